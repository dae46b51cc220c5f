use crate::pipeline::ingest::{IngestReport, IngestionController};
use crate::scheduler::{Job, Quota, RateLimitedScheduler};
use crate::settings::SweepPlan;
use crate::store::{Collection, DocumentStore, StoreResult, decode_rows};
use chrono::{DateTime, TimeDelta, Utc};
use log::{error, info};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use xmlstats_api::Game;

/// What a deferred ingest job should do, with its arguments bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestTask {
    Teams,
    Schedule { team_id: String },
    Roster { team_id: String },
    Result { game_id: String },
}

impl fmt::Display for IngestTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestTask::Teams => f.write_str("teams"),
            IngestTask::Schedule { team_id } => write!(f, "schedule {team_id}"),
            IngestTask::Roster { team_id } => write!(f, "roster {team_id}"),
            IngestTask::Result { game_id } => write!(f, "result {game_id}"),
        }
    }
}

pub struct IngestJob {
    controller: Arc<IngestionController>,
    task: IngestTask,
}

#[derive(Debug)]
pub struct JobOutcome {
    pub task: IngestTask,
    /// `None` when the job failed; the failure has already been logged.
    pub report: Option<IngestReport>,
}

impl Job for IngestJob {
    type Output = JobOutcome;

    fn describe(&self) -> String {
        self.task.to_string()
    }

    async fn run(self) -> JobOutcome {
        let controller = &self.controller;
        let result = match &self.task {
            IngestTask::Teams => controller.refresh_teams().await,
            IngestTask::Schedule { team_id } => controller.ingest_schedule(team_id).await,
            IngestTask::Roster { team_id } => controller.ingest_roster(team_id).await,
            IngestTask::Result { game_id } => controller.ingest_result(game_id).await,
        };

        let report = match result {
            Ok(report) => Some(report),
            Err(e) => {
                error!("{} failed: {e}", self.task);
                None
            }
        };
        JobOutcome { task: self.task, report }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub jobs: usize,
    pub failed: usize,
    /// Phases that never ran because their work list couldn't be read.
    pub skipped_phases: usize,
    pub totals: IngestReport,
}

impl SweepSummary {
    fn absorb(&mut self, outcomes: Vec<JobOutcome>) {
        for outcome in outcomes {
            self.jobs += 1;
            match outcome.report {
                Some(report) => self.totals += report,
                None => self.failed += 1,
            }
        }
    }
}

impl fmt::Display for SweepSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} jobs ({} failed): {}", self.jobs, self.failed, self.totals)?;
        if self.skipped_phases > 0 {
            write!(f, "; {} phases skipped", self.skipped_phases)?;
        }
        Ok(())
    }
}

/// A game is assumed over once `cutoff` has passed since tip-off.
pub fn is_finished(game: &Game, now: DateTime<Utc>, cutoff: TimeDelta) -> bool {
    game.event_start_date_time
        .checked_add_signed(cutoff)
        .is_some_and(|done| done < now)
}

/// One pass over everything that might need fetching.
///
/// Phases run in order so each one sees what the previous one stored:
/// teams, then schedules and rosters per stored team, then results for
/// finished games. All phases share the scheduler's quota.
pub struct Sweep {
    controller: Arc<IngestionController>,
    store: Arc<dyn DocumentStore>,
    scheduler: RateLimitedScheduler<IngestJob>,
    plan: SweepPlan,
    result_cutoff: TimeDelta,
}

impl Sweep {
    pub fn new(
        controller: IngestionController,
        store: Arc<dyn DocumentStore>,
        quota: Quota,
        plan: SweepPlan,
        result_cutoff: TimeDelta,
    ) -> Self {
        Self {
            controller: Arc::new(controller),
            store,
            scheduler: RateLimitedScheduler::new(quota),
            plan,
            result_cutoff,
        }
    }

    pub fn quota(&self) -> Quota {
        self.scheduler.quota()
    }

    /// Run every enabled phase. A listing failure skips only the phase that
    /// needed it; later phases still run.
    pub async fn run(&mut self, now: DateTime<Utc>) -> SweepSummary {
        let mut summary = SweepSummary::default();

        if self.plan.refresh_teams {
            self.submit(IngestTask::Teams);
            summary.absorb(self.scheduler.schedule().await);
        }

        if self.plan.refresh_schedules || self.plan.refresh_rosters {
            match self.store.list(Collection::Teams, false).await {
                Ok(teams) => {
                    info!("refreshing {} teams", teams.len());
                    for row in teams {
                        if self.plan.refresh_schedules {
                            self.submit(IngestTask::Schedule { team_id: row.id.clone() });
                        }
                        if self.plan.refresh_rosters {
                            self.submit(IngestTask::Roster { team_id: row.id });
                        }
                    }
                    summary.absorb(self.scheduler.schedule().await);
                }
                Err(e) => {
                    error!("could not list teams; skipping schedules and rosters: {e}");
                    summary.skipped_phases += 1;
                }
            }
        }

        if self.plan.fetch_results {
            match self.pending_results(now).await {
                Ok(pending) => {
                    info!("{} finished games without results or scores", pending.len());
                    for game_id in pending {
                        self.submit(IngestTask::Result { game_id });
                    }
                    summary.absorb(self.scheduler.schedule().await);
                }
                Err(e) => {
                    error!("could not list pending games; skipping results: {e}");
                    summary.skipped_phases += 1;
                }
            }
        }

        summary
    }

    /// Finished games with no processed record, in id order. That covers
    /// games never fetched and games whose scoring failed after the fetch.
    async fn pending_results(&self, now: DateTime<Utc>) -> StoreResult<Vec<String>> {
        let processed = self.ids(Collection::Processed).await?;

        let rows = self.store.list(Collection::Games, true).await?;
        let games: Vec<Game> = decode_rows(Collection::Games, rows);
        Ok(games
            .into_iter()
            .filter(|game| is_finished(game, now, self.result_cutoff))
            .filter(|game| !processed.contains(&game.event_id))
            .map(|game| game.event_id)
            .collect())
    }

    async fn ids(&self, collection: Collection) -> StoreResult<HashSet<String>> {
        Ok(self
            .store
            .list(collection, false)
            .await?
            .into_iter()
            .map(|row| row.id)
            .collect())
    }

    fn submit(&mut self, task: IngestTask) {
        self.scheduler.submit(IngestJob { controller: self.controller.clone(), task });
    }
}
