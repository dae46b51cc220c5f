use crate::pipeline::scoring::ScoringEngine;
use crate::store::{Collection, DocumentStore, StoreError, to_document};
use log::{debug, warn};
use serde_json::Value;
use std::fmt;
use std::ops::AddAssign;
use std::sync::Arc;
use thiserror::Error;
use xmlstats_api::Reply;
use xmlstats_api::client::{ApiError, XmlstatsApi};
use xmlstats_api::xmlstats::XmlstatsError;

/// Write counts for one ingest call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub conflicts: usize,
    pub scored: usize,
}

impl AddAssign for IngestReport {
    fn add_assign(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.conflicts += other.conflicts;
        self.scored += other.scored;
    }
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} inserted, {} updated, {} unchanged, {} conflicts, {} scored",
            self.inserted, self.updated, self.unchanged, self.conflicts, self.scored
        )
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type IngestResult = Result<IngestReport, IngestError>;

/// Fetch-and-upsert flows, one per entity kind.
///
/// Games and results are write-once: an existing document is never
/// rewritten. Teams and players are overwritten with the current revision.
/// Conflicts are logged and skipped.
pub struct IngestionController {
    api: XmlstatsApi,
    store: Arc<dyn DocumentStore>,
    scoring: ScoringEngine,
}

impl IngestionController {
    pub fn new(api: XmlstatsApi, store: Arc<dyn DocumentStore>, scoring: ScoringEngine) -> Self {
        Self { api, store, scoring }
    }

    pub async fn refresh_teams(&self) -> IngestResult {
        let mut report = IngestReport::default();
        let Some(teams) = accept(self.api.fetch_teams().await?, "teams") else {
            return Ok(report);
        };

        for team in teams.iter().filter(|t| !t.team_id.is_empty()) {
            let doc = to_document(team)?;
            self.overwrite(Collection::Teams, &team.team_id, &doc, &mut report).await?;
        }
        Ok(report)
    }

    /// Record every game in a team's results listing that isn't stored yet.
    pub async fn ingest_schedule(&self, team_id: &str) -> IngestResult {
        let mut report = IngestReport::default();
        let Some(games) = accept(self.api.fetch_schedule(team_id).await?, team_id) else {
            return Ok(report);
        };
        debug!("{team_id}: {} games listed", games.len());

        for game in &games {
            if self.store.get(Collection::Games, &game.event_id).await?.is_some() {
                report.unchanged += 1;
                continue;
            }
            let doc = to_document(game)?;
            self.create(Collection::Games, &game.event_id, &doc, &mut report).await?;
        }
        Ok(report)
    }

    /// Refresh every player on a team's roster, stamping them with `team_id`.
    pub async fn ingest_roster(&self, team_id: &str) -> IngestResult {
        let mut report = IngestReport::default();
        let Some(roster) = accept(self.api.fetch_roster(team_id).await?, team_id) else {
            return Ok(report);
        };
        debug!("{team_id}: {} players on roster", roster.players.len());

        for mut player in roster.players {
            if player.display_name.is_empty() {
                continue;
            }
            player.team_id = Some(team_id.to_owned());
            let doc = to_document(&player)?;
            self.overwrite(Collection::Players, &player.display_name, &doc, &mut report)
                .await?;
        }
        Ok(report)
    }

    /// Fetch and store a game's box score if it isn't stored yet, then score it.
    pub async fn ingest_result(&self, game_id: &str) -> IngestResult {
        let mut report = IngestReport::default();
        if self.store.get(Collection::Results, game_id).await?.is_some() {
            debug!("{game_id}: result already stored");
            report.unchanged += 1;
            // Scoring skips games that already have a processed record.
            self.score(game_id, &mut report).await;
            return Ok(report);
        }

        let Some(box_score) = accept(self.api.fetch_boxscore(game_id).await?, game_id) else {
            return Ok(report);
        };
        let doc = to_document(&box_score)?;
        if !self.create(Collection::Results, game_id, &doc, &mut report).await? {
            return Ok(report);
        }

        self.score(game_id, &mut report).await;
        Ok(report)
    }

    /// A scoring failure leaves the result in place; the next sweep retries.
    async fn score(&self, game_id: &str, report: &mut IngestReport) {
        match self.scoring.process(game_id).await {
            Ok(Some(_)) => report.scored += 1,
            Ok(None) => {}
            Err(e) => warn!("{game_id}: result stored but scoring failed: {e}"),
        }
    }

    /// Insert a new document. `false` if someone else got there first.
    async fn create(
        &self,
        collection: Collection,
        id: &str,
        doc: &Value,
        report: &mut IngestReport,
    ) -> Result<bool, StoreError> {
        match self.store.insert(collection, id, doc, None).await {
            Ok(_) => {
                report.inserted += 1;
                Ok(true)
            }
            Err(StoreError::Conflict { .. }) => {
                warn!("{collection}/{id} already exists; skipping");
                report.conflicts += 1;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Insert, or replace carrying the stored revision forward.
    async fn overwrite(
        &self,
        collection: Collection,
        id: &str,
        doc: &Value,
        report: &mut IngestReport,
    ) -> Result<(), StoreError> {
        let current = self.store.get(collection, id).await?;
        let rev = current.as_ref().map(|d| d.rev.as_str());

        match self.store.insert(collection, id, doc, rev).await {
            Ok(_) if current.is_some() => report.updated += 1,
            Ok(_) => report.inserted += 1,
            Err(StoreError::Conflict { .. }) => {
                warn!("{collection}/{id} changed underneath us; skipping");
                report.conflicts += 1;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }
}

/// Unwrap a 200 reply; anything else is logged and treated as no data.
fn accept<T>(reply: Reply<T>, what: &str) -> Option<T> {
    match reply {
        Reply::Data(data) => Some(data),
        Reply::Status { status, body } => {
            warn!(
                "Server did not return a \"200 OK\" response for {what}: {status} {}",
                XmlstatsError::describe(&body)
            );
            None
        }
    }
}
