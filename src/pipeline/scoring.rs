use crate::store::{Collection, DocumentStore, StoreError, StoreResult, decode_rows, to_document};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use xmlstats_api::xmlstats::{BoxScore, Player, PlayerStats, Team, TeamTotals};

/// Per-period caps for regulation; later periods are worth more.
const REGULATION_CAPS: [i32; 4] = [2, 4, 6, 8];
const OVERTIME_BASE: i32 = 5;
const OVERTIME_FLOOR: i32 = 3;
const LEAD_CHANGE_POINTS: i32 = 3;
/// Lowercased birthplace fragment that marks a player as notable.
const NOTABLE_BIRTHPLACE: &str = "australia";

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Rating {
    A,
    B,
    C,
}

impl Rating {
    pub fn from_score(score: i32) -> Self {
        if score > 15 {
            Rating::A
        } else if score > 10 {
            Rating::B
        } else {
            Rating::C
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodMetrics {
    pub q1_dif: i32,
    pub q2_dif: i32,
    pub q3_dif: i32,
    pub q4_dif: i32,
    pub points_total_diff: i32,
    pub points_final_diff: i32,
    pub lead_changes: i32,
    pub points_based_score: i32,
    pub points_based_rating: Rating,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSummary {
    pub team_id: String,
    pub abbreviation: String,
    pub full_name: String,
}

impl From<&Team> for TeamSummary {
    fn from(team: &Team) -> Self {
        Self {
            team_id: team.team_id.clone(),
            abbreviation: team.abbreviation.clone(),
            full_name: team.full_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotablePlayer {
    pub display_name: String,
    pub team_abbreviation: Option<String>,
    pub position: Option<String>,
    pub minutes: Option<i32>,
    pub points: Option<i32>,
    pub assists: Option<i32>,
    pub rebounds: Option<i32>,
    pub steals: Option<i32>,
    pub blocks: Option<i32>,
}

impl From<&PlayerStats> for NotablePlayer {
    fn from(line: &PlayerStats) -> Self {
        Self {
            display_name: line.display_name.clone(),
            team_abbreviation: line.team_abbreviation.clone(),
            position: line.position.clone(),
            minutes: line.minutes,
            points: line.points,
            assists: line.assists,
            rebounds: line.rebounds(),
            steals: line.steals,
            blocks: line.blocks,
        }
    }
}

/// The derived, write-once record for one finished game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedGame {
    pub game_id: String,
    pub home_team: TeamSummary,
    pub away_team: TeamSummary,
    /// Absent when the box score lacks usable period scores.
    #[serde(flatten)]
    pub metrics: Option<PeriodMetrics>,
    pub notable_players: Vec<NotablePlayer>,
    /// Display string only; which side comes first is a coin flip.
    pub final_score: Option<String>,
}

// ---------------------------------------------------------------------------
// Display-order randomness
// ---------------------------------------------------------------------------

pub trait Coin: Send {
    /// Whether the home score is shown first.
    fn home_first(&mut self) -> bool;
}

pub struct RandomCoin(StdRng);

impl RandomCoin {
    pub fn new() -> Self {
        Self(StdRng::from_entropy())
    }
}

impl Default for RandomCoin {
    fn default() -> Self {
        Self::new()
    }
}

impl Coin for RandomCoin {
    fn home_first(&mut self) -> bool {
        self.0.gen_bool(0.5)
    }
}

/// Always lands the same way.
#[derive(Debug, Clone, Copy)]
pub struct FixedCoin(pub bool);

impl Coin for FixedCoin {
    fn home_first(&mut self) -> bool {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Pure scoring
// ---------------------------------------------------------------------------

/// Scoring metrics from per-period scores, or `None` if either side has
/// fewer than four periods.
pub fn period_metrics(home: &[i32], away: &[i32]) -> Option<PeriodMetrics> {
    if home.len() < REGULATION_CAPS.len() || away.len() < REGULATION_CAPS.len() {
        return None;
    }
    let periods = home.len().min(away.len());
    let diff = |i: usize| (home[i] - away[i]).abs();
    let home_led = |i: usize| home[i] > away[i];

    let regulation: [i32; 4] = std::array::from_fn(diff);
    let mut score: i32 = regulation
        .iter()
        .zip(REGULATION_CAPS)
        .map(|(&d, cap)| (cap - d).max(0))
        .sum();

    let mut lead_changes = (1..REGULATION_CAPS.len())
        .filter(|&i| home_led(i) != home_led(i - 1))
        .count() as i32;

    for i in REGULATION_CAPS.len()..periods {
        score += (OVERTIME_BASE - diff(i)).max(OVERTIME_FLOOR);
        if home_led(i) != home_led(i - 1) {
            lead_changes += 1;
        }
    }
    score += LEAD_CHANGE_POINTS * lead_changes;

    Some(PeriodMetrics {
        q1_dif: regulation[0],
        q2_dif: regulation[1],
        q3_dif: regulation[2],
        q4_dif: regulation[3],
        points_total_diff: regulation.iter().sum(),
        points_final_diff: regulation[3],
        lead_changes,
        points_based_score: score,
        points_based_rating: Rating::from_score(score),
    })
}

/// Display names of players whose birthplace contains "australia", ignoring case.
pub fn notable_names<'a>(players: impl IntoIterator<Item = &'a Player>) -> HashSet<String> {
    players
        .into_iter()
        .filter(|p| {
            p.birthplace
                .as_deref()
                .is_some_and(|b| b.to_lowercase().contains(NOTABLE_BIRTHPLACE))
        })
        .map(|p| p.display_name.clone())
        .collect()
}

fn final_points(periods: Option<&Vec<i32>>, totals: Option<&TeamTotals>) -> Option<i32> {
    totals
        .and_then(|t| t.points)
        .or_else(|| periods.map(|p| p.iter().sum()))
}

pub fn score_game(
    game_id: &str,
    box_score: &BoxScore,
    notable: &HashSet<String>,
    home_first: bool,
) -> ProcessedGame {
    let metrics = match (&box_score.home_period_scores, &box_score.away_period_scores) {
        (Some(home), Some(away)) => period_metrics(home, away),
        _ => None,
    };

    let notable_players = box_score
        .home_stats
        .iter()
        .chain(&box_score.away_stats)
        .filter(|line| notable.contains(&line.display_name))
        .map(NotablePlayer::from)
        .collect();

    let home = final_points(box_score.home_period_scores.as_ref(), box_score.home_totals.as_ref());
    let away = final_points(box_score.away_period_scores.as_ref(), box_score.away_totals.as_ref());
    let final_score = match (home, away) {
        (Some(h), Some(a)) if home_first => Some(format!("{h}/{a}")),
        (Some(h), Some(a)) => Some(format!("{a}/{h}")),
        _ => None,
    };

    ProcessedGame {
        game_id: game_id.to_owned(),
        home_team: TeamSummary::from(&box_score.home_team),
        away_team: TeamSummary::from(&box_score.away_team),
        metrics,
        notable_players,
        final_score,
    }
}

// ---------------------------------------------------------------------------
// Store-backed engine
// ---------------------------------------------------------------------------

pub struct ScoringEngine {
    store: Arc<dyn DocumentStore>,
    coin: Mutex<Box<dyn Coin>>,
}

impl ScoringEngine {
    pub fn new(store: Arc<dyn DocumentStore>, coin: impl Coin + 'static) -> Self {
        Self { store, coin: Mutex::new(Box::new(coin)) }
    }

    /// Score a stored result and persist the processed record.
    ///
    /// Returns `None` without writing when the game is already processed,
    /// has no stored result, or loses a concurrent write.
    pub async fn process(&self, game_id: &str) -> StoreResult<Option<ProcessedGame>> {
        if self.store.get(Collection::Processed, game_id).await?.is_some() {
            debug!("{game_id} already processed");
            return Ok(None);
        }

        let Some(result) = self.store.get(Collection::Results, game_id).await? else {
            warn!("no result stored for {game_id}; nothing to score");
            return Ok(None);
        };
        let box_score: BoxScore = result.decode(Collection::Results)?;

        let rows = self.store.list(Collection::Players, true).await?;
        let players: Vec<Player> = decode_rows(Collection::Players, rows);
        let notable = notable_names(&players);

        let home_first = {
            let mut coin = self.coin.lock().unwrap_or_else(|e| e.into_inner());
            coin.home_first()
        };
        let processed = score_game(game_id, &box_score, &notable, home_first);

        let doc = to_document(&processed)?;
        match self.store.insert(Collection::Processed, game_id, &doc, None).await {
            Ok(_) => {
                info!(
                    "processed {game_id}: rating {:?}, {} notable players",
                    processed.metrics.as_ref().map(|m| m.points_based_rating),
                    processed.notable_players.len()
                );
                Ok(Some(processed))
            }
            Err(StoreError::Conflict { .. }) => {
                warn!("{game_id} was processed concurrently; keeping the stored record");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
