//! xmlstats wire types: serde shapes for the NBA endpoints the pipeline reads.
//! Every document keeps unknown fields in `extra` so the stored copy is the
//! full provider payload, not just the fields named here.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Teams  (/{sport}/teams)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Team {
    pub team_id: String,
    pub abbreviation: String,
    pub full_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Team results  (/{sport}/results/{team_id})
// ---------------------------------------------------------------------------

/// One game from a team's results listing, seen from that team's side.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TeamResult {
    pub event_id: String,
    pub event_start_date_time: Option<String>,
    pub event_season_type: Option<String>,
    pub team: Team,
    pub opponent: Team,
    /// "h" or "a", relative to `team`.
    pub team_event_location_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Box score  (/{sport}/boxscore/{event_id})
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxScore {
    pub home_team: Team,
    pub away_team: Team,
    /// Absent on some feeds until the game is final.
    pub home_period_scores: Option<Vec<i32>>,
    pub away_period_scores: Option<Vec<i32>>,
    pub home_stats: Vec<PlayerStats>,
    pub away_stats: Vec<PlayerStats>,
    pub home_totals: Option<TeamTotals>,
    pub away_totals: Option<TeamTotals>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerStats {
    pub display_name: String,
    pub team_abbreviation: Option<String>,
    pub position: Option<String>,
    pub minutes: Option<i32>,
    pub points: Option<i32>,
    pub assists: Option<i32>,
    pub offensive_rebounds: Option<i32>,
    pub defensive_rebounds: Option<i32>,
    pub steals: Option<i32>,
    pub blocks: Option<i32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlayerStats {
    pub fn rebounds(&self) -> Option<i32> {
        match (self.offensive_rebounds, self.defensive_rebounds) {
            (None, None) => None,
            (off, def) => Some(off.unwrap_or_default() + def.unwrap_or_default()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamTotals {
    pub points: Option<i32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Roster  (/{sport}/roster/{team_id})
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Roster {
    pub team: Team,
    pub players: Vec<Player>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Player {
    pub display_name: String,
    pub birthplace: Option<String>,
    /// Not part of the roster payload; stamped with the roster's team on ingest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Errors  (any non-200 body)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct XmlstatsError {
    pub error: XmlstatsErrorDetail,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct XmlstatsErrorDetail {
    pub code: String,
    pub description: String,
}

impl XmlstatsError {
    /// Best-effort description of an error body, falling back to the raw text.
    pub fn describe(body: &str) -> String {
        match serde_json::from_str::<XmlstatsError>(body) {
            Ok(err) if !err.error.description.is_empty() => {
                format!("{} ({})", err.error.description, err.error.code)
            }
            _ => body.to_owned(),
        }
    }
}
