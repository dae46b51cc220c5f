use crate::xmlstats::{BoxScore, Roster, Team, TeamResult};
use crate::{Game, Reply, RequestConfig};
use chrono::DateTime;
use flate2::read::GzDecoder;
use log::debug;
use reqwest::Client;
use reqwest::header::{ACCEPT_ENCODING, AUTHORIZATION, CONTENT_ENCODING, USER_AGENT};
use serde::de::DeserializeOwned;
use std::io::Read;
use std::time::Duration;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

pub const DEFAULT_HOST: &str = "erikberg.com";
pub const DEFAULT_SPORT: &str = "nba";

/// xmlstats API client.
///
/// Every call is a single GET; there is no retry or pacing here. Callers that
/// need to respect the provider's quota go through a scheduler first.
#[derive(Debug, Clone)]
pub struct XmlstatsApi {
    client: Client,
    scheme: String,
    host: String,
    sport: String,
    authorization: String,
    user_agent: String,
    timeout: Duration,
}

/// Failures that never produced an HTTP status worth branching on.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unable to contact server for {1}: {0}")]
    Network(#[source] reqwest::Error, String),
    #[error("Could not decompress response from {1}: {0}")]
    Decompress(#[source] std::io::Error, String),
    #[error("Parse error for {1}: {0}")]
    Parsing(#[source] serde_json::Error, String),
}

impl XmlstatsApi {
    pub fn new(access_token: &str, user_agent: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            scheme: "https".into(),
            host: DEFAULT_HOST.into(),
            sport: DEFAULT_SPORT.into(),
            authorization: format!("Bearer {access_token}"),
            user_agent: user_agent.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_host(mut self, scheme: impl Into<String>, host: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self.host = host.into();
        self
    }

    pub fn with_sport(mut self, sport: impl Into<String>) -> Self {
        self.sport = sport.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base request for `endpoint` under the configured sport.
    pub fn request(&self, endpoint: &str) -> RequestConfig {
        RequestConfig::new(self.host.as_str())
            .scheme(self.scheme.as_str())
            .sport(self.sport.as_str())
            .endpoint(endpoint)
    }

    pub async fn fetch_teams(&self) -> ApiResult<Reply<Vec<Team>>> {
        self.fetch(&self.request("teams")).await
    }

    /// A team's results listing, mapped to games with resolved home/away ids.
    pub async fn fetch_schedule(&self, team_id: &str) -> ApiResult<Reply<Vec<Game>>> {
        let reply: Reply<Vec<TeamResult>> = self.fetch(&self.request("results").id(team_id)).await?;
        Ok(reply.map(|results| results.iter().filter_map(map_team_result).collect()))
    }

    pub async fn fetch_roster(&self, team_id: &str) -> ApiResult<Reply<Roster>> {
        self.fetch(&self.request("roster").id(team_id)).await
    }

    pub async fn fetch_boxscore(&self, event_id: &str) -> ApiResult<Reply<BoxScore>> {
        self.fetch(&self.request("boxscore").id(event_id)).await
    }

    pub async fn fetch<T: DeserializeOwned>(&self, request: &RequestConfig) -> ApiResult<Reply<T>> {
        let url = request.build_url();
        debug!("GET {url}");

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .header(AUTHORIZATION, &self.authorization)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT_ENCODING, "gzip")
            .send()
            .await
            .map_err(|e| ApiError::Network(e, url.clone()))?;

        let status = response.status().as_u16();
        let gzipped = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("gzip"));

        let raw = response
            .bytes()
            .await
            .map_err(|e| ApiError::Network(e, url.clone()))?;

        if status != 200 {
            // Error bodies are informational; a mislabelled one is kept as sent.
            let body = match gzipped.then(|| gunzip(&raw)) {
                Some(Ok(body)) => String::from_utf8_lossy(&body).into_owned(),
                _ => String::from_utf8_lossy(&raw).into_owned(),
            };
            return Ok(Reply::Status { status, body });
        }

        let body = if gzipped {
            gunzip(&raw).map_err(|e| ApiError::Decompress(e, url.clone()))?
        } else {
            raw.to_vec()
        };

        serde_json::from_slice(&body)
            .map(Reply::Data)
            .map_err(|e| ApiError::Parsing(e, url))
    }
}

fn gunzip(raw: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(raw.len() * 4);
    GzDecoder::new(raw).read_to_end(&mut out)?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Mapping: xmlstats wire types → domain types
// ---------------------------------------------------------------------------

/// Entries with an unknown location or unparseable start time are skipped;
/// they can't be keyed or gated reliably.
fn map_team_result(r: &TeamResult) -> Option<Game> {
    let start = r.event_start_date_time.as_deref()?;
    let Ok(event_start_date_time) = DateTime::parse_from_rfc3339(start) else {
        debug!("skipping {}: bad start time {start:?}", r.event_id);
        return None;
    };

    let (home, away) = match r.team_event_location_type.as_deref() {
        Some(loc) if loc.eq_ignore_ascii_case("h") => (&r.team, &r.opponent),
        Some(loc) if loc.eq_ignore_ascii_case("a") => (&r.opponent, &r.team),
        other => {
            debug!("skipping {}: unknown location type {other:?}", r.event_id);
            return None;
        }
    };

    Some(Game {
        event_id: r.event_id.clone(),
        event_start_date_time,
        home_team_id: home.team_id.clone(),
        away_team_id: away.team_id.clone(),
        season_type: r.event_season_type.clone(),
    })
}
