pub mod client;
pub mod xmlstats;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request construction
// ---------------------------------------------------------------------------

/// The pieces of an xmlstats request URL.
///
/// Follows the documented request convention:
/// `https://{host}/{sport}/{endpoint}/{id}.{format}?{params}`.
/// Undefined path segments are dropped rather than left empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestConfig {
    pub scheme: String,
    pub host: String,
    pub sport: Option<String>,
    pub endpoint: Option<String>,
    pub id: Option<String>,
    pub format: String,
    pub params: Vec<(String, String)>,
}

impl RequestConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            scheme: "https".into(),
            host: host.into(),
            sport: None,
            endpoint: None,
            id: None,
            format: "json".into(),
            params: Vec::new(),
        }
    }

    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn sport(mut self, sport: impl Into<String>) -> Self {
        self.sport = Some(sport.into());
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Append a query parameter. Order of insertion is the order on the wire.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn build_url(&self) -> String {
        let path = [
            self.sport.as_deref(),
            self.endpoint.as_deref(),
            self.id.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("/");

        let mut url = format!("{}://{}/{}.{}", self.scheme, self.host, path, self.format);

        if !self.params.is_empty() {
            let query = self
                .params
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            url.push('?');
            url.push_str(&query);
        }
        url
    }
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// Outcome of a request that reached the server.
///
/// A non-200 status is not an error at this layer: callers decide what
/// "no data" means for them.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<T> {
    Data(T),
    Status { status: u16, body: String },
}

impl<T> Reply<T> {
    pub fn data(self) -> Option<T> {
        match self {
            Reply::Data(data) => Some(data),
            Reply::Status { .. } => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reply<U> {
        match self {
            Reply::Data(data) => Reply::Data(f(data)),
            Reply::Status { status, body } => Reply::Status { status, body },
        }
    }
}

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

/// A scheduled game, keyed by the provider's event id.
///
/// Built from a team's results listing, which reports the game from that
/// team's point of view; the home/away split is resolved at mapping time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub event_id: String,
    pub event_start_date_time: DateTime<FixedOffset>,
    pub home_team_id: String,
    pub away_team_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season_type: Option<String>,
}
