use crate::scheduler::Quota;
use chrono::TimeDelta;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_DB_PREFIX: &str = "b_";
const DEFAULT_MAX_STARTS: usize = 5;
const DEFAULT_WINDOW_SECS: u64 = 60;
const DEFAULT_MAX_CONCURRENT: usize = 5;
const DEFAULT_RESULT_CUTOFF_HOURS: i64 = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub scheme: String,
    pub host: String,
    pub sport: String,
    pub access_token: String,
    pub user_agent_contact: String,
    /// Per-request timeout for provider calls.
    pub timeout: Duration,
}

impl ProviderSettings {
    /// `<product>/<version> (<contact>)`, as xmlstats asks every client to send.
    pub fn user_agent(&self) -> String {
        format!(
            "{}/{} ({})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            self.user_agent_contact
        )
    }
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// `None` runs against an in-memory store and persists nothing.
    pub couchdb_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db_prefix: String,
}

/// Which phases of a sweep are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPlan {
    pub refresh_teams: bool,
    pub refresh_schedules: bool,
    pub refresh_rosters: bool,
    pub fetch_results: bool,
}

impl Default for SweepPlan {
    fn default() -> Self {
        Self {
            refresh_teams: true,
            refresh_schedules: true,
            refresh_rosters: true,
            fetch_results: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: ProviderSettings,
    pub store: StoreSettings,
    pub quota: Quota,
    /// How long after tip-off a game is assumed finished.
    pub result_cutoff: TimeDelta,
    pub plan: SweepPlan,
}

impl Settings {
    pub fn load() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(SettingsError::Missing(key));

        let timeout_secs = parse_or(&get, "XMLSTATS_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(SettingsError::Invalid { key: "XMLSTATS_TIMEOUT_SECS", value: "0".into() });
        }

        let provider = ProviderSettings {
            scheme: get("XMLSTATS_SCHEME").unwrap_or_else(|| "https".into()),
            host: get("XMLSTATS_HOST").unwrap_or_else(|| xmlstats_api::client::DEFAULT_HOST.into()),
            sport: get("XMLSTATS_SPORT").unwrap_or_else(|| xmlstats_api::client::DEFAULT_SPORT.into()),
            access_token: required("XMLSTATS_ACCESS_TOKEN")?,
            user_agent_contact: required("XMLSTATS_USER_AGENT_CONTACT")?,
            timeout: Duration::from_secs(timeout_secs),
        };

        let store = StoreSettings {
            couchdb_url: get("COUCHDB_URL").map(|url| url.trim_end_matches('/').to_owned()),
            username: get("COUCHDB_USERNAME"),
            password: get("COUCHDB_PASSWORD"),
            db_prefix: lookup("BESTGAME_DB_PREFIX").unwrap_or_else(|| DEFAULT_DB_PREFIX.into()),
        };

        let max_starts = parse_or(&get, "BESTGAME_MAX_STARTS", DEFAULT_MAX_STARTS)?;
        let window_secs = parse_or(&get, "BESTGAME_WINDOW_SECS", DEFAULT_WINDOW_SECS)?;
        let max_concurrent = parse_or(&get, "BESTGAME_MAX_CONCURRENT", DEFAULT_MAX_CONCURRENT)?;
        let quota = Quota::new(max_starts, Duration::from_secs(window_secs), max_concurrent)
            .ok_or_else(|| SettingsError::Invalid {
                key: "BESTGAME_MAX_STARTS/BESTGAME_WINDOW_SECS/BESTGAME_MAX_CONCURRENT",
                value: format!("{max_starts}/{window_secs}/{max_concurrent}"),
            })?;

        let cutoff_hours = parse_or(&get, "BESTGAME_RESULT_CUTOFF_HOURS", DEFAULT_RESULT_CUTOFF_HOURS)?;
        let result_cutoff = TimeDelta::try_hours(cutoff_hours).ok_or(SettingsError::Invalid {
            key: "BESTGAME_RESULT_CUTOFF_HOURS",
            value: cutoff_hours.to_string(),
        })?;

        let plan = SweepPlan {
            refresh_teams: parse_flag(&get, "BESTGAME_REFRESH_TEAMS")?,
            refresh_schedules: parse_flag(&get, "BESTGAME_REFRESH_SCHEDULES")?,
            refresh_rosters: parse_flag(&get, "BESTGAME_REFRESH_ROSTERS")?,
            fetch_results: parse_flag(&get, "BESTGAME_FETCH_RESULTS")?,
        };

        Ok(Self { provider, store, quota, result_cutoff, plan })
    }
}

fn parse_or<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, SettingsError> {
    match get(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| SettingsError::Invalid { key, value }),
    }
}

/// Phase toggles default to on.
fn parse_flag(get: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<bool, SettingsError> {
    match get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(true),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(value) => Err(SettingsError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Settings, SettingsError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("XMLSTATS_ACCESS_TOKEN", "abc123"),
        ("XMLSTATS_USER_AGENT_CONTACT", "ops@example.com"),
    ];

    #[test]
    fn defaults_match_provider_quota() {
        let settings = load(&REQUIRED).unwrap();
        assert_eq!(settings.quota.max_starts(), 5);
        assert_eq!(settings.quota.window(), Duration::from_secs(60));
        assert_eq!(settings.quota.max_concurrent(), 5);
        assert_eq!(settings.result_cutoff, TimeDelta::hours(10));
        assert_eq!(settings.provider.host, "erikberg.com");
        assert_eq!(settings.provider.sport, "nba");
        assert_eq!(settings.provider.timeout, Duration::from_secs(30));
        assert_eq!(settings.store.db_prefix, "b_");
        assert!(settings.store.couchdb_url.is_none());
        assert_eq!(settings.plan, SweepPlan::default());
    }

    #[test]
    fn user_agent_carries_product_version_and_contact() {
        let settings = load(&REQUIRED).unwrap();
        assert_eq!(
            settings.provider.user_agent(),
            format!("bestgame/{} (ops@example.com)", env!("CARGO_PKG_VERSION"))
        );
    }

    #[test]
    fn missing_token_is_reported_by_name() {
        let err = load(&[("XMLSTATS_USER_AGENT_CONTACT", "ops@example.com")]).unwrap_err();
        assert_eq!(err, SettingsError::Missing("XMLSTATS_ACCESS_TOKEN"));
    }

    #[test]
    fn zero_quota_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("BESTGAME_MAX_CONCURRENT", "0"));
        assert!(matches!(load(&pairs), Err(SettingsError::Invalid { .. })));
    }

    #[test]
    fn overrides_and_flags_parse() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("COUCHDB_URL", "https://acct.cloudant.com/"),
            ("BESTGAME_MAX_STARTS", "3"),
            ("BESTGAME_RESULT_CUTOFF_HOURS", "12"),
            ("BESTGAME_REFRESH_ROSTERS", "off"),
            ("BESTGAME_DB_PREFIX", ""),
            ("XMLSTATS_TIMEOUT_SECS", "5"),
        ]);
        let settings = load(&pairs).unwrap();
        assert_eq!(settings.store.couchdb_url.as_deref(), Some("https://acct.cloudant.com"));
        assert_eq!(settings.quota.max_starts(), 3);
        assert_eq!(settings.result_cutoff, TimeDelta::hours(12));
        assert!(!settings.plan.refresh_rosters);
        assert!(settings.plan.refresh_teams);
        assert_eq!(settings.store.db_prefix, "");
        assert_eq!(settings.provider.timeout, Duration::from_secs(5));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("XMLSTATS_TIMEOUT_SECS", "0"));
        assert_eq!(
            load(&pairs).unwrap_err(),
            SettingsError::Invalid { key: "XMLSTATS_TIMEOUT_SECS", value: "0".into() }
        );
    }

    #[test]
    fn garbage_flag_is_invalid() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("BESTGAME_FETCH_RESULTS", "maybe"));
        assert_eq!(
            load(&pairs).unwrap_err(),
            SettingsError::Invalid { key: "BESTGAME_FETCH_RESULTS", value: "maybe".into() }
        );
    }
}
