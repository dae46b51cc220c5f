use bestgame::pipeline::ingest::IngestionController;
use bestgame::pipeline::scoring::{RandomCoin, ScoringEngine};
use bestgame::pipeline::sweep::Sweep;
use bestgame::settings::{Settings, StoreSettings};
use bestgame::store::{Collection, CouchStore, DocumentStore, MemoryStore};
use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;
use xmlstats_api::client::XmlstatsApi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if handle_cli_args() {
        return Ok(());
    }

    better_panic::install();
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::load()?;
    let store = open_store(&settings.store);

    let api = XmlstatsApi::new(&settings.provider.access_token, settings.provider.user_agent())
        .with_host(settings.provider.scheme.as_str(), settings.provider.host.as_str())
        .with_sport(settings.provider.sport.as_str())
        .with_timeout(settings.provider.timeout);
    let scoring = ScoringEngine::new(store.clone(), RandomCoin::new());
    let controller = IngestionController::new(api, store.clone(), scoring);

    let mut sweep = Sweep::new(controller, store, settings.quota, settings.plan, settings.result_cutoff);
    let quota = sweep.quota();
    info!(
        "sweep starting: {} starts per {:?}, {} concurrent",
        quota.max_starts(),
        quota.window(),
        quota.max_concurrent()
    );

    let summary = sweep.run(Utc::now()).await;
    info!("sweep finished: {summary}");

    Ok(())
}

fn open_store(settings: &StoreSettings) -> Arc<dyn DocumentStore> {
    let Some(url) = &settings.couchdb_url else {
        warn!("COUCHDB_URL not set; running against an in-memory store, nothing will persist");
        return Arc::new(MemoryStore::new());
    };

    let mut couch = CouchStore::new(url.as_str(), settings.db_prefix.as_str());
    if let Some(username) = &settings.username {
        couch = couch.with_credentials(username.as_str(), settings.password.clone());
    }
    let databases: Vec<String> = Collection::ALL.iter().map(|&c| couch.database(c)).collect();
    info!("using CouchDB at {url}: {}", databases.join(", "));
    Arc::new(couch)
}

fn handle_cli_args() -> bool {
    let mut args = std::env::args().skip(1);
    let Some(arg) = args.next() else {
        return false;
    };

    match arg.as_str() {
        "-h" | "--help" => {
            println!("{}", usage_text());
            true
        }
        "-V" | "--version" => {
            println!("bestgame {}", env!("CARGO_PKG_VERSION"));
            true
        }
        _ => {
            eprintln!("Unknown argument: {arg}\n\n{}", usage_text());
            std::process::exit(2);
        }
    }
}

fn usage_text() -> &'static str {
    "bestgame - fetch NBA results from xmlstats and rate the best games to watch

Usage:
  bestgame
  bestgame --help
  bestgame --version

Runs one sweep (teams, schedules, rosters, finished-game results) and exits.
A .env file in the working directory is read if present.

Environment:
  XMLSTATS_ACCESS_TOKEN         xmlstats API token (required)
  XMLSTATS_USER_AGENT_CONTACT   Contact put in the User-Agent header (required)
  XMLSTATS_HOST                 API host (default erikberg.com)
  XMLSTATS_SCHEME               http or https (default https)
  XMLSTATS_SPORT                Sport path segment (default nba)
  XMLSTATS_TIMEOUT_SECS         Per-request timeout in seconds (default 30)
  COUCHDB_URL                   CouchDB base URL; unset runs in memory only
  COUCHDB_USERNAME              CouchDB basic-auth user
  COUCHDB_PASSWORD              CouchDB basic-auth password
  BESTGAME_DB_PREFIX            Database name prefix (default b_)
  BESTGAME_MAX_STARTS           Requests started per window (default 5)
  BESTGAME_WINDOW_SECS          Rate window in seconds (default 60)
  BESTGAME_MAX_CONCURRENT       Requests in flight at once (default 5)
  BESTGAME_RESULT_CUTOFF_HOURS  Hours after tip-off before fetching a result (default 10)
  BESTGAME_REFRESH_TEAMS        Phase toggles, true/false (default true)
  BESTGAME_REFRESH_SCHEDULES
  BESTGAME_REFRESH_ROSTERS
  BESTGAME_FETCH_RESULTS
  RUST_LOG                      Log filter (default info)"
}
