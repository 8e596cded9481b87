//! Process configuration, layered CLI-flag-over-environment-variable via
//! `clap`'s `env` feature. See `SPEC_FULL.md` section A.3.

use std::path::PathBuf;

use clap::Parser;

/// Long-running media ingestion pipeline.
#[derive(Debug, Parser, Clone)]
#[command(name = "scraper-pipeline", author, version, about)]
pub struct Settings {
    /// Start the automation loop instead of the interactive menu.
    #[arg(long, env = "SCRAPER_AUTOMATED")]
    pub automated: bool,

    /// Persistent store connection string (SQLite DSN).
    #[arg(long, env = "SCRAPER_CONNECTION_STRING", default_value = "sqlite://scraper.db")]
    pub connection_string: String,

    /// Root directory for downloads and logs.
    #[arg(long, env = "SCRAPER_DOWNLOAD_DIR", default_value = "./downloads")]
    pub download_dir: PathBuf,

    /// Delivery bot token. Delivery is enabled only when token, chat id,
    /// and base url are all present.
    #[arg(long, env = "SCRAPER_DELIVERY_TOKEN")]
    pub delivery_token: Option<String>,

    /// Delivery chat id.
    #[arg(long, env = "SCRAPER_DELIVERY_CHAT_ID")]
    pub delivery_chat_id: Option<String>,

    /// Delivery API base url, e.g. `https://api.telegram.org`.
    #[arg(long, env = "SCRAPER_DELIVERY_BASE_URL")]
    pub delivery_base_url: Option<String>,

    /// Challenge-solver endpoint.
    #[arg(long, env = "SCRAPER_SOLVER_URL", default_value = "http://127.0.0.1:8191/v1")]
    pub solver_url: String,

    /// Concurrent download workers.
    #[arg(long, env = "SCRAPER_CONCURRENCY_DOWNLOADS", default_value_t = 3)]
    pub concurrency_downloads: usize,

    /// Concurrent upload workers.
    #[arg(long, env = "SCRAPER_CONCURRENCY_UPLOADS", default_value_t = 2)]
    pub concurrency_uploads: usize,

    /// Session time-to-live, in minutes.
    #[arg(long, env = "SCRAPER_SESSION_TTL_MINUTES", default_value_t = 30)]
    pub session_ttl_minutes: i64,

    /// Default channel check interval, in minutes, for newly saved channels.
    #[arg(long, env = "SCRAPER_SCHEDULE_DEFAULT_INTERVAL_MINUTES", default_value_t = 60)]
    pub schedule_default_interval_minutes: i64,

    /// Increase log verbosity (repeatable). Ignored if `RUST_LOG` is set.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Decrease log verbosity. Ignored if `RUST_LOG` is set.
    #[arg(short, long)]
    pub quiet: bool,
}

impl Settings {
    /// Delivery is enabled only when all three delivery fields are set.
    pub fn delivery_enabled(&self) -> bool {
        self.delivery_token.is_some() && self.delivery_chat_id.is_some() && self.delivery_base_url.is_some()
    }

    /// True if exactly one or two (but not all three) delivery fields are set -
    /// a likely operator mistake, logged as a warning rather than a hard error.
    pub fn delivery_partially_configured(&self) -> bool {
        let set_count = [
            self.delivery_token.is_some(),
            self.delivery_chat_id.is_some(),
            self.delivery_base_url.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count();
        set_count > 0 && set_count < 3
    }
}
