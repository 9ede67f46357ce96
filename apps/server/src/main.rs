//! Price Watch Bot - Headless Server
//!
//! Polls the token price and alerts Telegram users whose watch slots trigger.

mod config;

use clap::Parser;
use config::AppConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

use pricewatch_alerts::{Database, Notifier, TelegramBot};
use pricewatch_feeds::{DexScreenerFetcher, FetcherConfig, PriceSource};

/// Price Watch Bot CLI
#[derive(Parser, Debug)]
#[command(name = "pricewatch-bot")]
#[command(about = "Telegram token price alert bot", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long)]
    log_level: Option<String>,

    /// SQLite database URL
    #[arg(long)]
    database_url: Option<String>,

    /// Seconds between price checks
    #[arg(short = 'i', long)]
    poll_interval: Option<u64>,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(url) = &self.database_url {
            config.database_url = url.clone();
        }
        if let Some(secs) = self.poll_interval {
            config.monitor.poll_interval_secs = secs;
        }
    }
}

fn init_logging(level: &str) {
    let level = match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Filesystem path of a SQLite URL, if it names a file.
fn sqlite_file_path(database_url: &str) -> Option<PathBuf> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(PathBuf::from(path))
}

fn ensure_database_dir(database_url: &str) -> std::io::Result<()> {
    let parent = sqlite_file_path(database_url)
        .and_then(|path| path.parent().map(Path::to_path_buf))
        .filter(|dir| !dir.as_os_str().is_empty());

    if let Some(dir) = parent {
        std::fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "Database directory ready");
    }
    Ok(())
}

async fn run_monitor_loop(notifier: Arc<Notifier>, interval: Duration) {
    info!(interval_secs = interval.as_secs(), "Starting monitor loop");

    loop {
        match notifier.run_cycle().await {
            Ok(Some(report)) if report.fired > 0 => {
                info!(
                    price = report.price,
                    checked = report.checked,
                    fired = report.fired,
                    delivered = report.delivered,
                    failed = report.failed,
                    "Monitor cycle fired watches"
                );
            }
            Ok(Some(report)) => {
                debug!(
                    price = report.price,
                    checked = report.checked,
                    "Monitor cycle complete"
                );
            }
            Ok(None) => debug!("Monitor cycle skipped"),
            Err(e) => error!(error = %e, "Monitor cycle failed"),
        }

        tokio::time::sleep(interval).await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let mut config = AppConfig::load(Path::new(&args.config))?;
    config.apply_env();
    args.apply(&mut config);

    init_logging(&config.log_level);
    config.validate()?;

    info!("🚀 Price Watch Bot starting...");
    info!("  Chain: {}", config.feed.chain);
    info!("  Token: {}", config.feed.token_address);
    info!("  Poll Interval: {}s", config.monitor.poll_interval_secs);
    info!("  Database: {}", config.database_url);

    ensure_database_dir(&config.database_url)?;
    let db = Database::connect(&config.database_url).await?;

    let fetcher = DexScreenerFetcher::new(&FetcherConfig::from(&config.feed))?;
    info!("  Feed: {}", fetcher.url());
    let source: Arc<dyn PriceSource> = Arc::new(fetcher);

    let bot = Arc::new(TelegramBot::new(
        &config.telegram.bot_token,
        db.clone(),
        source.clone(),
    ));
    let notifier = Arc::new(Notifier::new(db, source, bot.clone()));

    let monitor_handle = tokio::spawn(run_monitor_loop(
        notifier,
        config.monitor.poll_interval(),
    ));

    // Returns on Ctrl+C
    bot.run().await;

    info!("Shutting down...");
    monitor_handle.abort();
    info!("👋 Goodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sqlite_file_path() {
        assert_eq!(
            sqlite_file_path("sqlite://db/saves.db"),
            Some(PathBuf::from("db/saves.db"))
        );
        assert_eq!(
            sqlite_file_path("sqlite:data.db?mode=rwc"),
            Some(PathBuf::from("data.db"))
        );
        assert_eq!(sqlite_file_path("sqlite::memory:"), None);
        assert_eq!(sqlite_file_path("postgres://localhost/db"), None);
    }

    #[test]
    fn test_ensure_database_dir_without_parent() {
        assert!(ensure_database_dir("sqlite::memory:").is_ok());
        assert!(ensure_database_dir("sqlite://saves.db").is_ok());
    }

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from([
            "pricewatch-bot",
            "--log-level",
            "debug",
            "--poll-interval",
            "15",
        ]);
        let mut config = AppConfig::default();
        args.apply(&mut config);

        assert_eq!(args.config, "config.json");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.monitor.poll_interval_secs, 15);
        assert_eq!(config.database_url, "sqlite://db/saves.db");
    }
}
