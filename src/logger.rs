//! log4rs setup. Audit and metrics lines (see [`crate::query::telemetry`]) are routed to
//! their own rolling files when a log directory is configured; otherwise everything goes
//! to stderr so stdout stays reserved for command output.

use crate::errors::DbError;
use crate::query::telemetry::{AUDIT_TARGET, METRICS_TARGET};
use log::LevelFilter;
use log4rs::Handle;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::Path;
use std::sync::OnceLock;

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_RETENTION: u32 = 7;

static HANDLE: OnceLock<Handle> = OnceLock::new();

fn config_err(e: impl std::fmt::Display) -> DbError {
    DbError::Config(format!("logging: {e}"))
}

/// Unknown names fall back to `info`.
#[must_use]
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(dir: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, DbError> {
    let pattern = dir.join(format!("{stem}.{{}}.log"));
    let roller = FixedWindowRoller::builder()
        .build(&pattern.display().to_string(), keep)
        .map_err(config_err)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(dir.join(format!("{stem}.log")), Box::new(policy))
        .map_err(config_err)
}

/// Builds the log4rs configuration without installing it.
///
/// # Errors
/// Returns an error if the directory cannot be created or an appender cannot open its file.
pub fn build_config(dir: Option<&Path>, level: &str, retention: Option<u32>) -> Result<Config, DbError> {
    let lvl = parse_level(level);
    let Some(dir) = dir else {
        let console = ConsoleAppender::builder()
            .target(Target::Stderr)
            .encoder(Box::new(PatternEncoder::new(PATTERN)))
            .build();
        return Config::builder()
            .appender(Appender::builder().build("console", Box::new(console)))
            .build(Root::builder().appender("console").build(lvl))
            .map_err(config_err);
    };
    std::fs::create_dir_all(dir)?;
    let keep = retention.unwrap_or(DEFAULT_RETENTION).max(1);
    Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(dir, "app", keep)?)))
        .appender(Appender::builder().build("audit", Box::new(rolling(dir, "audit", keep)?)))
        .appender(Appender::builder().build("metrics", Box::new(rolling(dir, "metrics", keep)?)))
        .logger(Logger::builder().appender("audit").additive(false).build(AUDIT_TARGET, lvl))
        .logger(Logger::builder().appender("metrics").additive(false).build(METRICS_TARGET, lvl))
        .build(Root::builder().appender("app").build(lvl))
        .map_err(config_err)
}

/// Installs (or replaces) the process-wide logging configuration.
///
/// # Errors
/// Returns an error if the configuration cannot be built, or if another logger
/// implementation was installed first.
pub fn configure_logging(dir: Option<&Path>, level: &str, retention: Option<u32>) -> Result<(), DbError> {
    let config = build_config(dir, level, retention)?;
    if let Some(handle) = HANDLE.get() {
        handle.set_config(config);
        return Ok(());
    }
    let handle = log4rs::init_config(config).map_err(config_err)?;
    // a concurrent first call may have won; its handle drives the same logger
    let _ = HANDLE.set(handle);
    Ok(())
}

/// Configures logging from `BOOKSTORE_LOG_DIR`, `BOOKSTORE_LOG_LEVEL` and
/// `BOOKSTORE_LOG_RETENTION`.
///
/// # Errors
/// See [`configure_logging`].
pub fn configure_from_env() -> Result<(), DbError> {
    let dir = std::env::var("BOOKSTORE_LOG_DIR").ok().map(std::path::PathBuf::from);
    let level = std::env::var("BOOKSTORE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let retention = std::env::var("BOOKSTORE_LOG_RETENTION").ok().and_then(|s| s.parse::<u32>().ok());
    configure_logging(dir.as_deref(), &level, retention)
}
