//! Application configuration. Precedence: CLI > environment (`BOOKSTORE_*`) > TOML
//! file > defaults. Every source is a [`ConfigLayer`] of optional values; the first
//! layer that sets a value wins.

use crate::catalog::{DEFAULT_COLLECTION, DEFAULT_PAGE_SIZE};
use crate::errors::DbError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "bookstore.toml";
pub const DEFAULT_DB_NAME: &str = "plp_bookstore";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_SLOW_QUERY_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub db_name: String,
    pub collection: String,
    pub page_size: usize,
    pub log_dir: Option<PathBuf>,
    pub log_level: String,
    /// Rolled log files kept per stream; `None` uses the logger default.
    pub log_retention: Option<u32>,
    pub slow_query_ms: u64,
    /// NDJSON file of books to load instead of the built-in sample.
    pub seed_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_name: DEFAULT_DB_NAME.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            log_dir: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_retention: None,
            slow_query_ms: DEFAULT_SLOW_QUERY_MS,
            seed_file: None,
        }
    }
}

/// One configuration source with every value optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub db_name: Option<String>,
    pub collection: Option<String>,
    pub page_size: Option<usize>,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_retention: Option<u32>,
    pub slow_query_ms: Option<u64>,
    pub seed_file: Option<PathBuf>,
}

impl ConfigLayer {
    /// Fills values not yet set from a lower-precedence layer.
    pub fn fill_from(&mut self, lower: Self) {
        self.db_name = self.db_name.take().or(lower.db_name);
        self.collection = self.collection.take().or(lower.collection);
        self.page_size = self.page_size.or(lower.page_size);
        self.log_dir = self.log_dir.take().or(lower.log_dir);
        self.log_level = self.log_level.take().or(lower.log_level);
        self.log_retention = self.log_retention.or(lower.log_retention);
        self.slow_query_ms = self.slow_query_ms.or(lower.slow_query_ms);
        self.seed_file = self.seed_file.take().or(lower.seed_file);
    }

    /// # Errors
    /// Returns a config error if the file is unreadable or not valid TOML for this schema.
    pub fn from_toml_file(path: &Path) -> Result<Self, DbError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DbError::Config(format!("{}: {e}", path.display())))?;
        toml::from_str(&text).map_err(|e| DbError::Config(format!("{}: {e}", path.display())))
    }

    /// Reads `BOOKSTORE_*` variables through `lookup`.
    ///
    /// # Errors
    /// Returns a config error for unparseable numeric values.
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DbError> {
        let number = |key: &str| -> Result<Option<u64>, DbError> {
            lookup(key)
                .map(|v| v.trim().parse::<u64>().map_err(|e| DbError::Config(format!("{key}={v}: {e}"))))
                .transpose()
        };
        Ok(Self {
            db_name: lookup("BOOKSTORE_DB_NAME"),
            collection: lookup("BOOKSTORE_COLLECTION"),
            page_size: number("BOOKSTORE_PAGE_SIZE")?
                .map(usize::try_from)
                .transpose()
                .map_err(|e| DbError::Config(format!("BOOKSTORE_PAGE_SIZE: {e}")))?,
            log_dir: lookup("BOOKSTORE_LOG_DIR").map(PathBuf::from),
            log_level: lookup("BOOKSTORE_LOG_LEVEL"),
            log_retention: number("BOOKSTORE_LOG_RETENTION")?
                .map(u32::try_from)
                .transpose()
                .map_err(|e| DbError::Config(format!("BOOKSTORE_LOG_RETENTION: {e}")))?,
            slow_query_ms: number("BOOKSTORE_SLOW_QUERY_MS")?,
            seed_file: lookup("BOOKSTORE_SEED_FILE").map(PathBuf::from),
        })
    }

    /// Applies defaults and checks the result.
    ///
    /// # Errors
    /// Returns a config error for a zero page size or an empty name.
    pub fn resolve(self) -> Result<AppConfig, DbError> {
        let d = AppConfig::default();
        let cfg = AppConfig {
            db_name: self.db_name.unwrap_or(d.db_name),
            collection: self.collection.unwrap_or(d.collection),
            page_size: self.page_size.unwrap_or(d.page_size),
            log_dir: self.log_dir,
            log_level: self.log_level.unwrap_or(d.log_level),
            log_retention: self.log_retention,
            slow_query_ms: self.slow_query_ms.unwrap_or(d.slow_query_ms),
            seed_file: self.seed_file,
        };
        if cfg.log_retention == Some(0) {
            return Err(DbError::Config("log_retention must be at least 1".into()));
        }
        if cfg.page_size == 0 {
            return Err(DbError::Config("page_size must be at least 1".into()));
        }
        if cfg.collection.trim().is_empty() {
            return Err(DbError::Config("collection name must not be empty".into()));
        }
        if cfg.db_name.trim().is_empty() {
            return Err(DbError::Config("db_name must not be empty".into()));
        }
        Ok(cfg)
    }
}

/// Config file locations, highest precedence first. Only the first existing file is read.
#[must_use]
pub fn candidate_paths(explicit: Option<&Path>, env_path: Option<PathBuf>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(p) = explicit {
        paths.push(p.to_path_buf());
    }
    if let Some(p) = env_path {
        paths.push(p);
    }
    if let Some(dir) = dirs_next::config_dir() {
        paths.push(dir.join(CONFIG_FILE_NAME));
    }
    if let Ok(cur) = std::env::current_dir() {
        paths.push(cur.join(CONFIG_FILE_NAME));
    }
    paths
}

/// Resolves the configuration from `cli`, the process environment and the first config
/// file found.
///
/// # Errors
/// A missing `--config` file is an error; discovered files are only read if they exist.
pub fn load(cli: ConfigLayer, explicit: Option<&Path>) -> Result<AppConfig, DbError> {
    let env_lookup = |k: &str| std::env::var(k).ok();
    load_with(cli, explicit, env_lookup)
}

/// [`load`] with an injectable environment.
///
/// # Errors
/// See [`load`].
pub fn load_with(
    cli: ConfigLayer,
    explicit: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<AppConfig, DbError> {
    if let Some(p) = explicit
        && !p.exists()
    {
        return Err(DbError::Config(format!("config file not found: {}", p.display())));
    }
    let env_path = lookup("BOOKSTORE_CONFIG").map(PathBuf::from);
    let mut merged = cli;
    merged.fill_from(ConfigLayer::from_env_with(&lookup)?);
    if let Some(path) = candidate_paths(explicit, env_path).into_iter().find(|p| p.is_file()) {
        log::debug!("reading config from {}", path.display());
        merged.fill_from(ConfigLayer::from_toml_file(&path)?);
    }
    merged.resolve()
}
