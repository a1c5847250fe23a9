//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{
    BeatmapSearchArgs, CliArgs, Command, CompareArgs, DuelArgs, GlobalOverrides, PageArgs,
    PairArgs, PlayerArgs, ScoreSearchArgs, SummaryArgs,
};

use std::{
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::{CacheDomain, DEFAULT_MAX_KEY_LEN, DomainTtls};
use crate::compare::{ComparisonBounds, DEFAULT_MAX_ENTITIES, MIN_ENTITIES};
use crate::query::PageLimits;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "rankboard";
const ENV_PREFIX: &str = "RANKBOARD";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_CACHE_CAPACITY: usize = 10_000;
const DEFAULT_CACHE_SWEEP_SECS: u64 = 300;
/// Room for the longest domain prefix plus a hex SHA-256 digest.
const MIN_KEY_LEN: usize = 96;
const DEFAULT_PAGE_SIZE: u32 = 50;
const DEFAULT_MAX_PAGE_SIZE: u32 = 100;
const DEFAULT_TOP_SCORES: u32 = 100;

#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub query: QuerySettings,
    pub comparison: ComparisonSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub capacity: NonZeroUsize,
    /// `None` leaves expiry to lookups only.
    pub sweep_interval: Option<Duration>,
    pub max_key_len: usize,
    pub ttl: DomainTtls,
}

#[derive(Debug, Clone, Copy)]
pub struct QuerySettings {
    pub default_page_size: NonZeroU32,
    pub max_page_size: NonZeroU32,
}

impl QuerySettings {
    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_limit: self.default_page_size.get(),
            max_limit: self.max_page_size.get(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ComparisonSettings {
    pub max_entities: usize,
    /// Scores fetched per player for head-to-head.
    pub top_scores: NonZeroU32,
}

impl ComparisonSettings {
    pub fn bounds(&self) -> ComparisonBounds {
        ComparisonBounds::new(self.max_entities)
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    query: RawQuerySettings,
    comparison: RawComparisonSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(max) = overrides.comparison_max_entities {
            self.comparison.max_entities = Some(max);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            database,
            cache,
            query,
            comparison,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache)?,
            query: build_query_settings(query)?,
            comparison: build_comparison_settings(comparison)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let capacity = NonZeroUsize::new(cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY))
        .ok_or_else(|| LoadError::invalid("cache.capacity", "must be greater than zero"))?;

    let sweep_secs = cache
        .sweep_interval_secs
        .unwrap_or(DEFAULT_CACHE_SWEEP_SECS);
    let sweep_interval = (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs));

    let max_key_len = cache.max_key_len.unwrap_or(DEFAULT_MAX_KEY_LEN);
    if max_key_len < MIN_KEY_LEN {
        return Err(LoadError::invalid(
            "cache.max_key_len",
            format!("must be at least {MIN_KEY_LEN}"),
        ));
    }

    let ttl = cache.ttl.unwrap_or_default();
    if let Some(domain) = CacheDomain::ALL
        .into_iter()
        .find(|domain| ttl.seconds(*domain) == 0)
    {
        return Err(LoadError::invalid(
            "cache.ttl",
            format!("ttl for `{domain}` must be greater than zero"),
        ));
    }

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        capacity,
        sweep_interval,
        max_key_len,
        ttl,
    })
}

fn build_query_settings(query: RawQuerySettings) -> Result<QuerySettings, LoadError> {
    let max_page_size = non_zero_u32(
        query.max_page_size.unwrap_or(DEFAULT_MAX_PAGE_SIZE).into(),
        "query.max_page_size",
    )?;
    let default_page_size = non_zero_u32(
        query
            .default_page_size
            .unwrap_or(DEFAULT_PAGE_SIZE.min(max_page_size.get()))
            .into(),
        "query.default_page_size",
    )?;
    if default_page_size > max_page_size {
        return Err(LoadError::invalid(
            "query.default_page_size",
            "must not exceed query.max_page_size",
        ));
    }

    Ok(QuerySettings {
        default_page_size,
        max_page_size,
    })
}

fn build_comparison_settings(
    comparison: RawComparisonSettings,
) -> Result<ComparisonSettings, LoadError> {
    let max_entities = comparison
        .max_entities
        .map_or(DEFAULT_MAX_ENTITIES, |value| value as usize);
    if max_entities < MIN_ENTITIES {
        return Err(LoadError::invalid(
            "comparison.max_entities",
            format!("must be at least {MIN_ENTITIES}"),
        ));
    }

    let top_scores = non_zero_u32(
        comparison.top_scores.unwrap_or(DEFAULT_TOP_SCORES).into(),
        "comparison.top_scores",
    )?;

    Ok(ComparisonSettings {
        max_entities,
        top_scores,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    capacity: Option<usize>,
    sweep_interval_secs: Option<u64>,
    max_key_len: Option<usize>,
    ttl: Option<DomainTtls>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawQuerySettings {
    default_page_size: Option<u32>,
    max_page_size: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawComparisonSettings {
    max_entities: Option<u32>,
    top_scores: Option<u32>,
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
