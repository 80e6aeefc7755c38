//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{
    CliArgs, Command, DatabaseOverride, ReconcileArgs, ReconcileJob, ServeArgs, ServeOverrides,
};

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use apalis_cron::Schedule;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::jobs::{
    DEFAULT_FULL_CLEANUP_CRON, DEFAULT_ORPHAN_CLEANUP_CRON, DEFAULT_PROFILE_SYNC_CRON,
    parse_schedule,
};
use crate::application::reconcile::DEFAULT_PROFILE_SYNC_LOOKBACK;
use crate::cache::CacheBackend;
use crate::domain::posts::ContentLimits;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "plaza";
const ENV_PREFIX: &str = "PLAZA";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 16;
const DEFAULT_DB_JOBS_MAX_CONNECTIONS: u32 = 4;
const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_DB_STATEMENT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_DB_JOBS_STATEMENT_TIMEOUT_MS: u64 = 120_000;
const DEFAULT_CACHE_BACKEND: &str = "memory";
const DEFAULT_COMMENTS_TTL_SECS: u64 = 30 * 60;
const DEFAULT_MAX_CACHED_COMMENTS: u64 = 20;
const DEFAULT_CACHE_OP_TIMEOUT_MS: u64 = 200;
const DEFAULT_MAX_INFLIGHT_INVALIDATIONS: u64 = 64;
const DEFAULT_MEMORY_CAPACITY: u64 = 10_000;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub feed: ContentLimits,
    pub scheduler: SchedulerSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
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
    pub jobs_max_connections: NonZeroU32,
    pub acquire_timeout: Duration,
    /// Server-side `statement_timeout` and `lock_timeout` for request pools.
    pub statement_timeout: Duration,
    /// Same bound for the reconciliation pool, whose bulk statements run longer.
    pub jobs_statement_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub backend: CacheBackend,
    pub comments_ttl: Duration,
    pub max_cached_comments: NonZeroUsize,
    pub op_timeout: Duration,
    pub max_inflight_invalidations: NonZeroUsize,
    pub memory_capacity: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub enabled: bool,
    pub profile_sync: Schedule,
    pub orphan_cleanup: Schedule,
    pub full_cleanup: Schedule,
    pub profile_sync_lookback: Duration,
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

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Reconcile(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    feed: RawFeedSettings,
    scheduler: RawSchedulerSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
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
        if let Some(backend) = overrides.cache_backend.as_ref() {
            self.cache.backend = Some(backend.clone());
        }
        if let Some(url) = overrides.cache_redis_url.as_ref() {
            self.cache.redis_url = Some(url.clone());
        }
        if let Some(enabled) = overrides.scheduler_enabled {
            self.scheduler.enabled = Some(enabled);
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            cache,
            feed,
            scheduler,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache)?,
            feed: build_feed_settings(feed)?,
            scheduler: build_scheduler_settings(scheduler)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
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
    let url = non_blank(database.url);

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;
    let jobs_max_connections = non_zero_u32(
        database
            .jobs_max_connections
            .unwrap_or(DEFAULT_DB_JOBS_MAX_CONNECTIONS)
            .into(),
        "database.jobs_max_connections",
    )?;

    let acquire_secs = database
        .acquire_timeout_seconds
        .unwrap_or(DEFAULT_DB_ACQUIRE_TIMEOUT_SECS);
    if acquire_secs == 0 {
        return Err(LoadError::invalid(
            "database.acquire_timeout_seconds",
            "must be greater than zero",
        ));
    }

    let statement_timeout = positive_millis(
        database
            .statement_timeout_ms
            .unwrap_or(DEFAULT_DB_STATEMENT_TIMEOUT_MS),
        "database.statement_timeout_ms",
    )?;
    let jobs_statement_timeout = positive_millis(
        database
            .jobs_statement_timeout_ms
            .unwrap_or(DEFAULT_DB_JOBS_STATEMENT_TIMEOUT_MS),
        "database.jobs_statement_timeout_ms",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
        jobs_max_connections,
        acquire_timeout: Duration::from_secs(acquire_secs),
        statement_timeout,
        jobs_statement_timeout,
    })
}

fn positive_millis(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_millis(value))
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let backend_name = cache
        .backend
        .unwrap_or_else(|| DEFAULT_CACHE_BACKEND.to_string());
    let backend = match backend_name.trim().to_ascii_lowercase().as_str() {
        "memory" => CacheBackend::Memory,
        "redis" => {
            let url = non_blank(cache.redis_url).ok_or_else(|| {
                LoadError::invalid("cache.redis_url", "required when cache.backend is `redis`")
            })?;
            CacheBackend::Redis { url }
        }
        other => {
            return Err(LoadError::invalid(
                "cache.backend",
                format!("unknown backend `{other}`; expected `memory` or `redis`"),
            ));
        }
    };

    let ttl_secs = cache
        .comments_ttl_seconds
        .unwrap_or(DEFAULT_COMMENTS_TTL_SECS);
    if ttl_secs == 0 {
        return Err(LoadError::invalid(
            "cache.comments_ttl_seconds",
            "must be greater than zero",
        ));
    }

    let op_timeout_ms = cache.op_timeout_ms.unwrap_or(DEFAULT_CACHE_OP_TIMEOUT_MS);
    if op_timeout_ms == 0 {
        return Err(LoadError::invalid(
            "cache.op_timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        backend,
        comments_ttl: Duration::from_secs(ttl_secs),
        max_cached_comments: non_zero_usize(
            cache
                .max_cached_comments
                .unwrap_or(DEFAULT_MAX_CACHED_COMMENTS),
            "cache.max_cached_comments",
        )?,
        op_timeout: Duration::from_millis(op_timeout_ms),
        max_inflight_invalidations: non_zero_usize(
            cache
                .max_inflight_invalidations
                .unwrap_or(DEFAULT_MAX_INFLIGHT_INVALIDATIONS),
            "cache.max_inflight_invalidations",
        )?,
        memory_capacity: non_zero_usize(
            cache.memory_capacity.unwrap_or(DEFAULT_MEMORY_CAPACITY),
            "cache.memory_capacity",
        )?,
    })
}

fn build_feed_settings(feed: RawFeedSettings) -> Result<ContentLimits, LoadError> {
    let defaults = ContentLimits::default();
    Ok(ContentLimits {
        post_content_max: non_zero_usize_or(
            feed.post_content_max_chars,
            defaults.post_content_max,
            "feed.post_content_max_chars",
        )?,
        image_url_max: non_zero_usize_or(
            feed.image_url_max_chars,
            defaults.image_url_max,
            "feed.image_url_max_chars",
        )?,
        comment_content_max: non_zero_usize_or(
            feed.comment_content_max_chars,
            defaults.comment_content_max,
            "feed.comment_content_max_chars",
        )?,
        reply_to_max: non_zero_usize_or(
            feed.reply_to_max_chars,
            defaults.reply_to_max,
            "feed.reply_to_max_chars",
        )?,
    })
}

fn build_scheduler_settings(
    scheduler: RawSchedulerSettings,
) -> Result<SchedulerSettings, LoadError> {
    let profile_sync = cron_setting(
        scheduler.profile_sync_cron,
        DEFAULT_PROFILE_SYNC_CRON,
        "scheduler.profile_sync_cron",
    )?;
    let orphan_cleanup = cron_setting(
        scheduler.orphan_cleanup_cron,
        DEFAULT_ORPHAN_CLEANUP_CRON,
        "scheduler.orphan_cleanup_cron",
    )?;
    let full_cleanup = cron_setting(
        scheduler.full_cleanup_cron,
        DEFAULT_FULL_CLEANUP_CRON,
        "scheduler.full_cleanup_cron",
    )?;

    let lookback_secs = scheduler
        .profile_sync_lookback_seconds
        .unwrap_or(DEFAULT_PROFILE_SYNC_LOOKBACK.as_secs());
    if lookback_secs == 0 {
        return Err(LoadError::invalid(
            "scheduler.profile_sync_lookback_seconds",
            "must be greater than zero",
        ));
    }

    Ok(SchedulerSettings {
        enabled: scheduler.enabled.unwrap_or(true),
        profile_sync,
        orphan_cleanup,
        full_cleanup,
        profile_sync_lookback: Duration::from_secs(lookback_secs),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
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
    jobs_max_connections: Option<u32>,
    acquire_timeout_seconds: Option<u64>,
    statement_timeout_ms: Option<u64>,
    jobs_statement_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    backend: Option<String>,
    redis_url: Option<String>,
    comments_ttl_seconds: Option<u64>,
    max_cached_comments: Option<u64>,
    op_timeout_ms: Option<u64>,
    max_inflight_invalidations: Option<u64>,
    memory_capacity: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFeedSettings {
    post_content_max_chars: Option<u64>,
    image_url_max_chars: Option<u64>,
    comment_content_max_chars: Option<u64>,
    reply_to_max_chars: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSchedulerSettings {
    enabled: Option<bool>,
    profile_sync_cron: Option<String>,
    orphan_cleanup_cron: Option<String>,
    full_cleanup_cron: Option<String>,
    profile_sync_lookback_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
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

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value_usize: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value_usize)
        .ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_usize_or(
    value: Option<u64>,
    default: usize,
    key: &'static str,
) -> Result<usize, LoadError> {
    match value {
        Some(value) => non_zero_usize(value, key).map(NonZeroUsize::get),
        None => Ok(default),
    }
}

fn cron_setting(
    value: Option<String>,
    default: &str,
    key: &'static str,
) -> Result<Schedule, LoadError> {
    let expression = non_blank(value).unwrap_or_else(|| default.to_string());
    parse_schedule(&expression).map_err(|err| LoadError::invalid(key, err.to_string()))
}
