//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File, Map};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;

pub use cli::{
    ChaptersArgs, CliArgs, Command, GlobalOverrides, GlossaryArgs, HighlightArgs, SeriesArgs,
    TranslateArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "novella";
const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";
const DEFAULT_API_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_CACHE_TTL_MS: u64 = 5 * 60 * 1000;
const DEFAULT_GLOSSARY_TTL_MS: u64 = 2 * 60 * 1000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub client: ClientSettings,
    pub api: ApiSettings,
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
pub struct CacheSettings {
    pub enabled: bool,
    pub default_ttl: Duration,
}

/// Per-operation TTLs used by the cached client.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub series_ttl: Duration,
    pub chapters_ttl: Duration,
    pub glossary_ttl: Duration,
    pub suggestions_ttl: Duration,
    pub shares_ttl: Duration,
    /// Upper bound on a single backend call made by the client.
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            series_ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            chapters_ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            glossary_ttl: Duration::from_millis(DEFAULT_GLOSSARY_TTL_MS),
            suggestions_ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            shares_ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: Url,
    pub timeout: Duration,
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
    load_from(cli, None)
}

/// As [`load`], reading `NOVELLA__*` variables from `env` instead of the
/// process environment when given.
fn load_from(cli: &CliArgs, env: Option<Map<String, String>>) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix("NOVELLA")
            .separator("__")
            .try_parsing(true)
            .source(env),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);
    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    client: RawClientSettings,
    api: RawApiSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(base_url) = overrides.base_url.as_ref() {
            self.api.base_url = Some(base_url.clone());
        }
        if let Some(timeout) = overrides.api_timeout_ms {
            self.api.timeout_ms = Some(timeout);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if overrides.no_cache {
            self.cache.enabled = Some(false);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        Ok(Self {
            logging: build_logging_settings(raw.logging)?,
            cache: build_cache_settings(raw.cache)?,
            client: build_client_settings(raw.client)?,
            api: build_api_settings(raw.api)?,
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

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        default_ttl: non_zero_millis(
            cache.default_ttl_ms.unwrap_or(DEFAULT_CACHE_TTL_MS),
            "cache.default_ttl_ms",
        )?,
    })
}

fn build_client_settings(client: RawClientSettings) -> Result<ClientSettings, LoadError> {
    let defaults = ClientSettings::default();
    let ttl = |value: Option<u64>, fallback: Duration, key: &'static str| match value {
        Some(ms) => non_zero_millis(ms, key),
        None => Ok(fallback),
    };

    Ok(ClientSettings {
        series_ttl: ttl(client.series_ttl_ms, defaults.series_ttl, "client.series_ttl_ms")?,
        chapters_ttl: ttl(
            client.chapters_ttl_ms,
            defaults.chapters_ttl,
            "client.chapters_ttl_ms",
        )?,
        glossary_ttl: ttl(
            client.glossary_ttl_ms,
            defaults.glossary_ttl,
            "client.glossary_ttl_ms",
        )?,
        suggestions_ttl: ttl(
            client.suggestions_ttl_ms,
            defaults.suggestions_ttl,
            "client.suggestions_ttl_ms",
        )?,
        shares_ttl: ttl(client.shares_ttl_ms, defaults.shares_ttl, "client.shares_ttl_ms")?,
        request_timeout: ttl(
            client.request_timeout_ms,
            defaults.request_timeout,
            "client.request_timeout_ms",
        )?,
    })
}

fn build_api_settings(api: RawApiSettings) -> Result<ApiSettings, LoadError> {
    let raw_url = api
        .base_url
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let base_url = Url::parse(&raw_url)
        .map_err(|err| LoadError::invalid("api.base_url", format!("`{raw_url}`: {err}")))?;
    if !matches!(base_url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "api.base_url",
            format!("unsupported scheme `{}`", base_url.scheme()),
        ));
    }

    Ok(ApiSettings {
        base_url,
        timeout: non_zero_millis(
            api.timeout_ms.unwrap_or(DEFAULT_API_TIMEOUT_MS),
            "api.timeout_ms",
        )?,
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
struct RawCacheSettings {
    enabled: Option<bool>,
    default_ttl_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawClientSettings {
    series_ttl_ms: Option<u64>,
    chapters_ttl_ms: Option<u64>,
    glossary_ttl_ms: Option<u64>,
    suggestions_ttl_ms: Option<u64>,
    shares_ttl_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawApiSettings {
    base_url: Option<String>,
    timeout_ms: Option<u64>,
}

fn non_zero_millis(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_millis(value))
}
