//! Configuration layer: typed settings with layered precedence
//! (legacy environment names → file → `VIEWDOCS__*` environment → CLI).

mod cli;

use std::{net::SocketAddr, num::NonZeroUsize, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

pub use cli::{CliArgs, Command, RenderArgs, ServeArgs, ServeOverrides, SharedOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "viewdocs";
const ENV_PREFIX: &str = "VIEWDOCS";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8888;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_RAW_ORIGIN: &str = "https://raw.githubusercontent.com";
const DEFAULT_MARKDOWN_ENDPOINT: &str = "https://api.github.com/markdown/raw";
const DEFAULT_TEMPLATE_URL: &str =
    "https://raw.githubusercontent.com/progrium/viewdocs/master/docs/template.html";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_HOSTNAME: &str = "viewdocs.io";
const DEFAULT_ROOT_REDIRECT: &str = "http://progrium.viewdocs.io/viewdocs/";
const DEFAULT_CDN_BASE: &str = "https://cdn.jsdelivr.net/gh";
const DEFAULT_CACHE_CAPACITY_BYTES: u64 = 256 * 1024 * 1024;
const DEFAULT_CACHE_TTL_SECS: u64 = 60;
const DEFAULT_PATH_PREFIX: &str = ".";

/// Flat environment names honoured for compatibility with existing deployments.
pub(crate) mod legacy {
    pub const ACCESS_TOKEN: &str = "ACCESS_TOKEN";
    pub const PORT: &str = "PORT";
    pub const USE_CACHE: &str = "USE_CACHE";
    pub const HOSTNAME: &str = "HOSTNAME";
    pub const GITHUB_USER: &str = "GITHUB_USER";
    pub const PATH_PREFIX: &str = "PATH_PREFIX";
    pub const DEBUG: &str = "DEBUG";
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub upstream: UpstreamSettings,
    pub routing: RoutingSettings,
    pub cache: CacheSettings,
    pub development: DevelopmentSettings,
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
pub struct UpstreamSettings {
    pub raw_origin: Url,
    pub markdown_endpoint: Url,
    /// Required to serve or render; checked at startup.
    pub access_token: Option<String>,
    pub request_timeout: Duration,
    pub default_template_url: Url,
}

#[derive(Debug, Clone)]
pub struct RoutingSettings {
    pub hostname: String,
    pub tenant_override: Option<String>,
    pub root_redirect: String,
    pub cdn_base: String,
    pub legacy_aliases: Vec<LegacyAliasSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LegacyAliasSettings {
    pub host_markers: Vec<String>,
    pub prefix: String,
    pub target: String,
    pub docs_target: String,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub capacity_bytes: NonZeroUsize,
    pub ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct DevelopmentSettings {
    pub local_override: bool,
    pub path_prefix: PathBuf,
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

/// Load settings using the configured precedence.
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    load_with_env(cli, |key| std::env::var(key).ok())
}

/// Like [`load`], with the legacy environment read through `lookup`.
pub fn load_with_env<F>(cli: &CliArgs, lookup: F) -> Result<Settings, LoadError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_legacy_env(lookup)?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Render(args)) => raw.apply_shared_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    upstream: RawUpstreamSettings,
    routing: RawRoutingSettings,
    cache: RawCacheSettings,
    development: RawDevelopmentSettings,
}

impl RawSettings {
    /// Fill keys still unset after the file and `VIEWDOCS__*` layers from the
    /// flat legacy names. A structured key always wins over its legacy name.
    fn apply_legacy_env<F>(&mut self, lookup: F) -> Result<(), LoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if self.upstream.access_token.is_none() {
            self.upstream.access_token = get(legacy::ACCESS_TOKEN);
        }
        if self.server.port.is_none()
            && let Some(port) = get(legacy::PORT)
        {
            let port = port
                .parse::<u16>()
                .map_err(|err| LoadError::invalid("PORT", format!("failed to parse: {err}")))?;
            self.server.port = Some(port);
        }
        if self.cache.enabled.is_none() {
            self.cache.enabled = get(legacy::USE_CACHE).map(|use_cache| use_cache != "false");
        }
        if self.routing.hostname.is_none() {
            self.routing.hostname = get(legacy::HOSTNAME);
        }
        if self.routing.tenant_override.is_none() {
            self.routing.tenant_override = get(legacy::GITHUB_USER);
        }
        if self.development.path_prefix.is_none() {
            self.development.path_prefix = get(legacy::PATH_PREFIX).map(PathBuf::from);
        }
        if self.development.local_override.is_none() {
            self.development.local_override = get(legacy::DEBUG).map(|debug| debug == "1");
        }
        Ok(())
    }

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
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(tenant) = overrides.tenant_override.as_ref() {
            self.routing.tenant_override = Some(tenant.clone());
        }
        if let Some(hostname) = overrides.hostname.as_ref() {
            self.routing.hostname = Some(hostname.clone());
        }

        self.apply_shared_overrides(&overrides.shared);
    }

    fn apply_shared_overrides(&mut self, overrides: &SharedOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(token) = overrides.access_token.as_ref() {
            self.upstream.access_token = Some(token.clone());
        }
        if let Some(local) = overrides.local_override {
            self.development.local_override = Some(local);
        }
        if let Some(prefix) = overrides.path_prefix.as_ref() {
            self.development.path_prefix = Some(prefix.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            upstream,
            routing,
            cache,
            development,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            upstream: build_upstream_settings(upstream)?,
            routing: build_routing_settings(routing)?,
            cache: build_cache_settings(cache)?,
            development: build_development_settings(development),
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

fn build_upstream_settings(upstream: RawUpstreamSettings) -> Result<UpstreamSettings, LoadError> {
    let raw_origin = parse_url(upstream.raw_origin, DEFAULT_RAW_ORIGIN, "upstream.raw_origin")?;
    let markdown_endpoint = parse_url(
        upstream.markdown_endpoint,
        DEFAULT_MARKDOWN_ENDPOINT,
        "upstream.markdown_endpoint",
    )?;
    let default_template_url = parse_url(
        upstream.default_template_url,
        DEFAULT_TEMPLATE_URL,
        "upstream.default_template_url",
    )?;

    let timeout_secs = upstream
        .request_timeout_seconds
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "upstream.request_timeout_seconds",
            "must be greater than zero",
        ));
    }

    let access_token = upstream.access_token.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    Ok(UpstreamSettings {
        raw_origin,
        markdown_endpoint,
        access_token,
        request_timeout: Duration::from_secs(timeout_secs),
        default_template_url,
    })
}

fn build_routing_settings(routing: RawRoutingSettings) -> Result<RoutingSettings, LoadError> {
    let hostname = routing
        .hostname
        .unwrap_or_else(|| DEFAULT_HOSTNAME.to_string());
    if hostname.trim().is_empty() {
        return Err(LoadError::invalid(
            "routing.hostname",
            "hostname must not be empty",
        ));
    }

    let cdn_base = parse_url(routing.cdn_base, DEFAULT_CDN_BASE, "routing.cdn_base")?;
    let root_redirect = routing
        .root_redirect
        .unwrap_or_else(|| DEFAULT_ROOT_REDIRECT.to_string());

    Ok(RoutingSettings {
        hostname,
        tenant_override: routing
            .tenant_override
            .filter(|tenant| !tenant.trim().is_empty()),
        root_redirect,
        cdn_base: cdn_base.as_str().trim_end_matches('/').to_string(),
        legacy_aliases: routing
            .legacy_aliases
            .unwrap_or_else(default_legacy_aliases),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let capacity = cache
        .capacity_bytes
        .unwrap_or(DEFAULT_CACHE_CAPACITY_BYTES);
    let capacity: usize = capacity.try_into().map_err(|_| {
        LoadError::invalid(
            "cache.capacity_bytes",
            "value exceeds supported range for usize",
        )
    })?;
    let capacity_bytes = NonZeroUsize::new(capacity)
        .ok_or_else(|| LoadError::invalid("cache.capacity_bytes", "must be greater than zero"))?;

    let ttl_secs = cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS);
    if ttl_secs == 0 {
        return Err(LoadError::invalid(
            "cache.ttl_seconds",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        capacity_bytes,
        ttl: Duration::from_secs(ttl_secs),
    })
}

fn build_development_settings(development: RawDevelopmentSettings) -> DevelopmentSettings {
    DevelopmentSettings {
        local_override: development.local_override.unwrap_or(false),
        path_prefix: development
            .path_prefix
            .filter(|prefix| !prefix.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PATH_PREFIX)),
    }
}

fn default_legacy_aliases() -> Vec<LegacyAliasSettings> {
    vec![LegacyAliasSettings {
        host_markers: vec!["progrium".to_string(), "dokku".to_string()],
        prefix: "/dokku".to_string(),
        target: "https://dokku.com".to_string(),
        docs_target: "https://dokku.com/docs".to_string(),
    }]
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
struct RawUpstreamSettings {
    raw_origin: Option<String>,
    markdown_endpoint: Option<String>,
    access_token: Option<String>,
    request_timeout_seconds: Option<u64>,
    default_template_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRoutingSettings {
    hostname: Option<String>,
    tenant_override: Option<String>,
    root_redirect: Option<String>,
    cdn_base: Option<String>,
    legacy_aliases: Option<Vec<LegacyAliasSettings>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    capacity_bytes: Option<u64>,
    ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDevelopmentSettings {
    local_override: Option<bool>,
    path_prefix: Option<PathBuf>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_url(value: Option<String>, default: &str, key: &'static str) -> Result<Url, LoadError> {
    let value = value.unwrap_or_else(|| default.to_string());
    Url::parse(value.trim())
        .map_err(|err| LoadError::invalid(key, format!("invalid URL `{value}`: {err}")))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
