//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::NonZeroUsize,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use axum::http::HeaderName;
use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::cache::TierPolicy;
use crate::domain::tenant::{TenantIcon, TenantId};
use crate::routing::{DEFAULT_ADMIN_PREFIX, DEFAULT_ASSET_PREFIX, DEFAULT_TENANT_NAMESPACE};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "tenant-edge";
const ENV_PREFIX: &str = "TENANT_EDGE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_INTERNAL_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 3000;
const DEFAULT_INTERNAL_PORT: u16 = 3001;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_ROOT_DOMAIN: &str = "localhost:3000";
const DEFAULT_PROTOCOL: &str = "http";
const DEFAULT_ORIGIN_URL: &str = "http://127.0.0.1:4000";
const DEFAULT_PURGE_PATH: &str = "/api/delete";
const DEFAULT_ORIGIN_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_STAGE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_RETRY_INTERVAL_MS: u64 = 30_000;
const DEFAULT_SHIELD_FRESH_SECS: u64 = 120;
const DEFAULT_SHIELD_SWR_SECS: u64 = 31_556_952;
const DEFAULT_SHIELD_SIE_SECS: u64 = 86_400;
const DEFAULT_REGIONAL_FRESH_SECS: u64 = 3_600;
const DEFAULT_REGIONAL_SWR_SECS: u64 = 60;
const DEFAULT_REGIONAL_SIE_SECS: u64 = 3_600;
const DEFAULT_TIER_CAPACITY: usize = 1_000;
const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;
const DEFAULT_SHIELD_HEADER: &str = "edge-cache-control";
const DEFAULT_REGIONAL_HEADER: &str = "regional-cache-control";
const DEFAULT_TAG_HEADER: &str = "cache-tag";
const DEFAULT_INTERNAL_HEADER_PREFIX: &str = "x-internal-";

/// Command-line arguments for the tenant-edge binary.
#[derive(Debug, Parser)]
#[command(
    name = "tenant-edge",
    version,
    about = "Multi-tenant edge router with tiered caching"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "TENANT_EDGE_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the public and internal HTTP listeners.
    Serve(Box<ServeArgs>),
    /// Ask a running instance to invalidate a tag across every tier.
    Invalidate(InvalidateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the public listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the internal listener host.
    #[arg(long = "server-internal-host", value_name = "HOST")]
    pub server_internal_host: Option<String>,

    /// Override the public listener port.
    #[arg(long = "server-public-port", value_name = "PORT")]
    pub public_port: Option<u16>,

    /// Override the internal listener port.
    #[arg(long = "server-internal-port", value_name = "PORT")]
    pub internal_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the root domain tenants are subdomains of.
    #[arg(long = "root-domain", value_name = "DOMAIN")]
    pub root_domain: Option<String>,

    /// Override the origin base URL for pages.
    #[arg(long = "origin-pages-url", value_name = "URL")]
    pub origin_pages_url: Option<String>,

    /// Override the origin base URL for shared assets.
    #[arg(long = "origin-assets-url", value_name = "URL")]
    pub origin_assets_url: Option<String>,

    /// Override the content data file served by the content API.
    #[arg(long = "content-data-file", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub content_data_file: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct InvalidateArgs {
    /// Tag to invalidate, e.g. a tenant id or `post:42`.
    #[arg(long, value_name = "TAG")]
    pub tag: String,

    /// Invalidation endpoint; defaults to the configured internal listener.
    #[arg(long, value_name = "URL", env = "TENANT_EDGE_INVALIDATE_ENDPOINT")]
    pub endpoint: Option<String>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub routing: RoutingSettings,
    pub origin: OriginSettings,
    pub cache: CacheSettings,
    pub invalidation: InvalidationSettings,
    pub tenants: TenantSettings,
    pub content: ContentSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub internal_addr: SocketAddr,
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
pub struct RoutingSettings {
    /// May include a port, e.g. `localhost:3000`.
    pub root_domain: String,
    pub protocol: String,
    /// Platform domain of `{tenant}---{branch}` preview hosts.
    pub preview_domain: Option<String>,
    pub tenant_namespace: String,
    pub admin_prefix: String,
    pub asset_prefixes: Vec<String>,
    /// Prefer `x-forwarded-host` over `host` when resolving tenants.
    pub trust_forwarded_host: bool,
}

impl RoutingSettings {
    pub fn root_url(&self) -> String {
        format!("{}://{}", self.protocol, self.root_domain)
    }
}

#[derive(Debug, Clone)]
pub struct OriginSettings {
    pub pages_url: Url,
    pub assets_url: Url,
    pub purge_path: String,
    pub request_timeout: Duration,
    pub tag_header: String,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub shield: TierPolicy,
    pub regional: TierPolicy,
    pub shield_capacity: NonZeroUsize,
    pub regional_capacity: NonZeroUsize,
    pub shield_header: String,
    pub regional_header: String,
    pub internal_header_prefixes: Vec<String>,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct InvalidationSettings {
    pub stage_timeout: Duration,
    /// `None` disables the background retry loop.
    pub retry_interval: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct SeedTenant {
    pub id: TenantId,
    pub icon: TenantIcon,
}

#[derive(Debug, Clone, Default)]
pub struct TenantSettings {
    pub seed: Vec<SeedTenant>,
}

#[derive(Debug, Clone, Default)]
pub struct ContentSettings {
    pub data_file: Option<PathBuf>,
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
        Some(Command::Invalidate(_)) => {}
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
    routing: RawRoutingSettings,
    origin: RawOriginSettings,
    cache: RawCacheSettings,
    invalidation: RawInvalidationSettings,
    tenants: RawTenantSettings,
    content: RawContentSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(host) = overrides.server_internal_host.as_ref() {
            self.server.internal_host = Some(host.clone());
        }
        if let Some(port) = overrides.public_port {
            self.server.public_port = Some(port);
        }
        if let Some(port) = overrides.internal_port {
            self.server.internal_port = Some(port);
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
        if let Some(domain) = overrides.root_domain.as_ref() {
            self.routing.root_domain = Some(domain.clone());
        }
        if let Some(url) = overrides.origin_pages_url.as_ref() {
            self.origin.pages_url = Some(url.clone());
        }
        if let Some(url) = overrides.origin_assets_url.as_ref() {
            self.origin.assets_url = Some(url.clone());
        }
        if let Some(path) = overrides.content_data_file.as_ref() {
            self.content.data_file = Some(path.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            routing,
            origin,
            cache,
            invalidation,
            tenants,
            content,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            routing: build_routing_settings(routing)?,
            origin: build_origin_settings(origin)?,
            cache: build_cache_settings(cache)?,
            invalidation: build_invalidation_settings(invalidation)?,
            tenants: build_tenant_settings(tenants)?,
            content: build_content_settings(content),
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let internal_host = server
        .internal_host
        .unwrap_or_else(|| DEFAULT_INTERNAL_HOST.to_string());

    let public_port = server.public_port.unwrap_or(DEFAULT_PUBLIC_PORT);
    if public_port == 0 {
        return Err(LoadError::invalid(
            "server.public_port",
            "port must be greater than zero",
        ));
    }

    let internal_port = server.internal_port.unwrap_or(DEFAULT_INTERNAL_PORT);
    if internal_port == 0 {
        return Err(LoadError::invalid(
            "server.internal_port",
            "port must be greater than zero",
        ));
    }

    let public_addr = parse_socket_addr(&host, public_port)
        .map_err(|reason| LoadError::invalid("server.public_addr", reason))?;
    let internal_addr = parse_socket_addr(&internal_host, internal_port)
        .map_err(|reason| LoadError::invalid("server.internal_addr", reason))?;
    if public_addr == internal_addr {
        return Err(LoadError::invalid(
            "server.internal_port",
            "internal listener must not share the public address",
        ));
    }

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
        public_addr,
        internal_addr,
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

fn build_routing_settings(routing: RawRoutingSettings) -> Result<RoutingSettings, LoadError> {
    let root_domain = routing
        .root_domain
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_ROOT_DOMAIN.to_string());
    if root_domain.is_empty() {
        return Err(LoadError::invalid(
            "routing.root_domain",
            "must not be empty",
        ));
    }
    if root_domain.contains('/') {
        return Err(LoadError::invalid(
            "routing.root_domain",
            "must be a bare host name, optionally with a port",
        ));
    }

    let protocol = routing
        .protocol
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_PROTOCOL.to_string());
    if protocol != "http" && protocol != "https" {
        return Err(LoadError::invalid(
            "routing.protocol",
            "must be `http` or `https`",
        ));
    }

    let preview_domain = routing.preview_domain.and_then(|value| {
        let trimmed = value.trim().trim_start_matches('.').to_ascii_lowercase();
        (!trimmed.is_empty()).then_some(trimmed)
    });

    let tenant_namespace = routing
        .tenant_namespace
        .unwrap_or_else(|| DEFAULT_TENANT_NAMESPACE.to_string());
    require_path_prefix("routing.tenant_namespace", &tenant_namespace)?;
    if tenant_namespace == "/" {
        return Err(LoadError::invalid(
            "routing.tenant_namespace",
            "must not be the site root",
        ));
    }

    let admin_prefix = routing
        .admin_prefix
        .unwrap_or_else(|| DEFAULT_ADMIN_PREFIX.to_string());
    require_path_prefix("routing.admin_prefix", &admin_prefix)?;

    let asset_prefixes = routing
        .asset_prefixes
        .unwrap_or_else(|| vec![DEFAULT_ASSET_PREFIX.to_string()]);
    for prefix in &asset_prefixes {
        require_path_prefix("routing.asset_prefixes", prefix)?;
    }

    Ok(RoutingSettings {
        root_domain,
        protocol,
        preview_domain,
        tenant_namespace,
        admin_prefix,
        asset_prefixes,
        trust_forwarded_host: routing.trust_forwarded_host.unwrap_or(false),
    })
}

fn build_origin_settings(origin: RawOriginSettings) -> Result<OriginSettings, LoadError> {
    let pages_raw = origin
        .pages_url
        .unwrap_or_else(|| DEFAULT_ORIGIN_URL.to_string());
    let pages_url = parse_http_url("origin.pages_url", &pages_raw)?;
    let assets_url = match origin.assets_url {
        Some(raw) => parse_http_url("origin.assets_url", &raw)?,
        None => pages_url.clone(),
    };

    let purge_path = origin
        .purge_path
        .unwrap_or_else(|| DEFAULT_PURGE_PATH.to_string());
    require_path_prefix("origin.purge_path", &purge_path)?;

    let timeout_ms = origin
        .request_timeout_ms
        .unwrap_or(DEFAULT_ORIGIN_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "origin.request_timeout_ms",
            "must be greater than zero",
        ));
    }

    let tag_header = origin
        .tag_header
        .unwrap_or_else(|| DEFAULT_TAG_HEADER.to_string());
    require_header_name("origin.tag_header", &tag_header)?;

    Ok(OriginSettings {
        pages_url,
        assets_url,
        purge_path,
        request_timeout: Duration::from_millis(timeout_ms),
        tag_header: tag_header.to_ascii_lowercase(),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let RawCacheSettings {
        shield,
        regional,
        internal_header_prefixes,
        max_body_bytes,
    } = cache;

    let shield_policy = build_tier_policy(
        &shield,
        (
            DEFAULT_SHIELD_FRESH_SECS,
            DEFAULT_SHIELD_SWR_SECS,
            DEFAULT_SHIELD_SIE_SECS,
        ),
        "cache.shield",
    )?;
    let regional_policy = build_tier_policy(
        &regional,
        (
            DEFAULT_REGIONAL_FRESH_SECS,
            DEFAULT_REGIONAL_SWR_SECS,
            DEFAULT_REGIONAL_SIE_SECS,
        ),
        "cache.regional",
    )?;

    let shield_capacity = NonZeroUsize::new(shield.capacity.unwrap_or(DEFAULT_TIER_CAPACITY))
        .ok_or_else(|| LoadError::invalid("cache.shield.capacity", "must be greater than zero"))?;
    let regional_capacity = NonZeroUsize::new(regional.capacity.unwrap_or(DEFAULT_TIER_CAPACITY))
        .ok_or_else(|| {
            LoadError::invalid("cache.regional.capacity", "must be greater than zero")
        })?;

    let shield_header = shield
        .header
        .unwrap_or_else(|| DEFAULT_SHIELD_HEADER.to_string())
        .to_ascii_lowercase();
    require_header_name("cache.shield.header", &shield_header)?;
    let regional_header = regional
        .header
        .unwrap_or_else(|| DEFAULT_REGIONAL_HEADER.to_string())
        .to_ascii_lowercase();
    require_header_name("cache.regional.header", &regional_header)?;
    if shield_header == regional_header {
        return Err(LoadError::invalid(
            "cache.regional.header",
            "must differ from the shield header",
        ));
    }

    let internal_header_prefixes = internal_header_prefixes
        .unwrap_or_else(|| vec![DEFAULT_INTERNAL_HEADER_PREFIX.to_string()])
        .into_iter()
        .map(|prefix| prefix.trim().to_ascii_lowercase())
        .filter(|prefix| !prefix.is_empty())
        .collect();

    let max_body_bytes = max_body_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES);
    if max_body_bytes == 0 {
        return Err(LoadError::invalid(
            "cache.max_body_bytes",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        shield: shield_policy,
        regional: regional_policy,
        shield_capacity,
        regional_capacity,
        shield_header,
        regional_header,
        internal_header_prefixes,
        max_body_bytes,
    })
}

fn build_tier_policy(
    raw: &RawTierSettings,
    (fresh, swr, sie): (u64, u64, u64),
    key: &'static str,
) -> Result<TierPolicy, LoadError> {
    let policy = TierPolicy::from_secs(
        raw.fresh_secs.unwrap_or(fresh),
        raw.stale_while_revalidate_secs.unwrap_or(swr),
        raw.stale_if_error_secs.unwrap_or(sie),
    );
    if !policy.is_ordered() {
        return Err(LoadError::invalid(
            key,
            "fresh, stale-while-revalidate and stale-if-error windows must all be greater than zero",
        ));
    }
    Ok(policy)
}

fn build_invalidation_settings(
    invalidation: RawInvalidationSettings,
) -> Result<InvalidationSettings, LoadError> {
    let stage_timeout_ms = invalidation
        .stage_timeout_ms
        .unwrap_or(DEFAULT_STAGE_TIMEOUT_MS);
    if stage_timeout_ms == 0 {
        return Err(LoadError::invalid(
            "invalidation.stage_timeout_ms",
            "must be greater than zero",
        ));
    }

    let retry_ms = invalidation
        .retry_interval_ms
        .unwrap_or(DEFAULT_RETRY_INTERVAL_MS);

    Ok(InvalidationSettings {
        stage_timeout: Duration::from_millis(stage_timeout_ms),
        retry_interval: (retry_ms > 0).then(|| Duration::from_millis(retry_ms)),
    })
}

fn build_tenant_settings(tenants: RawTenantSettings) -> Result<TenantSettings, LoadError> {
    let mut seed = Vec::with_capacity(tenants.seed.len());
    for raw in tenants.seed {
        let id = TenantId::parse(&raw.id)
            .map_err(|err| LoadError::invalid("tenants.seed.id", format!("`{}`: {err}", raw.id)))?;
        if id.is_reserved() {
            return Err(LoadError::invalid(
                "tenants.seed.id",
                format!("`{id}` is reserved"),
            ));
        }
        let icon = TenantIcon::parse(&raw.icon)
            .map_err(|err| LoadError::invalid("tenants.seed.icon", err.to_string()))?;
        if seed.iter().any(|existing: &SeedTenant| existing.id == id) {
            return Err(LoadError::invalid(
                "tenants.seed.id",
                format!("`{id}` is listed more than once"),
            ));
        }
        seed.push(SeedTenant { id, icon });
    }
    Ok(TenantSettings { seed })
}

fn build_content_settings(content: RawContentSettings) -> ContentSettings {
    ContentSettings {
        data_file: content
            .data_file
            .filter(|path| !path.as_os_str().is_empty()),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    internal_host: Option<String>,
    public_port: Option<u16>,
    internal_port: Option<u16>,
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
struct RawRoutingSettings {
    root_domain: Option<String>,
    protocol: Option<String>,
    preview_domain: Option<String>,
    tenant_namespace: Option<String>,
    admin_prefix: Option<String>,
    asset_prefixes: Option<Vec<String>>,
    trust_forwarded_host: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawOriginSettings {
    pages_url: Option<String>,
    assets_url: Option<String>,
    purge_path: Option<String>,
    request_timeout_ms: Option<u64>,
    tag_header: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    shield: RawTierSettings,
    regional: RawTierSettings,
    internal_header_prefixes: Option<Vec<String>>,
    max_body_bytes: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTierSettings {
    fresh_secs: Option<u64>,
    stale_while_revalidate_secs: Option<u64>,
    stale_if_error_secs: Option<u64>,
    capacity: Option<usize>,
    header: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawInvalidationSettings {
    stage_timeout_ms: Option<u64>,
    retry_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTenantSettings {
    seed: Vec<RawSeedTenant>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawSeedTenant {
    id: String,
    icon: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentSettings {
    data_file: Option<PathBuf>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_http_url(key: &'static str, raw: &str) -> Result<Url, LoadError> {
    let url = Url::parse(raw.trim())
        .map_err(|err| LoadError::invalid(key, format!("invalid URL `{raw}`: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(LoadError::invalid(
            key,
            format!("`{raw}` must be an absolute http(s) URL"),
        ));
    }
    Ok(url)
}

fn require_path_prefix(key: &'static str, value: &str) -> Result<(), LoadError> {
    if value.starts_with('/') {
        Ok(())
    } else {
        Err(LoadError::invalid(
            key,
            format!("`{value}` must start with `/`"),
        ))
    }
}

fn require_header_name(key: &'static str, value: &str) -> Result<(), LoadError> {
    HeaderName::from_bytes(value.as_bytes())
        .map(|_| ())
        .map_err(|_| LoadError::invalid(key, format!("`{value}` is not a valid header name")))
}
