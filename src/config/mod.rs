//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    collections::BTreeMap,
    net::SocketAddr,
    num::NonZeroU32,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::domain::grid::GridStyle;

pub use cli::{
    CliArgs, Command, GridArgs, RenderArgs, RenderOverrides, ServeArgs, ServeOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "kartenwerk";
const ENV_PREFIX: &str = "KARTENWERK";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_STORAGE_DIR: &str = "artifacts";
const DEFAULT_MAPS_DIR: &str = "maps";
const DEFAULT_JOBS_CONCURRENCY: u32 = 2;
const DEFAULT_JOBS_RETENTION_SECS: u64 = 500;
const DEFAULT_JOBS_REAP_INTERVAL_SECS: u64 = 60;
const DEFAULT_BACKGROUND_TIMEOUT_SECS: u64 = 10;
pub(crate) const DEFAULT_RASTERIZER_PATH: &str = "rsvg-convert";
pub(crate) const DEFAULT_THEME: &str = "offline";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub storage: StorageSettings,
    pub maps: MapsSettings,
    pub jobs: JobsSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    /// Base for download URLs; always ends with `/`.
    pub public_url: Url,
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
pub struct StorageSettings {
    pub directory: PathBuf,
}

#[derive(Debug, Clone)]
pub struct MapsSettings {
    pub directory: PathBuf,
}

#[derive(Debug, Clone)]
pub struct JobsSettings {
    pub concurrency: NonZeroU32,
    pub retention: Duration,
    pub reap_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub rasterizer_path: PathBuf,
    pub default_theme: String,
    /// Theme name → tile URL template with `{bbox}`, `{width}` and `{height}`.
    pub themes: BTreeMap<String, String>,
    pub background_timeout: Duration,
    pub grid_style: GridStyle,
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
        Some(Command::Render(args)) => raw.apply_render_overrides(&args.overrides),
        Some(Command::Grid(_)) => {}
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    storage: RawStorageSettings,
    maps: RawMapsSettings,
    jobs: RawJobsSettings,
    render: RawRenderSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(url) = overrides.public_url.as_ref() {
            self.server.public_url = Some(url.clone());
        }
        if let Some(value) = overrides.jobs_concurrency {
            self.jobs.concurrency = Some(value);
        }
        if let Some(seconds) = overrides.jobs_retention_seconds {
            self.jobs.retention_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.jobs_reap_interval_seconds {
            self.jobs.reap_interval_seconds = Some(seconds);
        }

        self.apply_render_overrides(&overrides.render);
    }

    fn apply_render_overrides(&mut self, overrides: &RenderOverrides) {
        if let Some(directory) = overrides.storage_directory.as_ref() {
            self.storage.directory = Some(directory.clone());
        }
        if let Some(directory) = overrides.maps_directory.as_ref() {
            self.maps.directory = Some(directory.clone());
        }
        if let Some(path) = overrides.rasterizer_path.as_ref() {
            self.render.rasterizer_path = Some(path.clone());
        }
        if let Some(theme) = overrides.default_theme.as_ref() {
            self.render.default_theme = Some(theme.clone());
        }
        if let Some(style) = overrides.grid_style.as_ref() {
            self.render.grid_style = Some(style.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            storage,
            maps,
            jobs,
            render,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let storage = build_storage_settings(storage)?;
        let maps = build_maps_settings(maps)?;
        let jobs = build_jobs_settings(jobs)?;
        let render = build_render_settings(render)?;

        Ok(Self {
            server,
            logging,
            storage,
            maps,
            jobs,
            render,
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

    let raw_url = server
        .public_url
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| format!("http://{host}:{port}/"));
    let raw_url = if raw_url.ends_with('/') {
        raw_url
    } else {
        format!("{raw_url}/")
    };
    let public_url = Url::parse(&raw_url)
        .map_err(|err| LoadError::invalid("server.public_url", format!("invalid URL: {err}")))?;
    if public_url.cannot_be_a_base() {
        return Err(LoadError::invalid(
            "server.public_url",
            "URL must be usable as a base",
        ));
    }

    Ok(ServerSettings { addr, public_url })
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

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let directory = storage
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "storage.directory",
            "path must not be empty",
        ));
    }

    Ok(StorageSettings { directory })
}

fn build_maps_settings(maps: RawMapsSettings) -> Result<MapsSettings, LoadError> {
    let directory = maps
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MAPS_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid("maps.directory", "path must not be empty"));
    }

    Ok(MapsSettings { directory })
}

fn build_jobs_settings(jobs: RawJobsSettings) -> Result<JobsSettings, LoadError> {
    let concurrency = jobs.concurrency.unwrap_or(DEFAULT_JOBS_CONCURRENCY);
    let retention = jobs
        .retention_seconds
        .unwrap_or(DEFAULT_JOBS_RETENTION_SECS);
    let reap_interval = jobs
        .reap_interval_seconds
        .unwrap_or(DEFAULT_JOBS_REAP_INTERVAL_SECS);

    Ok(JobsSettings {
        concurrency: non_zero_u32(concurrency.into(), "jobs.concurrency")?,
        retention: non_zero_secs(retention, "jobs.retention_seconds")?,
        reap_interval: non_zero_secs(reap_interval, "jobs.reap_interval_seconds")?,
    })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let rasterizer_path = render
        .rasterizer_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RASTERIZER_PATH));
    if rasterizer_path.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "render.rasterizer_path",
            "path must not be empty",
        ));
    }

    let default_theme = render
        .default_theme
        .map(|theme| theme.trim().to_string())
        .filter(|theme| !theme.is_empty())
        .unwrap_or_else(|| DEFAULT_THEME.to_string());

    let themes = render.themes.unwrap_or_default();
    for (name, template) in &themes {
        if !template.contains("{bbox}") {
            return Err(LoadError::invalid(
                "render.themes",
                format!("template for theme `{name}` must contain `{{bbox}}`"),
            ));
        }
    }

    let timeout = render
        .background_timeout_seconds
        .unwrap_or(DEFAULT_BACKGROUND_TIMEOUT_SECS);
    let background_timeout = non_zero_secs(timeout, "render.background_timeout_seconds")?;

    let grid_style = match render.grid_style {
        Some(style) => GridStyle::from_str(&style)
            .map_err(|err| LoadError::invalid("render.grid_style", err.to_string()))?,
        None => GridStyle::default(),
    };

    Ok(RenderSettings {
        rasterizer_path,
        default_theme,
        themes,
        background_timeout,
        grid_style,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    public_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMapsSettings {
    directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawJobsSettings {
    concurrency: Option<u32>,
    retention_seconds: Option<u64>,
    reap_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    rasterizer_path: Option<PathBuf>,
    default_theme: Option<String>,
    themes: Option<BTreeMap<String, String>>,
    background_timeout_seconds: Option<u64>,
    grid_style: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
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

fn non_zero_secs(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
