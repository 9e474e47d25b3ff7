use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the kartenwerk binary.
#[derive(Debug, Parser)]
#[command(name = "kartenwerk", version, about = "Printable action map renderer")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "KARTENWERK_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP API together with the render workers.
    Serve(Box<ServeArgs>),
    /// Render stored map documents once and print the artifact paths.
    Render(RenderArgs),
    /// Print the grid overlay for a bounding box as GeoJSON.
    Grid(GridArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub overrides: RenderOverrides,

    /// Map ids to render; documents are read from the maps directory.
    #[arg(value_name = "MAP_ID", required = true)]
    pub map_ids: Vec<String>,

    /// Output file type: svg, pdf, png or png:small|medium|large.
    #[arg(long = "format", default_value = "png", value_name = "FILE_TYPE")]
    pub format: String,

    /// Render even when an artifact for the version already exists.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub force: bool,
}

#[derive(Debug, Args, Clone)]
pub struct GridArgs {
    /// Bounding box as `minX,minY,maxX,maxY`.
    #[arg(long, value_name = "BBOX", allow_hyphen_values = true)]
    pub bbox: String,

    /// Cell counts as `CXxCY`; derived from the bbox orientation when absent.
    #[arg(long, value_name = "CELLS")]
    pub cells: Option<String>,

    /// Label colour scheme (red|green|violet|blue).
    #[arg(long, value_name = "NAME")]
    pub style: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RenderOverrides {
    /// Override the artifact storage directory.
    #[arg(long = "storage-directory", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub storage_directory: Option<PathBuf>,

    /// Override the directory holding map content documents.
    #[arg(long = "maps-directory", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub maps_directory: Option<PathBuf>,

    /// Override the SVG converter executable used for PNG and PDF output.
    #[arg(long = "render-rasterizer-path", value_name = "PATH")]
    pub rasterizer_path: Option<PathBuf>,

    /// Override the background theme used when a map does not name one.
    #[arg(long = "render-default-theme", value_name = "THEME")]
    pub default_theme: Option<String>,

    /// Override the grid label colour scheme.
    #[arg(long = "render-grid-style", value_name = "NAME")]
    pub grid_style: Option<String>,

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
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub render: RenderOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the public base URL used in download links.
    #[arg(long = "server-public-url", value_name = "URL")]
    pub public_url: Option<String>,

    /// Override the number of render workers.
    #[arg(long = "jobs-concurrency", value_name = "COUNT")]
    pub jobs_concurrency: Option<u32>,

    /// Override how long finished and failed jobs stay queryable.
    #[arg(long = "jobs-retention-seconds", value_name = "SECONDS")]
    pub jobs_retention_seconds: Option<u64>,

    /// Override how often expired jobs are removed.
    #[arg(long = "jobs-reap-interval-seconds", value_name = "SECONDS")]
    pub jobs_reap_interval_seconds: Option<u64>,
}
