use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the viewdocs binary.
#[derive(Debug, Parser)]
#[command(name = "viewdocs", version, about = "Documentation pages served from repositories")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "VIEWDOCS_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(Box<ServeArgs>),
    /// Render one document and write it to stdout.
    Render(RenderArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SharedOverrides {
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

    /// Credential for the markdown rendering service.
    #[arg(long = "access-token", value_name = "TOKEN")]
    pub access_token: Option<String>,

    /// Read documents and templates from the working tree before the origin.
    #[arg(
        long = "local-override",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub local_override: Option<bool>,

    /// Working-tree root used by --local-override.
    #[arg(long = "path-prefix", value_name = "PATH")]
    pub path_prefix: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub shared: SharedOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Serve cache hits; `false` renders every request.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Serve every request as this tenant instead of the first host label.
    #[arg(long = "tenant-override", value_name = "TENANT")]
    pub tenant_override: Option<String>,

    /// Public hostname used to recognise same-tenant absolute links.
    #[arg(long = "hostname", value_name = "HOST")]
    pub hostname: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub overrides: SharedOverrides,

    /// Tenant owning the repository.
    #[arg(long, value_name = "TENANT")]
    pub tenant: String,

    /// Document to render, as `repository[~reference][/document]`.
    #[arg(value_name = "TARGET")]
    pub target: String,
}
