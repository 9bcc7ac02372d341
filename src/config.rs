use anyhow::{Context, Result};
use clap::Parser;
use std::{env, fmt, path::PathBuf, time::Duration};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TRANSFER_TIMEOUT_SECS: u64 = 300;
const DEFAULT_DRIVE_PAGE_SIZE: u32 = 100;
pub const DEFAULT_DRIVE_API_BASE: &str = "https://www.googleapis.com";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Deadline applied to each of a transfer's download and upload calls.
    pub transfer_timeout: Duration,
    pub source: SourceConfig,
    pub destination: DestinationConfig,
}

/// Settings for the hierarchical source. Absent values leave the source
/// unconfigured rather than failing startup.
#[derive(Clone)]
pub struct SourceConfig {
    pub service_account_key: Option<String>,
    pub service_account_file: Option<PathBuf>,
    pub folder_id: Option<String>,
    pub api_base: String,
    pub page_size: u32,
}

#[derive(Clone)]
pub struct DestinationConfig {
    pub connection_string: Option<String>,
    pub container: Option<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Google Drive to Azure Blob Storage migration bridge")]
pub struct Args {
    /// Host to bind to (overrides BRIDGE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides BRIDGE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Per-call transfer deadline in seconds (overrides BRIDGE_TRANSFER_TIMEOUT_SECS)
    #[arg(long)]
    pub transfer_timeout_secs: Option<u64>,

    /// Maximum entries returned by one source listing (overrides BRIDGE_DRIVE_PAGE_SIZE)
    #[arg(long)]
    pub drive_page_size: Option<u32>,

    /// Path to a service account key file (overrides GOOGLE_SERVICE_ACCOUNT_KEY_FILE)
    #[arg(long)]
    pub service_account_file: Option<PathBuf>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();
        Self::from_sources(args, |name| env::var(name).ok())
    }

    /// Merge parsed arguments over values looked up by `lookup`.
    /// Empty or whitespace-only values count as unset.
    pub fn from_sources(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        // --- Environment fallback ---
        let env_host = var("BRIDGE_HOST").unwrap_or_else(|| DEFAULT_HOST.into());
        let env_port = parse_var(var("BRIDGE_PORT"), "BRIDGE_PORT")?.unwrap_or(DEFAULT_PORT);
        let env_timeout = parse_var(
            var("BRIDGE_TRANSFER_TIMEOUT_SECS"),
            "BRIDGE_TRANSFER_TIMEOUT_SECS",
        )?
        .unwrap_or(DEFAULT_TRANSFER_TIMEOUT_SECS);
        let env_page_size = parse_var(var("BRIDGE_DRIVE_PAGE_SIZE"), "BRIDGE_DRIVE_PAGE_SIZE")?
            .unwrap_or(DEFAULT_DRIVE_PAGE_SIZE);

        // --- Merge ---
        let timeout_secs = args.transfer_timeout_secs.unwrap_or(env_timeout);
        if timeout_secs == 0 {
            anyhow::bail!("transfer timeout must be at least one second");
        }

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            transfer_timeout: Duration::from_secs(timeout_secs),
            source: SourceConfig {
                service_account_key: var("GOOGLE_SERVICE_ACCOUNT_KEY"),
                service_account_file: args
                    .service_account_file
                    .or_else(|| var("GOOGLE_SERVICE_ACCOUNT_KEY_FILE").map(PathBuf::from)),
                folder_id: var("GOOGLE_DRIVE_FOLDER_ID"),
                api_base: var("GOOGLE_DRIVE_API_BASE")
                    .unwrap_or_else(|| DEFAULT_DRIVE_API_BASE.into()),
                page_size: args.drive_page_size.unwrap_or(env_page_size),
            },
            destination: DestinationConfig {
                connection_string: var("AZURE_STORAGE_CONNECTION_STRING"),
                container: var("AZURE_CONTAINER_NAME"),
            },
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(value: Option<String>, name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("parsing {} value `{}`", name, raw))
        })
        .transpose()
}

fn redact<T>(value: &Option<T>) -> &'static str {
    if value.is_some() { "<set>" } else { "<unset>" }
}

// Credentials must never reach the startup log line.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("transfer_timeout", &self.transfer_timeout)
            .field("source", &self.source)
            .field("destination", &self.destination)
            .finish()
    }
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("service_account_key", &redact(&self.service_account_key))
            .field("service_account_file", &self.service_account_file)
            .field("folder_id", &self.folder_id)
            .field("api_base", &self.api_base)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl fmt::Debug for DestinationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationConfig")
            .field("connection_string", &redact(&self.connection_string))
            .field("container", &self.container)
            .finish()
    }
}
