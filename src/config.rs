//! Command line and layered configuration.
//!
//! Priority, lowest first: built-in defaults, config file, `QCHAT_`-prefixed
//! environment variables, CLI flags (and the env vars clap maps onto them).

use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;

/// Config file looked up in the working directory when none is given.
const DEFAULT_CONFIG_NAME: &str = "query-chat";

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Base URL of the query service
    #[arg(long, env = "QUERY_CHAT_URL")]
    pub base_url: Option<String>,

    /// Path of the streaming query endpoint
    #[arg(long)]
    pub query_path: Option<String>,

    /// Log output format: pretty or json
    #[arg(long, env = "LOG_FORMAT")]
    pub log_format: Option<String>,

    /// Ask one question, print the answer and exit
    #[arg(short, long)]
    pub query: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub endpoint: EndpointConfig,
    pub ui: UiConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EndpointConfig {
    pub base_url: String,
    pub query_path: String,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UiConfig {
    /// How long the connection error notice stays visible.
    pub error_status_secs: u64,
    pub cursor: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

/// Log line format.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Self::from_cli(&cli)
    }

    pub fn from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder()
            .set_default("endpoint.base_url", "http://127.0.0.1:8000")?
            .set_default("endpoint.query_path", "/api/query")?
            .set_default("endpoint.connect_timeout_secs", 10)?
            .set_default("ui.error_status_secs", 3)?
            .set_default("ui.cursor", crate::terminal::DEFAULT_CURSOR)?
            .set_default("logging.format", "pretty")?;

        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_NAME).required(false)),
        };

        // E.g. QCHAT_ENDPOINT__BASE_URL=http://localhost:9000
        builder = builder.add_source(
            Environment::with_prefix("QCHAT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(url) = &cli.base_url {
            builder = builder.set_override("endpoint.base_url", url.as_str())?;
        }
        if let Some(path) = &cli.query_path {
            builder = builder.set_override("endpoint.query_path", path.as_str())?;
        }
        if let Some(format) = &cli.log_format {
            builder = builder.set_override("logging.format", format.to_lowercase())?;
        }

        builder.build()?.try_deserialize()
    }

    #[must_use]
    pub fn error_status_duration(&self) -> Duration {
        Duration::from_secs(self.ui.error_status_secs)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.endpoint.connect_timeout_secs)
    }
}
