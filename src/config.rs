use clap::Parser;
use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct WarehouseConfig {
    pub backend: String, // "bigquery" or "duckdb"
    /// Billing project for dry runs and query jobs (BigQuery backend).
    pub project_id: String,
    pub api_base: Option<String>,
    pub access_token: Option<String>,
    /// Path to the local database file (DuckDB backend).
    pub connection_string: Option<String>,
    pub pool_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatasetConfig {
    pub project_id: String,
    pub dataset_id: String,
    pub table_name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "vertex" or "ollama"
    pub model: String,   // Model name
    pub api_key: Option<String>,
    pub api_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub warehouse: WarehouseConfig,
    pub dataset: DatasetConfig,
    pub web: WebConfig,
    pub llm: LlmConfig,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Warehouse backend override ("bigquery" or "duckdb")
    #[arg(long)]
    pub warehouse: Option<String>,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        // Start with default configuration
        let mut config_builder = Config::builder();

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/nl-insight/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // Build the config
        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(warehouse) = &args.warehouse {
            config.warehouse.backend = warehouse.clone();
        }

        Ok(config)
    }
}

// Default implementation
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            warehouse: WarehouseConfig {
                backend: "bigquery".to_string(),
                project_id: "bigquery-public-data".to_string(),
                api_base: None,
                access_token: None,
                connection_string: Some("nl-insight.db".to_string()),
                pool_size: 5,
            },
            dataset: DatasetConfig {
                project_id: "bigquery-public-data".to_string(),
                dataset_id: "san_francisco_311".to_string(),
                table_name: "311_service_requests".to_string(),
            },
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            llm: LlmConfig {
                backend: "vertex".to_string(),
                model: "gemini-2.0-flash-001".to_string(),
                api_key: None,
                api_url: None,
            },
        }
    }
}
