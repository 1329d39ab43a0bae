use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

mod config;
mod dataset;
mod llm;
mod pipeline;
mod table;
mod util;
mod warehouse;
mod web;

use crate::config::{AppConfig, CliArgs};
use crate::llm::LlmManager;
use crate::util::logging::init_tracing;
use crate::warehouse::WarehouseManager;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Initialize the warehouse backend
    info!(
        "Initializing warehouse backend: {} (dataset {}.{}.{})",
        config.warehouse.backend,
        config.dataset.project_id,
        config.dataset.dataset_id,
        config.dataset.table_name
    );
    let warehouse = Arc::new(WarehouseManager::new(&config.warehouse)?);

    // Initialize LLM manager
    info!("Initializing LLM manager with backend: {}", config.llm.backend);
    let llm = Arc::new(LlmManager::new(&config.llm)?);

    // Create application state
    let app_state = Arc::new(AppState::new(config.clone(), warehouse, llm));

    // Start the web server
    info!(
        "Starting nl-insight server on {}:{}",
        config.web.host, config.web.port
    );
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(Box::new(std::io::Error::other(e.to_string())) as Box<dyn std::error::Error>);
        }
    }

    Ok(())
}
