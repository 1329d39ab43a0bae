use crate::config::AppConfig;
use crate::dataset::DatasetProfile;
use crate::llm::LlmManager;
use crate::pipeline::Pipeline;
use crate::warehouse::WarehouseManager;
use minijinja::Environment;
use std::sync::Arc;

/// Shared application state for the web server
pub struct AppState {
    pub config: AppConfig,
    pub pipeline: Pipeline,
    pub template_env: Environment<'static>,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        warehouse: Arc<WarehouseManager>,
        llm: Arc<LlmManager>,
    ) -> Self {
        // Initialize template environment
        let mut env = Environment::new();
        env.add_template("chart.html", include_str!("../../templates/chart.html"))
            .expect("Failed to add chart template");
        env.add_filter("json", |value: minijinja::value::Value| {
            serde_json::to_string(&value).unwrap_or_else(|_| "null".to_string())
        });

        let profile = DatasetProfile::from_config(&config.dataset);
        let pipeline = Pipeline::new(warehouse, llm, profile);

        Self {
            config,
            pipeline,
            template_env: env,
            startup_time: chrono::Utc::now(),
        }
    }
}
