use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cohort::config::Settings;
use cohort::error::{CohortError, Result};
use cohort::interface::QueryPipeline;
use cohort::roster::Roster;
use cohort::schema::SchemaRegistry;
use cohort::server;
use cohort::translate::LanguageServiceClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::load()?;

    let roster = Arc::new(Roster::from_csv_path(&settings.data_path)?);
    if roster.is_empty() {
        warn!(path = %settings.data_path, "roster is empty; every query will come back empty");
    }
    let registry = Arc::new(SchemaRegistry::student_records());

    let language = &settings.language_service;
    let api_key = language
        .api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .ok_or_else(|| CohortError::Config("no language service API key configured".into()))?;
    let client = LanguageServiceClient::new(
        &language.base_url,
        &language.model,
        &api_key,
        Duration::from_secs(language.timeout_secs),
    )?;

    let pipeline = Arc::new(QueryPipeline::new(roster, registry, Box::new(client)));
    let app = server::router(pipeline);

    let listener = tokio::net::TcpListener::bind(&settings.listen)
        .await
        .map_err(|e| CohortError::Config(format!("cannot bind {}: {e}", settings.listen)))?;
    info!(listen = %settings.listen, "cohort serving");
    axum::serve(listener, app)
        .await
        .map_err(|e| CohortError::Config(format!("server error: {e}")))?;
    Ok(())
}
