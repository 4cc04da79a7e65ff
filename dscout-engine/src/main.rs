//! dscout-engine - Conflict Scoring & Aggregation Engine
//!
//! Aggregates competing events from the configured providers, scores
//! schedule conflict per candidate date, and serves the result over HTTP
//! for the UI service.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use dscout_engine::analysis::DateAnalyzer;
use dscout_engine::aggregator::SourceAggregator;
use dscout_engine::cache::SqliteCache;
use dscout_engine::classifier::{ConflictClassifier, OpenAiCategoryMatcher};
use dscout_engine::config::{resolve_api_key, ApiKeyKind, EngineConfig};
use dscout_engine::dedup::Deduplicator;
use dscout_engine::seasonality::{
    HolidayConflictDetector, SeasonalityEngine, StaticHolidayCalendar,
};
use dscout_engine::types::CategoryMatchProvider;
use dscout_engine::AppState;

const LISTEN_ADDR: &str = "127.0.0.1:5787";

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting dscout-engine (Conflict Scoring)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Resolve data folder and TOML config
    let config_path = dscout_common::config::default_config_path("engine");
    let toml_config = dscout_common::config::load_toml_config(&config_path)?;
    let data_folder =
        dscout_common::config::resolve_data_folder(None, "DSCOUT_DATA_FOLDER", &toml_config);
    let db_path = dscout_common::config::ensure_data_folder(&data_folder)?;
    info!("Database: {}", db_path.display());

    let db_pool = dscout_engine::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    let engine_config = EngineConfig::default();

    // Provider adapters (keyless providers degrade to unavailable)
    let providers = dscout_engine::providers::build_providers(&db_pool, &toml_config).await?;

    // AI matcher is optional: without a key the classifier stops at the
    // static table
    let matcher: Option<Arc<dyn CategoryMatchProvider>> =
        match resolve_api_key(ApiKeyKind::OpenAi, &db_pool, &toml_config).await? {
            Some(key) => Some(Arc::new(OpenAiCategoryMatcher::new(key)?)),
            None => {
                tracing::warn!("No OpenAI key configured; AI category matching disabled");
                None
            }
        };

    let cache = Arc::new(SqliteCache::new(db_pool.clone()));

    let analyzer = DateAnalyzer::new(
        SourceAggregator::new(providers, engine_config.aggregator.clone()),
        Deduplicator::new(engine_config.dedup.clone()),
        ConflictClassifier::new(cache.clone(), matcher),
        SeasonalityEngine::new(cache.clone()),
        HolidayConflictDetector::new(Arc::new(StaticHolidayCalendar::new()), cache),
        &engine_config,
    );

    let state = AppState::new(db_pool, Arc::new(analyzer));
    let app = dscout_engine::build_router(state);

    let listener = tokio::net::TcpListener::bind(LISTEN_ADDR).await?;
    info!("Listening on http://{}", LISTEN_ADDR);
    info!("Health check: http://{}/health", LISTEN_ADDR);

    axum::serve(listener, app).await?;

    Ok(())
}
