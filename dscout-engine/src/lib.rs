//! dscout-engine library interface
//!
//! Exposes the conflict scoring pipeline and the HTTP surface for
//! integration testing.

pub mod aggregator;
pub mod analysis;
pub mod api;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod db;
pub mod dedup;
pub mod error;
pub mod providers;
pub mod scoring;
pub mod seasonality;
pub mod types;

pub use crate::error::{ApiError, ApiResult, EngineError};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::analysis::DateAnalyzer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Analysis pipeline with its injected components
    pub analyzer: Arc<DateAnalyzer>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, analyzer: Arc<DateAnalyzer>) -> Self {
        Self {
            db,
            analyzer,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::analyze_routes())
        .merge(api::health_routes())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
