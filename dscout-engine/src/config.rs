//! Engine configuration: strategy ladders, thresholds, API key resolution
//!
//! API keys resolve with Database -> ENV -> TOML priority; everything else
//! is a plain config struct with compiled defaults, overridable from the
//! TOML file.

use dscout_common::config::TomlConfig;
use dscout_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

use crate::types::EventSource;

/// Search strategy kind within a provider's ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Provider-side city match (Ticketmaster)
    CitySearch,
    /// Free-text keyword search (Ticketmaster)
    KeywordSearch,
    /// Geo radius search; skipped when the query carries no radius
    RadiusSearch,
    /// Provider market/DMA lookup for the city (Ticketmaster)
    MarketSearch,
    /// Category-filtered search (PredictHQ)
    CategorySearch,
    /// Rank-thresholded search (PredictHQ)
    RankedSearch,
    /// Firecrawl-backed city listing scrape
    CityScrape,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::CitySearch => "city_search",
            StrategyKind::KeywordSearch => "keyword_search",
            StrategyKind::RadiusSearch => "radius_search",
            StrategyKind::MarketSearch => "market_search",
            StrategyKind::CategorySearch => "category_search",
            StrategyKind::RankedSearch => "ranked_search",
            StrategyKind::CityScrape => "city_scrape",
        }
    }
}

/// One rung of a provider's strategy ladder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub kind: StrategyKind,
    pub enabled: bool,
    pub timeout_ms: u64,
    /// Radius override for radius strategies (query radius wins)
    pub radius_km: Option<f64>,
    /// Minimum provider rank for ranked strategies (PredictHQ 0-100)
    pub min_rank: Option<u32>,
    /// Page size requested from the provider
    pub max_results: u32,
}

impl StrategyConfig {
    pub fn new(kind: StrategyKind) -> Self {
        Self {
            kind,
            enabled: true,
            timeout_ms: 8_000,
            radius_km: None,
            min_rank: None,
            max_results: 50,
        }
    }
}

/// Aggregator tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Distinct-event count at which remaining strategies are skipped
    pub early_return_threshold: usize,
    /// Strategies in flight at once per provider
    pub max_concurrent_strategies: usize,
    /// Strategies in flight at once across all providers
    pub global_fanout_cap: usize,
    pub ticketmaster_ladder: Vec<StrategyConfig>,
    pub predicthq_ladder: Vec<StrategyConfig>,
    pub scraper_ladder: Vec<StrategyConfig>,
}

impl AggregatorConfig {
    pub fn ladder_for(&self, source: EventSource) -> &[StrategyConfig] {
        match source {
            EventSource::Ticketmaster => &self.ticketmaster_ladder,
            EventSource::PredictHq => &self.predicthq_ladder,
            EventSource::CityScraper => &self.scraper_ladder,
        }
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            early_return_threshold: 50,
            max_concurrent_strategies: 3,
            global_fanout_cap: 8,
            ticketmaster_ladder: vec![
                StrategyConfig::new(StrategyKind::CitySearch),
                StrategyConfig::new(StrategyKind::KeywordSearch),
                StrategyConfig::new(StrategyKind::RadiusSearch),
                StrategyConfig::new(StrategyKind::MarketSearch),
            ],
            predicthq_ladder: vec![
                StrategyConfig::new(StrategyKind::CategorySearch),
                StrategyConfig {
                    min_rank: Some(50),
                    ..StrategyConfig::new(StrategyKind::RankedSearch)
                },
            ],
            scraper_ladder: vec![StrategyConfig {
                timeout_ms: 20_000,
                ..StrategyConfig::new(StrategyKind::CityScrape)
            }],
        }
    }
}

/// Deduplication tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Title similarity at or above which same-day/same-city pairs merge
    pub similarity_threshold: f64,
    /// Deterministic cap on the raw event list before pairwise comparison
    pub max_events: usize,
    /// Merge tie-break order, highest priority first
    pub provider_priority: Vec<EventSource>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
            max_events: 200,
            provider_priority: vec![
                EventSource::Ticketmaster,
                EventSource::PredictHq,
                EventSource::CityScraper,
            ],
        }
    }
}

/// Scoring tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Events given full per-event scoring; the rest contribute the flat
    /// long-tail term
    pub max_comparisons: usize,
    /// Scores at or above this land in high_risk_dates
    pub high_risk_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            max_comparisons: 10,
            high_risk_threshold: 12.0,
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

// ============================================================================
// API key resolution
// ============================================================================

/// Provider API keys resolvable through the 3-tier configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyKind {
    Ticketmaster,
    PredictHq,
    Firecrawl,
    OpenAi,
}

impl ApiKeyKind {
    /// Key in the settings table
    pub fn setting_key(&self) -> &'static str {
        match self {
            ApiKeyKind::Ticketmaster => "ticketmaster_api_key",
            ApiKeyKind::PredictHq => "predicthq_api_key",
            ApiKeyKind::Firecrawl => "firecrawl_api_key",
            ApiKeyKind::OpenAi => "openai_api_key",
        }
    }

    /// Environment variable name
    pub fn env_var(&self) -> &'static str {
        match self {
            ApiKeyKind::Ticketmaster => "DSCOUT_TICKETMASTER_API_KEY",
            ApiKeyKind::PredictHq => "DSCOUT_PREDICTHQ_API_KEY",
            ApiKeyKind::Firecrawl => "DSCOUT_FIRECRAWL_API_KEY",
            ApiKeyKind::OpenAi => "DSCOUT_OPENAI_API_KEY",
        }
    }

    fn toml_key<'a>(&self, config: &'a TomlConfig) -> Option<&'a String> {
        match self {
            ApiKeyKind::Ticketmaster => config.ticketmaster_api_key.as_ref(),
            ApiKeyKind::PredictHq => config.predicthq_api_key.as_ref(),
            ApiKeyKind::Firecrawl => config.firecrawl_api_key.as_ref(),
            ApiKeyKind::OpenAi => config.openai_api_key.as_ref(),
        }
    }
}

/// Resolve a provider API key from 3-tier configuration.
///
/// **Priority:** Database -> ENV -> TOML. Returns `None` when no tier has
/// a valid key; providers without a key register as unavailable rather
/// than failing aggregation.
pub async fn resolve_api_key(
    kind: ApiKeyKind,
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<Option<String>> {
    let mut sources = Vec::new();

    let db_key = crate::db::settings::get_setting::<String>(db, kind.setting_key()).await?;
    if db_key.as_deref().map(is_valid_key).unwrap_or(false) {
        sources.push("database");
    }

    let env_key = std::env::var(kind.env_var()).ok();
    if env_key.as_deref().map(is_valid_key).unwrap_or(false) {
        sources.push("environment");
    }

    let toml_key = kind.toml_key(toml_config);
    if toml_key.map(|k| is_valid_key(k)).unwrap_or(false) {
        sources.push("TOML");
    }

    if sources.len() > 1 {
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            kind.setting_key(),
            sources.join(", "),
            sources[0]
        );
    }

    if let Some(key) = db_key {
        if is_valid_key(&key) {
            info!("{} loaded from database", kind.setting_key());
            return Ok(Some(key));
        }
    }

    if let Some(key) = env_key {
        if is_valid_key(&key) {
            info!("{} loaded from environment variable", kind.setting_key());
            return Ok(Some(key));
        }
    }

    if let Some(key) = toml_key {
        if is_valid_key(key) {
            info!("{} loaded from TOML config", kind.setting_key());
            return Ok(Some(key.clone()));
        }
    }

    Ok(None)
}

/// Resolve a key that must be present, with a configuration hint on failure
pub async fn require_api_key(
    kind: ApiKeyKind,
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<String> {
    resolve_api_key(kind, db, toml_config).await?.ok_or_else(|| {
        Error::Config(format!(
            "{} not configured. Set it via the settings table, the {} environment \
             variable, or the TOML config file.",
            kind.setting_key(),
            kind.env_var()
        ))
    })
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
