//! Base types and traits for the conflict scoring engine
//!
//! The normalized `Event` contract every provider adapter produces, the
//! cache-entry types shared by the classifier and the seasonality engine,
//! and the traits the engine's injected collaborators implement
//! (`ProviderAdapter`, `CategoryMatchProvider`, `HolidayProvider`).

use async_trait::async_trait;
use chrono::NaiveDate;
use dscout_common::dates::{inclusive_day_span, DateRange};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::StrategyConfig;

// ============================================================================
// Events
// ============================================================================

/// Event source provider tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Ticketmaster,
    PredictHq,
    CityScraper,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::Ticketmaster => "ticketmaster",
            EventSource::PredictHq => "predicthq",
            EventSource::CityScraper => "city_scraper",
        }
    }
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized competing-event record
///
/// Produced by a provider adapter's mapping function and immutable from
/// then on. `source_id` carries the provider-native id and drives
/// cross-source deduplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Start date (required)
    pub date: NaiveDate,
    /// End date for multi-day events
    pub end_date: Option<NaiveDate>,
    pub city: String,
    pub venue: Option<String>,
    pub category: String,
    pub subcategory: Option<String>,
    pub expected_attendees: Option<u32>,
    pub source: EventSource,
    /// Provider-native id, used for dedup
    pub source_id: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
}

impl Event {
    /// Event length in days, inclusive of both endpoints (1 for single-day)
    pub fn duration_days(&self) -> i64 {
        match self.end_date {
            Some(end) => inclusive_day_span(self.date, end),
            None => 1,
        }
    }

    /// Whether the event is running on `date`
    pub fn occurs_on(&self, date: NaiveDate) -> bool {
        let end = self.end_date.unwrap_or(self.date);
        date >= self.date && date <= end
    }

    /// Key used for distinct-event counting during aggregation:
    /// provider-native id when present, normalized title otherwise.
    pub fn distinct_key(&self) -> String {
        match &self.source_id {
            Some(id) => format!("{}:{}", self.source, id),
            None => normalize_title(&self.title),
        }
    }
}

/// Lowercased, whitespace-collapsed title used for similarity comparison
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// A deduplicated event plus the audit trail of provider ids merged into it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub event: Event,
    /// All contributing provider-native ids (at least the survivor's own)
    pub source_ids: Vec<String>,
}

/// Deduplicated list of events for one (city, date-range) query
///
/// Invariant: no two members have title similarity at or above the dedup
/// threshold on the same day in the same city.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanonicalEventSet {
    pub events: Vec<CanonicalEvent>,
    /// Raw events dropped by the deterministic pre-dedup cap
    pub truncated: usize,
}

impl CanonicalEventSet {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

// ============================================================================
// Search queries
// ============================================================================

/// Aggregation query; at least one of `city`/`keyword` must be present
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub city: Option<String>,
    pub keyword: Option<String>,
    pub category: Option<String>,
    pub date_range: DateRange,
    /// Search radius in km for radius-based strategies
    pub radius_km: Option<f64>,
}

impl SearchQuery {
    /// Identifying parameter check; the aggregator fails fast without one.
    pub fn has_identifying_parameter(&self) -> bool {
        self.city.as_deref().map(|c| !c.trim().is_empty()).unwrap_or(false)
            || self.keyword.as_deref().map(|k| !k.trim().is_empty()).unwrap_or(false)
    }
}

// ============================================================================
// Classification
// ============================================================================

/// How a category conflict weight was determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    /// Exact category/subcategory equality
    Exact,
    /// Static relationship table
    Rule,
    /// AI-assisted semantic match
    Ai,
}

/// Conflict weight for a (planned, competing) category pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConflictWeight {
    /// Weight on the 0-20 per-event scale (15 max for exact pairs)
    pub weight: f64,
    pub confidence: f64,
    pub method: MatchMethod,
    pub reasoning: Vec<String>,
}

/// Structured result of one AI category match call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryMatch {
    pub is_match: bool,
    pub confidence: f64,
    pub reasoning: String,
}

// ============================================================================
// Seasonality & holidays
// ============================================================================

/// Coarse seasonal popularity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandLevel {
    Low,
    Medium,
    High,
}

/// Month-granularity demand multiplier for a category/region
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonalMultiplier {
    /// Demand multiplier, >= 0, 1.0 is neutral
    pub multiplier: f64,
    pub demand_level: DemandLevel,
    pub confidence: f64,
    /// True when the engine had no data for this category/region and
    /// returned the neutral multiplier
    pub coverage_warning: bool,
}

impl SeasonalMultiplier {
    pub fn neutral() -> Self {
        Self {
            multiplier: 1.0,
            demand_level: DemandLevel::Medium,
            confidence: 0.3,
            coverage_warning: true,
        }
    }
}

/// A single observed holiday or cultural event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolidayInfo {
    pub name: String,
    pub date: NaiveDate,
    pub country: String,
    pub region: Option<String>,
    /// Venues commonly close for this holiday
    pub venue_closure_expected: bool,
    /// Relative cultural significance, 0.0-1.0
    pub significance: f64,
}

/// Degree of holiday impact on a candidate date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolidayImpactLevel {
    None,
    Partial,
    Full,
}

/// Holiday-closure risk for one date/category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolidayImpact {
    pub multiplier: f64,
    pub total_impact: HolidayImpactLevel,
    pub holidays: Vec<HolidayInfo>,
    /// True when the calendar has no coverage for the requested country
    pub coverage_warning: bool,
}

impl HolidayImpact {
    pub fn neutral(coverage_warning: bool) -> Self {
        Self {
            multiplier: 1.0,
            total_impact: HolidayImpactLevel::None,
            holidays: Vec::new(),
            coverage_warning,
        }
    }
}

// ============================================================================
// Scoring
// ============================================================================

/// Analysis depth requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisDepth {
    #[default]
    Standard,
    Deep,
}

/// Per-factor breakdown published with every score
///
/// Downstream UI renders these; the breakdown is part of the public
/// contract, not a diagnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreFactors {
    /// Largest category conflict weight among fully-scored events
    pub category_weight: f64,
    /// Largest duration multiplier applied to a fully-scored event
    pub duration_multiplier: f64,
    pub attendance_multiplier: f64,
    pub seasonal_multiplier: f64,
    pub holiday_multiplier: f64,
}

/// Final conflict score for one candidate date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictScore {
    /// Composite score, capped to [0, 20]
    pub score: f64,
    pub factors: ScoreFactors,
    pub events_considered: usize,
    pub events_truncated: usize,
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Outcome of one provider strategy execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyOutcome {
    Completed,
    /// Disabled, missing required input, or short-circuited by early return
    Skipped,
    TimedOut,
    Failed,
    /// Provider could not run at all (e.g. missing credentials)
    Unavailable,
}

/// Observability record for one provider/strategy execution
///
/// Failures degrade to empty contributions; this record is how they stay
/// visible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDiagnostics {
    pub provider: EventSource,
    pub strategy: String,
    pub outcome: StrategyOutcome,
    pub events_found: usize,
    pub elapsed_ms: u64,
    pub detail: Option<String>,
}

// ============================================================================
// Collaborator traits
// ============================================================================

/// Provider adapter errors
///
/// "No results" is never an error; adapters raise only for hard failures
/// and the aggregator recovers those as empty contributions.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Missing credentials")]
    MissingCredentials,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// External event source adapter
///
/// Implementations normalize provider wire formats into `Event` at this
/// boundary so provider parsing quirks never reach the core.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn source(&self) -> EventSource;

    /// False when the adapter cannot run at all (no credentials); the
    /// aggregator records it unavailable without calling `search`.
    fn available(&self) -> bool;

    async fn search(
        &self,
        strategy: &StrategyConfig,
        query: &SearchQuery,
    ) -> Result<Vec<Event>, ProviderError>;
}

/// AI classification provider errors
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    /// Provider returned output that is not the expected structured shape
    #[error("Parse error: {0}")]
    Parse(String),
}

/// AI-assisted semantic category matcher
#[async_trait]
pub trait CategoryMatchProvider: Send + Sync {
    async fn match_category(
        &self,
        event_category: &str,
        target_category: &str,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<CategoryMatch, MatchError>;
}

/// Holiday/cultural-event data source
///
/// "No holidays" is an empty list, never an error.
#[async_trait]
pub trait HolidayProvider: Send + Sync {
    async fn holidays_for_date(
        &self,
        date: NaiveDate,
        country: &str,
        region: Option<&str>,
    ) -> Vec<HolidayInfo>;

    /// Whether the provider has any coverage for a country
    fn covers_country(&self, country: &str) -> bool;
}
