//! Date analysis orchestration
//!
//! `DateAnalyzer` owns one pass through the pipeline: aggregate competing
//! events once for the context window, deduplicate, then per candidate
//! date classify, look up seasonal and holiday adjustments, and score on
//! the blocking worker. All components are constructor-injected; tests
//! run the whole pipeline against fakes.
//!
//! After input validation nothing here raises. Provider failures arrive
//! as diagnostics, classification failures as zero weights, cache
//! failures as direct computation, data gaps as coverage warnings.

use chrono::NaiveDate;
use dscout_common::dates::DateRange;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::aggregator::SourceAggregator;
use crate::classifier::ConflictClassifier;
use crate::config::EngineConfig;
use crate::dedup::Deduplicator;
use crate::error::EngineError;
use crate::scoring::{ConflictScorer, PlannedEvent};
use crate::seasonality::{HolidayConflictDetector, SeasonalityEngine};
use crate::types::{
    AnalysisDepth, CanonicalEvent, CategoryConflictWeight, ConflictScore,
    ProviderDiagnostics, SearchQuery, SeasonalMultiplier,
};

/// Public analysis request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub city: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub expected_attendees: u32,
    pub candidate_dates: Vec<NaiveDate>,
    /// Window the competing-event search covers; candidate dates outside
    /// it are still scored, but only against events the window surfaced
    pub date_range_for_context: DateRange,
    #[serde(default)]
    pub depth: AnalysisDepth,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub radius_km: Option<f64>,
}

/// Assessment of one candidate date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateAssessment {
    pub date: NaiveDate,
    pub conflict_score: ConflictScore,
    pub competing_events: Vec<CanonicalEvent>,
    pub seasonal_factors: SeasonalMultiplier,
    pub holiday_warnings: Vec<String>,
}

/// Public analysis response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    /// Dates under the high-risk threshold, lowest score first
    pub recommended_dates: Vec<DateAssessment>,
    /// Dates at or above the high-risk threshold
    pub high_risk_dates: Vec<DateAssessment>,
    pub diagnostics: Vec<ProviderDiagnostics>,
}

/// Conflict analysis pipeline over injected components
pub struct DateAnalyzer {
    aggregator: SourceAggregator,
    deduplicator: Deduplicator,
    classifier: ConflictClassifier,
    seasonality: SeasonalityEngine,
    holiday: HolidayConflictDetector,
    scorer: ConflictScorer,
    high_risk_threshold: f64,
}

impl DateAnalyzer {
    pub fn new(
        aggregator: SourceAggregator,
        deduplicator: Deduplicator,
        classifier: ConflictClassifier,
        seasonality: SeasonalityEngine,
        holiday: HolidayConflictDetector,
        config: &EngineConfig,
    ) -> Self {
        Self {
            aggregator,
            deduplicator,
            classifier,
            seasonality,
            holiday,
            scorer: ConflictScorer::new(&config.scoring),
            high_risk_threshold: config.scoring.high_risk_threshold,
        }
    }

    /// Analyze every candidate date and partition by risk.
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResponse, EngineError> {
        if request.candidate_dates.is_empty() {
            return Err(EngineError::InvalidQuery(
                "at least one candidate date is required".to_string(),
            ));
        }

        let query = SearchQuery {
            city: Some(request.city.clone()),
            keyword: None,
            category: Some(request.category.clone()),
            date_range: request.date_range_for_context,
            radius_km: request.radius_km,
        };

        let aggregation = self.aggregator.aggregate(&query).await?;
        let canonical = self.deduplicator.dedup(aggregation.events);

        tracing::info!(
            city = %request.city,
            candidates = request.candidate_dates.len(),
            competing_events = canonical.len(),
            truncated = canonical.truncated,
            "Scoring candidate dates"
        );

        // Classify each canonical event once; the map is shared by every
        // candidate date the event overlaps.
        let weights = self.classify_all(&request, &canonical.events).await;

        let country = request.country.as_deref().unwrap_or("us");
        let region = request.region.as_deref().unwrap_or("national");

        let mut assessments = Vec::with_capacity(request.candidate_dates.len());
        for &date in &request.candidate_dates {
            let assessment = self
                .assess_date(&request, date, &canonical.events, &weights, country, region, canonical.truncated)
                .await;
            assessments.push(assessment);
        }

        let (high_risk, mut recommended): (Vec<_>, Vec<_>) = assessments
            .into_iter()
            .partition(|a| a.conflict_score.score >= self.high_risk_threshold);

        recommended.sort_by(|a, b| {
            a.conflict_score
                .score
                .partial_cmp(&b.conflict_score.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(AnalysisResponse {
            recommended_dates: recommended,
            high_risk_dates: high_risk,
            diagnostics: aggregation.diagnostics,
        })
    }

    async fn classify_all(
        &self,
        request: &AnalysisRequest,
        events: &[CanonicalEvent],
    ) -> HashMap<Uuid, CategoryConflictWeight> {
        let mut weights = HashMap::with_capacity(events.len());
        for canonical in events {
            let weight = self
                .classifier
                .classify(
                    &request.category,
                    request.subcategory.as_deref(),
                    &canonical.event,
                )
                .await;
            weights.insert(canonical.event.id, weight);
        }
        weights
    }

    #[allow(clippy::too_many_arguments)]
    async fn assess_date(
        &self,
        request: &AnalysisRequest,
        date: NaiveDate,
        events: &[CanonicalEvent],
        weights: &HashMap<Uuid, CategoryConflictWeight>,
        country: &str,
        region: &str,
        events_truncated: usize,
    ) -> DateAssessment {
        let competing: Vec<CanonicalEvent> = events
            .iter()
            .filter(|c| c.event.occurs_on(date))
            .cloned()
            .collect();

        let seasonal = self
            .seasonality
            .seasonal_multiplier(date, &request.category, request.subcategory.as_deref(), region)
            .await;
        let holiday = self
            .holiday
            .holiday_impact(date, &request.category, request.subcategory.as_deref(), country, request.region.as_deref())
            .await;

        let mut holiday_warnings: Vec<String> = holiday
            .holidays
            .iter()
            .map(|h| {
                if h.venue_closure_expected {
                    format!("{}: venue closures expected", h.name)
                } else {
                    h.name.clone()
                }
            })
            .collect();
        if holiday.coverage_warning {
            holiday_warnings.push(format!("no holiday data for country '{}'", country));
        }
        if seasonal.coverage_warning {
            holiday_warnings.push(format!(
                "no seasonal data for category '{}'",
                request.category
            ));
        }

        let planned = PlannedEvent {
            expected_attendees: request.expected_attendees,
            depth: request.depth,
        };

        let conflict_score = self
            .scorer
            .score(
                planned,
                competing.clone(),
                filter_weights(weights, &competing),
                seasonal.clone(),
                holiday,
                events_truncated,
            )
            .await;

        tracing::debug!(
            date = %date,
            score = conflict_score.score,
            competing = competing.len(),
            "Candidate date assessed"
        );

        DateAssessment {
            date,
            conflict_score,
            competing_events: competing,
            seasonal_factors: seasonal,
            holiday_warnings,
        }
    }
}

fn filter_weights(
    weights: &HashMap<Uuid, CategoryConflictWeight>,
    events: &[CanonicalEvent],
) -> HashMap<Uuid, CategoryConflictWeight> {
    events
        .iter()
        .filter_map(|c| {
            weights
                .get(&c.event.id)
                .map(|w| (c.event.id, w.clone()))
        })
        .collect()
}
