//! PredictHQ events API client
//!
//! PredictHQ uses its own category taxonomy ("conferences", "expos",
//! "performing-arts", ...); `map_category` translates it into the engine
//! taxonomy during normalization so the classifier never sees provider
//! vocabulary.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::RateLimiter;
use crate::config::{StrategyConfig, StrategyKind};
use crate::types::{Event, EventSource, ProviderAdapter, ProviderError, SearchQuery};

const PREDICTHQ_BASE_URL: &str = "https://api.predicthq.com/v1/events/";
const USER_AGENT: &str = "DateScout/0.1.0 (https://github.com/datescout/datescout)";
const RATE_LIMIT_MS: u64 = 350;

/// PredictHQ response envelope
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PhqResponse {
    pub results: Vec<PhqEvent>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PhqEvent {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    /// ISO date or datetime of the event start
    pub start: String,
    pub end: Option<String>,
    pub labels: Option<Vec<String>>,
    /// PredictHQ attendance estimate
    pub phq_attendance: Option<u32>,
    pub entities: Option<Vec<PhqEntity>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PhqEntity {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub name: Option<String>,
}

/// PredictHQ API client
pub struct PredictHqClient {
    http_client: reqwest::Client,
    api_key: Option<String>,
    rate_limiter: Arc<RateLimiter>,
    base_url: String,
}

impl PredictHqClient {
    pub fn new(api_key: Option<String>) -> dscout_common::Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| dscout_common::Error::Internal(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
            base_url: PREDICTHQ_BASE_URL.to_string(),
        })
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn build_params(
        &self,
        strategy: &StrategyConfig,
        query: &SearchQuery,
    ) -> Option<Vec<(String, String)>> {
        let mut params = vec![
            ("limit".to_string(), strategy.max_results.to_string()),
            ("active.gte".to_string(), query.date_range.start.to_string()),
            ("active.lte".to_string(), query.date_range.end.to_string()),
            ("place.name".to_string(), query.city.clone()?),
        ];

        match strategy.kind {
            StrategyKind::CategorySearch => {
                if let Some(category) = &query.category {
                    if let Some(phq) = reverse_map_category(category) {
                        params.push(("category".to_string(), phq.to_string()));
                    }
                }
            }
            StrategyKind::RankedSearch => {
                let min_rank = strategy.min_rank?;
                params.push(("rank.gte".to_string(), min_rank.to_string()));
            }
            _ => return None,
        }

        Some(params)
    }
}

#[async_trait]
impl ProviderAdapter for PredictHqClient {
    fn source(&self) -> EventSource {
        EventSource::PredictHq
    }

    fn available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(
        &self,
        strategy: &StrategyConfig,
        query: &SearchQuery,
    ) -> Result<Vec<Event>, ProviderError> {
        let api_key = self.api_key.as_ref().ok_or(ProviderError::MissingCredentials)?;

        let Some(params) = self.build_params(strategy, query) else {
            return Ok(Vec::new());
        };

        self.rate_limiter.wait().await;

        tracing::debug!(
            strategy = strategy.kind.as_str(),
            city = ?query.city,
            "Querying PredictHQ events API"
        );

        let response = self
            .http_client
            .get(&self.base_url)
            .bearer_auth(api_key)
            .query(&params)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ProviderError::Api(status.as_u16(), "auth rejected".to_string()));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(status.as_u16(), error_text));
        }

        let body: PhqResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let events: Vec<Event> = body
            .results
            .into_iter()
            .filter_map(|raw| normalize_event(raw, query))
            .collect();

        tracing::debug!(
            strategy = strategy.kind.as_str(),
            count = events.len(),
            "PredictHQ search complete"
        );

        Ok(events)
    }
}

/// Map one PredictHQ record into the normalized shape
pub fn normalize_event(raw: PhqEvent, query: &SearchQuery) -> Option<Event> {
    let date = parse_date(&raw.start)?;
    let end_date = raw
        .end
        .as_deref()
        .and_then(parse_date)
        .filter(|end| *end > date);

    let venue = raw.entities.as_ref().and_then(|entities| {
        entities
            .iter()
            .find(|e| e.entity_type == "venue")
            .and_then(|e| e.name.clone())
    });

    let (category, subcategory) = map_category(&raw.category, raw.labels.as_deref());

    Some(Event {
        id: Uuid::new_v4(),
        title: raw.title,
        description: raw.description,
        date,
        end_date,
        city: query.city.clone().unwrap_or_default(),
        venue,
        category,
        subcategory,
        expected_attendees: raw.phq_attendance,
        source: EventSource::PredictHq,
        source_id: Some(raw.id),
        url: None,
        image_url: None,
    })
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    // PredictHQ sends either a date or a full timestamp
    NaiveDate::parse_from_str(&s[..s.len().min(10)], "%Y-%m-%d").ok()
}

/// PredictHQ category -> engine taxonomy
pub fn map_category(phq_category: &str, labels: Option<&[String]>) -> (String, Option<String>) {
    let subcategory = labels
        .and_then(|l| l.first())
        .map(|l| titlecase_label(l));

    let category = match phq_category {
        "concerts" | "festivals" => "Music",
        "performing-arts" => "Entertainment",
        "sports" => "Sports",
        "conferences" | "expos" => "Business & Professional",
        "community" => "Community",
        "food-drink" => "Food & Drink",
        _ => return ("Community".to_string(), subcategory),
    };

    (category.to_string(), subcategory)
}

/// Engine taxonomy -> PredictHQ category filter (best effort)
fn reverse_map_category(category: &str) -> Option<&'static str> {
    match category.trim().to_lowercase().as_str() {
        "music" => Some("concerts,festivals"),
        "entertainment" => Some("performing-arts"),
        "sports" => Some("sports"),
        "business & professional" | "technology" => Some("conferences,expos"),
        "food & drink" => Some("food-drink"),
        "community" => Some("community"),
        _ => None,
    }
}

fn titlecase_label(label: &str) -> String {
    label
        .split(&['-', '_', ' '][..])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
