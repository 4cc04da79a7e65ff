//! Ticketmaster Discovery API client
//!
//! Wire format stays inside this module: `normalize_event` maps the
//! Discovery payload into the shared `Event` shape. Strategy kinds map to
//! Discovery query parameters (city, keyword, geo radius, market id).

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::RateLimiter;
use crate::config::{StrategyConfig, StrategyKind};
use crate::types::{Event, EventSource, ProviderAdapter, ProviderError, SearchQuery};

const TICKETMASTER_BASE_URL: &str = "https://app.ticketmaster.com/discovery/v2/events.json";
const USER_AGENT: &str = "DateScout/0.1.0 (https://github.com/datescout/datescout)";
const RATE_LIMIT_MS: u64 = 200; // 5 requests per second

/// Discovery API envelope
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmResponse {
    #[serde(rename = "_embedded")]
    pub embedded: Option<TmEmbedded>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmEmbedded {
    pub events: Vec<TmEvent>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmEvent {
    pub id: String,
    pub name: String,
    pub info: Option<String>,
    pub url: Option<String>,
    pub dates: TmDates,
    pub classifications: Option<Vec<TmClassification>>,
    pub images: Option<Vec<TmImage>>,
    #[serde(rename = "_embedded")]
    pub embedded: Option<TmEventEmbedded>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmDates {
    pub start: TmDate,
    pub end: Option<TmDate>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmDate {
    #[serde(rename = "localDate")]
    pub local_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmClassification {
    pub segment: Option<TmNamed>,
    pub genre: Option<TmNamed>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmNamed {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmImage {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmEventEmbedded {
    pub venues: Option<Vec<TmVenue>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmVenue {
    pub name: Option<String>,
    pub city: Option<TmNamed>,
}

/// Ticketmaster API client
pub struct TicketmasterClient {
    http_client: reqwest::Client,
    api_key: Option<String>,
    rate_limiter: Arc<RateLimiter>,
    base_url: String,
}

impl TicketmasterClient {
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
            base_url: TICKETMASTER_BASE_URL.to_string(),
        })
    }

    /// Point the client at a test server
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
            ("size".to_string(), strategy.max_results.to_string()),
            (
                "startDateTime".to_string(),
                format!("{}T00:00:00Z", query.date_range.start),
            ),
            (
                "endDateTime".to_string(),
                format!("{}T23:59:59Z", query.date_range.end),
            ),
        ];

        match strategy.kind {
            StrategyKind::CitySearch => {
                params.push(("city".to_string(), query.city.clone()?));
            }
            StrategyKind::KeywordSearch => {
                let keyword = query
                    .keyword
                    .clone()
                    .or_else(|| query.category.clone())?;
                params.push(("keyword".to_string(), keyword));
                if let Some(city) = &query.city {
                    params.push(("city".to_string(), city.clone()));
                }
            }
            StrategyKind::RadiusSearch => {
                // Requires a radius from the query or the ladder rung
                let radius = query.radius_km.or(strategy.radius_km)?;
                params.push(("city".to_string(), query.city.clone()?));
                params.push(("radius".to_string(), (radius.round() as i64).to_string()));
                params.push(("unit".to_string(), "km".to_string()));
            }
            StrategyKind::MarketSearch => {
                let market = market_id_for_city(query.city.as_deref()?)?;
                params.push(("marketId".to_string(), market.to_string()));
            }
            _ => return None,
        }

        Some(params)
    }
}

#[async_trait]
impl ProviderAdapter for TicketmasterClient {
    fn source(&self) -> EventSource {
        EventSource::Ticketmaster
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

        let Some(mut params) = self.build_params(strategy, query) else {
            // Required inputs absent; the ladder falls through
            return Ok(Vec::new());
        };
        params.push(("apikey".to_string(), api_key.clone()));

        self.rate_limiter.wait().await;

        tracing::debug!(
            strategy = strategy.kind.as_str(),
            city = ?query.city,
            "Querying Ticketmaster Discovery API"
        );

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(status.as_u16(), error_text));
        }

        let body: TmResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let events: Vec<Event> = body
            .embedded
            .map(|e| e.events)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|raw| normalize_event(raw, query))
            .collect();

        tracing::debug!(
            strategy = strategy.kind.as_str(),
            count = events.len(),
            "Ticketmaster search complete"
        );

        Ok(events)
    }
}

/// Map one Discovery event into the normalized shape.
///
/// Events without a parseable start date are dropped; everything else is
/// carried through with the query city as fallback.
pub fn normalize_event(raw: TmEvent, query: &SearchQuery) -> Option<Event> {
    let date = raw
        .dates
        .start
        .local_date
        .as_deref()
        .and_then(parse_date)?;
    let end_date = raw
        .dates
        .end
        .as_ref()
        .and_then(|d| d.local_date.as_deref())
        .and_then(parse_date)
        .filter(|end| *end > date);

    let (venue, venue_city) = raw
        .embedded
        .as_ref()
        .and_then(|e| e.venues.as_ref())
        .and_then(|v| v.first())
        .map(|v| (v.name.clone(), v.city.as_ref().map(|c| c.name.clone())))
        .unwrap_or((None, None));

    let city = venue_city
        .or_else(|| query.city.clone())
        .unwrap_or_default();

    let classification = raw.classifications.as_ref().and_then(|c| c.first());
    let category = classification
        .and_then(|c| c.segment.as_ref())
        .map(|s| s.name.clone())
        .unwrap_or_else(|| "Entertainment".to_string());
    let subcategory = classification.and_then(|c| c.genre.as_ref()).map(|g| g.name.clone());

    Some(Event {
        id: Uuid::new_v4(),
        title: raw.name,
        description: raw.info,
        date,
        end_date,
        city,
        venue,
        category,
        subcategory,
        expected_attendees: None,
        source: EventSource::Ticketmaster,
        source_id: Some(raw.id),
        url: raw.url,
        image_url: raw.images.and_then(|imgs| imgs.into_iter().next()).map(|i| i.url),
    })
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Static city -> Discovery market id table for the market strategy
fn market_id_for_city(city: &str) -> Option<u32> {
    match city.trim().to_lowercase().as_str() {
        "new york" | "new york city" => Some(35),
        "los angeles" => Some(27),
        "chicago" => Some(7),
        "san francisco" | "san francisco bay area" => Some(41),
        "austin" => Some(36),
        "boston" => Some(5),
        "seattle" => Some(42),
        "denver" => Some(10),
        "atlanta" => Some(1),
        "miami" => Some(15),
        _ => None,
    }
}
