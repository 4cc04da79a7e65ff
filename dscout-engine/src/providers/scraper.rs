//! Firecrawl-backed city event scraper
//!
//! Fallback source for cities where the structured providers have thin
//! coverage. Firecrawl extracts a structured event list from city listing
//! pages; the extraction schema mirrors the normalized `Event` shape so
//! the mapping here stays mechanical.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::RateLimiter;
use crate::config::{StrategyConfig, StrategyKind};
use crate::types::{Event, EventSource, ProviderAdapter, ProviderError, SearchQuery};

const FIRECRAWL_BASE_URL: &str = "https://api.firecrawl.dev/v1/extract";
const USER_AGENT: &str = "DateScout/0.1.0 (https://github.com/datescout/datescout)";
const RATE_LIMIT_MS: u64 = 1_000;

/// Firecrawl extract response envelope
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScrapeResponse {
    pub success: bool,
    pub data: Option<ScrapeData>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScrapeData {
    pub events: Vec<ScrapedEvent>,
}

/// One event extracted from a listing page
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScrapedEvent {
    pub title: String,
    pub description: Option<String>,
    pub date: String,
    pub end_date: Option<String>,
    pub venue: Option<String>,
    pub category: Option<String>,
    pub url: Option<String>,
}

/// City listing scraper backed by Firecrawl
pub struct CityEventScraper {
    http_client: reqwest::Client,
    api_key: Option<String>,
    rate_limiter: Arc<RateLimiter>,
    base_url: String,
}

impl CityEventScraper {
    pub fn new(api_key: Option<String>) -> dscout_common::Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(45))
            .build()
            .map_err(|e| dscout_common::Error::Internal(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
            base_url: FIRECRAWL_BASE_URL.to_string(),
        })
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

#[async_trait]
impl ProviderAdapter for CityEventScraper {
    fn source(&self) -> EventSource {
        EventSource::CityScraper
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

        if strategy.kind != StrategyKind::CityScrape {
            return Ok(Vec::new());
        }
        let Some(city) = query.city.clone() else {
            return Ok(Vec::new());
        };

        self.rate_limiter.wait().await;

        let prompt = format!(
            "List public events in {} between {} and {} with title, description, \
             date, end_date, venue, category and url.",
            city, query.date_range.start, query.date_range.end
        );

        tracing::debug!(city = %city, "Scraping city event listings via Firecrawl");

        let response = self
            .http_client
            .post(&self.base_url)
            .bearer_auth(api_key)
            .json(&serde_json::json!({
                "urls": [format!("https://www.eventbrite.com/d/{}/events/", city.to_lowercase().replace(' ', "-"))],
                "prompt": prompt,
            }))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(status.as_u16(), error_text));
        }

        let body: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        if !body.success {
            return Err(ProviderError::Api(200, "extraction unsuccessful".to_string()));
        }

        let events: Vec<Event> = body
            .data
            .map(|d| d.events)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|raw| normalize_event(raw, &city))
            .filter(|e| query.date_range.contains(e.date))
            .collect();

        tracing::debug!(city = %city, count = events.len(), "City scrape complete");

        Ok(events)
    }
}

/// Map one scraped record into the normalized shape.
///
/// Scraped data is the least trusted input: unparseable dates drop the
/// record, categories default to Community, and no attendance estimate is
/// invented.
pub fn normalize_event(raw: ScrapedEvent, city: &str) -> Option<Event> {
    let date = parse_date(&raw.date)?;
    let end_date = raw
        .end_date
        .as_deref()
        .and_then(parse_date)
        .filter(|end| *end > date);

    Some(Event {
        id: Uuid::new_v4(),
        title: raw.title,
        description: raw.description,
        date,
        end_date,
        city: city.to_string(),
        venue: raw.venue,
        category: raw.category.unwrap_or_else(|| "Community".to_string()),
        subcategory: None,
        expected_attendees: None,
        source: EventSource::CityScraper,
        source_id: None,
        url: raw.url,
        image_url: None,
    })
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}
