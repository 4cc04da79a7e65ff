//! Shared fixtures for integration tests

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use dscout_engine::aggregator::SourceAggregator;
use dscout_engine::cache::MemoryCache;
use dscout_engine::classifier::ConflictClassifier;
use dscout_engine::config::{AggregatorConfig, EngineConfig, StrategyConfig, StrategyKind};
use dscout_engine::dedup::Deduplicator;
use dscout_engine::analysis::DateAnalyzer;
use dscout_engine::seasonality::{
    HolidayConflictDetector, SeasonalityEngine, StaticHolidayCalendar,
};
use dscout_engine::types::{
    Event, EventSource, ProviderAdapter, ProviderError, SearchQuery,
};

/// Scripted provider behavior for one test
pub enum FakeBehavior {
    Events(Vec<Event>),
    Error,
    Hang,
}

/// Provider double returning the same scripted behavior for every rung
pub struct FakeProvider {
    pub source: EventSource,
    pub behavior: FakeBehavior,
}

impl FakeProvider {
    pub fn returning(source: EventSource, events: Vec<Event>) -> Arc<dyn ProviderAdapter> {
        Arc::new(Self {
            source,
            behavior: FakeBehavior::Events(events),
        })
    }

    pub fn hanging(source: EventSource) -> Arc<dyn ProviderAdapter> {
        Arc::new(Self {
            source,
            behavior: FakeBehavior::Hang,
        })
    }

    pub fn failing(source: EventSource) -> Arc<dyn ProviderAdapter> {
        Arc::new(Self {
            source,
            behavior: FakeBehavior::Error,
        })
    }
}

#[async_trait]
impl ProviderAdapter for FakeProvider {
    fn source(&self) -> EventSource {
        self.source
    }

    fn available(&self) -> bool {
        true
    }

    async fn search(
        &self,
        _strategy: &StrategyConfig,
        _query: &SearchQuery,
    ) -> Result<Vec<Event>, ProviderError> {
        match &self.behavior {
            FakeBehavior::Events(events) => Ok(events.clone()),
            FakeBehavior::Error => Err(ProviderError::Api(500, "scripted failure".to_string())),
            FakeBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Vec::new())
            }
        }
    }
}

/// Event builder with sensible defaults for test scenarios
pub struct EventBuilder {
    event: Event,
}

impl EventBuilder {
    pub fn new(title: &str, date: NaiveDate) -> Self {
        Self {
            event: Event {
                id: Uuid::new_v4(),
                title: title.to_string(),
                description: None,
                date,
                end_date: None,
                city: "Austin".to_string(),
                venue: None,
                category: "Entertainment".to_string(),
                subcategory: None,
                expected_attendees: None,
                source: EventSource::Ticketmaster,
                source_id: Some(format!("tm-{}", title.to_lowercase().replace(' ', "-"))),
                url: None,
                image_url: None,
            },
        }
    }

    pub fn category(mut self, category: &str, subcategory: Option<&str>) -> Self {
        self.event.category = category.to_string();
        self.event.subcategory = subcategory.map(str::to_string);
        self
    }

    pub fn venue(mut self, venue: &str) -> Self {
        self.event.venue = Some(venue.to_string());
        self
    }

    pub fn source(mut self, source: EventSource, source_id: &str) -> Self {
        self.event.source = source;
        self.event.source_id = Some(source_id.to_string());
        self
    }

    pub fn spanning(mut self, end: NaiveDate) -> Self {
        self.event.end_date = Some(end);
        self
    }

    pub fn attendees(mut self, n: u32) -> Self {
        self.event.expected_attendees = Some(n);
        self
    }

    pub fn build(self) -> Event {
        self.event
    }
}

/// One-rung ladders with a short timeout, suitable for fakes
pub fn test_aggregator_config(timeout_ms: u64) -> AggregatorConfig {
    let rung = |kind| StrategyConfig {
        timeout_ms,
        ..StrategyConfig::new(kind)
    };
    AggregatorConfig {
        early_return_threshold: 50,
        max_concurrent_strategies: 3,
        global_fanout_cap: 8,
        ticketmaster_ladder: vec![rung(StrategyKind::CitySearch)],
        predicthq_ladder: vec![rung(StrategyKind::CategorySearch)],
        scraper_ladder: vec![rung(StrategyKind::CityScrape)],
    }
}

/// Full pipeline over fakes: memory cache, static holiday calendar, no
/// AI matcher.
pub fn build_test_analyzer(providers: Vec<Arc<dyn ProviderAdapter>>) -> DateAnalyzer {
    let config = EngineConfig::default();
    let cache = Arc::new(MemoryCache::new());

    DateAnalyzer::new(
        SourceAggregator::new(providers, test_aggregator_config(500)),
        Deduplicator::new(config.dedup.clone()),
        ConflictClassifier::new(cache.clone(), None),
        SeasonalityEngine::new(cache.clone()),
        HolidayConflictDetector::new(Arc::new(StaticHolidayCalendar::new()), cache),
        &config,
    )
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
