//! Multi-source event aggregation
//!
//! Each provider runs an ordered ladder of search strategies. Several
//! strategies may be in flight at once (bounded by a per-provider
//! semaphore) but results are folded in declared ladder order, so the
//! early-return decision and the final event list are deterministic for
//! fixed provider responses. Providers run concurrently with no
//! cross-provider coordination.
//!
//! A provider failure of any kind (missing credentials, HTTP error,
//! timeout) contributes zero events and one diagnostics record. Only an
//! invalid query fails aggregation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::config::{AggregatorConfig, StrategyConfig, StrategyKind};
use crate::error::EngineError;
use crate::types::{
    Event, ProviderAdapter, ProviderDiagnostics, ProviderError, SearchQuery, StrategyOutcome,
};

/// Raw aggregation output: per-provider events concatenated, pre-dedup
#[derive(Debug, Default)]
pub struct AggregationResult {
    pub events: Vec<Event>,
    pub diagnostics: Vec<ProviderDiagnostics>,
}

impl AggregationResult {
    /// Providers that contributed nothing because they were unavailable
    pub fn unavailable_providers(&self) -> Vec<String> {
        self.diagnostics
            .iter()
            .filter(|d| d.outcome == StrategyOutcome::Unavailable)
            .map(|d| d.provider.to_string())
            .collect()
    }
}

/// Strategy ladder runner over the configured provider set
pub struct SourceAggregator {
    providers: Vec<Arc<dyn ProviderAdapter>>,
    config: AggregatorConfig,
}

enum LadderEntry {
    /// Not spawned: disabled or required input absent
    Skipped(StrategyConfig, &'static str),
    Running(StrategyConfig, JoinHandle<(Result<Result<Vec<Event>, ProviderError>, tokio::time::error::Elapsed>, u64)>),
}

impl SourceAggregator {
    pub fn new(providers: Vec<Arc<dyn ProviderAdapter>>, config: AggregatorConfig) -> Self {
        Self { providers, config }
    }

    /// Run every provider's ladder and concatenate the raw results.
    ///
    /// Fails only on an invalid query; every downstream failure is
    /// recorded in diagnostics and recovered as an empty contribution.
    pub async fn aggregate(&self, query: &SearchQuery) -> Result<AggregationResult, EngineError> {
        if !query.has_identifying_parameter() {
            return Err(EngineError::InvalidQuery(
                "at least one of city or keyword is required".to_string(),
            ));
        }

        // Global fan-out cap across providers, on top of each provider's
        // own concurrency bound
        let global = Arc::new(Semaphore::new(self.config.global_fanout_cap.max(1)));

        let runs = self
            .providers
            .iter()
            .map(|provider| self.run_provider(provider.clone(), query, global.clone()));
        let per_provider = futures::future::join_all(runs).await;

        let mut result = AggregationResult::default();
        for (events, diagnostics) in per_provider {
            result.events.extend(events);
            result.diagnostics.extend(diagnostics);
        }

        tracing::info!(
            events = result.events.len(),
            providers = self.providers.len(),
            "Aggregation complete"
        );

        Ok(result)
    }

    /// Execute one provider's ladder.
    ///
    /// Strategies spawn in declared order behind the concurrency
    /// semaphore; folding also walks declared order, accumulating a
    /// running distinct-event count. Once the count reaches the
    /// early-return threshold, strategies later in the ladder are
    /// cancelled and recorded as skipped.
    async fn run_provider(
        &self,
        provider: Arc<dyn ProviderAdapter>,
        query: &SearchQuery,
        global: Arc<Semaphore>,
    ) -> (Vec<Event>, Vec<ProviderDiagnostics>) {
        let source = provider.source();
        let ladder = self.config.ladder_for(source);

        if !provider.available() {
            tracing::warn!(provider = %source, "Provider unavailable (no credentials)");
            return (
                Vec::new(),
                vec![ProviderDiagnostics {
                    provider: source,
                    strategy: "*".to_string(),
                    outcome: StrategyOutcome::Unavailable,
                    events_found: 0,
                    elapsed_ms: 0,
                    detail: Some("missing credentials".to_string()),
                }],
            );
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_strategies.max(1)));
        let mut entries = Vec::with_capacity(ladder.len());

        for strategy in ladder {
            if !strategy.enabled {
                entries.push(LadderEntry::Skipped(strategy.clone(), "disabled"));
                continue;
            }
            if !required_inputs_present(strategy, query) {
                entries.push(LadderEntry::Skipped(strategy.clone(), "required input absent"));
                continue;
            }

            let semaphore = semaphore.clone();
            let global = global.clone();
            let provider = provider.clone();
            let strategy_owned = strategy.clone();
            let query = query.clone();

            let handle = tokio::spawn(async move {
                let _provider_permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("aggregator semaphore closed");
                let _global_permit = global
                    .acquire_owned()
                    .await
                    .expect("aggregator fan-out semaphore closed");
                let start = Instant::now();
                let outcome = tokio::time::timeout(
                    Duration::from_millis(strategy_owned.timeout_ms),
                    provider.search(&strategy_owned, &query),
                )
                .await;
                (outcome, start.elapsed().as_millis() as u64)
            });

            entries.push(LadderEntry::Running(strategy.clone(), handle));
        }

        let mut distinct: HashSet<String> = HashSet::new();
        let mut events = Vec::new();
        let mut diagnostics = Vec::new();
        let mut early_returned = false;

        for entry in entries {
            match entry {
                LadderEntry::Skipped(strategy, reason) => {
                    diagnostics.push(ProviderDiagnostics {
                        provider: source,
                        strategy: strategy.kind.as_str().to_string(),
                        outcome: StrategyOutcome::Skipped,
                        events_found: 0,
                        elapsed_ms: 0,
                        detail: Some(reason.to_string()),
                    });
                }
                LadderEntry::Running(strategy, handle) => {
                    let strategy_name = strategy.kind.as_str().to_string();

                    if early_returned {
                        handle.abort();
                        diagnostics.push(ProviderDiagnostics {
                            provider: source,
                            strategy: strategy_name,
                            outcome: StrategyOutcome::Skipped,
                            events_found: 0,
                            elapsed_ms: 0,
                            detail: Some("early return".to_string()),
                        });
                        continue;
                    }

                    match handle.await {
                        Ok((Ok(Ok(found)), elapsed_ms)) => {
                            let mut fresh = 0usize;
                            for event in &found {
                                if distinct.insert(event.distinct_key()) {
                                    fresh += 1;
                                }
                            }
                            tracing::debug!(
                                provider = %source,
                                strategy = %strategy_name,
                                found = found.len(),
                                fresh,
                                "Strategy complete"
                            );
                            diagnostics.push(ProviderDiagnostics {
                                provider: source,
                                strategy: strategy_name,
                                outcome: StrategyOutcome::Completed,
                                events_found: found.len(),
                                elapsed_ms,
                                detail: None,
                            });
                            events.extend(found);

                            if distinct.len() >= self.config.early_return_threshold {
                                tracing::debug!(
                                    provider = %source,
                                    distinct = distinct.len(),
                                    "Early return threshold reached"
                                );
                                early_returned = true;
                            }
                        }
                        Ok((Ok(Err(err)), elapsed_ms)) => {
                            let outcome = match err {
                                ProviderError::MissingCredentials => StrategyOutcome::Unavailable,
                                _ => StrategyOutcome::Failed,
                            };
                            let recovered = EngineError::ProviderUnavailable {
                                provider: source,
                                reason: err.to_string(),
                            };
                            tracing::warn!(
                                strategy = %strategy_name,
                                error = %recovered,
                                "Strategy failed; contributing no events"
                            );
                            diagnostics.push(ProviderDiagnostics {
                                provider: source,
                                strategy: strategy_name,
                                outcome,
                                events_found: 0,
                                elapsed_ms,
                                detail: Some(err.to_string()),
                            });
                        }
                        Ok((Err(_elapsed), elapsed_ms)) => {
                            tracing::warn!(
                                provider = %source,
                                strategy = %strategy_name,
                                timeout_ms = strategy.timeout_ms,
                                "Strategy timed out; contributing no events"
                            );
                            diagnostics.push(ProviderDiagnostics {
                                provider: source,
                                strategy: strategy_name,
                                outcome: StrategyOutcome::TimedOut,
                                events_found: 0,
                                elapsed_ms,
                                detail: Some(format!("timeout after {}ms", strategy.timeout_ms)),
                            });
                        }
                        Err(join_err) => {
                            diagnostics.push(ProviderDiagnostics {
                                provider: source,
                                strategy: strategy_name,
                                outcome: StrategyOutcome::Failed,
                                events_found: 0,
                                elapsed_ms: 0,
                                detail: Some(format!("task error: {}", join_err)),
                            });
                        }
                    }
                }
            }
        }

        (events, diagnostics)
    }
}

/// Whether a strategy's required query inputs are present.
///
/// A missing input is a fallthrough, not a failure: the ladder simply
/// moves on to the next rung.
fn required_inputs_present(strategy: &StrategyConfig, query: &SearchQuery) -> bool {
    match strategy.kind {
        StrategyKind::RadiusSearch => {
            query.radius_km.or(strategy.radius_km).is_some() && query.city.is_some()
        }
        StrategyKind::KeywordSearch => query.keyword.is_some() || query.category.is_some(),
        StrategyKind::CitySearch
        | StrategyKind::MarketSearch
        | StrategyKind::CategorySearch
        | StrategyKind::RankedSearch
        | StrategyKind::CityScrape => query.city.is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventSource;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use dscout_common::dates::DateRange;
    use uuid::Uuid;

    /// Scripted provider: one canned response (or failure) per ladder rung
    struct FakeProvider {
        source: EventSource,
        available: bool,
        responses: Vec<FakeResponse>,
    }

    #[derive(Clone)]
    enum FakeResponse {
        Events(usize),
        Error,
        Hang,
    }

    impl FakeProvider {
        fn events(source: EventSource, counts: Vec<FakeResponse>) -> Arc<dyn ProviderAdapter> {
            Arc::new(Self {
                source,
                available: true,
                responses: counts,
            })
        }

        fn unavailable(source: EventSource) -> Arc<dyn ProviderAdapter> {
            Arc::new(Self {
                source,
                available: false,
                responses: vec![],
            })
        }
    }

    fn make_events(count: usize, tag: &str) -> Vec<Event> {
        (0..count)
            .map(|i| Event {
                id: Uuid::new_v4(),
                title: format!("{} event {}", tag, i),
                description: None,
                date: NaiveDate::from_ymd_opt(2026, 6, 20).unwrap(),
                end_date: None,
                city: "Austin".to_string(),
                venue: None,
                category: "Music".to_string(),
                subcategory: None,
                expected_attendees: None,
                source: EventSource::Ticketmaster,
                source_id: Some(format!("{}-{}", tag, i)),
                url: None,
                image_url: None,
            })
            .collect()
    }

    #[async_trait]
    impl ProviderAdapter for FakeProvider {
        fn source(&self) -> EventSource {
            self.source
        }

        fn available(&self) -> bool {
            self.available
        }

        async fn search(
            &self,
            strategy: &StrategyConfig,
            _query: &SearchQuery,
        ) -> Result<Vec<Event>, ProviderError> {
            // Rung index recovered from max_results, set per-rung in tests
            let idx = (strategy.max_results as usize).min(self.responses.len().saturating_sub(1));
            match &self.responses[idx] {
                FakeResponse::Events(n) => Ok(make_events(*n, strategy.kind.as_str())),
                FakeResponse::Error => Err(ProviderError::Api(500, "boom".to_string())),
                FakeResponse::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(Vec::new())
                }
            }
        }
    }

    fn query() -> SearchQuery {
        SearchQuery {
            city: Some("Austin".to_string()),
            keyword: None,
            category: Some("Music".to_string()),
            date_range: DateRange::new(
                NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
                NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
            ),
            radius_km: None,
        }
    }

    /// Ladder where rung N reports max_results = N, letting the fake
    /// provider select its scripted response per rung.
    fn indexed_ladder(kinds: &[StrategyKind], timeout_ms: u64) -> Vec<StrategyConfig> {
        kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| StrategyConfig {
                timeout_ms,
                max_results: i as u32,
                ..StrategyConfig::new(*kind)
            })
            .collect()
    }

    fn config_with_tm_ladder(ladder: Vec<StrategyConfig>, threshold: usize) -> AggregatorConfig {
        AggregatorConfig {
            early_return_threshold: threshold,
            max_concurrent_strategies: 2,
            global_fanout_cap: 8,
            ticketmaster_ladder: ladder,
            predicthq_ladder: vec![],
            scraper_ladder: vec![],
        }
    }

    #[tokio::test]
    async fn invalid_query_is_rejected() {
        let aggregator = SourceAggregator::new(vec![], AggregatorConfig::default());
        let mut q = query();
        q.city = None;
        let err = aggregator.aggregate(&q).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn results_concatenate_across_strategies() {
        let provider = FakeProvider::events(
            EventSource::Ticketmaster,
            vec![FakeResponse::Events(3), FakeResponse::Events(2)],
        );
        let config = config_with_tm_ladder(
            indexed_ladder(&[StrategyKind::CitySearch, StrategyKind::KeywordSearch], 5_000),
            50,
        );
        let aggregator = SourceAggregator::new(vec![provider], config);

        let result = aggregator.aggregate(&query()).await.unwrap();
        assert_eq!(result.events.len(), 5);
        assert!(result
            .diagnostics
            .iter()
            .all(|d| d.outcome == StrategyOutcome::Completed));
    }

    #[tokio::test]
    async fn early_return_skips_remaining_strategies() {
        let provider = FakeProvider::events(
            EventSource::Ticketmaster,
            vec![
                FakeResponse::Events(10),
                FakeResponse::Events(10),
                FakeResponse::Events(10),
            ],
        );
        let config = config_with_tm_ladder(
            indexed_ladder(
                &[
                    StrategyKind::CitySearch,
                    StrategyKind::KeywordSearch,
                    StrategyKind::MarketSearch,
                ],
                5_000,
            ),
            10,
        );
        let aggregator = SourceAggregator::new(vec![provider], config);

        let result = aggregator.aggregate(&query()).await.unwrap();
        // First rung alone satisfies the threshold
        assert_eq!(result.events.len(), 10);

        let skipped: Vec<_> = result
            .diagnostics
            .iter()
            .filter(|d| d.outcome == StrategyOutcome::Skipped)
            .collect();
        assert_eq!(skipped.len(), 2);
        assert!(skipped
            .iter()
            .all(|d| d.detail.as_deref() == Some("early return")));
    }

    #[tokio::test]
    async fn provider_error_degrades_to_empty_contribution() {
        let provider = FakeProvider::events(
            EventSource::Ticketmaster,
            vec![FakeResponse::Error, FakeResponse::Events(4)],
        );
        let config = config_with_tm_ladder(
            indexed_ladder(&[StrategyKind::CitySearch, StrategyKind::KeywordSearch], 5_000),
            50,
        );
        let aggregator = SourceAggregator::new(vec![provider], config);

        let result = aggregator.aggregate(&query()).await.unwrap();
        assert_eq!(result.events.len(), 4);
        assert_eq!(result.diagnostics[0].outcome, StrategyOutcome::Failed);
        assert_eq!(result.diagnostics[1].outcome, StrategyOutcome::Completed);
    }

    #[tokio::test]
    async fn timeout_degrades_to_empty_contribution() {
        let provider = FakeProvider::events(
            EventSource::Ticketmaster,
            vec![FakeResponse::Hang, FakeResponse::Events(2)],
        );
        let config = config_with_tm_ladder(
            indexed_ladder(&[StrategyKind::CitySearch, StrategyKind::KeywordSearch], 100),
            50,
        );
        let aggregator = SourceAggregator::new(vec![provider], config);

        let result = aggregator.aggregate(&query()).await.unwrap();
        assert_eq!(result.events.len(), 2);
        assert_eq!(result.diagnostics[0].outcome, StrategyOutcome::TimedOut);
    }

    #[tokio::test]
    async fn unavailable_provider_is_recorded_not_raised() {
        let providers = vec![
            FakeProvider::unavailable(EventSource::PredictHq),
            FakeProvider::events(EventSource::Ticketmaster, vec![FakeResponse::Events(1)]),
        ];
        let mut config = config_with_tm_ladder(
            indexed_ladder(&[StrategyKind::CitySearch], 5_000),
            50,
        );
        config.predicthq_ladder = indexed_ladder(&[StrategyKind::CategorySearch], 5_000);
        let aggregator = SourceAggregator::new(providers, config);

        let result = aggregator.aggregate(&query()).await.unwrap();
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.unavailable_providers(), vec!["predicthq".to_string()]);
    }

    #[tokio::test]
    async fn disabled_and_inputless_strategies_are_skipped() {
        let provider = FakeProvider::events(
            EventSource::Ticketmaster,
            vec![FakeResponse::Events(2), FakeResponse::Events(2), FakeResponse::Events(2)],
        );
        let mut ladder = indexed_ladder(
            &[
                StrategyKind::CitySearch,
                StrategyKind::KeywordSearch,
                StrategyKind::RadiusSearch,
            ],
            5_000,
        );
        ladder[1].enabled = false;
        // RadiusSearch has no radius anywhere: required input absent
        let config = config_with_tm_ladder(ladder, 50);
        let aggregator = SourceAggregator::new(vec![provider], config);

        let result = aggregator.aggregate(&query()).await.unwrap();
        assert_eq!(result.events.len(), 2);

        let outcomes: Vec<_> = result.diagnostics.iter().map(|d| d.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                StrategyOutcome::Completed,
                StrategyOutcome::Skipped,
                StrategyOutcome::Skipped,
            ]
        );
        assert_eq!(
            result.diagnostics[2].detail.as_deref(),
            Some("required input absent")
        );
    }

    #[tokio::test]
    async fn fold_order_is_declared_order() {
        let provider = FakeProvider::events(
            EventSource::Ticketmaster,
            vec![FakeResponse::Events(1), FakeResponse::Events(1)],
        );
        let config = config_with_tm_ladder(
            indexed_ladder(&[StrategyKind::CitySearch, StrategyKind::KeywordSearch], 5_000),
            50,
        );
        let aggregator = SourceAggregator::new(vec![provider], config);

        let result = aggregator.aggregate(&query()).await.unwrap();
        assert_eq!(result.diagnostics[0].strategy, "city_search");
        assert_eq!(result.diagnostics[1].strategy, "keyword_search");
    }
}
