//! Category/subcategory conflict classification
//!
//! Resolution ladder, short-circuiting at the first answer:
//! 1. Exact category and subcategory match: fixed maximum weight, no
//!    cache or AI consulted.
//! 2. Exact category match: fixed moderate weight.
//! 3. Static relationship table (both categories known).
//! 4. AI-assisted semantic match, cached by the unordered category pair.
//!
//! Classification never fails: a broken cache falls back to the AI call,
//! a broken AI call falls back to zero weight with the failure noted in
//! the reasoning. The ladder never blends table and AI answers; the AI
//! runs only when the table has no entry.

pub mod ai_matcher;
pub mod rules;

pub use ai_matcher::OpenAiCategoryMatcher;

use std::sync::Arc;

use crate::cache::{cache_key, CacheStore, CacheTable};
use crate::error::EngineError;
use crate::types::{
    CategoryConflictWeight, CategoryMatchProvider, Event, MatchMethod,
};

/// Weight for an exact category + subcategory match (0-20 scale)
pub const EXACT_MATCH_WEIGHT: f64 = 15.0;
/// Weight for an exact category match with differing subcategories
pub const SAME_CATEGORY_WEIGHT: f64 = 8.0;
/// Ceiling for AI-derived weights; scaled by the model's confidence
const AI_MATCH_WEIGHT: f64 = 8.0;

/// Conflict classifier with injected cache and optional AI matcher
pub struct ConflictClassifier {
    cache: Arc<dyn CacheStore>,
    matcher: Option<Arc<dyn CategoryMatchProvider>>,
}

impl ConflictClassifier {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        matcher: Option<Arc<dyn CategoryMatchProvider>>,
    ) -> Self {
        Self { cache, matcher }
    }

    /// Weight a competing event against the planned category/subcategory.
    ///
    /// Always returns a weight; every failure path degrades with a
    /// reasoning note.
    pub async fn classify(
        &self,
        planned_category: &str,
        planned_subcategory: Option<&str>,
        event: &Event,
    ) -> CategoryConflictWeight {
        let event_category = event.category.as_str();
        let event_subcategory = event.subcategory.as_deref();

        // Rung 1: exact pair. Never consults cache or AI.
        if eq_ignore_case(planned_category, event_category)
            && subcategories_match(planned_subcategory, event_subcategory)
        {
            return CategoryConflictWeight {
                weight: EXACT_MATCH_WEIGHT,
                confidence: 1.0,
                method: MatchMethod::Exact,
                reasoning: vec![format!(
                    "Exact category and subcategory match: {} / {}",
                    event_category,
                    event_subcategory.unwrap_or("-")
                )],
            };
        }

        // Rung 2: same category, different subcategory
        if eq_ignore_case(planned_category, event_category) {
            return CategoryConflictWeight {
                weight: SAME_CATEGORY_WEIGHT,
                confidence: 0.9,
                method: MatchMethod::Exact,
                reasoning: vec![format!("Same category: {}", event_category)],
            };
        }

        // Rung 3: static relationship table
        if let Some(rel) = rules::relationship(planned_category, event_category) {
            return CategoryConflictWeight {
                weight: rel.weight(),
                confidence: 0.8,
                method: MatchMethod::Rule,
                reasoning: vec![format!(
                    "Static relationship {} <-> {}: {:?}",
                    planned_category, event_category, rel
                )],
            };
        }

        // Rung 4: AI-assisted semantic match, cached by unordered pair
        self.classify_via_ai(
            planned_category,
            planned_subcategory,
            event_category,
            event_subcategory,
            event,
        )
        .await
    }

    async fn classify_via_ai(
        &self,
        planned_category: &str,
        planned_subcategory: Option<&str>,
        event_category: &str,
        event_subcategory: Option<&str>,
        event: &Event,
    ) -> CategoryConflictWeight {
        let key = pair_cache_key(
            planned_category,
            planned_subcategory,
            event_category,
            event_subcategory,
        );

        // Cache hit short-circuits the AI call entirely; a cache error
        // only costs the short-circuit.
        match self.cache.get(CacheTable::ConflictWeights, &key).await {
            Ok(Some(value)) => match serde_json::from_value::<CategoryConflictWeight>(value) {
                Ok(cached) => {
                    tracing::debug!(
                        planned = %planned_category,
                        event = %event_category,
                        "Conflict weight cache hit"
                    );
                    return cached;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Corrupt conflict weight cache entry; recomputing");
                }
            },
            Ok(None) => {}
            Err(e) => {
                let recovered = EngineError::CacheUnavailable(e.to_string());
                tracing::warn!(error = %recovered, "Computing conflict weight directly");
            }
        }

        let result = match &self.matcher {
            Some(matcher) => {
                match matcher
                    .match_category(
                        event_category,
                        planned_category,
                        Some(event.title.as_str()),
                        event.description.as_deref(),
                    )
                    .await
                {
                    Ok(matched) => {
                        let weight = if matched.is_match {
                            AI_MATCH_WEIGHT * matched.confidence.clamp(0.0, 1.0)
                        } else {
                            0.0
                        };
                        CategoryConflictWeight {
                            weight,
                            confidence: matched.confidence.clamp(0.0, 1.0),
                            method: MatchMethod::Ai,
                            reasoning: vec![matched.reasoning],
                        }
                    }
                    Err(e) => {
                        let recovered = EngineError::ClassificationFailure(e.to_string());
                        tracing::warn!(
                            planned = %planned_category,
                            event = %event_category,
                            error = %recovered,
                            "Defaulting to zero conflict weight"
                        );
                        CategoryConflictWeight {
                            weight: 0.0,
                            confidence: 0.1,
                            method: MatchMethod::Rule,
                            reasoning: vec![format!("AI match unavailable: {}", e)],
                        }
                    }
                }
            }
            None => CategoryConflictWeight {
                weight: 0.0,
                confidence: 0.1,
                method: MatchMethod::Rule,
                reasoning: vec![format!(
                    "No relationship data for {} <-> {} and no AI matcher configured",
                    planned_category, event_category
                )],
            },
        };

        // Only genuine AI answers are worth remembering
        if result.method == MatchMethod::Ai {
            if let Ok(value) = serde_json::to_value(&result) {
                if let Err(e) = self.cache.put(CacheTable::ConflictWeights, &key, value).await {
                    tracing::warn!(error = %e, "Conflict weight cache write failed");
                }
            }
        }

        result
    }
}

/// Cache key for the unordered (category+subcategory) pair
fn pair_cache_key(
    category_a: &str,
    subcategory_a: Option<&str>,
    category_b: &str,
    subcategory_b: Option<&str>,
) -> String {
    let mut sides = [
        format!("{}/{}", category_a.trim().to_lowercase(), subcategory_a.unwrap_or("").trim().to_lowercase()),
        format!("{}/{}", category_b.trim().to_lowercase(), subcategory_b.unwrap_or("").trim().to_lowercase()),
    ];
    sides.sort();
    cache_key(&[&sides[0], &sides[1]])
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Exact subcategory match requires both sides to name one
fn subcategories_match(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => eq_ignore_case(a, b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::types::{CategoryMatch, EventSource, MatchError};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct FakeMatcher {
        calls: AtomicUsize,
        response: Result<CategoryMatch, ()>,
    }

    impl FakeMatcher {
        fn matching(confidence: f64) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                response: Ok(CategoryMatch {
                    is_match: true,
                    confidence,
                    reasoning: "semantically equivalent".to_string(),
                }),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                response: Err(()),
            })
        }
    }

    #[async_trait]
    impl CategoryMatchProvider for FakeMatcher {
        async fn match_category(
            &self,
            _event_category: &str,
            _target_category: &str,
            _title: Option<&str>,
            _description: Option<&str>,
        ) -> Result<CategoryMatch, MatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Ok(m) => Ok(m.clone()),
                Err(()) => Err(MatchError::Parse("not json".to_string())),
            }
        }
    }

    fn event(category: &str, subcategory: Option<&str>) -> Event {
        Event {
            id: Uuid::new_v4(),
            title: "Competing Event".to_string(),
            description: None,
            date: NaiveDate::from_ymd_opt(2026, 6, 20).unwrap(),
            end_date: None,
            city: "Austin".to_string(),
            venue: None,
            category: category.to_string(),
            subcategory: subcategory.map(str::to_string),
            expected_attendees: None,
            source: EventSource::Ticketmaster,
            source_id: None,
            url: None,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn exact_pair_scores_maximum_without_cache_or_ai() {
        // A failing cache and a failing matcher prove neither is consulted
        let classifier = ConflictClassifier::new(
            Arc::new(MemoryCache::failing()),
            Some(FakeMatcher::failing()),
        );

        let weight = classifier
            .classify("Entertainment", Some("Theater"), &event("Entertainment", Some("Theater")))
            .await;

        assert_eq!(weight.weight, EXACT_MATCH_WEIGHT);
        assert_eq!(weight.method, MatchMethod::Exact);
        assert_eq!(weight.confidence, 1.0);
    }

    #[tokio::test]
    async fn exact_pair_is_case_insensitive() {
        let classifier = ConflictClassifier::new(Arc::new(MemoryCache::new()), None);
        let weight = classifier
            .classify("entertainment", Some("theater"), &event("Entertainment", Some("Theater")))
            .await;
        assert_eq!(weight.weight, EXACT_MATCH_WEIGHT);
    }

    #[tokio::test]
    async fn same_category_scores_moderate() {
        let classifier = ConflictClassifier::new(Arc::new(MemoryCache::new()), None);
        let weight = classifier
            .classify("Entertainment", Some("Theater"), &event("Entertainment", Some("Comedy")))
            .await;
        assert_eq!(weight.weight, SAME_CATEGORY_WEIGHT);
        assert_eq!(weight.method, MatchMethod::Exact);
    }

    #[tokio::test]
    async fn related_categories_use_the_table() {
        let classifier = ConflictClassifier::new(Arc::new(MemoryCache::new()), None);
        let weight = classifier
            .classify("Music", None, &event("Entertainment", None))
            .await;
        assert_eq!(weight.weight, 8.0);
        assert_eq!(weight.method, MatchMethod::Rule);
    }

    #[tokio::test]
    async fn unrelated_known_categories_score_zero_without_ai() {
        let matcher = FakeMatcher::matching(0.9);
        let classifier =
            ConflictClassifier::new(Arc::new(MemoryCache::new()), Some(matcher.clone()));
        let weight = classifier
            .classify("Sports", None, &event("Technology", None))
            .await;
        assert_eq!(weight.weight, 0.0);
        assert_eq!(weight.method, MatchMethod::Rule);
        // Table answered; the AI was never consulted
        assert_eq!(matcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn foreign_taxonomy_falls_through_to_ai_and_caches() {
        let matcher = FakeMatcher::matching(0.9);
        let cache = Arc::new(MemoryCache::new());
        let classifier = ConflictClassifier::new(cache.clone(), Some(matcher.clone()));

        let weight = classifier
            .classify("Music", None, &event("Konzerte", None))
            .await;
        assert_eq!(weight.method, MatchMethod::Ai);
        assert!((weight.weight - 7.2).abs() < 1e-9); // 8.0 * 0.9
        assert_eq!(matcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);

        // Second classification hits the cache; no further AI call
        let again = classifier
            .classify("Music", None, &event("Konzerte", None))
            .await;
        assert_eq!(again.method, MatchMethod::Ai);
        assert_eq!(matcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_key_is_unordered() {
        let a = pair_cache_key("Music", None, "Konzerte", Some("Jazz"));
        let b = pair_cache_key("Konzerte", Some("Jazz"), "Music", None);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn ai_failure_degrades_to_zero_weight() {
        let classifier = ConflictClassifier::new(
            Arc::new(MemoryCache::new()),
            Some(FakeMatcher::failing()),
        );
        let weight = classifier
            .classify("Music", None, &event("Konzerte", None))
            .await;
        assert_eq!(weight.weight, 0.0);
        assert_eq!(weight.method, MatchMethod::Rule);
        assert!(weight.reasoning[0].contains("AI match unavailable"));
    }

    #[tokio::test]
    async fn broken_cache_still_classifies() {
        let matcher = FakeMatcher::matching(0.5);
        let classifier = ConflictClassifier::new(
            Arc::new(MemoryCache::failing()),
            Some(matcher.clone()),
        );
        let weight = classifier
            .classify("Music", None, &event("Konzerte", None))
            .await;
        assert_eq!(weight.method, MatchMethod::Ai);
        assert!((weight.weight - 4.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn missing_subcategory_is_not_an_exact_pair() {
        let classifier = ConflictClassifier::new(Arc::new(MemoryCache::new()), None);
        let weight = classifier
            .classify("Entertainment", None, &event("Entertainment", None))
            .await;
        assert_eq!(weight.weight, SAME_CATEGORY_WEIGHT);
    }
}
