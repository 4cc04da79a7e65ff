//! Cross-source event deduplication
//!
//! Providers frequently list the same real-world event under different
//! native ids. A pair merges when normalized title similarity
//! (Jaro-Winkler) reaches the configured threshold AND both records start
//! the same day in the same city. The survivor is chosen by tie-break
//! (venue present, then image present, then provider priority) and
//! enriched with any fields it was missing; every contributing provider
//! id is kept for audit.
//!
//! Deduplicating an already-deduplicated set is a no-op.

use strsim::jaro_winkler;

use crate::config::DedupConfig;
use crate::types::{normalize_title, CanonicalEvent, CanonicalEventSet, Event, EventSource};

/// Similarity-based event merger
pub struct Deduplicator {
    similarity_threshold: f64,
    max_events: usize,
    provider_priority: Vec<EventSource>,
}

impl Deduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Self {
            similarity_threshold: config.similarity_threshold,
            max_events: config.max_events,
            provider_priority: config.provider_priority,
        }
    }

    /// Collapse near-duplicates into a canonical set.
    ///
    /// Input beyond `max_events` is dropped deterministically: the
    /// first-inserted records are kept, the tail is counted in
    /// `truncated`. Pairwise comparison is bounded by the same cap.
    pub fn dedup(&self, mut events: Vec<Event>) -> CanonicalEventSet {
        let truncated = events.len().saturating_sub(self.max_events);
        if truncated > 0 {
            tracing::warn!(
                dropped = truncated,
                cap = self.max_events,
                "Event list exceeds dedup cap; dropping tail"
            );
            events.truncate(self.max_events);
        }

        let mut canonical: Vec<CanonicalEvent> = Vec::new();

        for event in events {
            let matched = canonical
                .iter_mut()
                .find(|existing| self.is_duplicate(&existing.event, &event));

            match matched {
                Some(existing) => {
                    tracing::debug!(
                        kept = %existing.event.title,
                        merged = %event.title,
                        "Merging duplicate event"
                    );
                    self.merge_into(existing, event);
                }
                None => {
                    let source_ids = event.source_id.iter().cloned().collect();
                    canonical.push(CanonicalEvent { event, source_ids });
                }
            }
        }

        CanonicalEventSet {
            events: canonical,
            truncated,
        }
    }

    /// Re-run dedup over an existing canonical set (idempotence path)
    pub fn dedup_set(&self, set: CanonicalEventSet) -> CanonicalEventSet {
        let prior_truncated = set.truncated;
        let mut merged_ids: Vec<Vec<String>> = Vec::new();
        let events: Vec<Event> = set
            .events
            .into_iter()
            .map(|c| {
                merged_ids.push(c.source_ids);
                c.event
            })
            .collect();

        let mut result = self.dedup(events);
        // Restore audit ids lost by unwrapping (no merges happen when the
        // input is already canonical, so positions line up)
        for (canonical, ids) in result.events.iter_mut().zip(merged_ids) {
            for id in ids {
                if !canonical.source_ids.contains(&id) {
                    canonical.source_ids.push(id);
                }
            }
        }
        result.truncated += prior_truncated;
        result
    }

    /// Matching signal: same-day start, same normalized city, title
    /// similarity at or above threshold.
    fn is_duplicate(&self, a: &Event, b: &Event) -> bool {
        if a.date != b.date {
            return false;
        }
        if normalize_city(&a.city) != normalize_city(&b.city) {
            return false;
        }
        self.title_similarity(&a.title, &b.title) >= self.similarity_threshold
    }

    pub fn title_similarity(&self, a: &str, b: &str) -> f64 {
        jaro_winkler(&normalize_title(a), &normalize_title(b))
    }

    /// Merge `incoming` into an existing canonical record, keeping the
    /// tie-break winner and filling its gaps from the loser.
    fn merge_into(&self, existing: &mut CanonicalEvent, incoming: Event) {
        let incoming_ids: Vec<String> = incoming.source_id.iter().cloned().collect();

        if self.prefer_incoming(&existing.event, &incoming) {
            let loser = std::mem::replace(&mut existing.event, incoming);
            fill_missing(&mut existing.event, &loser);
        } else {
            fill_missing(&mut existing.event, &incoming);
        }

        for id in incoming_ids {
            if !existing.source_ids.contains(&id) {
                existing.source_ids.push(id);
            }
        }
    }

    /// Tie-break: venue presence, then image presence, then provider
    /// priority order.
    fn prefer_incoming(&self, kept: &Event, incoming: &Event) -> bool {
        match (kept.venue.is_some(), incoming.venue.is_some()) {
            (false, true) => return true,
            (true, false) => return false,
            _ => {}
        }
        match (kept.image_url.is_some(), incoming.image_url.is_some()) {
            (false, true) => return true,
            (true, false) => return false,
            _ => {}
        }
        self.priority_rank(incoming.source) < self.priority_rank(kept.source)
    }

    fn priority_rank(&self, source: EventSource) -> usize {
        self.provider_priority
            .iter()
            .position(|s| *s == source)
            .unwrap_or(self.provider_priority.len())
    }
}

/// Copy optional fields the winner is missing from the merged-away record
fn fill_missing(winner: &mut Event, loser: &Event) {
    if winner.description.is_none() {
        winner.description = loser.description.clone();
    }
    if winner.end_date.is_none() {
        winner.end_date = loser.end_date;
    }
    if winner.venue.is_none() {
        winner.venue = loser.venue.clone();
    }
    if winner.subcategory.is_none() {
        winner.subcategory = loser.subcategory.clone();
    }
    if winner.expected_attendees.is_none() {
        winner.expected_attendees = loser.expected_attendees;
    }
    if winner.url.is_none() {
        winner.url = loser.url.clone();
    }
    if winner.image_url.is_none() {
        winner.image_url = loser.image_url.clone();
    }
}

fn normalize_city(city: &str) -> String {
    city.trim().to_lowercase()
}
