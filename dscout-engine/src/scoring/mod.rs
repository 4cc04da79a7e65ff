//! Final conflict score assembly
//!
//! The scoring pass is pure CPU work over data the async pipeline already
//! gathered (canonical events, per-event category weights, seasonal and
//! holiday multipliers). `score` offloads it to a blocking worker so the
//! request path never stalls; `score_events` is the pure function the
//! tests exercise directly.

use std::collections::HashMap;
use uuid::Uuid;

use crate::config::ScoringConfig;
use crate::types::{
    AnalysisDepth, CanonicalEvent, CategoryConflictWeight, ConflictScore, HolidayImpact,
    ScoreFactors, SeasonalMultiplier,
};

/// Score ceiling: no date scores worse than this
pub const MAX_SCORE: f64 = 20.0;
/// Per-event base contribution
const EVENT_BASE: f64 = 3.0;
/// Flat contribution of events beyond `max_comparisons`
const LONG_TAIL_POINTS: f64 = 2.0;

/// Planned-event inputs the scorer needs; category conflict arrives
/// pre-resolved in the weight map
#[derive(Debug, Clone)]
pub struct PlannedEvent {
    pub expected_attendees: u32,
    pub depth: AnalysisDepth,
}

/// Conflict scorer
pub struct ConflictScorer {
    max_comparisons: usize,
}

impl ConflictScorer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            max_comparisons: config.max_comparisons,
        }
    }

    /// Score one candidate date on a blocking worker thread.
    pub async fn score(
        &self,
        planned: PlannedEvent,
        events: Vec<CanonicalEvent>,
        weights: HashMap<Uuid, CategoryConflictWeight>,
        seasonal: SeasonalMultiplier,
        holiday: HolidayImpact,
        events_truncated: usize,
    ) -> ConflictScore {
        let max_comparisons = self.max_comparisons;
        tokio::task::spawn_blocking(move || {
            score_events(
                max_comparisons,
                &planned,
                &events,
                &weights,
                &seasonal,
                &holiday,
                events_truncated,
            )
        })
        .await
        .expect("Scoring task panicked")
    }
}

/// Pure scoring pass.
///
/// 1. Rank events by significance and take the top `max_comparisons` for
///    full scoring; the ranking is a cost control, not a filter.
/// 2. Per selected event: base 3 + category weight + presence bonuses,
///    multiplied by the duration multiplier.
/// 3. Remaining events contribute a flat 2 points each.
/// 4. Attendance, seasonal and holiday multipliers apply to the
///    aggregate, which is finally capped at 20.
pub fn score_events(
    max_comparisons: usize,
    planned: &PlannedEvent,
    events: &[CanonicalEvent],
    weights: &HashMap<Uuid, CategoryConflictWeight>,
    seasonal: &SeasonalMultiplier,
    holiday: &HolidayImpact,
    events_truncated: usize,
) -> ConflictScore {
    if events.is_empty() {
        return ConflictScore {
            score: 0.0,
            factors: ScoreFactors {
                category_weight: 0.0,
                duration_multiplier: 1.0,
                attendance_multiplier: 1.0,
                seasonal_multiplier: seasonal.multiplier,
                holiday_multiplier: holiday.multiplier,
            },
            events_considered: 0,
            events_truncated,
        };
    }

    // Significance ordering decides which events get full scoring
    let mut ranked: Vec<&CanonicalEvent> = events.iter().collect();
    ranked.sort_by(|a, b| {
        significance(&b.event)
            .partial_cmp(&significance(&a.event))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let (selected, tail) = ranked.split_at(max_comparisons.min(ranked.len()));

    let mut aggregate = 0.0;
    let mut max_category_weight: f64 = 0.0;
    let mut max_duration_multiplier: f64 = 1.0;

    for canonical in selected {
        let event = &canonical.event;
        let category_weight = weights.get(&event.id).map(|w| w.weight).unwrap_or(0.0);

        let mut subtotal = EVENT_BASE + category_weight;
        if event.venue.is_some() {
            subtotal += 4.0;
        }
        if event.image_url.is_some() {
            subtotal += 2.0;
        }
        if event.description.as_deref().map(|d| d.len() > 50).unwrap_or(false) {
            subtotal += 1.0;
        }
        if planned.depth == AnalysisDepth::Deep
            && event.expected_attendees.map(|a| a > 500).unwrap_or(false)
        {
            subtotal += 2.0;
        }

        let duration = duration_multiplier(event.duration_days());
        aggregate += subtotal * duration;

        max_category_weight = max_category_weight.max(category_weight);
        max_duration_multiplier = max_duration_multiplier.max(duration);
    }

    // Long tail: reduced weight, but every event still counts
    aggregate += tail.len() as f64 * LONG_TAIL_POINTS;

    let attendance = attendance_multiplier(planned.expected_attendees);
    aggregate *= attendance;
    aggregate *= seasonal.multiplier;
    aggregate *= holiday.multiplier;

    ConflictScore {
        score: aggregate.min(MAX_SCORE).max(0.0),
        factors: ScoreFactors {
            category_weight: max_category_weight,
            duration_multiplier: max_duration_multiplier,
            attendance_multiplier: attendance,
            seasonal_multiplier: seasonal.multiplier,
            holiday_multiplier: holiday.multiplier,
        },
        events_considered: events.len(),
        events_truncated,
    }
}

/// Significance heuristic ranking events for full scoring.
///
/// Base 10, +20 venue, +15 image, +10 long description, plus up to 25
/// proportional to expected attendance (attendees / 10, capped).
pub fn significance(event: &crate::types::Event) -> f64 {
    let mut score = 10.0;
    if event.venue.is_some() {
        score += 20.0;
    }
    if event.image_url.is_some() {
        score += 15.0;
    }
    if event.description.as_deref().map(|d| d.len() > 50).unwrap_or(false) {
        score += 10.0;
    }
    if let Some(attendees) = event.expected_attendees {
        score += (attendees as f64 / 10.0).min(25.0);
    }
    score
}

/// Duration multiplier over inclusive day span.
///
/// 1.0 / 1.3 / 1.6 for one/two/three days, then +0.3 per additional day
/// capped at 2.0.
pub fn duration_multiplier(days: i64) -> f64 {
    let days = days.max(1);
    (1.0 + (days - 1) as f64 * 0.3).min(2.0)
}

/// Planned-attendance multiplier on the aggregate
fn attendance_multiplier(expected_attendees: u32) -> f64 {
    if expected_attendees > 1000 {
        1.1
    } else if expected_attendees > 500 {
        1.05
    } else {
        1.0
    }
}
