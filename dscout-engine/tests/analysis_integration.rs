//! End-to-end pipeline tests over fake providers
//!
//! Exercises the full analyze path: aggregation, dedup, classification,
//! seasonal/holiday adjustment, scoring, and risk partitioning.

mod helpers;

use dscout_common::dates::DateRange;
use dscout_engine::analysis::AnalysisRequest;
use dscout_engine::types::{AnalysisDepth, EventSource, StrategyOutcome};
use helpers::{build_test_analyzer, date, EventBuilder, FakeProvider};

fn request(candidates: Vec<chrono::NaiveDate>) -> AnalysisRequest {
    AnalysisRequest {
        city: "Austin".to_string(),
        category: "Entertainment".to_string(),
        subcategory: Some("Theater".to_string()),
        expected_attendees: 500,
        candidate_dates: candidates,
        date_range_for_context: DateRange::new(date(2026, 6, 1), date(2026, 6, 30)),
        depth: AnalysisDepth::Standard,
        country: Some("us".to_string()),
        region: None,
        radius_km: None,
    }
}

#[tokio::test]
async fn zero_competing_events_scores_zero_and_recommends() {
    let analyzer = build_test_analyzer(vec![FakeProvider::returning(
        EventSource::Ticketmaster,
        vec![],
    )]);

    let response = analyzer.analyze(request(vec![date(2026, 6, 20)])).await.unwrap();

    assert_eq!(response.recommended_dates.len(), 1);
    assert!(response.high_risk_dates.is_empty());

    let assessment = &response.recommended_dates[0];
    assert_eq!(assessment.conflict_score.score, 0.0);
    assert_eq!(assessment.conflict_score.events_considered, 0);
}

#[tokio::test]
async fn exact_category_clash_lands_in_high_risk() {
    let competing = EventBuilder::new("Broadway Revival", date(2026, 6, 20))
        .category("Entertainment", Some("Theater"))
        .venue("Paramount Theatre")
        .build();
    let analyzer = build_test_analyzer(vec![FakeProvider::returning(
        EventSource::Ticketmaster,
        vec![competing],
    )]);

    let response = analyzer
        .analyze(request(vec![date(2026, 6, 20), date(2026, 6, 23)]))
        .await
        .unwrap();

    // June 20 collides with a same-category/subcategory event with a
    // venue: 3 + 15 + 4 = 22, capped to 20, far past the threshold
    assert_eq!(response.high_risk_dates.len(), 1);
    let risky = &response.high_risk_dates[0];
    assert_eq!(risky.date, date(2026, 6, 20));
    assert_eq!(risky.conflict_score.score, 20.0);
    assert_eq!(risky.conflict_score.factors.category_weight, 15.0);

    // June 23 has no competing events
    assert_eq!(response.recommended_dates.len(), 1);
    assert_eq!(response.recommended_dates[0].date, date(2026, 6, 23));
    assert_eq!(response.recommended_dates[0].conflict_score.score, 0.0);
}

#[tokio::test]
async fn recommended_dates_sort_by_ascending_score() {
    let busy_day = EventBuilder::new("Small Meetup", date(2026, 6, 20))
        .category("Community", None)
        .build();
    let analyzer = build_test_analyzer(vec![FakeProvider::returning(
        EventSource::Ticketmaster,
        vec![busy_day],
    )]);

    let response = analyzer
        .analyze(request(vec![date(2026, 6, 20), date(2026, 6, 23)]))
        .await
        .unwrap();

    assert_eq!(response.recommended_dates.len(), 2);
    assert_eq!(response.recommended_dates[0].date, date(2026, 6, 23));
    assert!(
        response.recommended_dates[0].conflict_score.score
            <= response.recommended_dates[1].conflict_score.score
    );
}

#[tokio::test]
async fn duplicates_across_providers_merge_before_scoring() {
    let tm = EventBuilder::new("Summer Music Festival", date(2026, 6, 20))
        .category("Music", None)
        .venue("Zilker Park")
        .source(EventSource::Ticketmaster, "tm-1")
        .build();
    let phq = EventBuilder::new("Summer Music Fest", date(2026, 6, 20))
        .category("Music", None)
        .source(EventSource::PredictHq, "phq-9")
        .attendees(15_000)
        .build();

    let analyzer = build_test_analyzer(vec![
        FakeProvider::returning(EventSource::Ticketmaster, vec![tm]),
        FakeProvider::returning(EventSource::PredictHq, vec![phq]),
    ]);

    let response = analyzer.analyze(request(vec![date(2026, 6, 20)])).await.unwrap();

    let assessment = response
        .recommended_dates
        .iter()
        .chain(response.high_risk_dates.iter())
        .find(|a| a.date == date(2026, 6, 20))
        .unwrap();

    assert_eq!(assessment.competing_events.len(), 1);
    let merged = &assessment.competing_events[0];
    // Merge keeps the venue record and both provider ids, and enriches
    // it with the attendance estimate
    assert_eq!(merged.event.venue.as_deref(), Some("Zilker Park"));
    assert_eq!(merged.event.expected_attendees, Some(15_000));
    assert_eq!(merged.source_ids.len(), 2);
}

#[tokio::test]
async fn hanging_provider_degrades_to_diagnostics() {
    let competing = EventBuilder::new("Indie Night", date(2026, 6, 20))
        .category("Music", None)
        .build();
    let analyzer = build_test_analyzer(vec![
        FakeProvider::hanging(EventSource::PredictHq),
        FakeProvider::returning(EventSource::Ticketmaster, vec![competing]),
    ]);

    let response = analyzer.analyze(request(vec![date(2026, 6, 20)])).await.unwrap();

    // The timed-out provider contributed nothing but the analysis
    // completed with the other provider's events
    let timed_out: Vec<_> = response
        .diagnostics
        .iter()
        .filter(|d| d.outcome == StrategyOutcome::TimedOut)
        .collect();
    assert_eq!(timed_out.len(), 1);
    assert_eq!(timed_out[0].provider, EventSource::PredictHq);

    let assessment = response
        .recommended_dates
        .iter()
        .chain(response.high_risk_dates.iter())
        .find(|a| a.date == date(2026, 6, 20))
        .unwrap();
    assert_eq!(assessment.conflict_score.events_considered, 1);
}

#[tokio::test]
async fn failing_provider_degrades_to_diagnostics() {
    let analyzer = build_test_analyzer(vec![FakeProvider::failing(EventSource::CityScraper)]);

    let response = analyzer.analyze(request(vec![date(2026, 6, 20)])).await.unwrap();
    assert_eq!(response.recommended_dates.len(), 1);
    assert!(response
        .diagnostics
        .iter()
        .any(|d| d.outcome == StrategyOutcome::Failed));
}

#[tokio::test]
async fn empty_candidate_dates_is_invalid() {
    let analyzer = build_test_analyzer(vec![]);
    let err = analyzer.analyze(request(vec![])).await.unwrap_err();
    assert!(matches!(
        err,
        dscout_engine::EngineError::InvalidQuery(_)
    ));
}

#[tokio::test]
async fn multi_day_event_hits_every_covered_candidate() {
    let festival = EventBuilder::new("Film Festival", date(2026, 6, 19))
        .category("Entertainment", Some("Film"))
        .spanning(date(2026, 6, 21))
        .build();
    let analyzer = build_test_analyzer(vec![FakeProvider::returning(
        EventSource::Ticketmaster,
        vec![festival],
    )]);

    let response = analyzer
        .analyze(request(vec![date(2026, 6, 20), date(2026, 6, 22)]))
        .await
        .unwrap();

    let all: Vec<_> = response
        .recommended_dates
        .iter()
        .chain(response.high_risk_dates.iter())
        .collect();

    let covered = all.iter().find(|a| a.date == date(2026, 6, 20)).unwrap();
    let clear = all.iter().find(|a| a.date == date(2026, 6, 22)).unwrap();
    assert_eq!(covered.conflict_score.events_considered, 1);
    // Three-day event carries the 1.6 duration multiplier
    assert!((covered.conflict_score.factors.duration_multiplier - 1.6).abs() < 1e-9);
    assert_eq!(clear.conflict_score.events_considered, 0);
}

#[tokio::test]
async fn holiday_candidate_carries_warnings() {
    let analyzer = build_test_analyzer(vec![FakeProvider::returning(
        EventSource::Ticketmaster,
        vec![],
    )]);

    let mut req = request(vec![date(2026, 12, 25)]);
    req.date_range_for_context = DateRange::new(date(2026, 12, 1), date(2026, 12, 31));

    let response = analyzer.analyze(req).await.unwrap();
    let assessment = response
        .recommended_dates
        .iter()
        .chain(response.high_risk_dates.iter())
        .next()
        .unwrap();

    assert!(assessment
        .holiday_warnings
        .iter()
        .any(|w| w.contains("Christmas") && w.contains("closures")));
}

#[tokio::test]
async fn uncovered_country_warns_instead_of_failing() {
    let analyzer = build_test_analyzer(vec![FakeProvider::returning(
        EventSource::Ticketmaster,
        vec![],
    )]);

    let mut req = request(vec![date(2026, 6, 20)]);
    req.country = Some("jp".to_string());

    let response = analyzer.analyze(req).await.unwrap();
    let assessment = &response.recommended_dates[0];
    assert!(assessment
        .holiday_warnings
        .iter()
        .any(|w| w.contains("no holiday data")));
}
