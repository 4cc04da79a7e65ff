//! Holiday impact detection
//!
//! `HolidayConflictDetector` turns the holidays observed on a date into a
//! conflict multiplier: a full venue-closure holiday weighs more than a
//! partial cultural observance, which weighs more than a plain weekday.
//! `StaticHolidayCalendar` is the built-in `HolidayProvider`, covering
//! the countries the engine ships data for; everything else comes back
//! with a coverage warning and a neutral multiplier.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use std::sync::Arc;

use crate::cache::{cache_key, CacheStore, CacheTable};
use crate::error::EngineError;
use crate::types::{
    HolidayImpact, HolidayImpactLevel, HolidayInfo, HolidayProvider,
};

const FULL_CLOSURE_MULTIPLIER: f64 = 1.5;
const PARTIAL_IMPACT_MULTIPLIER: f64 = 1.2;

/// Holiday impact detector with injected provider and cache
pub struct HolidayConflictDetector {
    provider: Arc<dyn HolidayProvider>,
    cache: Arc<dyn CacheStore>,
}

impl HolidayConflictDetector {
    pub fn new(provider: Arc<dyn HolidayProvider>, cache: Arc<dyn CacheStore>) -> Self {
        Self { provider, cache }
    }

    /// Holiday impact for one date/category/country.
    ///
    /// Dates with no observed holidays get the neutral multiplier; a
    /// country outside provider coverage additionally carries the
    /// coverage warning. Never fails.
    pub async fn holiday_impact(
        &self,
        date: NaiveDate,
        category: &str,
        subcategory: Option<&str>,
        country: &str,
        region: Option<&str>,
    ) -> HolidayImpact {
        // Holiday impact is date-granular, unlike the seasonal model
        let key = cache_key(&[
            "holiday",
            &date.to_string(),
            category,
            subcategory.unwrap_or(""),
            country,
            region.unwrap_or(""),
        ]);

        match self.cache.get(CacheTable::SeasonalInsights, &key).await {
            Ok(Some(value)) => {
                if let Ok(cached) = serde_json::from_value::<HolidayImpact>(value) {
                    return cached;
                }
                tracing::warn!("Corrupt holiday cache entry; recomputing");
            }
            Ok(None) => {}
            Err(e) => {
                let recovered = EngineError::CacheUnavailable(e.to_string());
                tracing::warn!(error = %recovered, "Computing holiday impact directly");
            }
        }

        if !self.provider.covers_country(country) {
            tracing::debug!(country = %country, "No holiday coverage for country");
            return HolidayImpact::neutral(true);
        }

        let holidays = self.provider.holidays_for_date(date, country, region).await;
        let result = impact_from_holidays(holidays);

        if let Ok(value) = serde_json::to_value(&result) {
            if let Err(e) = self.cache.put(CacheTable::SeasonalInsights, &key, value).await {
                tracing::warn!(error = %e, "Holiday cache write failed");
            }
        }

        result
    }
}

/// Fold observed holidays into an impact level and multiplier.
///
/// Any holiday expecting venue closures escalates to Full; otherwise any
/// holiday at all is Partial.
fn impact_from_holidays(holidays: Vec<HolidayInfo>) -> HolidayImpact {
    if holidays.is_empty() {
        return HolidayImpact::neutral(false);
    }

    let full_closure = holidays.iter().any(|h| h.venue_closure_expected);
    let (total_impact, multiplier) = if full_closure {
        (HolidayImpactLevel::Full, FULL_CLOSURE_MULTIPLIER)
    } else {
        (HolidayImpactLevel::Partial, PARTIAL_IMPACT_MULTIPLIER)
    };

    HolidayImpact {
        multiplier,
        total_impact,
        holidays,
        coverage_warning: false,
    }
}

// ============================================================================
// Built-in calendar
// ============================================================================

/// Fixed-date or nth-weekday holiday rule
struct HolidayRule {
    name: &'static str,
    country: &'static str,
    rule: DateRule,
    venue_closure_expected: bool,
    significance: f64,
}

enum DateRule {
    /// Same month/day every year
    Fixed(u32, u32),
    /// Nth weekday of a month (e.g. 4th Thursday of November)
    NthWeekday(u32, Weekday, u32),
    /// Last weekday of a month
    LastWeekday(u32, Weekday),
}

impl DateRule {
    fn matches(&self, date: NaiveDate) -> bool {
        match self {
            DateRule::Fixed(month, day) => date.month() == *month && date.day() == *day,
            DateRule::NthWeekday(month, weekday, n) => {
                date.month() == *month
                    && date.weekday() == *weekday
                    && (date.day() - 1) / 7 + 1 == *n
            }
            DateRule::LastWeekday(month, weekday) => {
                date.month() == *month
                    && date.weekday() == *weekday
                    && date.day() + 7 > days_in_month(date.year(), *month)
            }
        }
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.and_then(|d| d.pred_opt()).map(|d| d.day()).unwrap_or(31)
}

const RULES: &[HolidayRule] = &[
    HolidayRule { name: "New Year's Day", country: "us", rule: DateRule::Fixed(1, 1), venue_closure_expected: true, significance: 0.9 },
    HolidayRule { name: "Independence Day", country: "us", rule: DateRule::Fixed(7, 4), venue_closure_expected: false, significance: 0.8 },
    HolidayRule { name: "Halloween", country: "us", rule: DateRule::Fixed(10, 31), venue_closure_expected: false, significance: 0.5 },
    HolidayRule { name: "Veterans Day", country: "us", rule: DateRule::Fixed(11, 11), venue_closure_expected: false, significance: 0.4 },
    HolidayRule { name: "Christmas Day", country: "us", rule: DateRule::Fixed(12, 25), venue_closure_expected: true, significance: 1.0 },
    HolidayRule { name: "Christmas Eve", country: "us", rule: DateRule::Fixed(12, 24), venue_closure_expected: false, significance: 0.8 },
    HolidayRule { name: "Martin Luther King Jr. Day", country: "us", rule: DateRule::NthWeekday(1, Weekday::Mon, 3), venue_closure_expected: false, significance: 0.5 },
    HolidayRule { name: "Memorial Day", country: "us", rule: DateRule::LastWeekday(5, Weekday::Mon), venue_closure_expected: false, significance: 0.6 },
    HolidayRule { name: "Labor Day", country: "us", rule: DateRule::NthWeekday(9, Weekday::Mon, 1), venue_closure_expected: false, significance: 0.6 },
    HolidayRule { name: "Thanksgiving", country: "us", rule: DateRule::NthWeekday(11, Weekday::Thu, 4), venue_closure_expected: true, significance: 0.95 },
    HolidayRule { name: "New Year's Day", country: "ca", rule: DateRule::Fixed(1, 1), venue_closure_expected: true, significance: 0.9 },
    HolidayRule { name: "Canada Day", country: "ca", rule: DateRule::Fixed(7, 1), venue_closure_expected: false, significance: 0.8 },
    HolidayRule { name: "Christmas Day", country: "ca", rule: DateRule::Fixed(12, 25), venue_closure_expected: true, significance: 1.0 },
    HolidayRule { name: "New Year's Day", country: "uk", rule: DateRule::Fixed(1, 1), venue_closure_expected: true, significance: 0.9 },
    HolidayRule { name: "Christmas Day", country: "uk", rule: DateRule::Fixed(12, 25), venue_closure_expected: true, significance: 1.0 },
    HolidayRule { name: "Boxing Day", country: "uk", rule: DateRule::Fixed(12, 26), venue_closure_expected: true, significance: 0.85 },
];

/// Built-in holiday calendar backed by the static rule table
#[derive(Default)]
pub struct StaticHolidayCalendar;

impl StaticHolidayCalendar {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HolidayProvider for StaticHolidayCalendar {
    async fn holidays_for_date(
        &self,
        date: NaiveDate,
        country: &str,
        region: Option<&str>,
    ) -> Vec<HolidayInfo> {
        let country = country.trim().to_lowercase();
        RULES
            .iter()
            .filter(|rule| rule.country == country && rule.rule.matches(date))
            .map(|rule| HolidayInfo {
                name: rule.name.to_string(),
                date,
                country: country.clone(),
                region: region.map(str::to_string),
                venue_closure_expected: rule.venue_closure_expected,
                significance: rule.significance,
            })
            .collect()
    }

    fn covers_country(&self, country: &str) -> bool {
        let country = country.trim().to_lowercase();
        RULES.iter().any(|rule| rule.country == country)
    }
}
