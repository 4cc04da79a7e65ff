//! Seasonal demand and holiday impact adjustment
//!
//! Both engines answer with neutral multipliers plus an explicit coverage
//! warning when they have no data, and both treat their cache as
//! append-only knowledge with no expiry.

pub mod holiday;
pub mod seasonal;

pub use holiday::{HolidayConflictDetector, StaticHolidayCalendar};
pub use seasonal::SeasonalityEngine;
