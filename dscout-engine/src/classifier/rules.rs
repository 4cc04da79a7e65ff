//! Static category relationship table
//!
//! Categories the engine knows are bucketed into high/medium/low
//! cross-conflict relationships. Pairs of known categories with no listed
//! relationship conflict not at all; a pair involving a category outside
//! this taxonomy (foreign-language labels, provider-native vocabulary
//! that slipped through) has no table answer and falls through to the AI
//! matcher.

/// Cross-category conflict relationship strength
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relationship {
    High,
    Medium,
    Low,
    None,
}

impl Relationship {
    /// Weight contribution on the 0-20 per-event scale
    pub fn weight(&self) -> f64 {
        match self {
            Relationship::High => 8.0,
            Relationship::Medium => 4.0,
            Relationship::Low => 1.0,
            Relationship::None => 0.0,
        }
    }
}

/// Categories the static table covers
const KNOWN_CATEGORIES: &[&str] = &[
    "music",
    "entertainment",
    "sports",
    "business & professional",
    "technology",
    "food & drink",
    "arts & culture",
    "community",
    "family",
    "health & wellness",
];

/// Unordered high/medium/low relationship pairs. Unlisted pairs of known
/// categories are unrelated (weight 0).
const RELATIONSHIPS: &[(&str, &str, Relationship)] = &[
    ("music", "entertainment", Relationship::High),
    ("music", "arts & culture", Relationship::Medium),
    ("music", "food & drink", Relationship::Low),
    ("music", "community", Relationship::Low),
    ("entertainment", "arts & culture", Relationship::High),
    ("entertainment", "sports", Relationship::Medium),
    ("entertainment", "family", Relationship::Medium),
    ("entertainment", "food & drink", Relationship::Low),
    ("sports", "family", Relationship::Low),
    ("sports", "community", Relationship::Low),
    ("business & professional", "technology", Relationship::High),
    ("business & professional", "health & wellness", Relationship::Low),
    ("technology", "arts & culture", Relationship::Low),
    ("food & drink", "community", Relationship::Medium),
    ("food & drink", "arts & culture", Relationship::Low),
    ("arts & culture", "community", Relationship::Medium),
    ("family", "community", Relationship::Medium),
    ("health & wellness", "community", Relationship::Low),
];

/// Whether the static table covers a category at all
pub fn is_known_category(category: &str) -> bool {
    KNOWN_CATEGORIES.contains(&normalize(category).as_str())
}

/// Relationship between two known categories.
///
/// Returns `None` (the Option) when either category is outside the
/// taxonomy; that absence is what triggers the AI fallback, never a zero
/// weight.
pub fn relationship(a: &str, b: &str) -> Option<Relationship> {
    let a = normalize(a);
    let b = normalize(b);

    if !is_known_category(&a) || !is_known_category(&b) {
        return None;
    }
    if a == b {
        return Some(Relationship::High);
    }

    for (x, y, rel) in RELATIONSHIPS {
        if (*x == a && *y == b) || (*x == b && *y == a) {
            return Some(*rel);
        }
    }

    Some(Relationship::None)
}

fn normalize(category: &str) -> String {
    category.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relationship_is_symmetric() {
        assert_eq!(
            relationship("Music", "Entertainment"),
            relationship("Entertainment", "Music")
        );
    }

    #[test]
    fn related_pairs_have_expected_strength() {
        assert_eq!(relationship("Music", "Entertainment"), Some(Relationship::High));
        assert_eq!(relationship("Sports", "Entertainment"), Some(Relationship::Medium));
        assert_eq!(relationship("Music", "Food & Drink"), Some(Relationship::Low));
    }

    #[test]
    fn unlisted_known_pair_is_unrelated() {
        assert_eq!(relationship("Sports", "Technology"), Some(Relationship::None));
    }

    #[test]
    fn unknown_category_has_no_table_answer() {
        assert_eq!(relationship("Konzerte", "Music"), None);
        assert_eq!(relationship("Music", "Konzerte"), None);
    }

    #[test]
    fn weights_follow_bucket_order() {
        assert!(Relationship::High.weight() > Relationship::Medium.weight());
        assert!(Relationship::Medium.weight() > Relationship::Low.weight());
        assert!(Relationship::Low.weight() > Relationship::None.weight());
        assert_eq!(Relationship::High.weight(), 8.0);
        assert_eq!(Relationship::Medium.weight(), 4.0);
        assert_eq!(Relationship::Low.weight(), 1.0);
        assert_eq!(Relationship::None.weight(), 0.0);
    }

    #[test]
    fn normalization_ignores_case_and_padding() {
        assert!(is_known_category("  MUSIC "));
        assert!(!is_known_category("Musik"));
    }
}
