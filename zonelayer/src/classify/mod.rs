//! Zone surface classification.
//!
//! Maps the raw attribute text of an upstream zone feature onto a small
//! closed set of categories used for styling and legend grouping. Matching
//! is case-insensitive substring search over a fixed, ordered rule list;
//! the first matching rule wins, and anything unmatched falls back to
//! [`ZoneCategory::Other`].

use std::fmt;

/// Closed set of zone categories recognised by the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneCategory {
    /// Debris flow hazard designation.
    DebrisFlow,
    /// Steep slope failure designation.
    SteepSlope,
    /// Landslide hazard designation.
    Landslide,
    /// Tsunami inundation designation.
    Tsunami,
    /// Storm surge inundation designation.
    StormSurge,
    /// River flood inundation designation.
    Flood,
    /// Jurisdictional restricted area.
    Restricted,
    /// Anything the rule table does not recognise.
    Other,
}

impl ZoneCategory {
    /// Stable identifier used in logs and by the styling layer.
    pub fn as_str(self) -> &'static str {
        match self {
            ZoneCategory::DebrisFlow => "debris-flow",
            ZoneCategory::SteepSlope => "steep-slope",
            ZoneCategory::Landslide => "landslide",
            ZoneCategory::Tsunami => "tsunami",
            ZoneCategory::StormSurge => "storm-surge",
            ZoneCategory::Flood => "flood",
            ZoneCategory::Restricted => "restricted",
            ZoneCategory::Other => "other",
        }
    }
}

impl fmt::Display for ZoneCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered classification rules, evaluated first-match-wins.
///
/// Order is load-bearing: "storm surge" must be tested before "flood" so
/// that a "storm surge flooding" attribute does not fall into the generic
/// flood bucket. Keep this a slice, not a set.
const RULES: &[(&str, ZoneCategory, &str)] = &[
    ("debris flow", ZoneCategory::DebrisFlow, "Debris flow hazard zone"),
    ("steep slope", ZoneCategory::SteepSlope, "Steep slope failure zone"),
    ("landslide", ZoneCategory::Landslide, "Landslide hazard zone"),
    ("tsunami", ZoneCategory::Tsunami, "Tsunami inundation zone"),
    ("storm surge", ZoneCategory::StormSurge, "Storm surge inundation zone"),
    ("flood", ZoneCategory::Flood, "Flood inundation zone"),
    ("restricted", ZoneCategory::Restricted, "Restricted area"),
];

/// Label applied when no rule matches.
const FALLBACK_LABEL: &str = "Unclassified zone";

/// Classifies raw attribute text into a category and display label.
///
/// Pure and deterministic. The attribute text is typically the concatenated
/// string-valued properties of one upstream feature.
pub fn classify(attributes: &str) -> (ZoneCategory, String) {
    let haystack = attributes.to_lowercase();
    for (needle, category, label) in RULES {
        if haystack.contains(needle) {
            return (*category, (*label).to_string());
        }
    }
    (ZoneCategory::Other, FALLBACK_LABEL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_match() {
        let (category, label) = classify("designated landslide prevention area");
        assert_eq!(category, ZoneCategory::Landslide);
        assert_eq!(label, "Landslide hazard zone");
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let (category, _) = classify("TSUNAMI Inundation Assumption");
        assert_eq!(category, ZoneCategory::Tsunami);
    }

    #[test]
    fn test_storm_surge_wins_over_flood() {
        // "storm surge flooding" contains both needles; rule order decides.
        let (category, label) = classify("expected storm surge flooding depth 2m");
        assert_eq!(category, ZoneCategory::StormSurge);
        assert_eq!(label, "Storm surge inundation zone");
    }

    #[test]
    fn test_plain_flood_still_matches() {
        let (category, _) = classify("river flood assumption area");
        assert_eq!(category, ZoneCategory::Flood);
    }

    #[test]
    fn test_fallback_category() {
        let (category, label) = classify("municipal boundary");
        assert_eq!(category, ZoneCategory::Other);
        assert_eq!(label, FALLBACK_LABEL);
    }

    #[test]
    fn test_empty_attributes_fall_back() {
        let (category, _) = classify("");
        assert_eq!(category, ZoneCategory::Other);
    }

    #[test]
    fn test_every_rule_is_reachable() {
        for (needle, expected, _) in RULES {
            let (category, _) = classify(needle);
            assert_eq!(category, *expected, "rule for {needle:?} unreachable");
        }
    }

    #[test]
    fn test_category_identifiers_are_stable() {
        assert_eq!(ZoneCategory::StormSurge.as_str(), "storm-surge");
        assert_eq!(ZoneCategory::Other.to_string(), "other");
    }
}
