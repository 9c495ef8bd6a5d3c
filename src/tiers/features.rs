use serde::Serialize;

/// Entitlement entry for one coach feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Feature {
    pub key: &'static str,
    pub label: &'static str,
    pub available_on_free_tier: bool,
}

/// Static entitlement table, in display order
const FEATURES: &[Feature] = &[
    Feature {
        key: "chat",
        label: "Coach chat",
        available_on_free_tier: true,
    },
    Feature {
        key: "workout_review",
        label: "Workout review",
        available_on_free_tier: true,
    },
    Feature {
        key: "weekly_report",
        label: "Weekly report",
        available_on_free_tier: true,
    },
    Feature {
        key: "exercise_swap",
        label: "Exercise swap",
        available_on_free_tier: true,
    },
    Feature {
        key: "program_builder",
        label: "Program builder",
        available_on_free_tier: false,
    },
    Feature {
        key: "deep_analysis",
        label: "Deep analysis",
        available_on_free_tier: false,
    },
];

/// Look up a feature by key. Hyphenated keys are accepted too.
pub fn feature(key: &str) -> Option<&'static Feature> {
    let key = key.trim().replace('-', "_");
    FEATURES.iter().find(|f| f.key == key)
}

pub fn features() -> &'static [Feature] {
    FEATURES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_tier_eligibility() {
        for key in ["chat", "workout_review", "weekly_report", "exercise_swap"] {
            assert!(feature(key).unwrap().available_on_free_tier, "{key}");
        }
        for key in ["program_builder", "deep_analysis"] {
            assert!(!feature(key).unwrap().available_on_free_tier, "{key}");
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(feature("deep-analysis").unwrap().label, "Deep analysis");
        assert!(feature("not-a-real-feature").is_none());
        assert_eq!(features().len(), 6);
    }
}
