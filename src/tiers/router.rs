use std::fmt;
use std::sync::Arc;

use super::features::feature;
use crate::models::Backend;

/// Subscription tier of the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Pro,
}

impl Tier {
    /// Anything that is not "pro" is treated as free
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("pro") {
            Self::Pro
        } else {
            Self::Free
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const REASON_UNKNOWN_FEATURE: &str = "unknown feature";
pub const REASON_NOT_CONFIGURED: &str = "not configured";
pub const REASON_FREE_NOT_CONFIGURED: &str = "free tier not configured";

/// Outcome of routing one request.
///
/// `blocked` is a policy refusal. An allowed request with no backend has
/// `blocked == false`, `backend == None` and a reason; callers word the two
/// cases differently.
#[derive(Clone)]
pub struct RouteDecision {
    pub backend: Option<Arc<dyn Backend>>,
    pub blocked: bool,
    pub reason: Option<String>,
}

impl RouteDecision {
    fn allowed(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend: Some(backend),
            blocked: false,
            reason: None,
        }
    }

    fn unavailable(reason: &str) -> Self {
        Self {
            backend: None,
            blocked: false,
            reason: Some(reason.to_string()),
        }
    }

    fn blocked(reason: String) -> Self {
        Self {
            backend: None,
            blocked: true,
            reason: Some(reason),
        }
    }
}

impl fmt::Debug for RouteDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDecision")
            .field("backend", &self.backend.as_ref().map(|_| "<backend>"))
            .field("blocked", &self.blocked)
            .field("reason", &self.reason)
            .finish()
    }
}

/// Pick the backend for `tier` and `feature`; first matching rule wins
pub fn resolve_backend(
    tier: Tier,
    feature_key: &str,
    pro_backend: Option<Arc<dyn Backend>>,
    free_backend: Option<Arc<dyn Backend>>,
) -> RouteDecision {
    let Some(feature) = feature(feature_key) else {
        return RouteDecision::blocked(REASON_UNKNOWN_FEATURE.to_string());
    };

    match tier {
        Tier::Pro => match pro_backend {
            Some(backend) => RouteDecision::allowed(backend),
            None => RouteDecision::unavailable(REASON_NOT_CONFIGURED),
        },
        Tier::Free if !feature.available_on_free_tier => {
            RouteDecision::blocked(format!("{} requires upgrade", feature.label))
        },
        Tier::Free => match free_backend {
            Some(backend) => RouteDecision::allowed(backend),
            None => RouteDecision::unavailable(REASON_FREE_NOT_CONFIGURED),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MockBackend;

    fn mock() -> Arc<dyn Backend> {
        Arc::new(MockBackend::new())
    }

    fn same(decision: &RouteDecision, backend: &Arc<dyn Backend>) -> bool {
        decision
            .backend
            .as_ref()
            .is_some_and(|b| Arc::ptr_eq(b, backend))
    }

    #[test]
    fn test_tier_parse() {
        assert_eq!(Tier::parse("pro"), Tier::Pro);
        assert_eq!(Tier::parse("PRO"), Tier::Pro);
        assert_eq!(Tier::parse("free"), Tier::Free);
        assert_eq!(Tier::parse("anything"), Tier::Free);
    }

    #[test]
    fn test_unknown_feature_blocked_for_any_tier() {
        for tier in ["anything", "pro", "free"] {
            let decision =
                resolve_backend(Tier::parse(tier), "not-a-real-feature", Some(mock()), Some(mock()));
            assert!(decision.blocked);
            assert!(decision.backend.is_none());
            assert_eq!(decision.reason.as_deref(), Some("unknown feature"));
        }
    }

    #[test]
    fn test_pro_without_backend_is_not_configured() {
        let decision = resolve_backend(Tier::Pro, "chat", None, Some(mock()));
        assert!(!decision.blocked);
        assert!(decision.backend.is_none());
        assert_eq!(decision.reason.as_deref(), Some("not configured"));
    }

    #[test]
    fn test_pro_gets_pro_backend_for_any_feature() {
        let pro = mock();
        let free = mock();
        for key in ["chat", "deep_analysis", "program_builder"] {
            let decision = resolve_backend(Tier::Pro, key, Some(pro.clone()), Some(free.clone()));
            assert!(!decision.blocked);
            assert!(same(&decision, &pro));
            assert_eq!(decision.reason, None);
        }
    }

    #[test]
    fn test_free_pro_only_feature_blocked() {
        for pro in [Some(mock()), None] {
            let decision = resolve_backend(Tier::Free, "program_builder", pro, Some(mock()));
            assert!(decision.blocked);
            assert!(decision.backend.is_none());
            assert_eq!(
                decision.reason.as_deref(),
                Some("Program builder requires upgrade")
            );
        }
    }

    #[test]
    fn test_free_without_free_backend() {
        let decision = resolve_backend(Tier::Free, "chat", Some(mock()), None);
        assert!(!decision.blocked);
        assert!(decision.backend.is_none());
        assert_eq!(decision.reason.as_deref(), Some("free tier not configured"));
    }

    #[test]
    fn test_free_gets_free_backend() {
        let pro = mock();
        let free = mock();
        let decision = resolve_backend(Tier::Free, "weekly_report", Some(pro.clone()), Some(free.clone()));
        assert!(!decision.blocked);
        assert!(same(&decision, &free));
        assert!(!same(&decision, &pro));
    }
}
