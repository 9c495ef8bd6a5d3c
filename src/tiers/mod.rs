// Gateway module for tiers - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod features;
mod quota;
mod router;

// Public re-exports - the ONLY way to access tier functionality
pub use features::{feature, features, Feature};
pub use quota::{limits_for_tier, QuotaLimits, QuotaOverrides};
pub use router::{
    resolve_backend, RouteDecision, Tier, REASON_FREE_NOT_CONFIGURED, REASON_NOT_CONFIGURED,
    REASON_UNKNOWN_FEATURE,
};
