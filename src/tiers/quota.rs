use serde::{Deserialize, Serialize};

use super::router::Tier;
use crate::constants::{FREE_DAILY_LIMIT, FREE_MONTHLY_LIMIT, PRO_DAILY_LIMIT, PRO_MONTHLY_LIMIT};

/// Call ceilings for a tier. Counting and enforcement live in the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaLimits {
    pub daily: u32,
    pub monthly: u32,
}

/// Optional per-ceiling overrides from process configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaOverrides {
    pub free_daily_limit: Option<u32>,
    pub free_monthly_limit: Option<u32>,
    pub pro_daily_limit: Option<u32>,
    pub pro_monthly_limit: Option<u32>,
}

pub fn limits_for_tier(tier: Tier, overrides: &QuotaOverrides) -> QuotaLimits {
    match tier {
        Tier::Free => QuotaLimits {
            daily: overrides.free_daily_limit.unwrap_or(FREE_DAILY_LIMIT),
            monthly: overrides.free_monthly_limit.unwrap_or(FREE_MONTHLY_LIMIT),
        },
        Tier::Pro => QuotaLimits {
            daily: overrides.pro_daily_limit.unwrap_or(PRO_DAILY_LIMIT),
            monthly: overrides.pro_monthly_limit.unwrap_or(PRO_MONTHLY_LIMIT),
        },
    }
}
