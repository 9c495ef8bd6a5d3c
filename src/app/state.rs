use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use super::config::{free_backend_config, resolve_config, AiSettings};
use crate::models::{Backend, BackendFactory};
use crate::tiers::{limits_for_tier, resolve_backend, QuotaLimits, RouteDecision, Tier};
use crate::utils::ConfigError;

/// Process-wide coach state: the pro and free backend singletons.
///
/// Built once before traffic starts. Only `reconfigure` replaces the pro
/// backend; request handlers only read.
pub struct CoachState {
    settings: AiSettings,
    pro: RwLock<Option<Arc<dyn Backend>>>,
    free: Option<Arc<dyn Backend>>,
}

impl CoachState {
    /// Resolve and construct both backends. Config errors abort startup.
    pub fn from_settings(
        persisted: Option<&HashMap<String, String>>,
        settings: AiSettings,
    ) -> Result<Self, ConfigError> {
        let pro = BackendFactory::create(resolve_config(persisted, &settings).as_ref())?;
        let free = BackendFactory::create(free_backend_config(&settings).as_ref())?;

        if pro.is_none() {
            info!("No pro AI backend configured");
        }
        if free.is_none() {
            info!("No free-tier AI backend configured");
        }

        Ok(Self {
            settings,
            pro: RwLock::new(pro),
            free,
        })
    }

    /// Assemble state from already-built backends
    pub fn with_backends(
        settings: AiSettings,
        pro: Option<Arc<dyn Backend>>,
        free: Option<Arc<dyn Backend>>,
    ) -> Self {
        Self {
            settings,
            pro: RwLock::new(pro),
            free,
        }
    }

    pub fn pro_backend(&self) -> Option<Arc<dyn Backend>> {
        self.pro.read().clone()
    }

    pub fn free_backend(&self) -> Option<Arc<dyn Backend>> {
        self.free.clone()
    }

    pub fn settings(&self) -> &AiSettings {
        &self.settings
    }

    /// Route one request for `tier` and `feature`
    pub fn route(&self, tier: Tier, feature: &str) -> RouteDecision {
        resolve_backend(tier, feature, self.pro_backend(), self.free_backend())
    }

    /// Quota ceilings for `tier`
    pub fn limits(&self, tier: Tier) -> QuotaLimits {
        limits_for_tier(tier, &self.settings.quota_overrides())
    }

    /// Operator action: rebuild the pro backend from new persisted settings.
    /// On error the current backend stays in place.
    pub fn reconfigure(&self, persisted: Option<&HashMap<String, String>>) -> Result<(), ConfigError> {
        let backend = BackendFactory::create(resolve_config(persisted, &self.settings).as_ref())?;
        info!(
            "Pro AI backend reconfigured: {}",
            backend
                .as_ref()
                .map(|b| format!("{}/{}", b.provider(), b.model()))
                .unwrap_or_else(|| "none".to_string())
        );
        *self.pro.write() = backend;
        Ok(())
    }
}
