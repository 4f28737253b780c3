//! Supplicant Glue (SG): the thin gate between association-layer events and
//! PRSM.
//!
//! SG carries no policy of its own. It validates its own copy of the period
//! ordering at construction (mirroring `wpas_tdls_auto_init` in the original
//! glue, which performs this check independently of the controller it wraps),
//! exposes a master enable flag, and otherwise forwards every event straight
//! through to [`Prsm`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::addr::MacAddr;
use crate::capability::TdlsCapabilities;
use crate::config::{ConfigError, PrsmConfig};
use crate::engine::{EngineError, Prsm};
use crate::registry::RegistryStats;

/// Wraps a [`Prsm`] with a runtime enable/disable switch. While disabled,
/// every event is dropped; association-layer callers do not need to know
/// whether auto-mode is currently on.
pub struct SupplicantGlue<C: TdlsCapabilities + 'static> {
    engine: Arc<Prsm<C>>,
    enabled: AtomicBool,
}

impl<C: TdlsCapabilities + 'static> SupplicantGlue<C> {
    /// Validate `config` and build a controller around it, starting enabled.
    pub fn new(capability: C, config: PrsmConfig) -> Result<Arc<Self>, ConfigError> {
        // SG performs the same strict check PRSM does; `Prsm::new` would
        // catch it anyway, but validating here first matches the original
        // glue layer owning its own copy of the rule.
        config.validate()?;
        let engine = Prsm::new(capability, config)?;
        Ok(Arc::new(Self {
            engine,
            enabled: AtomicBool::new(true),
        }))
    }

    /// Enable or disable auto-mode. Disabling does not tear down existing
    /// links or stop timers; it only gates new events from reaching PRSM.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        tracing::info!(enabled, "supplicant glue: auto-mode toggled");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub async fn stats(&self) -> RegistryStats {
        self.engine.stats().await
    }

    pub async fn start(self: &Arc<Self>, addr: MacAddr) -> Result<(), EngineError> {
        if !self.is_enabled() {
            return Ok(());
        }
        self.engine.start(addr).await
    }

    pub async fn stop(self: &Arc<Self>, addr: MacAddr) {
        if !self.is_enabled() {
            return;
        }
        self.engine.stop(addr).await;
    }

    pub async fn connected(self: &Arc<Self>, addr: MacAddr) {
        if !self.is_enabled() {
            return;
        }
        self.engine.connected(addr).await;
    }

    pub async fn disconnected(self: &Arc<Self>, addr: MacAddr) {
        if !self.is_enabled() {
            return;
        }
        self.engine.disconnected(addr).await;
    }

    pub async fn discovery_response(self: &Arc<Self>, addr: MacAddr, rssi: i32) {
        if !self.is_enabled() {
            return;
        }
        self.engine.discovery_response(addr, rssi).await;
    }

    /// Tolerates being called with no peers tracked (double-deinit is
    /// harmless; there's nothing to remove).
    pub async fn remove_all(self: &Arc<Self>, kill_active_links: bool) {
        self.engine.remove_all(kill_active_links).await;
    }

    pub async fn deinit(self: &Arc<Self>) {
        self.set_enabled(false);
        self.engine.deinit().await;
    }
}
