//! Capability interface PRSM consumes from the driver/supplicant layer.
//!
//! This mirrors `wpas_tdls_auto_ctx` in the original glue: every call is a
//! single self-contained request, PRSM holds no assumptions about how the
//! implementor talks to the radio.

use async_trait::async_trait;

use crate::addr::MacAddr;

/// RSSI sentinel returned by `get_rssi` on driver failure. Every meaningful
/// threshold configured in `PrsmConfig` is well above this value, so treating
/// it as a plain `i32` and letting ordinary comparisons apply is sufficient.
pub const RSSI_FAILURE_SENTINEL: i32 = -102;

/// Non-zero driver status codes. `0` always means success.
pub type DriverStatus = i32;

/// Errors a capability call can report back to PRSM.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("driver rejected the request for {addr} (status {status})")]
    DriverRejected { addr: MacAddr, status: DriverStatus },
}

/// The set of operations PRSM needs from the supplicant/driver stack.
///
/// Implementors talk to the radio; PRSM only calls these methods and reacts
/// to their return values. `connect`/`disconnect`/`send_discovery` failures
/// are logged by the caller and otherwise ignored (the next tick retries).
#[async_trait]
pub trait TdlsCapabilities: Send + Sync {
    /// Request TDLS setup to `addr`. The actual handshake proceeds
    /// out-of-band; success here just means the request was accepted.
    async fn connect(&self, addr: MacAddr) -> DriverStatus;

    /// Request TDLS teardown of `addr`. May synchronously re-enter PRSM via
    /// `disconnected` on some drivers; callers must tolerate reentrancy.
    async fn disconnect(&self, addr: MacAddr);

    /// Fire-and-forget TDLS discovery probe.
    async fn send_discovery(&self, addr: MacAddr);

    /// Current RSSI of a connected peer, in dBm. Returns
    /// [`RSSI_FAILURE_SENTINEL`] on driver failure.
    async fn get_rssi(&self, addr: MacAddr) -> i32;

    /// Enable (`add = true`) or disable (`add = false`) driver-side byte
    /// accounting for `addr`. A non-zero return from an enabling call is
    /// fatal to peer creation.
    async fn monitor_traffic(&self, addr: MacAddr, add: bool) -> DriverStatus;

    /// Cumulative tx/rx byte counters for `addr`. `Err` means the read
    /// failed and the caller should treat the current rate sample as zero.
    async fn get_sta_bytes(&self, addr: MacAddr) -> Result<(u32, u32), CapabilityError>;
}
