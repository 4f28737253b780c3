//! Flat configuration record consumed by the PRSM engine.
//!
//! The configuration loader itself is an external collaborator; this module
//! only defines the shape of the record and the one validation rule PRSM
//! enforces at construction time.

use std::time::Duration;

/// Initial fast-connect attempts per peer before handing off to the slow cycle.
pub const MAX_FAST_CONN_ATTEMPTS: u32 = 20;

/// Minimum time between two rate samples of the same peer.
pub const MIN_SAMPLE_TIME_DIFF: Duration = Duration::from_millis(100);

/// Configuration for the PRSM engine, fixed for the lifetime of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrsmConfig {
    /// Discovery response with RSSI <= this is ignored for connection.
    pub rssi_connect_threshold: i32,
    /// Candidate must have combined traffic >= this to be discovered/connected (bps).
    pub data_connect_threshold: u64,
    /// Tick of the fast-cycle timer.
    pub fast_connect_period: Duration,
    /// Tick of the slow-cycle timer. Must be strictly greater than `fast_connect_period`.
    pub slow_connect_period: Duration,
    /// Connected peer with rate below this is torn down (bps).
    pub data_teardown_threshold: u64,
    /// Tick of the data-teardown timer.
    pub data_teardown_period: Duration,
    /// Connected peer with rssi below this counts as a bad sample.
    pub rssi_teardown_threshold: i32,
    /// Tick of the rssi-teardown timer.
    pub rssi_teardown_period: Duration,
    /// Consecutive bad RSSI samples strictly greater than this trigger teardown.
    pub rssi_teardown_count: u32,
    /// Upper bound on the number of simultaneously connected peers.
    pub max_connected_peers: u32,
}

/// Configuration-invalid errors, detected once at construction time.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "fast_connect_period ({fast:?}) must be strictly less than slow_connect_period ({slow:?})"
    )]
    FastNotBeforeSlow { fast: Duration, slow: Duration },
}

impl PrsmConfig {
    /// Validate the one invariant PRSM enforces at init: the fast cycle must
    /// be strictly faster than the slow cycle. Fails init otherwise.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fast_connect_period >= self.slow_connect_period {
            return Err(ConfigError::FastNotBeforeSlow {
                fast: self.fast_connect_period,
                slow: self.slow_connect_period,
            });
        }
        Ok(())
    }
}
