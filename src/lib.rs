//! TDLS auto-mode controller: a heuristic supervisor deciding when a
//! wireless station should open, keep, or tear down a direct peer-to-peer
//! (TDLS) link.
//!
//! The crate is split into two layers:
//!
//! - [`engine`]: the Peer Registry & State Machine (PRSM), which owns the
//!   peer table and all policy: connect/teardown thresholds, fast/slow
//!   discovery cycles, RSSI and throughput hysteresis.
//! - [`glue`]: Supplicant Glue (SG), a thin gate in front of PRSM with a
//!   master enable switch and no policy of its own.
//!
//! Both depend on a driver-provided [`capability::TdlsCapabilities`]
//! implementation, and operate over peers identified by [`addr::MacAddr`].

pub mod addr;
pub mod capability;
pub mod config;
pub mod engine;
pub mod glue;
pub mod peer;
pub mod rate;
pub mod registry;

pub use addr::MacAddr;
pub use capability::{CapabilityError, TdlsCapabilities};
pub use config::{ConfigError, PrsmConfig};
pub use engine::{EngineError, Prsm};
pub use glue::SupplicantGlue;
pub use registry::RegistryStats;
