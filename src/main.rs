//! TDLS auto-mode controller demonstration
//!
//! Drives the PRSM engine against an in-memory capability double so the
//! auto-mode heuristics can be observed end to end without real radio
//! hardware.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use tdls_auto_mode::capability::RSSI_FAILURE_SENTINEL;
use tdls_auto_mode::{CapabilityError, MacAddr, PrsmConfig, SupplicantGlue, TdlsCapabilities};
use tracing::{error, info};

/// A capability double simulating a station whose throughput climbs steadily
/// and whose RSSI degrades after a handful of samples, so both the
/// connect-qualification and rssi-teardown paths fire during the run.
struct DemoCapability {
    started_at: Instant,
    rssi_samples: AtomicU32,
}

impl DemoCapability {
    fn new() -> Self {
        Self {
            started_at: Instant::now(),
            rssi_samples: AtomicU32::new(0),
        }
    }
}

#[async_trait::async_trait]
impl TdlsCapabilities for DemoCapability {
    async fn connect(&self, addr: MacAddr) -> i32 {
        info!(%addr, "📡 driver: issuing TDLS setup request");
        0
    }

    async fn disconnect(&self, addr: MacAddr) {
        info!(%addr, "📴 driver: tearing down TDLS link");
    }

    async fn send_discovery(&self, addr: MacAddr) {
        info!(%addr, "🔍 driver: sending TDLS discovery probe");
    }

    async fn get_rssi(&self, addr: MacAddr) -> i32 {
        let sample = self.rssi_samples.fetch_add(1, Ordering::SeqCst);
        let rssi = if sample < 2 { -55 } else { -90 };
        info!(%addr, rssi, "📶 driver: rssi sample");
        rssi
    }

    async fn monitor_traffic(&self, addr: MacAddr, add: bool) -> i32 {
        info!(%addr, add, "🧮 driver: toggling traffic accounting");
        0
    }

    async fn get_sta_bytes(&self, _addr: MacAddr) -> Result<(u32, u32), CapabilityError> {
        // a steady ~100 KB/s of combined traffic since the demo started.
        let elapsed_ms = self.started_at.elapsed().as_millis() as u32;
        let bytes = elapsed_ms.wrapping_mul(100);
        Ok((bytes, bytes))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    info!("🚀 Starting TDLS auto-mode controller demonstration...");
    info!(sentinel = RSSI_FAILURE_SENTINEL, "rssi failure sentinel");

    let capability = DemoCapability::new();
    let config = PrsmConfig {
        rssi_connect_threshold: -70,
        data_connect_threshold: 1_000,
        fast_connect_period: Duration::from_millis(200),
        slow_connect_period: Duration::from_secs(2),
        data_teardown_threshold: 500,
        data_teardown_period: Duration::from_secs(1),
        rssi_teardown_threshold: -80,
        rssi_teardown_period: Duration::from_millis(300),
        rssi_teardown_count: 1,
        max_connected_peers: 4,
    };

    let glue = match SupplicantGlue::new(capability, config) {
        Ok(glue) => glue,
        Err(e) => {
            error!("❌ invalid configuration: {e}");
            return Err(e.into());
        }
    };
    info!("✅ PRSM initialized and enabled");

    let peer: MacAddr = "aa:bb:cc:dd:ee:01".parse()?;

    info!("\n📝 Example 1: tracking a new peer as an outgoing candidate");
    glue.start(peer).await?;
    info!(stats = ?glue.stats().await, "registry after start()");

    info!("\n📶 Example 2: discovery responses promote a qualifying candidate");
    // first sample just seeds the byte counters, nothing to compare against yet.
    glue.discovery_response(peer, -50).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    glue.discovery_response(peer, -50).await;
    info!(stats = ?glue.stats().await, "registry after discovery_response()");

    info!("\n🔗 Example 3: driver reports the link came up");
    glue.connected(peer).await;
    info!(stats = ?glue.stats().await, "registry after connected()");

    info!("\n⏱️  Example 4: letting hysteresis timers run until rssi-teardown fires");
    tokio::time::sleep(Duration::from_secs(1)).await;
    info!(stats = ?glue.stats().await, "registry after timers ticked");

    info!("\n🧹 Example 5: tearing everything down");
    glue.deinit().await;
    let final_stats = serde_json::to_string(&glue.stats().await)?;
    info!(stats = %final_stats, "registry after deinit()");

    info!("\n🎉 TDLS auto-mode controller demonstration completed!");
    Ok(())
}
