//! End-to-end scenarios for the TDLS auto-mode controller.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tdls_auto_mode::{CapabilityError, MacAddr, Prsm, PrsmConfig, TdlsCapabilities};

#[derive(Default)]
struct ScriptedCapability {
    bytes: Mutex<HashMap<MacAddr, (u32, u32)>>,
    rssi: Mutex<HashMap<MacAddr, i32>>,
    connect_calls: Mutex<Vec<MacAddr>>,
    disconnect_calls: Mutex<Vec<MacAddr>>,
}

impl ScriptedCapability {
    fn set_bytes(&self, addr: MacAddr, tx: u32, rx: u32) {
        self.bytes.lock().unwrap().insert(addr, (tx, rx));
    }

    fn set_rssi(&self, addr: MacAddr, rssi: i32) {
        self.rssi.lock().unwrap().insert(addr, rssi);
    }

    fn connects(&self) -> Vec<MacAddr> {
        self.connect_calls.lock().unwrap().clone()
    }

    fn disconnects(&self) -> Vec<MacAddr> {
        self.disconnect_calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TdlsCapabilities for ScriptedCapability {
    async fn connect(&self, addr: MacAddr) -> i32 {
        self.connect_calls.lock().unwrap().push(addr);
        0
    }

    async fn disconnect(&self, addr: MacAddr) {
        self.disconnect_calls.lock().unwrap().push(addr);
    }

    async fn send_discovery(&self, _addr: MacAddr) {}

    async fn get_rssi(&self, addr: MacAddr) -> i32 {
        *self
            .rssi
            .lock()
            .unwrap()
            .get(&addr)
            .unwrap_or(&tdls_auto_mode::capability::RSSI_FAILURE_SENTINEL)
    }

    async fn monitor_traffic(&self, _addr: MacAddr, _add: bool) -> i32 {
        0
    }

    async fn get_sta_bytes(&self, addr: MacAddr) -> Result<(u32, u32), CapabilityError> {
        Ok(*self.bytes.lock().unwrap().get(&addr).unwrap_or(&(0, 0)))
    }
}

fn addr(n: u8) -> MacAddr {
    MacAddr::new([0xaa, 0xbb, 0xcc, 0, 0, n])
}

fn scenario_config() -> PrsmConfig {
    PrsmConfig {
        rssi_connect_threshold: -70,
        data_connect_threshold: 1_000,
        fast_connect_period: Duration::from_millis(40),
        slow_connect_period: Duration::from_millis(400),
        data_teardown_threshold: 500,
        data_teardown_period: Duration::from_millis(40),
        rssi_teardown_threshold: -75,
        rssi_teardown_period: Duration::from_millis(40),
        rssi_teardown_count: 1,
        max_connected_peers: 1,
    }
}

// Scenario 1: a tracked candidate with healthy rssi and rising throughput
// is promoted to a connect request.
#[tokio::test]
async fn candidate_with_qualifying_signal_is_promoted() {
    let cap = std::sync::Arc::new(ScriptedCapability::default());
    let engine = Prsm::with_capability(cap.clone(), scenario_config()).unwrap();

    engine.start(addr(1)).await.unwrap();
    cap.set_bytes(addr(1), 0, 0);
    engine.discovery_response(addr(1), -50).await;
    assert!(cap.connects().is_empty(), "first sample only seeds counters");

    cap.set_bytes(addr(1), 50_000, 50_000);
    tokio::time::sleep(Duration::from_millis(120)).await;
    engine.discovery_response(addr(1), -50).await;

    assert_eq!(cap.connects(), vec![addr(1)]);
}

// Scenario 2: an rssi sample at or below the connect threshold never
// qualifies, no matter how much traffic follows.
#[tokio::test]
async fn weak_rssi_candidate_is_never_promoted() {
    let cap = std::sync::Arc::new(ScriptedCapability::default());
    let engine = Prsm::with_capability(cap.clone(), scenario_config()).unwrap();

    engine.start(addr(1)).await.unwrap();
    cap.set_bytes(addr(1), 50_000, 50_000);
    engine.discovery_response(addr(1), -70).await;
    engine.discovery_response(addr(1), -71).await;

    assert!(cap.connects().is_empty());
}

// Scenario 3: an incoming peer (remote-initiated) is fully cleaned up once
// it disconnects; no reconnect candidacy survives it.
#[tokio::test]
async fn incoming_peer_disconnect_fully_removes_entry() {
    let cap = std::sync::Arc::new(ScriptedCapability::default());
    let engine = Prsm::with_capability(cap.clone(), scenario_config()).unwrap();

    engine.connected(addr(7)).await;
    assert_eq!(engine.stats().await.peer_count, 1);

    engine.disconnected(addr(7)).await;
    let stats = engine.stats().await;
    assert_eq!(stats.peer_count, 0);
    assert_eq!(stats.conn_peer_count, 0);
}

// Scenario 4: max_connected_peers caps further discovery-driven connects,
// even for an otherwise fully-qualifying candidate.
#[tokio::test]
async fn max_connected_peers_blocks_further_connects() {
    let cap = std::sync::Arc::new(ScriptedCapability::default());
    let engine = Prsm::with_capability(cap.clone(), scenario_config()).unwrap();

    // scenario_config caps max_connected_peers at 1.
    engine.connected(addr(1)).await;

    engine.start(addr(2)).await.unwrap();
    cap.set_bytes(addr(2), 50_000, 50_000);
    tokio::time::sleep(Duration::from_millis(120)).await;
    engine.discovery_response(addr(2), -50).await;

    assert!(cap.connects().is_empty());
}

// Scenario 5: a candidate that exhausts its fast-connect attempts without
// qualifying falls into the slow-connect cohort, but stays a candidate.
#[tokio::test]
async fn exhausted_fast_attempts_falls_back_to_slow_cycle() {
    let cap = std::sync::Arc::new(ScriptedCapability::default());
    let engine = Prsm::with_capability(cap.clone(), scenario_config()).unwrap();

    engine.start(addr(1)).await.unwrap();
    // let several fast-connect ticks elapse without ever giving it traffic.
    tokio::time::sleep(Duration::from_millis(40 * 25)).await;

    let stats = engine.stats().await;
    assert_eq!(stats.peer_count, 1);
    assert_eq!(stats.candidate_slow, 1);
    assert_eq!(stats.candidate_fast, 0);
}

// Scenario 6: configuration with a non-strict fast/slow period ordering is
// rejected outright, before any peer can ever be tracked.
#[tokio::test]
async fn equal_periods_reject_construction() {
    let mut cfg = scenario_config();
    cfg.slow_connect_period = cfg.fast_connect_period;
    let result = Prsm::new(ScriptedCapability::default(), cfg);
    assert!(result.is_err());
}

// Invariant: conn_peer_count never exceeds peer_count.
#[tokio::test]
async fn conn_peer_count_never_exceeds_peer_count() {
    let cap = std::sync::Arc::new(ScriptedCapability::default());
    let engine = Prsm::with_capability(cap.clone(), scenario_config()).unwrap();

    engine.connected(addr(1)).await;
    engine.connected(addr(2)).await;
    let stats = engine.stats().await;
    assert!(stats.conn_peer_count <= stats.peer_count);
}

// A bad rssi driver read (the failure sentinel) degrades a connected peer
// toward teardown just like a genuinely low reading.
#[tokio::test]
async fn rssi_teardown_triggers_on_repeated_failure_sentinel() {
    let cap = std::sync::Arc::new(ScriptedCapability::default());
    let engine = Prsm::with_capability(cap.clone(), scenario_config()).unwrap();

    engine.connected(addr(3)).await;
    // no rssi entry seeded -> get_rssi returns RSSI_FAILURE_SENTINEL every tick.
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(cap.disconnects().contains(&addr(3)));
}

// `remove_all(false)` does not issue driver teardowns for links it clears.
#[tokio::test]
async fn remove_all_false_is_silent_to_the_driver() {
    let cap = std::sync::Arc::new(ScriptedCapability::default());
    let engine = Prsm::with_capability(cap.clone(), scenario_config()).unwrap();

    engine.connected(addr(1)).await;
    engine.remove_all(false).await;

    assert_eq!(engine.stats().await.peer_count, 0);
    assert!(cap.disconnects().is_empty());
}
