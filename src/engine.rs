//! The Peer Registry & State Machine engine.
//!
//! `Prsm` owns the registry and the four periodic timers. Every public
//! operation takes the same [`tokio::sync::Mutex`], serializing mutation the
//! way a single-threaded eloop callback would: each call runs to completion
//! before the next one observes the registry. The one documented exception is
//! `disconnect`: some drivers call it and re-enter `disconnected` before it
//! returns, so every call site releases the lock before invoking it.

use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use tokio::sync::Mutex as TokioMutex;
use tokio::task::JoinHandle;

use crate::addr::MacAddr;
use crate::capability::{CapabilityError, TdlsCapabilities};
use crate::config::{PrsmConfig, MAX_FAST_CONN_ATTEMPTS};
use crate::peer::Peer;
use crate::rate::sample_rate;
use crate::registry::{Registry, RegistryStats};

/// Errors a PRSM operation can surface to its caller. Only `start` can fail;
/// every other entry point logs and proceeds, matching the original's
/// "best-effort, the next tick retries" design.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

#[derive(Default)]
struct TimerHandles {
    fast_connect: Option<JoinHandle<()>>,
    slow_connect: Option<JoinHandle<()>>,
    data_teardown: Option<JoinHandle<()>>,
    rssi_teardown: Option<JoinHandle<()>>,
}

impl TimerHandles {
    fn abort_all(&mut self) {
        for handle in [
            self.fast_connect.take(),
            self.slow_connect.take(),
            self.data_teardown.take(),
            self.rssi_teardown.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
    }
}

/// The auto-mode controller (PRSM). Construct with [`Prsm::new`] and drive it
/// with the event entry points; drop the returned `Arc` (after [`Prsm::deinit`])
/// to tear everything down.
pub struct Prsm<C: TdlsCapabilities + 'static> {
    config: PrsmConfig,
    capability: Arc<C>,
    state: TokioMutex<Registry>,
    timers: StdMutex<TimerHandles>,
}

impl<C: TdlsCapabilities + 'static> Prsm<C> {
    /// Validate `config` and construct a fresh, empty controller.
    pub fn new(capability: C, config: PrsmConfig) -> Result<Arc<Self>, crate::config::ConfigError> {
        Self::with_capability(Arc::new(capability), config)
    }

    /// Like [`Prsm::new`], but takes a capability the caller already holds an
    /// `Arc` to (useful for tests that need to inspect the double after
    /// construction).
    pub fn with_capability(
        capability: Arc<C>,
        config: PrsmConfig,
    ) -> Result<Arc<Self>, crate::config::ConfigError> {
        config.validate()?;
        Ok(Arc::new(Self {
            config,
            capability,
            state: TokioMutex::new(Registry::new()),
            timers: StdMutex::new(TimerHandles::default()),
        }))
    }

    pub fn config(&self) -> &PrsmConfig {
        &self.config
    }

    /// Snapshot of the registry's current composition.
    pub async fn stats(&self) -> RegistryStats {
        self.state.lock().await.stats()
    }

    /// Begin tracking `addr` as a candidate for outgoing TDLS setup.
    pub async fn start(self: &Arc<Self>, addr: MacAddr) -> Result<(), EngineError> {
        let mut guard = self.state.lock().await;
        if guard.contains(&addr) {
            tracing::debug!(%addr, "start: already tracked, no-op");
            return Ok(());
        }

        // A stale accounting entry may remain from a previous session;
        // disable it before enabling, matching the original's add-peer order.
        self.capability.monitor_traffic(addr, false).await;
        let status = self.capability.monitor_traffic(addr, true).await;
        if status != 0 {
            tracing::error!(%addr, status, "start: driver refused to enable traffic accounting");
            return Err(EngineError::Capability(CapabilityError::DriverRejected {
                addr,
                status,
            }));
        }

        guard.insert(Peer::new_outgoing(addr));
        let peer_count = guard.peer_count();
        drop(guard);

        self.arm_fast_connect();
        if peer_count == 1 {
            self.arm_slow_connect();
        }

        tracing::info!(%addr, peer_count, "start: tracking peer for auto-mode");
        Ok(())
    }

    /// Stop tracking `addr`, tearing down an active link first if necessary.
    pub async fn stop(self: &Arc<Self>, addr: MacAddr) {
        let mut guard = self.state.lock().await;
        let Some(peer) = guard.get_mut(&addr) else {
            tracing::debug!(%addr, "stop: unknown peer");
            return;
        };

        if peer.connected {
            // Load-bearing: clear before calling disconnect, so a driver that
            // synchronously re-enters via `disconnected` sees this peer as
            // outgoing rather than incoming, and does not recursively call
            // back into `stop` for the entry we are already tearing down.
            peer.incoming_peer = false;
            drop(guard);
            self.capability.disconnect(addr).await;
            guard = self.state.lock().await;
        }

        guard.remove(&addr);
        let peer_count = guard.peer_count();
        drop(guard);

        self.capability.monitor_traffic(addr, false).await;

        if peer_count == 0 {
            self.cancel_fast_connect();
            self.cancel_slow_connect();
        }

        tracing::info!(%addr, peer_count, "stop: no longer tracking peer");
    }

    /// A peer finished (re)connecting, whether we initiated it or the remote
    /// side did. An unknown address is created as an incoming peer, which
    /// mirrors `start`'s side effects for that fresh entry: traffic
    /// accounting is enabled (aborting the insertion if the driver refuses),
    /// and the fast-connect timer is armed, with slow-connect armed too on
    /// the first peer ever inserted.
    pub async fn connected(self: &Arc<Self>, addr: MacAddr) {
        let now = Instant::now();
        let conn_peer_count;
        let mut newly_inserted_peer_count = None;
        {
            let mut guard = self.state.lock().await;
            let is_new = !guard.contains(&addr);

            if is_new {
                self.capability.monitor_traffic(addr, false).await;
                let status = self.capability.monitor_traffic(addr, true).await;
                if status != 0 {
                    tracing::error!(
                        %addr,
                        status,
                        "connected: driver refused to enable traffic accounting for incoming peer"
                    );
                    return;
                }
            }

            guard.apply_connected_event(addr);
            if let Some(peer) = guard.get_mut(&addr) {
                sample_rate(peer, self.capability.as_ref(), now).await;
            }
            conn_peer_count = guard.conn_peer_count();
            if is_new {
                newly_inserted_peer_count = Some(guard.peer_count());
            }
        }

        tracing::debug!(%addr, conn_peer_count, "connected: peer is now connected");

        self.arm_data_teardown();
        if conn_peer_count == 1 {
            self.arm_rssi_teardown();
        }

        if let Some(peer_count) = newly_inserted_peer_count {
            self.arm_fast_connect();
            if peer_count == 1 {
                self.arm_slow_connect();
            }
        }
    }

    /// A peer's link went down.
    pub async fn disconnected(self: &Arc<Self>, addr: MacAddr) {
        enum Next {
            Unknown,
            RemoveIncoming,
            Reconnect,
        }

        let next = {
            let mut guard = self.state.lock().await;
            if !guard.contains(&addr) {
                Next::Unknown
            } else {
                guard.mark_disconnected(&addr);
                let peer = guard.get_mut(&addr).expect("just checked contains");
                if peer.incoming_peer {
                    Next::RemoveIncoming
                } else {
                    peer.reset_reconnect_counters();
                    Next::Reconnect
                }
            }
        };

        match next {
            Next::Unknown => {
                tracing::debug!(%addr, "disconnected: unknown peer");
            }
            Next::RemoveIncoming => {
                tracing::debug!(%addr, "disconnected: incoming peer, removing");
                self.stop(addr).await;
            }
            Next::Reconnect => {
                tracing::debug!(%addr, "disconnected: outgoing peer, arming fast reconnect");
                self.arm_fast_connect();
            }
        }
    }

    /// A discovery probe response arrived with the given RSSI.
    pub async fn discovery_response(self: &Arc<Self>, addr: MacAddr, rssi: i32) {
        let should_connect;
        {
            let now = Instant::now();
            let mut guard = self.state.lock().await;
            let Some(peer) = guard.get_mut(&addr) else {
                tracing::debug!(%addr, "discovery_response: unknown peer, dropping");
                return;
            };

            peer.rssi = rssi;

            if peer.connected {
                tracing::error!(%addr, "discovery_response: peer already connected, dropping");
                return;
            }

            if peer.rssi <= self.config.rssi_connect_threshold {
                tracing::debug!(%addr, rssi, "discovery_response: rssi at or below connect threshold");
                return;
            }

            sample_rate(peer, self.capability.as_ref(), now).await;
            if peer.data_rate < self.config.data_connect_threshold {
                tracing::debug!(%addr, rate = peer.data_rate, "discovery_response: data rate below connect threshold");
                return;
            }

            if guard.conn_peer_count() >= self.config.max_connected_peers {
                tracing::debug!(%addr, "discovery_response: max connected peers reached, dropping");
                return;
            }

            should_connect = true;
        }

        if should_connect {
            let status = self.capability.connect(addr).await;
            tracing::debug!(%addr, status, "discovery_response: issuing connect");
        }
    }

    /// Drop every tracked peer. When `kill_active_links` is false, connected
    /// peers are marked disconnected first so the subsequent `stop` does not
    /// issue a real teardown.
    pub async fn remove_all(self: &Arc<Self>, kill_active_links: bool) {
        let addrs = {
            let mut guard = self.state.lock().await;
            if !kill_active_links {
                for addr in guard.addrs() {
                    guard.mark_disconnected(&addr);
                }
            }
            guard.addrs()
        };

        for addr in addrs {
            self.stop(addr).await;
        }
    }

    /// Tear down every tracked peer and stop all timers.
    pub async fn deinit(self: &Arc<Self>) {
        self.remove_all(false).await;
        self.timers.lock().unwrap().abort_all();
    }

    // -- timer plumbing -----------------------------------------------------

    fn arm_fast_connect(self: &Arc<Self>) {
        let handle = tokio::spawn(Self::run_loop(
            self.clone(),
            |s| s.config.fast_connect_period,
            Self::fast_connect_pass,
        ));
        if let Some(old) = self.timers.lock().unwrap().fast_connect.replace(handle) {
            old.abort();
        }
    }

    fn cancel_fast_connect(&self) {
        if let Some(old) = self.timers.lock().unwrap().fast_connect.take() {
            old.abort();
        }
    }

    fn arm_slow_connect(self: &Arc<Self>) {
        let handle = tokio::spawn(Self::run_loop(
            self.clone(),
            |s| s.config.slow_connect_period,
            Self::slow_connect_pass,
        ));
        if let Some(old) = self.timers.lock().unwrap().slow_connect.replace(handle) {
            old.abort();
        }
    }

    fn cancel_slow_connect(&self) {
        if let Some(old) = self.timers.lock().unwrap().slow_connect.take() {
            old.abort();
        }
    }

    fn arm_data_teardown(self: &Arc<Self>) {
        let handle = tokio::spawn(Self::run_loop(
            self.clone(),
            |s| s.config.data_teardown_period,
            Self::data_teardown_pass,
        ));
        if let Some(old) = self.timers.lock().unwrap().data_teardown.replace(handle) {
            old.abort();
        }
    }

    fn arm_rssi_teardown(self: &Arc<Self>) {
        let handle = tokio::spawn(Self::run_loop(
            self.clone(),
            |s| s.config.rssi_teardown_period,
            Self::rssi_teardown_pass,
        ));
        if let Some(old) = self.timers.lock().unwrap().rssi_teardown.replace(handle) {
            old.abort();
        }
    }

    /// A self-rearming timer: sleep for `period(self)`, run one `pass`, and
    /// keep looping as long as `pass` reports there is still work to watch.
    /// "Arming" a timer (the `arm_*` methods above) means aborting whatever
    /// instance of this loop is currently running for that slot and spawning
    /// a fresh one, which restarts the sleep from zero.
    async fn run_loop<Period, Pass, Fut>(self: Arc<Self>, period: Period, pass: Pass)
    where
        Period: Fn(&Self) -> std::time::Duration,
        Pass: Fn(Arc<Self>) -> Fut,
        Fut: Future<Output = bool>,
    {
        loop {
            tokio::time::sleep(period(&self)).await;
            if !pass(self.clone()).await {
                break;
            }
        }
    }

    // -- timer passes ---------------------------------------------------
    //
    // Each pass takes a lock only around a single peer's check (including
    // the read-only rate/rssi sample), then releases it before issuing any
    // driver call that can mutate the registry (`connect`, `disconnect`,
    // `send_discovery`). `disconnect` in particular may re-enter PRSM
    // synchronously, and holding the lock across it would deadlock the
    // reentrant call.

    async fn fast_connect_pass(self: Arc<Self>) -> bool {
        let now = Instant::now();
        let addrs = self.state.lock().await.addrs();
        let mut peer_in_fast_connect = false;

        for addr in addrs {
            let should_discover = {
                let mut guard = self.state.lock().await;
                match guard.get_mut(&addr) {
                    Some(peer) if !peer.connected && peer.fast_attempts <= MAX_FAST_CONN_ATTEMPTS => {
                        peer.fast_attempts += 1;
                        peer_in_fast_connect = true;
                        sample_rate(peer, self.capability.as_ref(), now).await;
                        peer.data_rate >= self.config.data_connect_threshold
                    }
                    _ => false,
                }
            };
            if should_discover {
                self.capability.send_discovery(addr).await;
                tracing::trace!(%addr, "fast-connect: sent discovery");
            }
        }

        peer_in_fast_connect
    }

    async fn slow_connect_pass(self: Arc<Self>) -> bool {
        let now = Instant::now();
        let addrs = self.state.lock().await.addrs();

        for addr in addrs {
            let should_discover = {
                let mut guard = self.state.lock().await;
                match guard.get_mut(&addr) {
                    Some(peer) if !peer.connected && peer.fast_attempts > MAX_FAST_CONN_ATTEMPTS => {
                        sample_rate(peer, self.capability.as_ref(), now).await;
                        peer.data_rate >= self.config.data_connect_threshold
                    }
                    _ => false,
                }
            };
            if should_discover {
                self.capability.send_discovery(addr).await;
                tracing::trace!(%addr, "slow-connect: sent discovery");
            }
        }

        self.state.lock().await.peer_count() > 0
    }

    async fn data_teardown_pass(self: Arc<Self>) -> bool {
        let now = Instant::now();
        let addrs = self.state.lock().await.addrs();

        for addr in addrs {
            let should_disconnect = {
                let mut guard = self.state.lock().await;
                match guard.get_mut(&addr) {
                    Some(peer) if peer.connected => {
                        sample_rate(peer, self.capability.as_ref(), now).await;
                        peer.data_rate < self.config.data_teardown_threshold
                    }
                    _ => false,
                }
            };
            if should_disconnect {
                tracing::debug!(%addr, "data-teardown: rate below threshold, disconnecting");
                self.capability.disconnect(addr).await;
            }
        }

        self.state.lock().await.conn_peer_count() > 0
    }

    async fn rssi_teardown_pass(self: Arc<Self>) -> bool {
        let addrs = self.state.lock().await.addrs();

        for addr in addrs {
            let should_disconnect = {
                let mut guard = self.state.lock().await;
                match guard.get_mut(&addr) {
                    Some(peer) if peer.connected => {
                        let rssi = self.capability.get_rssi(addr).await;
                        peer.rssi = rssi;
                        if peer.rssi >= self.config.rssi_teardown_threshold {
                            peer.low_rssi_vals = 0;
                            false
                        } else {
                            peer.low_rssi_vals += 1;
                            tracing::debug!(
                                %addr,
                                rssi = peer.rssi,
                                count = peer.low_rssi_vals,
                                "rssi-teardown: bad sample"
                            );
                            let over = peer.low_rssi_vals > self.config.rssi_teardown_count;
                            if over {
                                peer.low_rssi_vals = 0;
                            }
                            over
                        }
                    }
                    _ => false,
                }
            };
            if should_disconnect {
                tracing::debug!(%addr, "rssi-teardown: disconnecting");
                self.capability.disconnect(addr).await;
            }
        }

        self.state.lock().await.conn_peer_count() > 0
    }
}
