//! The peer registry: a keyed collection plus the two incrementally
//! maintained counters.

use std::collections::HashMap;

use serde::Serialize;

use crate::addr::MacAddr;
use crate::peer::{Peer, PeerState};

/// Set of tracked peers, keyed by MAC address, with O(1) threshold checks.
#[derive(Debug, Default)]
pub struct Registry {
    peers: HashMap<MacAddr, Peer>,
    conn_peer_count: u32,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peer_count(&self) -> u32 {
        self.peers.len() as u32
    }

    pub fn conn_peer_count(&self) -> u32 {
        self.conn_peer_count
    }

    pub fn get(&self, addr: &MacAddr) -> Option<&Peer> {
        self.peers.get(addr)
    }

    pub fn get_mut(&mut self, addr: &MacAddr) -> Option<&mut Peer> {
        self.peers.get_mut(addr)
    }

    pub fn contains(&self, addr: &MacAddr) -> bool {
        self.peers.contains_key(addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    pub fn addrs(&self) -> Vec<MacAddr> {
        self.peers.keys().copied().collect()
    }

    /// Insert a freshly created peer. The caller is responsible for every
    /// side effect (driver accounting, timer arming) that must happen around
    /// the insertion; the registry itself is pure bookkeeping.
    pub fn insert(&mut self, peer: Peer) {
        if peer.connected {
            self.conn_peer_count += 1;
        }
        self.peers.insert(peer.addr, peer);
    }

    /// Remove and return a peer. Decrements `conn_peer_count` if it was
    /// connected at the moment of removal.
    pub fn remove(&mut self, addr: &MacAddr) -> Option<Peer> {
        let peer = self.peers.remove(addr)?;
        if peer.connected {
            self.conn_peer_count = self.conn_peer_count.saturating_sub(1);
        }
        Some(peer)
    }

    /// Apply a `connected(addr)` event: increments `conn_peer_count`
    /// unconditionally, mirroring the original's literal
    /// `ctx->conn_peer_count++` ahead of the existence check, creates an
    /// incoming peer if `addr` is unknown, and marks the peer connected.
    pub fn apply_connected_event(&mut self, addr: MacAddr) {
        self.conn_peer_count += 1;
        let peer = self
            .peers
            .entry(addr)
            .or_insert_with(|| Peer::new_incoming(addr));
        peer.connected = true;
    }

    /// Mark a peer disconnected, updating `conn_peer_count`. No-op if the
    /// peer is unknown or already disconnected.
    pub fn mark_disconnected(&mut self, addr: &MacAddr) {
        if let Some(peer) = self.peers.get_mut(addr) {
            if peer.connected {
                peer.connected = false;
                self.conn_peer_count = self.conn_peer_count.saturating_sub(1);
            }
        }
    }

    pub fn stats(&self) -> RegistryStats {
        let mut candidate_fast = 0;
        let mut candidate_slow = 0;
        let mut connected = 0;
        let mut incoming_connected = 0;
        for peer in self.peers.values() {
            match peer.state() {
                PeerState::CandidateFast => candidate_fast += 1,
                PeerState::CandidateSlow => candidate_slow += 1,
                PeerState::Connected => connected += 1,
                PeerState::IncomingConnected => incoming_connected += 1,
            }
        }
        RegistryStats {
            peer_count: self.peer_count(),
            conn_peer_count: self.conn_peer_count(),
            candidate_fast,
            candidate_slow,
            connected,
            incoming_connected,
        }
    }
}

/// Read-only snapshot of the registry's composition, for observability.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RegistryStats {
    pub peer_count: u32,
    pub conn_peer_count: u32,
    pub candidate_fast: u32,
    pub candidate_slow: u32,
    pub connected: u32,
    pub incoming_connected: u32,
}
