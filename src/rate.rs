//! Throughput sampling: combined tx+rx rate per peer.

use std::time::Instant;

use crate::capability::TdlsCapabilities;
use crate::config::MIN_SAMPLE_TIME_DIFF;
use crate::peer::Peer;

/// Sample `peer`'s combined tx+rx throughput via `capability`, updating
/// `peer.data_rate` and the stored byte counters.
///
/// - First call after peer creation seeds the counters and leaves
///   `data_rate` at its prior value (0 for a fresh peer); no rate is
///   defined yet.
/// - A sample taken less than [`MIN_SAMPLE_TIME_DIFF`] after the previous one
///   is discarded outright: `data_rate` and the counters are left untouched.
/// - A failed driver read zeroes `data_rate` but does not touch the stored
///   counters (so the next successful sample still measures the delta since
///   the last genuine reading).
/// - The byte-counter subtraction is `u32` wrapping arithmetic: the counters
///   are 32-bit and may wrap once between samples, which this tolerates.
pub async fn sample_rate(peer: &mut Peer, capability: &dyn TdlsCapabilities, now: Instant) {
    let Some(last_query_time) = peer.last_query_time() else {
        let (tx, rx) = match capability.get_sta_bytes(peer.addr).await {
            Ok(counters) => counters,
            Err(_) => (0, 0),
        };
        peer.seed_counters(tx, rx, now);
        return;
    };

    let elapsed = now.saturating_duration_since(last_query_time);
    if elapsed < MIN_SAMPLE_TIME_DIFF {
        return;
    }

    let (last_tx_bytes, last_rx_bytes) = peer.counters();
    match capability.get_sta_bytes(peer.addr).await {
        Ok((tx_bytes, rx_bytes)) => {
            let delta_bytes =
                rx_bytes.wrapping_sub(last_rx_bytes) as u64 + tx_bytes.wrapping_sub(last_tx_bytes) as u64;
            let delta_msec = elapsed.as_millis().max(1) as u64;
            peer.data_rate = delta_bytes * 8 * 1000 / delta_msec;
            peer.seed_counters(tx_bytes, rx_bytes, now);
        }
        Err(_) => {
            peer.data_rate = 0;
        }
    }
}
