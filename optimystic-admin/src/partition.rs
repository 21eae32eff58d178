//! Partition detector: per-peer failure/goodbye counters,
//! advisory to whoever consumes `detect_partition`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use optimystic_base::PeerId;

const UNREACHABLE_AT_FAILURES: u32 = 3;
const RAPID_CHURN_THRESHOLD: usize = 5;
const RAPID_CHURN_WINDOW: Duration = Duration::from_secs(10);
const PEER_RECORD_TIMEOUT: Duration = Duration::from_secs(60);

struct PeerRecord {
    last_seen: Instant,
    last_goodbye: Option<Instant>,
    last_failure: Option<Instant>,
    consecutive_failures: u32,
}

/// Tracks peer reachability and raises an advisory partition signal when
/// enough distinct peers look unreachable or have recently said goodbye.
pub struct PartitionSensor {
    peers: HashMap<PeerId, PeerRecord>,
}

impl Default for PartitionSensor {
    fn default() -> Self {
        PartitionSensor { peers: HashMap::new() }
    }
}

impl PartitionSensor {
    pub fn new() -> Self {
        Self::default()
    }

    fn prune_expired(&mut self, now: Instant) {
        self.peers.retain(|_, r| now.duration_since(r.last_seen) < PEER_RECORD_TIMEOUT);
    }

    pub fn record_success(&mut self, peer_id: PeerId) {
        let now = Instant::now();
        self.prune_expired(now);
        let record = self.peers.entry(peer_id).or_insert_with(|| PeerRecord {
            last_seen: now,
            last_goodbye: None,
            last_failure: None,
            consecutive_failures: 0,
        });
        record.last_seen = now;
        record.consecutive_failures = 0;
        record.last_failure = None;
    }

    pub fn record_failure(&mut self, peer_id: PeerId) {
        let now = Instant::now();
        let record = self.peers.entry(peer_id).or_insert_with(|| PeerRecord {
            last_seen: now,
            last_goodbye: None,
            last_failure: None,
            consecutive_failures: 0,
        });
        record.consecutive_failures += 1;
        record.last_failure = Some(now);
    }

    pub fn record_goodbye(&mut self, peer_id: PeerId) {
        let now = Instant::now();
        let record = self.peers.entry(peer_id).or_insert_with(|| PeerRecord {
            last_seen: now,
            last_goodbye: None,
            last_failure: None,
            consecutive_failures: 0,
        });
        record.last_goodbye = Some(now);
    }

    /// `true` if 5 or more distinct peers are unreachable (≥3 consecutive
    /// failures, the most recent one within the rapid-churn window)
    /// without having said goodbye more recently than that failure. A
    /// goodbye excludes a peer from this count entirely rather than
    /// moving it to a second bucket: that's the only reading that
    /// matches both "goodbye'd peers don't count" and a goodbye
    /// reversing an already-tripped signal; counting goodbye'd peers
    /// separately would leave the total unchanged and the signal would
    /// never flip back to false. Bounding to the window keeps this a
    /// reading of current churn rather than an all-time tally: a peer
    /// whose failures are stale just hasn't been retried yet, not proof
    /// of an ongoing partition.
    pub fn detect_partition(&self) -> bool {
        let now = Instant::now();
        self.peers
            .values()
            .filter(|r| {
                r.consecutive_failures >= UNREACHABLE_AT_FAILURES
                    && r.last_failure
                        .is_some_and(|t| now.duration_since(t) < RAPID_CHURN_WINDOW)
                    && match (r.last_goodbye, r.last_failure) {
                        (Some(goodbye), Some(failure)) => goodbye < failure,
                        (Some(_), None) => false,
                        (None, _) => true,
                    }
            })
            .count()
            >= RAPID_CHURN_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(i: usize) -> PeerId {
        PeerId::from(format!("p{i}").as_str())
    }

    #[test]
    fn no_signal_below_threshold() {
        let mut sensor = PartitionSensor::new();
        for i in 0..4 {
            for _ in 0..3 {
                sensor.record_failure(peer(i));
            }
        }
        assert!(!sensor.detect_partition());
    }

    #[test]
    fn five_unreachable_peers_trip_the_signal() {
        let mut sensor = PartitionSensor::new();
        for i in 0..5 {
            for _ in 0..3 {
                sensor.record_failure(peer(i));
            }
        }
        assert!(sensor.detect_partition());
    }

    #[test]
    fn goodbye_excludes_a_peer_from_the_unreachable_count() {
        let mut sensor = PartitionSensor::new();
        for i in 0..5 {
            for _ in 0..3 {
                sensor.record_failure(peer(i));
            }
        }
        assert!(sensor.detect_partition());
        sensor.record_goodbye(peer(0));
        assert!(!sensor.detect_partition());
    }

    #[test]
    fn success_resets_failures() {
        let mut sensor = PartitionSensor::new();
        for i in 0..5 {
            for _ in 0..3 {
                sensor.record_failure(peer(i));
            }
        }
        sensor.record_success(peer(0));
        assert!(!sensor.detect_partition());
    }
}
