//! Admission control
//!
//! Tracks recent knocks per source address and holds the set of addresses
//! currently authorized to open a command session. Both live behind one
//! mutex so a knock completing and a command connection being gated for the
//! same address can never interleave inconsistently. Only atomic operations
//! are exposed; the containers never leave this module. Critical sections
//! are pure data-structure updates.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Sliding record of the most recent knocks from one address
struct KnockRecord {
    /// At most one slot per port of the configured sequence, oldest first
    knocks: VecDeque<u16>,
    /// When the previous knock from this address arrived
    last_knock: Instant,
}

#[derive(Default)]
struct AdmissionInner {
    /// Knock records by source address; grows with distinct addresses and
    /// is never pruned
    records: HashMap<IpAddr, KnockRecord>,
    /// Addresses holding an unconsumed session grant
    authorized: HashSet<IpAddr>,
}

/// Knock sequence tracker and authorization registry
pub struct AdmissionControl {
    sequence: Vec<u16>,
    timeout: Duration,
    inner: Mutex<AdmissionInner>,
}

impl AdmissionControl {
    /// Create admission control for the given knock sequence and per-gap
    /// timeout
    pub fn new(sequence: Vec<u16>, timeout: Duration) -> Self {
        Self {
            sequence,
            timeout,
            inner: Mutex::new(AdmissionInner::default()),
        }
    }

    /// Record a knock from `addr` on `port`.
    ///
    /// Returns true iff this knock completed the configured sequence, in
    /// which case the address is now authorized and its record is cleared.
    ///
    /// The timeout is measured against the previous knock from the same
    /// address, not against the start of the partial sequence: a sequence
    /// whose individual gaps each stay within the timeout may span any
    /// total duration.
    pub fn record_knock(&self, addr: IpAddr, port: u16) -> bool {
        let now = Instant::now();
        let reset;

        // The lock covers data updates only; logging happens after release
        let matched = {
            let mut inner = self.inner.lock().expect("admission state lock poisoned");

            let matched = {
                let record = inner.records.entry(addr).or_insert_with(|| KnockRecord {
                    knocks: VecDeque::with_capacity(self.sequence.len()),
                    last_knock: now,
                });

                reset = now.duration_since(record.last_knock) > self.timeout;
                if reset {
                    record.knocks.clear();
                }

                record.knocks.push_back(port);
                record.last_knock = now;

                // Keep only the last N knocks; ports outside the configured
                // sequence still consume window slots
                while record.knocks.len() > self.sequence.len() {
                    record.knocks.pop_front();
                }

                if record.knocks.iter().eq(self.sequence.iter()) {
                    record.knocks.clear();
                    true
                } else {
                    false
                }
            };

            if matched {
                inner.authorized.insert(addr);
            }

            matched
        };

        if reset {
            tracing::debug!("Knock timeout for {}, sequence reset", addr);
        }

        matched
    }

    /// Whether `addr` currently holds an unconsumed session grant
    pub fn is_authorized(&self, addr: IpAddr) -> bool {
        self.inner
            .lock()
            .expect("admission state lock poisoned")
            .authorized
            .contains(&addr)
    }

    /// Consume the grant for `addr`. Idempotent.
    pub fn revoke(&self, addr: IpAddr) {
        self.inner
            .lock()
            .expect("admission state lock poisoned")
            .authorized
            .remove(&addr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const SEQUENCE: [u16; 3] = [7000, 8000, 9000];

    fn addr(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn control(timeout: Duration) -> AdmissionControl {
        AdmissionControl::new(SEQUENCE.to_vec(), timeout)
    }

    #[test]
    fn exact_sequence_authorizes() {
        let control = control(Duration::from_secs(10));
        let a = addr(1);

        assert!(!control.record_knock(a, 7000));
        assert!(!control.record_knock(a, 8000));
        assert!(control.record_knock(a, 9000));
        assert!(control.is_authorized(a));
    }

    #[test]
    fn wrong_order_does_not_authorize() {
        let control = control(Duration::from_secs(10));
        let a = addr(1);

        assert!(!control.record_knock(a, 8000));
        assert!(!control.record_knock(a, 7000));
        assert!(!control.record_knock(a, 9000));
        assert!(!control.is_authorized(a));
    }

    #[test]
    fn foreign_ports_consume_window_slots() {
        let control = control(Duration::from_secs(10));
        let a = addr(1);

        control.record_knock(a, 7000);
        control.record_knock(a, 1234);
        control.record_knock(a, 8000);
        assert!(!control.record_knock(a, 9000));
        assert!(!control.is_authorized(a));

        // The window slides, so a clean run still gets through afterwards
        control.record_knock(a, 7000);
        control.record_knock(a, 8000);
        assert!(control.record_knock(a, 9000));
    }

    #[test]
    fn gap_beyond_timeout_resets_the_partial_sequence() {
        let control = control(Duration::from_millis(40));
        let a = addr(1);

        control.record_knock(a, 7000);
        control.record_knock(a, 8000);
        std::thread::sleep(Duration::from_millis(70));

        // The stale partial sequence is discarded before this knock lands
        assert!(!control.record_knock(a, 9000));
        assert!(!control.is_authorized(a));

        control.record_knock(a, 7000);
        control.record_knock(a, 8000);
        assert!(control.record_knock(a, 9000));
    }

    #[test]
    fn total_duration_is_unbounded_when_each_gap_is_within_timeout() {
        let control = control(Duration::from_millis(40));
        let a = addr(1);

        control.record_knock(a, 7000);
        std::thread::sleep(Duration::from_millis(25));
        control.record_knock(a, 8000);
        std::thread::sleep(Duration::from_millis(25));

        // Total elapsed exceeds the timeout; only per-gap spacing counts
        assert!(control.record_knock(a, 9000));
    }

    #[test]
    fn authorization_is_granted_once_and_revoked_once() {
        let control = control(Duration::from_secs(10));
        let a = addr(1);

        control.record_knock(a, 7000);
        control.record_knock(a, 8000);
        assert!(control.record_knock(a, 9000));
        assert!(control.is_authorized(a));

        control.revoke(a);
        assert!(!control.is_authorized(a));

        // Revoking again is a no-op
        control.revoke(a);
        assert!(!control.is_authorized(a));
    }

    #[test]
    fn matching_clears_the_record_for_a_fresh_start() {
        let control = control(Duration::from_secs(10));
        let a = addr(1);

        control.record_knock(a, 7000);
        control.record_knock(a, 8000);
        assert!(control.record_knock(a, 9000));
        control.revoke(a);

        // No leftover window contents: the same sequence works immediately
        control.record_knock(a, 7000);
        control.record_knock(a, 8000);
        assert!(control.record_knock(a, 9000));
    }

    #[test]
    fn interleaved_addresses_do_not_corrupt_each_other() {
        let control = control(Duration::from_secs(10));
        let a = addr(1);
        let b = addr(2);

        control.record_knock(a, 7000);
        control.record_knock(b, 7000);
        control.record_knock(a, 8000);
        control.record_knock(b, 8000);

        assert!(control.record_knock(a, 9000));
        assert!(control.is_authorized(a));
        assert!(!control.is_authorized(b));

        assert!(control.record_knock(b, 9000));
        assert!(control.is_authorized(b));
    }

    #[test]
    fn unknown_address_is_not_authorized() {
        let control = control(Duration::from_secs(10));
        assert!(!control.is_authorized(addr(200)));
    }
}
