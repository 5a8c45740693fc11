//! Per-client activity and request bookkeeping.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::trace;

/// Network identity of a remote peer (IP and port).
pub type ClientAddress = SocketAddr;

/// Everything tracked for a single client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientRecord {
    /// Time of the most recent request, admitted or not
    pub last_seen: Instant,
    /// Requests admitted in the current window
    pub request_count: u32,
}

impl ClientRecord {
    /// A record for a client seen for the first time.
    pub fn new(now: Instant) -> Self {
        Self {
            last_seen: now,
            request_count: 0,
        }
    }

    /// Time since the last request, zero if `now` is earlier than it.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }
}

/// Concurrent map from client address to its [`ClientRecord`].
///
/// Last-activity timestamps and request counts live in the same entry, so
/// removing a client drops both at once. Each operation holds only the shard
/// lock for its own key; unrelated clients proceed in parallel.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    records: DashMap<ClientAddress, ClientRecord>,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Record activity for `addr` at `now`, inserting it if unknown.
    ///
    /// Returns the previous last-activity time, or `None` for a new client.
    pub fn touch(&self, addr: ClientAddress, now: Instant) -> Option<Instant> {
        let mut previous = None;
        self.records
            .entry(addr)
            .and_modify(|record| {
                previous = Some(record.last_seen);
                record.last_seen = now;
            })
            .or_insert_with(|| {
                trace!(client = %addr, "Registering new client");
                ClientRecord::new(now)
            });
        previous
    }

    /// Last-activity time of `addr`, if tracked.
    pub fn last_seen_of(&self, addr: &ClientAddress) -> Option<Instant> {
        self.records.get(addr).map(|record| record.last_seen)
    }

    /// Requests admitted for `addr` in its current window, if tracked.
    pub fn request_count_of(&self, addr: &ClientAddress) -> Option<u32> {
        self.records.get(addr).map(|record| record.request_count)
    }

    /// Copy of the full record for `addr`.
    pub fn record_of(&self, addr: &ClientAddress) -> Option<ClientRecord> {
        self.records.get(addr).map(|record| *record)
    }

    /// Forget `addr`. Returns `true` if it was tracked.
    pub fn remove(&self, addr: &ClientAddress) -> bool {
        self.records.remove(addr).is_some()
    }

    /// Forget `addr` only if it has been idle for longer than `timeout`.
    ///
    /// The idle check runs under the entry lock, so a touch that lands first
    /// keeps the client.
    pub fn remove_if_idle(&self, addr: &ClientAddress, now: Instant, timeout: Duration) -> bool {
        self.records
            .remove_if(addr, |_, record| record.idle_for(now) > timeout)
            .is_some()
    }

    /// Snapshot of every tracked address.
    pub fn addresses(&self) -> Vec<ClientAddress> {
        self.records.iter().map(|entry| *entry.key()).collect()
    }

    /// Apply `f` to the record for `addr` while holding its entry lock.
    ///
    /// `f` receives the record as it was before this call (`None` for a new
    /// client) and returns the record to store alongside a result value.
    pub(crate) fn update<R>(
        &self,
        addr: ClientAddress,
        f: impl FnOnce(Option<ClientRecord>) -> (ClientRecord, R),
    ) -> R {
        match self.records.entry(addr) {
            Entry::Occupied(mut occupied) => {
                let (record, result) = f(Some(*occupied.get()));
                occupied.insert(record);
                result
            }
            Entry::Vacant(vacant) => {
                let (record, result) = f(None);
                vacant.insert(record);
                result
            }
        }
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no clients are tracked.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Forget every client.
    pub fn clear(&self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn addr(port: u16) -> ClientAddress {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_touch_inserts_new_client() {
        let registry = ClientRegistry::new();
        let now = Instant::now();

        assert_eq!(registry.touch(addr(4000), now), None);
        assert_eq!(registry.last_seen_of(&addr(4000)), Some(now));
        assert_eq!(registry.request_count_of(&addr(4000)), Some(0));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_touch_returns_previous_and_keeps_count() {
        let registry = ClientRegistry::new();
        let start = Instant::now();
        let later = start + Duration::from_secs(30);

        registry.touch(addr(4000), start);
        registry.update(addr(4000), |record| {
            let mut record = record.unwrap();
            record.request_count = 3;
            (record, ())
        });

        assert_eq!(registry.touch(addr(4000), later), Some(start));
        assert_eq!(registry.last_seen_of(&addr(4000)), Some(later));
        assert_eq!(registry.request_count_of(&addr(4000)), Some(3));
    }

    #[test]
    fn test_same_ip_different_port_is_different_client() {
        let registry = ClientRegistry::new();
        let now = Instant::now();

        registry.touch(addr(4000), now);
        registry.touch(addr(4001), now);

        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = ClientRegistry::new();
        registry.touch(addr(4000), Instant::now());

        assert!(registry.remove(&addr(4000)));
        assert!(!registry.remove(&addr(4000)));
        assert!(registry.is_empty());
        assert_eq!(registry.last_seen_of(&addr(4000)), None);
    }

    #[test]
    fn test_remove_if_idle_respects_timeout() {
        let registry = ClientRegistry::new();
        let start = Instant::now();
        let timeout = Duration::from_secs(600);
        registry.touch(addr(4000), start);

        // Exactly at the threshold is not yet idle
        assert!(!registry.remove_if_idle(&addr(4000), start + timeout, timeout));
        assert!(registry.remove_if_idle(
            &addr(4000),
            start + timeout + Duration::from_secs(1),
            timeout
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_if_idle_keeps_recently_touched_client() {
        let registry = ClientRegistry::new();
        let start = Instant::now();
        let timeout = Duration::from_secs(600);
        registry.touch(addr(4000), start);

        // A touch newer than the sweeper's notion of "now" must survive
        let sweep_now = start + Duration::from_secs(601);
        registry.touch(addr(4000), sweep_now + Duration::from_secs(1));

        assert!(!registry.remove_if_idle(&addr(4000), sweep_now, timeout));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_touch_racing_eviction_never_leaves_partial_state() {
        let timeout = Duration::from_secs(600);
        let start = Instant::now();
        let sweep_now = start + Duration::from_secs(601);
        let fresh = sweep_now + Duration::from_secs(1);

        for _ in 0..200 {
            let registry = Arc::new(ClientRegistry::new());
            registry.update(addr(4000), |_| {
                (
                    ClientRecord {
                        last_seen: start,
                        request_count: 7,
                    },
                    (),
                )
            });
            let barrier = Arc::new(std::sync::Barrier::new(2));

            let toucher = {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.touch(addr(4000), fresh)
                })
            };
            let sweeper = {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.remove_if_idle(&addr(4000), sweep_now, timeout)
                })
            };
            let previous = toucher.join().unwrap();
            let evicted = sweeper.join().unwrap();

            match (evicted, previous) {
                // Touch first: the client survives with its count
                (false, Some(_)) => assert_eq!(
                    registry.record_of(&addr(4000)),
                    Some(ClientRecord {
                        last_seen: fresh,
                        request_count: 7,
                    })
                ),
                // Eviction first: the touch re-registers a brand new client
                (true, None) => assert_eq!(
                    registry.record_of(&addr(4000)),
                    Some(ClientRecord::new(fresh))
                ),
                // Eviction after the touch would drop an active client
                (true, Some(_)) => panic!("evicted a client touched before the sweep"),
                (false, None) => panic!("touch saw no client but eviction did not happen"),
            }
            assert_eq!(registry.len(), 1);
        }
    }

    #[test]
    fn test_addresses_snapshot() {
        let registry = ClientRegistry::new();
        let now = Instant::now();
        for port in 4000..4005 {
            registry.touch(addr(port), now);
        }

        let mut addresses = registry.addresses();
        addresses.sort();

        assert_eq!(addresses, (4000..4005).map(addr).collect::<Vec<_>>());
    }

    #[test]
    fn test_concurrent_touches_keep_latest() {
        let registry = Arc::new(ClientRegistry::new());
        let start = Instant::now();

        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    registry.touch(addr(4000), start + Duration::from_secs(i));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let last_seen = registry.last_seen_of(&addr(4000)).unwrap();
        assert!(last_seen >= start && last_seen <= start + Duration::from_secs(7));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_clear() {
        let registry = ClientRegistry::new();
        registry.touch(addr(4000), Instant::now());
        registry.clear();
        assert_eq!(registry.len(), 0);
    }
}
