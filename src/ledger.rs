//! Per-client request ledger.
//!
//! Keeps the most recent requests seen from each client:
//! - Bounded history per client (oldest dropped first)
//! - Bounded number of clients (least recently seen evicted first)
//! - Point-in-time snapshots for aggregation

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

/// Default number of events kept per client.
pub const DEFAULT_MAX_EVENTS_PER_CLIENT: usize = 1000;

/// Default number of distinct clients tracked.
pub const DEFAULT_MAX_CLIENTS: usize = 100_000;

/// Client identifier used when the transport cannot supply one.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// One observed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEvent {
    pub user_agent: String,
    pub path: String,
}

/// History for one client.
#[derive(Debug)]
struct ClientHistory {
    /// Recent events in arrival order (bounded)
    events: VecDeque<RequestEvent>,
    /// Ledger tick of the most recent event
    last_seen: u64,
}

impl ClientHistory {
    fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events.min(64)),
            last_seen: 0,
        }
    }

    fn push(&mut self, event: RequestEvent, max_events: usize, tick: u64) {
        if self.events.len() >= max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
        self.last_seen = self.last_seen.max(tick);
    }
}

/// Independent copy of the ledger taken at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    clients: HashMap<String, Vec<RequestEvent>>,
}

impl LedgerSnapshot {
    /// Events for one client, oldest first.
    pub fn get(&self, client_id: &str) -> Option<&[RequestEvent]> {
        self.clients.get(client_id).map(|v| v.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<RequestEvent>)> {
        self.clients.iter()
    }

    /// Number of clients in the snapshot.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Sum of all per-client history lengths.
    pub fn total_events(&self) -> usize {
        self.clients.values().map(Vec::len).sum()
    }

    pub fn into_inner(self) -> HashMap<String, Vec<RequestEvent>> {
        self.clients
    }
}

/// Concurrent request ledger keyed by client identifier.
///
/// Appends for a client happen under that client's shard lock, so concurrent
/// writers never lose or duplicate events and readers never see a history
/// longer than the cap.
///
/// Client recency is tracked lazily: `recency` maps a tick to the client that
/// was seen at that tick, but an entry is only refreshed when eviction reaches
/// it. Each key is a lower bound on its client's `last_seen`, so the first
/// popped entry whose key still equals `last_seen` is the least recently seen
/// client. Appends for known clients never touch the index.
pub struct RequestLedger {
    /// Client histories
    clients: DashMap<String, ClientHistory>,
    /// Tick -> client, ordered oldest first
    recency: Mutex<BTreeMap<u64, String>>,
    /// Maximum events kept per client
    max_events_per_client: usize,
    /// Maximum distinct clients
    max_clients: usize,
    /// Monotonic tick for recency ordering
    clock: AtomicU64,
}

impl RequestLedger {
    /// Create a new ledger.
    pub fn new(max_events_per_client: usize, max_clients: usize) -> Self {
        Self {
            clients: DashMap::new(),
            recency: Mutex::new(BTreeMap::new()),
            max_events_per_client: max_events_per_client.max(1),
            max_clients: max_clients.max(1),
            clock: AtomicU64::new(0),
        }
    }

    /// Append a request to a client's history.
    pub fn record(&self, client_id: &str, user_agent: &str, path: &str) {
        let event = RequestEvent {
            user_agent: user_agent.to_string(),
            path: path.to_string(),
        };
        let tick = self.clock.fetch_add(1, Ordering::Relaxed);

        if let Some(mut history) = self.clients.get_mut(client_id) {
            history.push(event, self.max_events_per_client, tick);
            return;
        }

        let inserted = match self.clients.entry(client_id.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().push(event, self.max_events_per_client, tick);
                false
            }
            Entry::Vacant(entry) => {
                let mut history = ClientHistory::new(self.max_events_per_client);
                history.push(event, self.max_events_per_client, tick);
                entry.insert(history);
                true
            }
        };

        // The shard guard is released before the index lock is taken.
        if inserted {
            self.recency.lock().insert(tick, client_id.to_string());
            self.evict_over_capacity();
        }
    }

    /// Copy every client's history.
    ///
    /// Each shard is read-locked only while its entries are cloned.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let clients = self
            .clients
            .iter()
            .map(|entry| {
                let events: Vec<RequestEvent> = entry.events.iter().cloned().collect();
                (entry.key().clone(), events)
            })
            .collect();

        LedgerSnapshot { clients }
    }

    /// Copy one client's history.
    pub fn history(&self, client_id: &str) -> Option<Vec<RequestEvent>> {
        self.clients
            .get(client_id)
            .map(|entry| entry.events.iter().cloned().collect())
    }

    /// Total events currently held across all clients.
    pub fn total_event_count(&self) -> usize {
        self.clients.iter().map(|entry| entry.events.len()).sum()
    }

    /// Number of distinct clients currently tracked.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn max_events_per_client(&self) -> usize {
        self.max_events_per_client
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }

    pub fn clear(&self) {
        let mut recency = self.recency.lock();
        self.clients.clear();
        recency.clear();
    }

    /// Drop least recently seen clients until the client bound holds.
    ///
    /// The size check and each removal happen under the index lock, so
    /// concurrent callers never evict below the bound.
    fn evict_over_capacity(&self) {
        let mut recency = self.recency.lock();

        while self.clients.len() > self.max_clients {
            let Some((tick, client)) = recency.pop_first() else {
                break;
            };

            let evicted = self
                .clients
                .remove_if(&client, |_, history| history.last_seen == tick)
                .is_some();

            if evicted {
                tracing::debug!(client = %client, "Evicted least recently seen client from ledger");
            } else if let Some(last_seen) = self.clients.get(&client).map(|h| h.last_seen) {
                // Seen again since this entry was written; requeue at its real tick.
                recency.insert(last_seen, client);
            }
        }
    }
}

impl Default for RequestLedger {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENTS_PER_CLIENT, DEFAULT_MAX_CLIENTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_record_and_snapshot() {
        let ledger = RequestLedger::default();
        ledger.record("10.0.0.1", "curl/8.0", "/a");
        ledger.record("10.0.0.1", "curl/8.0", "/b");
        ledger.record("10.0.0.2", "Googlebot", "/");

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.len(), 2);
        let paths: Vec<_> = snapshot.get("10.0.0.1").unwrap().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/a", "/b"]);
        assert_eq!(snapshot.total_events(), 3);
        assert_eq!(ledger.total_event_count(), 3);
    }

    #[test]
    fn test_history_capped_to_most_recent() {
        let ledger = RequestLedger::default();
        for i in 1..=1001 {
            ledger.record("10.0.0.5", "ua", &format!("/event{}", i));
        }

        let history = ledger.history("10.0.0.5").unwrap();
        assert_eq!(history.len(), 1000);
        assert_eq!(history.first().unwrap().path, "/event2");
        assert_eq!(history.last().unwrap().path, "/event1001");
    }

    #[test]
    fn test_small_cap_keeps_arrival_order() {
        let ledger = RequestLedger::new(3, 10);
        for i in 0..10 {
            ledger.record("c", "ua", &i.to_string());
        }
        let paths: Vec<_> = ledger.history("c").unwrap().into_iter().map(|e| e.path).collect();
        assert_eq!(paths, vec!["7", "8", "9"]);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let ledger = RequestLedger::default();
        ledger.record("c", "ua", "/1");
        let snapshot = ledger.snapshot();

        ledger.record("c", "ua", "/2");
        ledger.record("d", "ua", "/1");

        assert_eq!(snapshot.get("c").unwrap().len(), 1);
        assert!(snapshot.get("d").is_none());
    }

    #[test]
    fn test_evicts_least_recently_seen_client() {
        let ledger = RequestLedger::new(10, 2);
        ledger.record("a", "ua", "/");
        ledger.record("b", "ua", "/");
        // Touch "a" so "b" becomes the stalest
        ledger.record("a", "ua", "/again");
        ledger.record("c", "ua", "/");

        assert_eq!(ledger.client_count(), 2);
        assert!(ledger.history("a").is_some());
        assert!(ledger.history("b").is_none());
        assert!(ledger.history("c").is_some());
    }

    #[test]
    fn test_existing_client_does_not_evict() {
        let ledger = RequestLedger::new(10, 2);
        ledger.record("a", "ua", "/");
        ledger.record("b", "ua", "/");
        ledger.record("a", "ua", "/");
        assert_eq!(ledger.client_count(), 2);
        assert_eq!(ledger.total_event_count(), 3);
    }

    #[test]
    fn test_concurrent_records_same_client() {
        let ledger = Arc::new(RequestLedger::new(100_000, 10));
        let threads = 8;
        let per_thread = 500;

        std::thread::scope(|scope| {
            for t in 0..threads {
                let ledger = Arc::clone(&ledger);
                scope.spawn(move || {
                    for i in 0..per_thread {
                        ledger.record("shared", "ua", &format!("/{}/{}", t, i));
                    }
                });
            }
        });

        let history = ledger.history("shared").unwrap();
        assert_eq!(history.len(), threads * per_thread);

        let mut paths: Vec<_> = history.into_iter().map(|e| e.path).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), threads * per_thread, "no duplicated events");
    }

    #[test]
    fn test_new_clients_at_capacity_evict_oldest() {
        let cap = 20_000;
        let ledger = RequestLedger::new(10, cap);
        for i in 0..cap {
            ledger.record(&format!("fill-{}", i), "ua", "/");
        }
        assert_eq!(ledger.client_count(), cap);

        // Keep the very first client warm while newcomers push the rest out
        ledger.record("fill-0", "ua", "/again");
        for i in 0..5_000 {
            ledger.record(&format!("new-{}", i), "ua", "/");
        }

        assert_eq!(ledger.client_count(), cap);
        assert!(ledger.history("fill-0").is_some());
        assert!(ledger.history("fill-1").is_none());
        assert!(ledger.history("fill-5000").is_none());
        assert!(ledger.history("fill-5001").is_some());
        assert!(ledger.history("new-4999").is_some());
        assert_eq!(ledger.history("fill-0").unwrap().len(), 2);
    }

    #[test]
    fn test_recency_index_tracks_live_clients() {
        let ledger = RequestLedger::new(10, 3);
        for round in 0..50 {
            ledger.record("hot", "ua", "/");
            ledger.record(&format!("cold-{}", round), "ua", "/");
        }

        assert_eq!(ledger.client_count(), 3);
        assert!(ledger.history("hot").is_some());
        assert!(ledger.history("cold-49").is_some());
        assert!(ledger.history("cold-48").is_some());
        // Stale entries are dropped or requeued as eviction reaches them
        assert!(ledger.recency.lock().len() <= ledger.client_count() + 1);
    }

    #[test]
    fn test_concurrent_records_at_history_cap() {
        let ledger = RequestLedger::new(DEFAULT_MAX_EVENTS_PER_CLIENT, 10);
        let writers = 4;
        let per_writer = 1_000;
        let done = std::sync::atomic::AtomicBool::new(false);
        let (ledger, done) = (&ledger, &done);

        std::thread::scope(|scope| {
            let readers: Vec<_> = (0..2)
                .map(|_| {
                    scope.spawn(move || {
                        let mut max_seen = 0;
                        while !done.load(Ordering::Acquire) {
                            let snapshot = ledger.snapshot();
                            if let Some(events) = snapshot.get("shared") {
                                max_seen = max_seen.max(events.len());
                            }
                        }
                        max_seen
                    })
                })
                .collect();

            let writer_handles: Vec<_> = (0..writers)
                .map(|t| {
                    scope.spawn(move || {
                        for i in 0..per_writer {
                            ledger.record("shared", "ua", &format!("/{}/{}", t, i));
                        }
                    })
                })
                .collect();

            for handle in writer_handles {
                handle.join().unwrap();
            }
            done.store(true, Ordering::Release);

            for reader in readers {
                assert!(reader.join().unwrap() <= DEFAULT_MAX_EVENTS_PER_CLIENT);
            }
        });

        let history = ledger.history("shared").unwrap();
        assert_eq!(history.len(), DEFAULT_MAX_EVENTS_PER_CLIENT);
        assert_eq!(ledger.total_event_count(), DEFAULT_MAX_EVENTS_PER_CLIENT);
    }

    #[test]
    fn test_concurrent_new_clients_settle_at_bound() {
        let cap = 64;
        let ledger = RequestLedger::new(10, cap);

        std::thread::scope(|scope| {
            for t in 0..8 {
                let ledger = &ledger;
                scope.spawn(move || {
                    for i in 0..500 {
                        ledger.record(&format!("{}-{}", t, i), "ua", "/");
                    }
                });
            }
        });

        assert_eq!(ledger.client_count(), cap);
        assert_eq!(ledger.total_event_count(), cap);
    }

    #[test]
    fn test_unknown_client_sentinel() {
        let ledger = RequestLedger::default();
        ledger.record(UNKNOWN_CLIENT, "", "/");
        assert_eq!(ledger.history("unknown").unwrap().len(), 1);
    }

    #[test]
    fn test_clear() {
        let ledger = RequestLedger::default();
        ledger.record("a", "ua", "/");
        ledger.clear();
        assert_eq!(ledger.client_count(), 0);
        assert_eq!(ledger.total_event_count(), 0);
    }
}
