//! Memoized schedules keyed by rate signature.
//!
//! The cache keeps a map from [`RateSignature`] to a shared
//! [`ScheduleResult`] and, when bounded, a recency list ordered from least to
//! most recently used. Entries are only trusted for the topology they were
//! computed on: [`ScheduleCache::sync_topology`] drops everything when the
//! graph's [`TopologyStamp`] changes.
//!
//! The cache is not synchronized. [`Scheduler`](crate::Scheduler) wraps it in
//! a single mutex.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::graph::TopologyStamp;
use crate::rate::RateSignature;
use crate::schedule::ScheduleResult;

/// Signature-keyed schedule store with optional LRU eviction.
#[derive(Debug, Default)]
pub struct ScheduleCache {
    /// Maximum entries; 0 means unbounded.
    capacity: usize,
    entries: HashMap<RateSignature, Arc<ScheduleResult>>,
    /// Least recently used first. Empty when unbounded.
    recency: VecDeque<RateSignature>,
    stamp: Option<TopologyStamp>,
}

impl ScheduleCache {
    /// Creates a cache holding at most `capacity` entries. A capacity of 0
    /// keeps every entry and skips recency bookkeeping.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Configured capacity (0 = unbounded).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of cached schedules.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a signature, marking it most recently used on a hit.
    pub fn get(&mut self, signature: &RateSignature) -> Option<Arc<ScheduleResult>> {
        let hit = self.entries.get(signature).cloned()?;
        if self.capacity > 0 {
            self.touch(signature);
        }
        Some(hit)
    }

    /// Stores a result, evicting the least recently used entry first if the
    /// cache is full.
    pub fn put(&mut self, signature: RateSignature, result: Arc<ScheduleResult>) {
        if self.capacity == 0 {
            self.entries.insert(signature, result);
            return;
        }
        if self.entries.contains_key(&signature) {
            self.touch(&signature);
            self.entries.insert(signature, result);
            return;
        }
        while self.recency.len() >= self.capacity {
            let Some(oldest) = self.recency.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            #[cfg(feature = "tracing")]
            tracing::debug!("cache_evict: {oldest}");
        }
        self.recency.push_back(signature.clone());
        self.entries.insert(signature, result);
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    /// Clears the cache if `stamp` differs from the topology the entries were
    /// computed on. Returns true if entries were dropped.
    pub fn sync_topology(&mut self, stamp: TopologyStamp) -> bool {
        if self.stamp == Some(stamp) {
            return false;
        }
        let had_entries = !self.entries.is_empty();
        self.clear();
        self.stamp = Some(stamp);
        had_entries
    }

    /// Forgets the topology stamp and all entries.
    pub fn invalidate(&mut self) {
        self.clear();
        self.stamp = None;
    }

    fn touch(&mut self, signature: &RateSignature) {
        if let Some(pos) = self.recency.iter().position(|s| s == signature) {
            if let Some(key) = self.recency.remove(pos) {
                self.recency.push_back(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DataflowGraph;
    use crate::rate::ExternalRates;
    use crate::schedule::{RepetitionVector, Schedule};
    use std::collections::BTreeMap;

    fn entry(graph: &DataflowGraph) -> (RateSignature, Arc<ScheduleResult>) {
        let signature = RateSignature::compute(graph, graph);
        let result = ScheduleResult {
            schedule: Schedule::new(),
            repetitions: RepetitionVector::new(),
            external_rates: ExternalRates::new(),
            buffer_sizes: BTreeMap::new(),
            signature: signature.clone(),
        };
        (signature, Arc::new(result))
    }

    /// Graphs with one port at rates 1, 2, 3, ... give distinct signatures.
    fn signatures(n: u32) -> Vec<(RateSignature, Arc<ScheduleResult>)> {
        let mut graph = DataflowGraph::new("top");
        let a = graph.add_actor("a");
        let port = graph.add_output(a, "out").unwrap();
        (1..=n)
            .map(|rate| {
                graph.set_rate(port, rate).unwrap();
                entry(&graph)
            })
            .collect()
    }

    #[test]
    fn test_hit_and_miss() {
        let mut cache = ScheduleCache::new(2);
        let entries = signatures(2);
        cache.put(entries[0].0.clone(), entries[0].1.clone());
        assert!(cache.get(&entries[0].0).is_some());
        assert!(cache.get(&entries[1].0).is_none());
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = ScheduleCache::new(2);
        let entries = signatures(3);
        cache.put(entries[0].0.clone(), entries[0].1.clone());
        cache.put(entries[1].0.clone(), entries[1].1.clone());
        // Touch the first so the second becomes the eviction victim.
        assert!(cache.get(&entries[0].0).is_some());
        cache.put(entries[2].0.clone(), entries[2].1.clone());
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&entries[0].0).is_some());
        assert!(cache.get(&entries[1].0).is_none());
        assert!(cache.get(&entries[2].0).is_some());
    }

    #[test]
    fn test_zero_capacity_never_evicts() {
        let mut cache = ScheduleCache::new(0);
        for (sig, result) in signatures(20) {
            cache.put(sig, result);
        }
        assert_eq!(cache.len(), 20);
    }

    #[test]
    fn test_reinsert_does_not_grow() {
        let mut cache = ScheduleCache::new(2);
        let entries = signatures(1);
        cache.put(entries[0].0.clone(), entries[0].1.clone());
        cache.put(entries[0].0.clone(), entries[0].1.clone());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_topology_change_clears() {
        let mut graph = DataflowGraph::new("top");
        let mut cache = ScheduleCache::new(0);
        assert!(!cache.sync_topology(graph.topology_stamp()));
        let (sig, result) = entry(&graph);
        cache.put(sig, result);
        assert!(!cache.sync_topology(graph.topology_stamp()));
        assert_eq!(cache.len(), 1);
        graph.add_actor("a");
        assert!(cache.sync_topology(graph.topology_stamp()));
        assert!(cache.is_empty());
    }
}
