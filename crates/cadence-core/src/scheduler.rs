//! Scheduler facade: solver, builder, and cache composed.
//!
//! [`Scheduler`] is the single entry point most callers need. It computes the
//! [`RateSignature`] of the graph, consults the cache, and on a miss runs the
//! [`BalanceSolver`] followed by the [`ScheduleBuilder`]. Every successful
//! call, hit or miss, pushes the boundary rates back to the caller.
//!
//! Cache state sits behind one `parking_lot::Mutex`. The computation itself
//! runs outside the lock, so a `Scheduler` can be shared between threads that
//! schedule independent graphs.
//!
//! # Example
//!
//! ```rust
//! use cadence_core::{DataflowGraph, Scheduler, SchedulerConfig};
//!
//! let mut graph = DataflowGraph::new("top");
//! let p = graph.add_actor("p");
//! let c = graph.add_actor("c");
//! let out = graph.add_output(p, "out").unwrap();
//! let input = graph.add_input(c, "in").unwrap();
//! graph.set_rate(input, 2).unwrap();
//! graph.connect(out, input).unwrap();
//!
//! let scheduler = Scheduler::new(SchedulerConfig::default());
//! let result = scheduler.schedule(&mut graph).unwrap();
//! assert_eq!(result.schedule.display(&graph).to_string(), "(p, 2) (c, 1)");
//! assert_eq!(graph.firings_per_iteration(p), Some(2));
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::balance::BalanceSolver;
use crate::builder::ScheduleBuilder;
use crate::cache::ScheduleCache;
use crate::config::SchedulerConfig;
use crate::error::ScheduleError;
use crate::graph::DataflowGraph;
use crate::rate::{ExternalRateSink, RateProvider, RateSignature};
use crate::schedule::ScheduleResult;

/// Computes and caches schedules.
pub struct Scheduler {
    config: SchedulerConfig,
    cache: Option<Mutex<ScheduleCache>>,
}

impl Scheduler {
    /// Creates a scheduler. `config.cache_capacity` decides whether results
    /// are cached.
    pub fn new(config: SchedulerConfig) -> Self {
        let cache = config
            .cache_capacity
            .map(|capacity| Mutex::new(ScheduleCache::new(capacity)));
        Self { config, cache }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Schedules a graph using its declared rates and records the results on
    /// it: boundary rates, firings per iteration, and, when buffer sizes are
    /// constrained, channel capacities.
    pub fn schedule(&self, graph: &mut DataflowGraph) -> Result<Arc<ScheduleResult>, ScheduleError> {
        let result = self.lookup_or_compute(&*graph, &*graph)?;
        graph.apply_external_rates(&result.external_rates);
        if self.config.constrain_buffer_sizes {
            graph.apply_buffer_sizes(&result.buffer_sizes);
        }
        graph.record_firing_counts(&result.repetitions);
        Ok(result)
    }

    /// Schedules a graph with rates from `rates`, pushing boundary rates to
    /// `sink`. The graph is not modified.
    pub fn schedule_with<R, S>(
        &self,
        graph: &DataflowGraph,
        rates: &R,
        sink: &mut S,
    ) -> Result<Arc<ScheduleResult>, ScheduleError>
    where
        R: RateProvider + ?Sized,
        S: ExternalRateSink + ?Sized,
    {
        let result = self.lookup_or_compute(graph, rates)?;
        sink.apply_external_rates(&result.external_rates);
        Ok(result)
    }

    /// Drops every cached schedule. Call after changing rates or topology
    /// through a channel the scheduler cannot observe.
    pub fn invalidate(&self) {
        if let Some(cache) = &self.cache {
            cache.lock().invalidate();
            #[cfg(feature = "tracing")]
            tracing::debug!("cache_invalidate");
        }
    }

    /// Number of cached schedules.
    pub fn cached_len(&self) -> usize {
        self.cache.as_ref().map_or(0, |cache| cache.lock().len())
    }

    fn lookup_or_compute<R: RateProvider + ?Sized>(
        &self,
        graph: &DataflowGraph,
        rates: &R,
    ) -> Result<Arc<ScheduleResult>, ScheduleError> {
        let signature = RateSignature::compute(graph, rates);
        let stamp = graph.topology_stamp();

        if let Some(cache) = &self.cache {
            let mut cache = cache.lock();
            if cache.sync_topology(stamp) {
                #[cfg(feature = "tracing")]
                tracing::debug!("cache_clear: topology of '{}' changed", graph.name());
            }
            if let Some(hit) = cache.get(&signature) {
                #[cfg(feature = "tracing")]
                tracing::debug!("cache_hit: {signature}");
                return Ok(hit);
            }
            #[cfg(feature = "tracing")]
            tracing::debug!("cache_miss: {signature}");
        }

        let result = Arc::new(self.compute(graph, rates, signature.clone())?);

        if let Some(cache) = &self.cache {
            let mut cache = cache.lock();
            cache.sync_topology(stamp);
            cache.put(signature, Arc::clone(&result));
        }
        Ok(result)
    }

    fn compute<R: RateProvider + ?Sized>(
        &self,
        graph: &DataflowGraph,
        rates: &R,
        signature: RateSignature,
    ) -> Result<ScheduleResult, ScheduleError> {
        let solution = BalanceSolver::new(graph, rates)
            .allow_disconnected(self.config.allow_disconnected)
            .allow_rate_changes(self.config.allow_rate_changes)
            .solve()?;
        let built = ScheduleBuilder::new(graph, rates, &solution.repetitions)
            .with_external_rates(&solution.external_rates)
            .build()?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "schedule_built: '{}' with {} entries over {} cluster(s)",
            graph.name(),
            built.schedule.len(),
            solution.clusters
        );

        Ok(ScheduleResult {
            schedule: built.schedule,
            repetitions: solution.repetitions,
            external_rates: solution.external_rates,
            buffer_sizes: built.buffer_sizes,
            signature,
        })
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}
