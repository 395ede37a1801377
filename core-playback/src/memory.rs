//! # Memory Pressure Monitor
//!
//! Sheds cache entries when the host is likely to be short on memory: when
//! the page is hidden, and when sampled heap usage crosses a threshold. Both
//! reactions are heuristics and never block a caller.

use crate::cache::AudioCache;
use crate::config::duration_ms;
use bridge_traits::{LifecycleChangeStream, LifecycleObserver, LifecycleState, MemoryTelemetry};
use core_runtime::events::{CoreEvent, EventBus, MemoryEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Memory pressure thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPressureConfig {
    /// Fraction of entries evicted when the page becomes hidden.
    ///
    /// Default: 0.3.
    #[serde(default = "default_hidden_eviction_fraction")]
    pub hidden_eviction_fraction: f64,

    /// Fraction of entries evicted when heap usage is high.
    ///
    /// Default: 0.5.
    #[serde(default = "default_heap_eviction_fraction")]
    pub heap_eviction_fraction: f64,

    /// Heap usage ratio above which the cache is trimmed.
    ///
    /// Default: 0.8.
    #[serde(default = "default_heap_usage_threshold")]
    pub heap_usage_threshold: f64,

    /// Period of the heap check and expiry sweep.
    ///
    /// Default: 30 seconds.
    #[serde(default = "default_check_interval", with = "duration_ms")]
    pub check_interval: Duration,
}

impl Default for MemoryPressureConfig {
    fn default() -> Self {
        Self {
            hidden_eviction_fraction: default_hidden_eviction_fraction(),
            heap_eviction_fraction: default_heap_eviction_fraction(),
            heap_usage_threshold: default_heap_usage_threshold(),
            check_interval: default_check_interval(),
        }
    }
}

impl MemoryPressureConfig {
    pub fn validate(&self) -> Result<(), String> {
        let fractions = [
            ("memory.hidden_eviction_fraction", self.hidden_eviction_fraction),
            ("memory.heap_eviction_fraction", self.heap_eviction_fraction),
            ("memory.heap_usage_threshold", self.heap_usage_threshold),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be between 0.0 and 1.0", name));
            }
        }

        if self.check_interval.is_zero() {
            return Err("memory.check_interval must be greater than 0".to_string());
        }

        Ok(())
    }
}

fn default_hidden_eviction_fraction() -> f64 {
    0.3
}

fn default_heap_eviction_fraction() -> f64 {
    0.5
}

fn default_heap_usage_threshold() -> f64 {
    0.8
}

fn default_check_interval() -> Duration {
    Duration::from_secs(30)
}

/// Watches lifecycle and heap signals and trims the cache in response.
pub struct MemoryMonitor {
    cache: Arc<AudioCache>,
    config: MemoryPressureConfig,
    lifecycle: Option<Arc<dyn LifecycleObserver>>,
    telemetry: Option<Arc<dyn MemoryTelemetry>>,
    event_bus: Option<EventBus>,
}

impl MemoryMonitor {
    pub fn new(cache: Arc<AudioCache>, config: MemoryPressureConfig) -> Self {
        Self {
            cache,
            config,
            lifecycle: None,
            telemetry: None,
            event_bus: None,
        }
    }

    pub fn with_lifecycle(mut self, lifecycle: Arc<dyn LifecycleObserver>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn MemoryTelemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(&self) -> &MemoryPressureConfig {
        &self.config
    }

    /// React to a visibility transition. Returns how many entries were evicted.
    pub fn on_lifecycle_change(&self, state: LifecycleState) -> usize {
        if !state.is_hidden() {
            return 0;
        }

        let evicted = self
            .cache
            .evict_fraction(self.config.hidden_eviction_fraction);
        info!(?state, evicted, "Page hidden, trimmed audio cache");
        self.emit(MemoryEvent::PageHidden { evicted });
        evicted
    }

    /// Sample heap usage and trim the cache if it is above the threshold.
    ///
    /// Does nothing when the host has no heap telemetry.
    pub fn check_heap(&self) -> usize {
        let Some(usage) = self.telemetry.as_ref().and_then(|t| t.heap_usage()) else {
            return 0;
        };

        if usage.ratio() <= self.config.heap_usage_threshold {
            debug!(ratio = usage.ratio(), "Heap usage within limits");
            return 0;
        }

        let evicted = self.cache.evict_fraction(self.config.heap_eviction_fraction);
        warn!(
            used_bytes = usage.used_bytes,
            limit_bytes = usage.limit_bytes,
            evicted,
            "High heap usage, trimmed audio cache"
        );
        self.emit(MemoryEvent::HighHeapUsage {
            used_bytes: usage.used_bytes,
            limit_bytes: usage.limit_bytes,
            evicted,
        });
        evicted
    }

    /// One periodic check: expiry sweep, then heap check.
    pub fn tick(&self) -> usize {
        self.cache.sweep_expired() + self.check_heap()
    }

    /// Run the monitor in the background until `token` is cancelled.
    ///
    /// The lifecycle subscription is in place when this returns, so a
    /// visibility change made right after it is not missed.
    pub async fn start(self: Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        let changes = self.subscribe_lifecycle().await;
        tokio::spawn(async move { self.run(changes, token).await })
    }

    async fn subscribe_lifecycle(&self) -> Option<Box<dyn LifecycleChangeStream>> {
        let lifecycle = self.lifecycle.as_ref()?;
        match lifecycle.subscribe_changes().await {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!(error = %e, "Lifecycle events unavailable, page-hidden trimming disabled");
                None
            }
        }
    }

    async fn run(
        &self,
        mut changes: Option<Box<dyn LifecycleChangeStream>>,
        token: CancellationToken,
    ) {
        let mut interval = tokio::time::interval(self.config.check_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        interval.tick().await;

        info!(
            check_interval_ms = self.config.check_interval.as_millis() as u64,
            lifecycle = changes.is_some(),
            telemetry = self.telemetry.is_some(),
            "Memory monitor started"
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    self.tick();
                }
                state = next_change(&mut changes) => match state {
                    Some(state) => {
                        self.on_lifecycle_change(state);
                    }
                    None => {
                        debug!("Lifecycle stream closed");
                        changes = None;
                    }
                },
            }
        }

        info!("Memory monitor stopped");
    }

    fn emit(&self, event: MemoryEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Memory(event)).ok();
        }
    }
}

/// Next lifecycle change, or never when there is no stream.
async fn next_change(stream: &mut Option<Box<dyn LifecycleChangeStream>>) -> Option<LifecycleState> {
    match stream {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}
