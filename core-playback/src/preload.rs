//! # Preload Scheduler
//!
//! Loads pronunciation audio ahead of explicit play requests, in priority
//! order and in small concurrent batches.
//!
//! Preloading is best-effort: a failed preload is logged and dropped. The
//! scheduler discards every load `Result` on purpose, so nothing a background
//! load does can surface as an error to the user.

use crate::cache::{AudioCache, EntryOrigin};
use crate::loader::{LoadStrategy, ResourceLoader};
use core_runtime::events::{CoreEvent, EventBus, PreloadEvent};
use core_runtime::logging::redact_url;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// How urgently a URL should be preloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreloadPriority {
    High,
    #[default]
    Medium,
    Low,
}

impl PreloadPriority {
    /// Sort weight: high = 3, medium = 2, low = 1.
    pub fn weight(self) -> u8 {
        match self {
            PreloadPriority::High => 3,
            PreloadPriority::Medium => 2,
            PreloadPriority::Low => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PreloadOptions {
    #[serde(default)]
    pub priority: PreloadPriority,
    #[serde(default)]
    pub strategy: LoadStrategy,
}

impl PreloadOptions {
    pub fn with_priority(mut self, priority: PreloadPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_strategy(mut self, strategy: LoadStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// One queued preload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadTask {
    pub url: String,
    pub priority: PreloadPriority,
    pub strategy: LoadStrategy,
}

#[derive(Default)]
struct QueueState {
    /// Insertion order; re-sorted (stably) when a batch is selected.
    queue: Vec<PreloadTask>,
    in_flight: HashSet<String>,
    running: bool,
}

struct SchedulerShared {
    loader: Arc<ResourceLoader>,
    cache: Arc<AudioCache>,
    batch_size: usize,
    state: Mutex<QueueState>,
    idle: watch::Sender<bool>,
    event_bus: Option<EventBus>,
}

/// Priority queue of preload requests.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct PreloadScheduler {
    shared: Arc<SchedulerShared>,
}

impl PreloadScheduler {
    pub fn new(
        loader: Arc<ResourceLoader>,
        cache: Arc<AudioCache>,
        batch_size: usize,
        event_bus: Option<EventBus>,
    ) -> Self {
        let (idle, _) = watch::channel(true);
        Self {
            shared: Arc::new(SchedulerShared {
                loader,
                cache,
                batch_size: batch_size.max(1),
                state: Mutex::new(QueueState::default()),
                idle,
                event_bus,
            }),
        }
    }

    /// Queue `urls` for background loading.
    ///
    /// URLs already cached, queued or in flight are skipped, so repeated calls
    /// are harmless. Returns how many URLs were newly queued. Must be called
    /// from within a Tokio runtime; the drain loop is spawned on it.
    pub fn preload<I, S>(&self, urls: I, options: PreloadOptions) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut queued = Vec::new();
        let start_drain = {
            let mut state = self.shared.state.lock();

            for url in urls {
                let url = url.into();
                let known = self.shared.cache.contains(&url)
                    || state.in_flight.contains(&url)
                    || state.queue.iter().any(|task| task.url == url);
                if known {
                    debug!(url = %redact_url(&url), "Preload skipped, already known");
                    continue;
                }

                queued.push(url.clone());
                state.queue.push(PreloadTask {
                    url,
                    priority: options.priority,
                    strategy: options.strategy,
                });
            }

            let start = !state.running && !state.queue.is_empty();
            if start {
                state.running = true;
            }
            start
        };

        for url in &queued {
            self.shared.emit(PreloadEvent::Queued {
                url: url.clone(),
                weight: options.priority.weight(),
            });
        }

        if start_drain {
            self.shared.idle.send_replace(false);
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move { shared.drain().await });
        }

        queued.len()
    }

    /// URLs waiting for a batch, in the order the next selection would take them.
    pub fn pending(&self) -> Vec<String> {
        let state = self.shared.state.lock();
        let mut queue: Vec<&PreloadTask> = state.queue.iter().collect();
        queue.sort_by_key(|task| Reverse(task.priority.weight()));
        queue.into_iter().map(|task| task.url.clone()).collect()
    }

    pub fn in_flight(&self) -> usize {
        self.shared.state.lock().in_flight.len()
    }

    pub fn is_idle(&self) -> bool {
        *self.shared.idle.borrow()
    }

    /// Resolves once the queue is empty and no batch is running.
    pub async fn wait_idle(&self) {
        let mut idle = self.shared.idle.subscribe();
        // The sender lives in `shared`, which `self` keeps alive.
        idle.wait_for(|idle| *idle).await.ok();
    }
}

impl SchedulerShared {
    async fn drain(&self) {
        loop {
            let Some(batch) = self.next_batch() else {
                self.emit(PreloadEvent::Idle);
                return;
            };

            let results = join_all(batch.iter().map(|task| {
                self.loader
                    .load(&task.url, task.strategy, EntryOrigin::Preload)
            }))
            .await;

            let mut loaded = 0;
            let mut failed = 0;
            {
                let mut state = self.state.lock();
                for (task, result) in batch.iter().zip(results) {
                    state.in_flight.remove(&task.url);
                    match result {
                        Ok(_) => loaded += 1,
                        Err(e) => {
                            failed += 1;
                            warn!(url = %redact_url(&task.url), error = %e, "Preload failed");
                        }
                    }
                }
            }

            debug!(loaded, failed, "Preload batch settled");
            self.emit(PreloadEvent::BatchCompleted { loaded, failed });

            tokio::task::yield_now().await;
        }
    }

    /// Take the next batch, highest weight first, ties in insertion order.
    /// Marks the scheduler idle and returns `None` when nothing is left.
    fn next_batch(&self) -> Option<Vec<PreloadTask>> {
        let mut state = self.state.lock();

        // Something may have been loaded on demand since it was queued.
        state.queue.retain(|task| !self.cache.contains(&task.url));

        if state.queue.is_empty() {
            state.running = false;
            self.idle.send_replace(true);
            return None;
        }

        state.queue.sort_by_key(|task| Reverse(task.priority.weight()));
        let take = self.batch_size.min(state.queue.len());
        let batch: Vec<PreloadTask> = state.queue.drain(..take).collect();
        for task in &batch {
            state.in_flight.insert(task.url.clone());
        }
        Some(batch)
    }

    fn emit(&self, event: PreloadEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Preload(event)).ok();
        }
    }
}
