//! Load watcher.
//!
//! # Responsibilities
//! - Count engine executions in flight
//! - Periodically compare the count against low/high watermarks
//! - Publish a choking flag with hysteresis
//!
//! # Design Decisions
//! - Watermarks live in an `ArcSwap` so config reloads apply without locking
//! - Choking flips on above the high watermark and off below the low one

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::broadcast;
use tokio::time;

use super::LoadSignal;
use crate::config::LoadConfig;
use crate::observability::metrics;

/// Number of engine executions currently running.
#[derive(Debug, Clone, Default)]
pub struct InflightCounter {
    count: Arc<AtomicUsize>,
}

impl InflightCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one execution until the guard is dropped.
    pub fn enter(&self) -> InflightGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        InflightGuard {
            count: self.count.clone(),
        }
    }

    pub fn current(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

/// Releases one in-flight slot on drop.
#[derive(Debug)]
pub struct InflightGuard {
    count: Arc<AtomicUsize>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Watermarks {
    low: usize,
    high: usize,
}

/// Choking flag with watermark hysteresis.
#[derive(Debug)]
pub struct LoadWatcher {
    watermarks: ArcSwap<Watermarks>,
    choking: AtomicBool,
}

impl LoadWatcher {
    pub fn new(config: &LoadConfig) -> Self {
        Self {
            watermarks: ArcSwap::from_pointee(Watermarks {
                low: config.low_watermark,
                high: config.high_watermark,
            }),
            choking: AtomicBool::new(false),
        }
    }

    /// Feed one load sample.
    pub fn tackle(&self, load: usize) {
        let marks = self.watermarks.load();
        let was_choking = self.choking.load(Ordering::SeqCst);

        let choking = if was_choking {
            load >= marks.low
        } else {
            load > marks.high
        };

        if choking != was_choking {
            self.choking.store(choking, Ordering::SeqCst);
            metrics::record_choking(choking);
            if choking {
                tracing::warn!(load, high_watermark = marks.high, "Engine is choking, rejecting heavy commands");
            } else {
                tracing::info!(load, low_watermark = marks.low, "Engine recovered, accepting heavy commands");
            }
        }
    }

    /// Apply new watermarks. The choking flag is re-evaluated on the next sample.
    pub fn reconfigure(&self, config: &LoadConfig) {
        let marks = Watermarks {
            low: config.low_watermark,
            high: config.high_watermark,
        };
        if **self.watermarks.load() != marks {
            tracing::info!(low = marks.low, high = marks.high, "Load watermarks updated");
            self.watermarks.store(Arc::new(marks));
        }
    }
}

impl LoadSignal for LoadWatcher {
    fn is_choking(&self) -> bool {
        self.choking.load(Ordering::SeqCst)
    }
}

/// Background task sampling the in-flight counter into a `LoadWatcher`.
pub struct LoadMonitor {
    watcher: Arc<LoadWatcher>,
    inflight: InflightCounter,
    interval: Duration,
}

impl LoadMonitor {
    pub fn new(watcher: Arc<LoadWatcher>, inflight: InflightCounter, interval: Duration) -> Self {
        Self {
            watcher,
            inflight,
            interval,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::debug!(interval_ms = self.interval.as_millis() as u64, "Load monitor starting");

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let load = self.inflight.current();
                    metrics::record_inflight(load);
                    self.watcher.tackle(load);
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Load monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
