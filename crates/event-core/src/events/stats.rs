//! Per-tick statistics
//!
//! [`Stats`] is a derived snapshot, recomputed from the live components each
//! time it is requested. Only the tick history needed for the rolling
//! average and the peak is kept between ticks.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;

/// Snapshot returned by [`EventCenter::stats`](crate::EventCenter::stats)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    /// Events dispatched by the most recent `process_events` call
    pub events_processed_this_tick: usize,
    /// Events waiting in both queues
    pub queued_events: usize,
    /// Events waiting in the immediate queue
    pub immediate_queued: usize,
    /// Events waiting in the normal queue
    pub normal_queued: usize,
    /// Active subscriptions across all payload types
    pub active_subscriptions: usize,
    /// Free containers parked in the pool
    pub pooled_events: usize,
    /// Mean duration of the last `stats_window` ticks
    pub average_processing_time_ms: f64,
    /// Most events dispatched in one tick
    pub peak_events_per_tick: usize,
    /// Completed `process_events` calls
    pub tick_count: u64,
    /// Events published since construction or the last clear
    pub total_published: u64,
    /// Events dispatched since construction or the last clear
    pub total_processed: u64,
    /// Listener failures since construction or the last clear
    pub listener_failures: u64,
    /// Pool acquisitions served from a free list
    pub pool_hits: u64,
    /// Pool acquisitions that created a container
    pub pool_misses: u64,
}

impl Stats {
    /// Render the snapshot as JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Whether the last tick left work for the next one
    pub fn has_backlog(&self) -> bool {
        self.queued_events > 0
    }
}

/// Tick history kept by the Event Center
#[derive(Debug)]
pub(crate) struct TickHistory {
    durations: VecDeque<Duration>,
    window: usize,
    last_processed: usize,
    peak: usize,
    ticks: u64,
}

impl TickHistory {
    pub(crate) fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            durations: VecDeque::with_capacity(window),
            window,
            last_processed: 0,
            peak: 0,
            ticks: 0,
        }
    }

    /// Record a finished tick; returns its tick number
    pub(crate) fn record(&mut self, processed: usize, elapsed: Duration) -> u64 {
        if self.durations.len() == self.window {
            self.durations.pop_front();
        }
        self.durations.push_back(elapsed);
        self.last_processed = processed;
        self.peak = self.peak.max(processed);
        self.ticks += 1;
        self.ticks
    }

    pub(crate) fn average_ms(&self) -> f64 {
        if self.durations.is_empty() {
            return 0.0;
        }
        let total: Duration = self.durations.iter().sum();
        total.as_secs_f64() * 1_000.0 / self.durations.len() as f64
    }

    pub(crate) fn last_processed(&self) -> usize {
        self.last_processed
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak
    }

    pub(crate) fn ticks(&self) -> u64 {
        self.ticks
    }

    pub(crate) fn reset(&mut self) {
        self.durations.clear();
        self.last_processed = 0;
        self.peak = 0;
        self.ticks = 0;
    }
}
