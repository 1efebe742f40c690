//! Engine activity counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct EngineMetrics {
    start_time: Instant,
    credits: AtomicU64,
    debits: AtomicU64,
    transfers: AtomicU64,
    games_played: AtomicU64,
    items_caught: AtomicU64,
    challenges_proposed: AtomicU64,
    challenges_resolved: AtomicU64,
    challenges_rejected: AtomicU64,
    challenges_expired: AtomicU64,
    flushes: AtomicU64,
    flush_failures: AtomicU64,
}

/// Serializable copy of the counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub credits: u64,
    pub debits: u64,
    pub transfers: u64,
    pub games_played: u64,
    pub items_caught: u64,
    pub challenges_proposed: u64,
    pub challenges_resolved: u64,
    pub challenges_rejected: u64,
    pub challenges_expired: u64,
    pub flushes: u64,
    pub flush_failures: u64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            credits: AtomicU64::new(0),
            debits: AtomicU64::new(0),
            transfers: AtomicU64::new(0),
            games_played: AtomicU64::new(0),
            items_caught: AtomicU64::new(0),
            challenges_proposed: AtomicU64::new(0),
            challenges_resolved: AtomicU64::new(0),
            challenges_rejected: AtomicU64::new(0),
            challenges_expired: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            flush_failures: AtomicU64::new(0),
        }
    }

    pub fn record_credit(&self) {
        self.credits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_debit(&self) {
        self.debits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transfer(&self) {
        self.transfers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_game(&self) {
        self.games_played.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_catch(&self) {
        self.items_caught.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_challenge_proposed(&self) {
        self.challenges_proposed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_challenge_resolved(&self) {
        self.challenges_resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_challenge_rejected(&self) {
        self.challenges_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_challenge_expired(&self) {
        self.challenges_expired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush_failure(&self) {
        self.flush_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_runtime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.total_runtime().as_secs(),
            credits: self.credits.load(Ordering::Relaxed),
            debits: self.debits.load(Ordering::Relaxed),
            transfers: self.transfers.load(Ordering::Relaxed),
            games_played: self.games_played.load(Ordering::Relaxed),
            items_caught: self.items_caught.load(Ordering::Relaxed),
            challenges_proposed: self.challenges_proposed.load(Ordering::Relaxed),
            challenges_resolved: self.challenges_resolved.load(Ordering::Relaxed),
            challenges_rejected: self.challenges_rejected.load(Ordering::Relaxed),
            challenges_expired: self.challenges_expired.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
