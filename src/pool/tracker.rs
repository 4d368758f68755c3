use crate::random::RandomSource;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Trade counts above this are capped during maintenance
pub const TRADE_COUNT_CAP: u64 = 1000;
/// Deep cleanup only purges when more than this many entries are stale
pub const DEEP_PURGE_MIN_STALE: usize = 100;
/// Inactivity threshold for deep cleanup
pub const INACTIVITY_DAYS: i64 = 7;

/// How often the cheaper and deeper cleanup passes run
///
/// Counted in `cleanup` calls. The age-based pass runs on every call.
#[derive(Debug, Clone, Copy)]
pub struct MaintenanceSchedule {
    pub cap_every: u64,
    pub deep_every: u64,
}

impl Default for MaintenanceSchedule {
    fn default() -> Self {
        Self {
            cap_every: 20,
            deep_every: 1000,
        }
    }
}

/// What a `cleanup` call removed or capped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub expired: usize,
    pub capped: usize,
    pub purged: usize,
}

/// Per-account last-used times and trade counters
pub struct CooldownTracker {
    last_used: HashMap<String, DateTime<Utc>>,
    trade_counts: HashMap<String, u64>,
    cooldown_min_ms: u64,
    cooldown_max_ms: u64,
    max_age: Duration,
    schedule: MaintenanceSchedule,
    cleanup_calls: u64,
}

impl CooldownTracker {
    pub fn new(cooldown_min_ms: u64, cooldown_max_ms: u64, max_age_ms: u64) -> Self {
        Self {
            last_used: HashMap::new(),
            trade_counts: HashMap::new(),
            cooldown_min_ms: cooldown_min_ms.min(cooldown_max_ms),
            cooldown_max_ms: cooldown_max_ms.max(cooldown_min_ms),
            max_age: Duration::milliseconds(max_age_ms as i64),
            schedule: MaintenanceSchedule::default(),
            cleanup_calls: 0,
        }
    }

    pub fn with_schedule(mut self, schedule: MaintenanceSchedule) -> Self {
        self.schedule = MaintenanceSchedule {
            cap_every: schedule.cap_every.max(1),
            deep_every: schedule.deep_every.max(1),
        };
        self
    }

    pub fn mark_used(&mut self, id: &str, now: DateTime<Utc>) {
        self.last_used.insert(id.to_string(), now);
        *self.trade_counts.entry(id.to_string()).or_insert(0) += 1;
    }

    pub fn trade_count(&self, id: &str) -> u64 {
        self.trade_counts.get(id).copied().unwrap_or(0)
    }

    pub fn last_used(&self, id: &str) -> Option<DateTime<Utc>> {
        self.last_used.get(id).copied()
    }

    pub fn tracked_cooldowns(&self) -> usize {
        self.last_used.len()
    }

    /// Cooldown for `id`, with a fresh random base on every call
    ///
    /// `base * (1 + (trades mod 5) * 0.2)`, so it grows by a fifth per trade
    /// and wraps every five trades.
    pub fn cooldown_for(&self, id: &str, rng: &mut dyn RandomSource) -> Duration {
        let base = rng.range_inclusive(self.cooldown_min_ms, self.cooldown_max_ms) as f64;
        let multiplier = 1.0 + (self.trade_count(id) % 5) as f64 * 0.2;
        Duration::milliseconds((base * multiplier).round() as i64)
    }

    /// True if `id` was never used or its cooldown has elapsed
    pub fn is_ready(&self, id: &str, now: DateTime<Utc>, rng: &mut dyn RandomSource) -> bool {
        match self.last_used.get(id) {
            None => true,
            Some(last) => now - *last >= self.cooldown_for(id, rng),
        }
    }

    /// Bound memory without a background timer
    pub fn cleanup(&mut self, now: DateTime<Utc>) -> CleanupStats {
        self.cleanup_calls += 1;
        let mut stats = CleanupStats::default();

        // Pass 1: expire old cooldowns
        let max_age = self.max_age;
        let before = self.last_used.len();
        self.last_used.retain(|_, last| now - *last <= max_age);
        stats.expired = before - self.last_used.len();

        // Pass 2: cap runaway counters
        if self.cleanup_calls % self.schedule.cap_every == 0 {
            for count in self.trade_counts.values_mut() {
                if *count > TRADE_COUNT_CAP {
                    *count = TRADE_COUNT_CAP;
                    stats.capped += 1;
                }
            }
        }

        // Pass 3: purge long-inactive accounts entirely
        if self.cleanup_calls % self.schedule.deep_every == 0 {
            let inactive = Duration::days(INACTIVITY_DAYS);
            let stale: Vec<String> = self
                .last_used
                .iter()
                .filter(|(_, last)| now - **last > inactive)
                .map(|(id, _)| id.clone())
                .collect();

            if stale.len() > DEEP_PURGE_MIN_STALE {
                for id in &stale {
                    self.last_used.remove(id);
                    self.trade_counts.remove(id);
                }
                stats.purged = stale.len();
            }
        }

        if stats != CleanupStats::default() {
            tracing::debug!(
                "Tracker cleanup: expired={}, capped={}, purged={}",
                stats.expired,
                stats.capped,
                stats.purged
            );
        }

        stats
    }
}
