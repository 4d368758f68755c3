use crate::config::BreakerConfig;
use crate::ledger::BalanceQuery;
use crate::models::SinkAccount;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub enum BreakerState {
    Armed,
    /// Terminal until `reset`
    Tripped { reason: String },
}

/// Answer from `CircuitBreaker::evaluate`
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerVerdict {
    pub tripped: bool,
    pub reason: String,
}

impl BreakerVerdict {
    fn armed() -> Self {
        Self {
            tripped: false,
            reason: String::new(),
        }
    }

    fn tripped(reason: String) -> Self {
        Self {
            tripped: true,
            reason,
        }
    }
}

/// Halts activity on failure streaks, high failure rates or sink balance loss
pub struct CircuitBreaker {
    config: BreakerConfig,
    sink: Option<SinkAccount>,
    state: BreakerState,
    consecutive_failures: u32,
    recent_outcomes: VecDeque<bool>,
    initial_sink_balance: Option<u64>,
    check_counter: u64,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig, sink: Option<SinkAccount>) -> Self {
        let window = config.failure_rate_window.max(1);
        Self {
            config: BreakerConfig {
                failure_rate_window: window,
                balance_check_interval: config.balance_check_interval.max(1),
                ..config
            },
            sink,
            state: BreakerState::Armed,
            consecutive_failures: 0,
            recent_outcomes: VecDeque::with_capacity(window),
            initial_sink_balance: None,
            check_counter: 0,
        }
    }

    pub fn state(&self) -> &BreakerState {
        &self.state
    }

    pub fn is_tripped(&self) -> bool {
        matches!(self.state, BreakerState::Tripped { .. })
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Outcomes in the window, oldest first
    pub fn recent_outcomes(&self) -> impl Iterator<Item = bool> + '_ {
        self.recent_outcomes.iter().copied()
    }

    pub fn initial_sink_balance(&self) -> Option<u64> {
        self.initial_sink_balance
    }

    pub fn set_initial_sink_balance(&mut self, balance: u64) {
        self.initial_sink_balance = Some(balance);
    }

    /// Sample the sink once as the stop-loss reference
    pub async fn record_initial_sink_balance<B: BalanceQuery>(&mut self, client: &B) {
        if !self.config.enabled {
            return;
        }
        let Some(sink) = &self.sink else {
            tracing::warn!("No sink account configured, emergency stop-loss disabled");
            return;
        };

        match client.get_balance(&sink.public_id).await {
            Ok(balance) => {
                tracing::info!("🛡️  Sink {} initial balance: {}", sink.public_id, balance);
                self.initial_sink_balance = Some(balance);
            }
            Err(e) => {
                tracing::warn!("Could not read initial sink balance, stop-loss disabled: {}", e);
            }
        }
    }

    pub fn record_outcome(&mut self, success: bool) {
        if !self.config.enabled {
            return;
        }

        if self.recent_outcomes.len() == self.config.failure_rate_window {
            self.recent_outcomes.pop_front();
        }
        self.recent_outcomes.push_back(success);

        if success {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures += 1;
        }
    }

    /// Run the checks in order and trip on the first that fires
    pub async fn evaluate<B: BalanceQuery>(&mut self, client: &B) -> BreakerVerdict {
        if !self.config.enabled {
            return BreakerVerdict::armed();
        }
        if let BreakerState::Tripped { reason } = &self.state {
            return BreakerVerdict::tripped(reason.clone());
        }

        self.check_counter += 1;

        let reason = match self.check_failures() {
            Some(reason) => Some(reason),
            None => self.check_stop_loss(client).await,
        };

        match reason {
            Some(reason) => {
                tracing::error!("🚨 Circuit breaker tripped: {}", reason);
                self.state = BreakerState::Tripped {
                    reason: reason.clone(),
                };
                BreakerVerdict::tripped(reason)
            }
            None => BreakerVerdict::armed(),
        }
    }

    /// Re-arm with empty history, keeping the sink reference
    pub fn reset(&mut self) {
        tracing::warn!("Circuit breaker manually reset");
        self.state = BreakerState::Armed;
        self.consecutive_failures = 0;
        self.recent_outcomes.clear();
        self.check_counter = 0;
    }

    fn check_failures(&self) -> Option<String> {
        // Check consecutive failures
        if self.consecutive_failures >= self.config.max_consecutive_failures {
            return Some(format!(
                "Consecutive failures: {} (limit {})",
                self.consecutive_failures, self.config.max_consecutive_failures
            ));
        }

        // Check failure rate, only on a full window
        let window = self.recent_outcomes.len();
        if window >= self.config.failure_rate_window {
            let failures = self.recent_outcomes.iter().filter(|ok| !**ok).count();
            let rate = failures as f64 / window as f64;
            if rate > self.config.max_failure_rate {
                return Some(format!(
                    "Failure rate {:.1}% over last {} trades (limit {:.1}%)",
                    rate * 100.0,
                    window,
                    self.config.max_failure_rate * 100.0
                ));
            }
        }

        None
    }

    async fn check_stop_loss<B: BalanceQuery>(&self, client: &B) -> Option<String> {
        if self.check_counter % self.config.balance_check_interval != 0 {
            return None;
        }
        let sink = self.sink.as_ref()?;
        let initial = self.initial_sink_balance.filter(|b| *b > 0)?;

        let current = match client.get_balance(&sink.public_id).await {
            Ok(balance) => balance,
            Err(e) => {
                tracing::warn!("Sink balance check failed for {}: {}", sink.public_id, e);
                return None;
            }
        };

        let loss = (initial as f64 - current as f64) / initial as f64;
        tracing::debug!("Sink {} balance {} (loss {:.1}%)", sink.public_id, current, loss * 100.0);

        if loss > self.config.emergency_stop_loss {
            return Some(format!(
                "Emergency stop-loss: sink balance down {:.1}% ({} -> {}, limit {:.1}%)",
                loss * 100.0,
                initial,
                current,
                self.config.emergency_stop_loss * 100.0
            ));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::SimulatedLedger;

    fn config() -> BreakerConfig {
        BreakerConfig {
            enabled: true,
            max_consecutive_failures: 3,
            failure_rate_window: 10,
            max_failure_rate: 0.3,
            emergency_stop_loss: 0.2,
            balance_check_interval: 3,
        }
    }

    fn sink() -> Option<SinkAccount> {
        Some(SinkAccount {
            public_id: "Sink1".to_string(),
        })
    }

    #[tokio::test]
    async fn test_consecutive_failures_trip_exactly_at_limit() {
        let ledger = SimulatedLedger::new();
        let mut breaker = CircuitBreaker::new(config(), None);

        breaker.record_outcome(false);
        breaker.record_outcome(false);
        assert!(!breaker.evaluate(&ledger).await.tripped);

        breaker.record_outcome(false);
        let verdict = breaker.evaluate(&ledger).await;
        assert!(verdict.tripped);
        assert_eq!(verdict.reason, "Consecutive failures: 3 (limit 3)");
    }

    #[tokio::test]
    async fn test_success_resets_streak() {
        let ledger = SimulatedLedger::new();
        let mut breaker = CircuitBreaker::new(config(), None);

        breaker.record_outcome(false);
        breaker.record_outcome(false);
        breaker.record_outcome(true);
        breaker.record_outcome(false);

        assert_eq!(breaker.consecutive_failures(), 1);
        assert!(!breaker.evaluate(&ledger).await.tripped);
    }

    #[tokio::test]
    async fn test_failure_rate_reports_percentage() {
        let ledger = SimulatedLedger::new();
        let mut breaker = CircuitBreaker::new(config(), None);

        // 4 failures out of 10, never more than 2 in a row
        for ok in [false, false, true, false, true, true, false, true, true, true] {
            breaker.record_outcome(ok);
        }

        let verdict = breaker.evaluate(&ledger).await;
        assert!(verdict.tripped);
        assert!(verdict.reason.contains("40.0%"), "{}", verdict.reason);
    }

    #[tokio::test]
    async fn test_failure_rate_waits_for_full_window() {
        let ledger = SimulatedLedger::new();
        let mut breaker = CircuitBreaker::new(config(), None);

        for ok in [false, true, false, true, false, true] {
            breaker.record_outcome(ok);
        }

        assert!(!breaker.evaluate(&ledger).await.tripped);
    }

    #[test]
    fn test_window_keeps_last_outcomes_in_order() {
        let mut breaker = CircuitBreaker::new(config(), None);
        let outcomes: Vec<bool> = (0..25).map(|i| i % 3 == 0).collect();

        for ok in &outcomes {
            breaker.record_outcome(*ok);
            assert!(breaker.recent_outcomes().count() <= 10);
        }

        let kept: Vec<bool> = breaker.recent_outcomes().collect();
        assert_eq!(kept, outcomes[15..].to_vec());
    }

    #[tokio::test]
    async fn test_stop_loss_only_on_interval() {
        let ledger = SimulatedLedger::new();
        ledger.set_balance("Sink1", 1_000);
        let mut breaker = CircuitBreaker::new(config(), sink());
        breaker.record_initial_sink_balance(&ledger).await;
        assert_eq!(breaker.initial_sink_balance(), Some(1_000));

        ledger.set_balance("Sink1", 750);

        assert!(!breaker.evaluate(&ledger).await.tripped);
        assert!(!breaker.evaluate(&ledger).await.tripped);
        // Only the initial sample so far
        assert_eq!(ledger.balance_queries("Sink1"), 1);

        let verdict = breaker.evaluate(&ledger).await;
        assert!(verdict.tripped);
        assert!(verdict.reason.contains("25.0%"), "{}", verdict.reason);
        assert_eq!(ledger.balance_queries("Sink1"), 2);
    }

    #[tokio::test]
    async fn test_sink_query_failure_does_not_trip() {
        let ledger = SimulatedLedger::new();
        let mut breaker = CircuitBreaker::new(
            BreakerConfig {
                balance_check_interval: 1,
                ..config()
            },
            sink(),
        );
        breaker.set_initial_sink_balance(1_000);
        ledger.fail_balance_for("Sink1");

        assert!(!breaker.evaluate(&ledger).await.tripped);
    }

    #[tokio::test]
    async fn test_tripped_is_terminal_until_reset() {
        let ledger = SimulatedLedger::new();
        let mut breaker = CircuitBreaker::new(config(), None);
        for _ in 0..3 {
            breaker.record_outcome(false);
        }
        let first = breaker.evaluate(&ledger).await;
        assert!(first.tripped);

        // Successes afterwards do not re-arm
        for _ in 0..10 {
            breaker.record_outcome(true);
        }
        assert_eq!(breaker.evaluate(&ledger).await, first);

        breaker.reset();
        assert_eq!(breaker.state(), &BreakerState::Armed);
        assert!(!breaker.evaluate(&ledger).await.tripped);
    }

    #[tokio::test]
    async fn test_disabled_breaker_never_trips() {
        let ledger = SimulatedLedger::new();
        let mut breaker = CircuitBreaker::new(
            BreakerConfig {
                enabled: false,
                ..config()
            },
            sink(),
        );

        for _ in 0..50 {
            breaker.record_outcome(false);
        }

        assert!(!breaker.evaluate(&ledger).await.tripped);
        assert_eq!(breaker.recent_outcomes().count(), 0);
        assert_eq!(ledger.balance_queries("Sink1"), 0);
    }
}
