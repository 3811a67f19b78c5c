use std::time::Duration;

/// Reconnect policy for downlinks with `keep_linked` set.
#[derive(Clone, Debug)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub base: Duration,
    /// Ceiling the exponential growth saturates at.
    pub max: Duration,
    /// Fraction of the delay randomized away to spread reconnect storms.
    /// Zero disables jitter, which deterministic tests rely on.
    pub jitter: f32,
    /// Attempts before the failure becomes terminal.
    pub retry_budget: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(100),
            max: Duration::from_secs(30),
            jitter: 0.25,
            retry_budget: 8,
        }
    }
}

/// Jittered exponential backoff with a retry budget.
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay before the next attempt, or `None` once the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.config.retry_budget {
            return None;
        }
        let shift = self.attempt.min(20);
        self.attempt += 1;

        let base_millis = self.config.base.as_millis() as u64;
        let max_millis = self.config.max.as_millis() as u64;
        let raw = base_millis.saturating_mul(1u64 << shift).min(max_millis);

        let jittered = if self.config.jitter > 0.0 {
            let spread = (raw as f32 * self.config.jitter) as u64;
            raw.saturating_sub(spread / 2) + fastrand::u64(0..=spread.max(1))
        } else {
            raw
        };
        Some(Duration::from_millis(jittered.max(1)))
    }

    /// Called after a successful link so the next failure starts cheap again.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::{Backoff, BackoffConfig};
    use std::time::Duration;

    fn config(budget: u32) -> BackoffConfig {
        BackoffConfig {
            base: Duration::from_millis(100),
            max: Duration::from_secs(2),
            jitter: 0.0,
            retry_budget: budget,
        }
    }

    #[test]
    fn delays_double_up_to_the_ceiling() {
        let mut backoff = Backoff::new(config(10));
        let delays: Vec<u64> = (0..6)
            .map(|_| backoff.next_delay().unwrap().as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1600, 2000]);
    }

    #[test]
    fn budget_exhaustion_is_terminal() {
        let mut backoff = Backoff::new(config(2));
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());
        assert_eq!(backoff.attempt(), 2);
    }

    #[test]
    fn an_oversized_jitter_fraction_never_underflows() {
        let mut backoff = Backoff::new(BackoffConfig {
            jitter: 4.0,
            ..config(8)
        });
        while let Some(delay) = backoff.next_delay() {
            assert!(delay >= Duration::from_millis(1));
        }
    }

    #[test]
    fn reset_restarts_the_schedule() {
        let mut backoff = Backoff::new(config(3));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(
            backoff.next_delay().unwrap(),
            Duration::from_millis(100)
        );
    }
}
