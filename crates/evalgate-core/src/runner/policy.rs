use std::time::Duration;

use crate::error::{EvalError, Result};

pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 500;
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_ABORT_FAILURE_RATE: f64 = 0.10;

#[derive(Debug, Clone, PartialEq)]
pub struct RunPolicy {
    pub concurrency: usize,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub call_timeout: Duration,
    pub run_timeout: Option<Duration>,
    /// Fraction of cases allowed to hard-fail before the run stops.
    pub abort_failure_rate: f64,
    pub include_cases: bool,
    pub require_reviewed_ground_truth: bool,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
            call_timeout: Duration::from_millis(DEFAULT_CALL_TIMEOUT_MS),
            run_timeout: None,
            abort_failure_rate: DEFAULT_ABORT_FAILURE_RATE,
            include_cases: false,
            require_reviewed_ground_truth: false,
        }
    }
}

impl RunPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(EvalError::Config("concurrency must be at least 1".to_string()));
        }
        if self.max_attempts == 0 {
            return Err(EvalError::Config("max_attempts must be at least 1".to_string()));
        }
        if self.call_timeout.is_zero() {
            return Err(EvalError::Config("call timeout must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.abort_failure_rate) {
            return Err(EvalError::Config(format!(
                "abort failure rate must be within [0, 1], got {}",
                self.abort_failure_rate
            )));
        }
        Ok(())
    }

    /// Exponential backoff before retry `attempt` (1-based attempt that just failed).
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(1_u32 << exponent)
    }

    #[must_use]
    pub fn should_abort(&self, hard_failed: usize, cases_total: usize) -> bool {
        if cases_total == 0 || hard_failed == 0 {
            return false;
        }
        #[allow(
            clippy::cast_precision_loss,
            reason = "case counts stay far below f64 mantissa precision"
        )]
        let rate = hard_failed as f64 / cases_total as f64;
        rate > self.abort_failure_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RunPolicy {
            backoff_base: Duration::from_millis(100),
            ..RunPolicy::default()
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(400));
    }

    #[test]
    fn abort_threshold_is_strictly_exceeded() {
        let policy = RunPolicy::default();
        assert!(!policy.should_abort(1, 10));
        assert!(policy.should_abort(2, 10));
        assert!(policy.should_abort(4, 10));
        assert!(!policy.should_abort(0, 0));
    }

    #[test]
    fn invalid_policies_are_rejected() {
        let zero_concurrency = RunPolicy {
            concurrency: 0,
            ..RunPolicy::default()
        };
        assert!(zero_concurrency.validate().is_err());
        let bad_rate = RunPolicy {
            abort_failure_rate: 1.5,
            ..RunPolicy::default()
        };
        assert!(bad_rate.validate().is_err());
        assert!(RunPolicy::default().validate().is_ok());
    }
}
