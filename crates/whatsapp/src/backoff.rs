use std::time::Duration;

use zahra_config::ReconnectConfig;

/// Exponential reconnect backoff with a ceiling and an optional attempt cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from(&ReconnectConfig::default())
    }
}

impl From<&ReconnectConfig> for Backoff {
    fn from(cfg: &ReconnectConfig) -> Self {
        Self {
            initial: Duration::from_millis(cfg.initial_backoff_ms),
            max: Duration::from_millis(cfg.max_backoff_ms.max(cfg.initial_backoff_ms)),
            max_attempts: cfg.max_attempts,
        }
    }
}

impl Backoff {
    /// Delay before the next attempt, given how many attempts have already
    /// failed since the last successful open.
    pub fn delay(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures);
        self.initial.saturating_mul(factor).min(self.max)
    }

    /// Whether another attempt is allowed after `failures` failed ones.
    pub fn allows(&self, failures: u32) -> bool {
        self.max_attempts.is_none_or(|max| failures < max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff(initial_ms: u64, max_ms: u64, max_attempts: Option<u32>) -> Backoff {
        Backoff::from(&ReconnectConfig {
            initial_backoff_ms: initial_ms,
            max_backoff_ms: max_ms,
            max_attempts,
        })
    }

    #[test]
    fn doubles_until_ceiling() {
        let b = backoff(500, 3_000, None);
        assert_eq!(b.delay(0), Duration::from_millis(500));
        assert_eq!(b.delay(1), Duration::from_millis(1_000));
        assert_eq!(b.delay(2), Duration::from_millis(2_000));
        assert_eq!(b.delay(3), Duration::from_millis(3_000));
        assert_eq!(b.delay(40), Duration::from_millis(3_000));
    }

    #[test]
    fn ceiling_never_below_initial() {
        let b = backoff(5_000, 100, None);
        assert_eq!(b.delay(0), Duration::from_millis(5_000));
    }

    #[test]
    fn attempt_cap() {
        let b = backoff(10, 10, Some(3));
        assert!(b.allows(2));
        assert!(!b.allows(3));
        assert!(backoff(10, 10, None).allows(u32::MAX));
    }
}
