//! Exponential backoff for broker reconnects.

use std::time::Duration;

/// Reconnect policy: delays double from `base_delay` up to `max_delay`.
///
/// `max_reconnects == 0` means "retry forever". The attempt count only starts over once
/// a subscription has stayed up for `stable_after`.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_reconnects: u32,
    pub stable_after: Duration,
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_reconnects: u32) -> Self {
        Self {
            base_delay,
            max_delay: Duration::from_secs(60),
            max_reconnects,
            stable_after: Duration::from_secs(30),
        }
    }

    /// Whether a subscription that lasted `uptime` earns a fresh attempt budget.
    pub fn is_stable(&self, uptime: Duration) -> bool {
        uptime >= self.stable_after
    }

    /// Delay before reconnect attempt number `n_attempts` (zero based).
    pub fn exponential_delay(&self, n_attempts: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * 2_f64.powi(n_attempts.min(32) as i32);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }

    pub fn should_retry(&self, n_past_attempts: u32) -> bool {
        self.max_reconnects == 0 || n_past_attempts < self.max_reconnects
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_delay() {
        let policy = ReconnectPolicy::default();

        assert_eq!(policy.exponential_delay(0).as_secs(), 2);
        assert_eq!(policy.exponential_delay(1).as_secs(), 4);
        assert_eq!(policy.exponential_delay(2).as_secs(), 8);
    }

    #[test]
    fn test_max_delay_cap() {
        let policy = ReconnectPolicy::default();

        assert_eq!(policy.exponential_delay(10), policy.max_delay);
        assert_eq!(policy.exponential_delay(u32::MAX), policy.max_delay);
    }

    #[test]
    fn test_short_lived_subscriptions_are_not_stable() {
        let policy = ReconnectPolicy::default();

        assert!(!policy.is_stable(Duration::from_millis(10)));
        assert!(!policy.is_stable(Duration::from_secs(29)));
        assert!(policy.is_stable(Duration::from_secs(30)));
    }

    #[test]
    fn test_zero_max_reconnects_retries_forever() {
        let unlimited = ReconnectPolicy::new(Duration::from_secs(2), 0);
        assert!(unlimited.should_retry(10_000));

        let limited = ReconnectPolicy::new(Duration::from_secs(2), 3);
        assert!(limited.should_retry(2));
        assert!(!limited.should_retry(3));
    }
}
