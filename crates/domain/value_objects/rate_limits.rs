use chrono::{DateTime, Duration, Utc};

/// Sliding-window limit: at most `rate` accepted attempts per `period`, and at
/// most `burst` within any `period / rate` sub-window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub rate: u32,
    pub burst: u32,
    pub period: Duration,
}

impl RateLimitPolicy {
    pub fn sub_window(&self) -> Duration {
        if self.rate == 0 {
            return self.period;
        }
        self.period / self.rate as i32
    }

    /// Decides whether one more attempt at `now` fits, given the previously
    /// accepted attempts.
    pub fn allows(&self, accepted: &[DateTime<Utc>], now: DateTime<Utc>) -> bool {
        if self.rate == 0 || self.burst == 0 {
            return false;
        }

        let window_start = now - self.period;
        let burst_start = now - self.sub_window();

        let in_window = accepted.iter().filter(|at| **at > window_start).count();
        let in_burst = accepted.iter().filter(|at| **at > burst_start).count();

        in_window < self.rate as usize && in_burst < self.burst as usize
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            rate: 5,
            burst: 1,
            period: Duration::minutes(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_blocks_back_to_back_attempts() {
        let policy = RateLimitPolicy::default();
        let now = Utc::now();

        assert!(policy.allows(&[], now));
        assert!(!policy.allows(&[now - Duration::seconds(30)], now));
        assert!(policy.allows(&[now - Duration::minutes(3)], now));
    }

    #[test]
    fn rate_caps_attempts_per_period() {
        let policy = RateLimitPolicy {
            rate: 3,
            burst: 3,
            period: Duration::minutes(10),
        };
        let now = Utc::now();
        let accepted = vec![
            now - Duration::minutes(9),
            now - Duration::minutes(6),
            now - Duration::minutes(1),
        ];

        assert!(!policy.allows(&accepted, now));
        assert!(policy.allows(&accepted, now + Duration::minutes(2)));
    }
}
