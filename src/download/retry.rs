//! Retry classification and backoff math, adapted from the teacher's
//! `src/download/retry.rs` with the same `FailureType`/`RetryPolicy`
//! shape; `NeedsAuth`/404 handling is repurposed here for the
//! URL-expiry-refresh contract in spec.md §4.5 rather than an
//! authentication prompt.

use std::time::Duration;

use rand::Rng;

/// Coarse classification of a download failure, used to decide whether
/// (and how) to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Worth retrying with backoff (connection reset, timeout, 5xx).
    Transient,
    /// Not worth retrying (4xx other than 404/429).
    Permanent,
    /// The media URL itself has expired; refresh via `resolve_media_url`
    /// rather than a plain retry.
    NeedsRefresh,
    /// Server asked us to slow down.
    RateLimited,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exp = self.backoff_multiplier.powi(attempt as i32);
        let raw = self.base_delay.as_secs_f64() * exp;
        let capped = raw.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped) + calculate_jitter(capped)
    }
}

fn calculate_jitter(base_secs: f64) -> Duration {
    let jitter_fraction = rand::thread_rng().gen_range(0.0..0.25);
    Duration::from_secs_f64(base_secs * jitter_fraction)
}

pub fn classify_http_status(status: u16) -> FailureType {
    match status {
        404 => FailureType::NeedsRefresh,
        429 => FailureType::RateLimited,
        500..=599 => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

pub fn classify_error(error: &reqwest::Error) -> FailureType {
    if error.is_timeout() || error.is_connect() {
        return FailureType::Transient;
    }
    if let Some(status) = error.status() {
        return classify_http_status(status.as_u16());
    }
    FailureType::Transient
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_404_as_needs_refresh() {
        assert_eq!(classify_http_status(404), FailureType::NeedsRefresh);
    }

    #[test]
    fn classifies_5xx_as_transient() {
        assert_eq!(classify_http_status(500), FailureType::Transient);
        assert_eq!(classify_http_status(503), FailureType::Transient);
    }

    #[test]
    fn classifies_429_as_rate_limited() {
        assert_eq!(classify_http_status(429), FailureType::RateLimited);
    }

    #[test]
    fn classifies_other_4xx_as_permanent() {
        assert_eq!(classify_http_status(401), FailureType::Permanent);
        assert_eq!(classify_http_status(403), FailureType::Permanent);
    }

    #[test]
    fn delay_grows_with_attempt_and_respects_cap() {
        let policy = RetryPolicy::default();
        let d0 = policy.calculate_delay(0);
        let d3 = policy.calculate_delay(3);
        assert!(d3 >= d0);
        let d_large = policy.calculate_delay(20);
        // base jitter can add up to 25% on top of max_delay
        assert!(d_large <= policy.max_delay + policy.max_delay.mul_f64(0.25));
    }
}
