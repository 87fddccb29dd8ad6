//! Rate-limit detection and backoff delay computation.
//!
//! Providers report quota exhaustion as message text rather than a distinct
//! error type, so classification and delay hints both work on the rendered
//! error message. [`BackoffConfig`] supplies the exponential fallback and the
//! hard ceiling applied to every computed wait.

use std::time::Duration;

/// Case-insensitive substrings that mark an error as a transient rate limit.
pub const RATE_LIMIT_MARKERS: &[&str] = &["resource_exhausted", "429", "quota", "rate limit"];

/// Whether an error message describes a rate-limit / quota failure.
///
/// # Example
///
/// ```
/// use wiki_quiz::backend::backoff::is_rate_limited;
///
/// assert!(is_rate_limited("HTTP 429: Too Many Requests"));
/// assert!(is_rate_limited("Quota exceeded for metric"));
/// assert!(!is_rate_limited("HTTP 400: invalid argument"));
/// ```
pub fn is_rate_limited(message: &str) -> bool {
    let lower = message.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m))
}

/// Configuration for rate-limit retry.
///
/// # Example
///
/// ```
/// use wiki_quiz::backend::BackoffConfig;
/// use std::time::Duration;
///
/// let standard = BackoffConfig::standard();
/// assert_eq!(standard.max_attempts, 3);
///
/// // Exponential fallback when the message carries no hint: 5s, 10s, 20s, ...
/// assert_eq!(standard.delay_for("HTTP 429", 1), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Total calls allowed, counting the first one. Default: 3.
    pub max_attempts: u32,

    /// Fallback delay before the first retry. Default: 5 seconds.
    pub base_delay: Duration,

    /// Multiplier applied per attempt for the fallback delay. Default: 2.0.
    pub multiplier: f64,

    /// Ceiling for any computed delay, hinted or not. Default: 120 seconds.
    pub max_delay: Duration,
}

impl BackoffConfig {
    /// Three attempts, 5s exponential fallback, 120s ceiling.
    pub fn standard() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            multiplier: 2.0,
            max_delay: Duration::from_secs(120),
        }
    }

    /// A single attempt. Rate limits surface immediately as `RetryExhausted`.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::standard()
        }
    }

    /// For interactive use (user is waiting): 2 attempts, 1s base, 10s ceiling.
    pub fn interactive() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }

    /// Exponential fallback for attempt N (0-indexed), capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_secs_f64() * self.multiplier.powi(attempt.min(1024) as i32);
        self.clamp(base)
    }

    /// Delay before retrying after `message` failed on attempt N (0-indexed).
    ///
    /// A hint in the message (`retry in 56.7s`, then `retryDelay: "56s"`)
    /// wins over the exponential fallback. Either way the result is clamped
    /// to `max_delay`.
    pub fn delay_for(&self, message: &str, attempt: u32) -> Duration {
        match hinted_delay_secs(message) {
            Some(secs) => self.clamp(secs),
            None => self.delay_for_attempt(attempt),
        }
    }

    fn clamp(&self, secs: f64) -> Duration {
        let max = self.max_delay.as_secs_f64();
        if secs.is_nan() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs.clamp(0.0, max))
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::standard()
    }
}

/// Server-suggested wait in seconds, if the message carries one.
pub fn hinted_delay_secs(message: &str) -> Option<f64> {
    retry_in_secs(message).or_else(|| retry_delay_secs(message))
}

/// `retry in <number>s`, where number may have a fractional part.
fn retry_in_secs(message: &str) -> Option<f64> {
    const KEY: &str = "retry in ";
    message.match_indices(KEY).find_map(|(idx, _)| {
        let rest = &message[idx + KEY.len()..];
        let int_len = digit_prefix_len(rest);
        if int_len == 0 {
            return None;
        }
        let mut len = int_len;
        if let Some(frac) = rest[int_len..].strip_prefix('.') {
            let frac_len = digit_prefix_len(frac);
            if frac_len > 0 {
                len += 1 + frac_len;
            }
        }
        if rest[len..].starts_with('s') {
            rest[..len].parse().ok()
        } else {
            None
        }
    })
}

/// `retryDelay<non-word chars><integer>s`, e.g. `'retryDelay': '56s'`.
fn retry_delay_secs(message: &str) -> Option<f64> {
    const KEY: &str = "retryDelay";
    message.match_indices(KEY).find_map(|(idx, _)| {
        let rest = message[idx + KEY.len()..]
            .trim_start_matches(|c: char| !(c.is_alphanumeric() || c == '_'));
        let len = digit_prefix_len(rest);
        if len > 0 && rest[len..].starts_with('s') {
            rest[..len].parse().ok()
        } else {
            None
        }
    })
}

fn digit_prefix_len(s: &str) -> usize {
    s.bytes().take_while(u8::is_ascii_digit).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_rate_limit_markers() {
        assert!(is_rate_limited("429 RESOURCE_EXHAUSTED"));
        assert!(is_rate_limited("resource_exhausted"));
        assert!(is_rate_limited("You exceeded your current QUOTA"));
        assert!(is_rate_limited("Rate Limit reached for requests"));
        assert!(!is_rate_limited("connection refused"));
        assert!(!is_rate_limited("pipeline was cancelled"));
    }

    #[test]
    fn retry_in_hint_with_fraction() {
        let msg = "429 You exceeded your current quota. Please retry in 56.73s.";
        assert_eq!(hinted_delay_secs(msg), Some(56.73));
    }

    #[test]
    fn retry_in_hint_integer() {
        assert_eq!(hinted_delay_secs("Please retry in 7s"), Some(7.0));
    }

    #[test]
    fn retry_in_requires_seconds_suffix() {
        assert_eq!(hinted_delay_secs("retry in 5 minutes"), None);
    }

    #[test]
    fn retry_delay_hint() {
        let msg = r#"RESOURCE_EXHAUSTED {'@type': 'RetryInfo', 'retryDelay': '42s'}"#;
        assert_eq!(hinted_delay_secs(msg), Some(42.0));
    }

    #[test]
    fn retry_in_beats_retry_delay() {
        let msg = "Please retry in 3s. details: retryDelay: 40s";
        assert_eq!(hinted_delay_secs(msg), Some(3.0));
    }

    #[test]
    fn fractional_retry_delay_is_not_a_hint() {
        assert_eq!(hinted_delay_secs("retryDelay: '12.5s'"), None);
    }

    #[test]
    fn later_occurrence_is_found() {
        let msg = "retry in later please; retry in 9s";
        assert_eq!(hinted_delay_secs(msg), Some(9.0));
    }

    #[test]
    fn exponential_fallback() {
        let config = BackoffConfig::standard();
        assert_eq!(config.delay_for("429", 0), Duration::from_secs(5));
        assert_eq!(config.delay_for("429", 1), Duration::from_secs(10));
        assert_eq!(config.delay_for("429", 2), Duration::from_secs(20));
    }

    #[test]
    fn hint_is_clamped() {
        let config = BackoffConfig::standard();
        assert_eq!(
            config.delay_for("Please retry in 600s", 0),
            Duration::from_secs(120)
        );
    }

    #[test]
    fn delay_never_exceeds_ceiling() {
        let config = BackoffConfig::standard();
        let huge = format!("retry in {}s", "9".repeat(400));
        let messages = [
            "429",
            "Please retry in 56.73s",
            "Please retry in 99999999999999999999999999999999999999s",
            "retryDelay: '86400s'",
            huge.as_str(),
            "quota exceeded",
            "",
        ];
        for msg in messages {
            for attempt in [0, 1, 2, 5, 10, 31, 64, 1000, u32::MAX] {
                let d = config.delay_for(msg, attempt);
                assert!(
                    d <= Duration::from_secs(120),
                    "delay {:?} > 120s for {:?} attempt {}",
                    d,
                    msg,
                    attempt
                );
            }
        }
    }

    #[test]
    fn presets() {
        assert_eq!(BackoffConfig::none().max_attempts, 1);
        assert_eq!(BackoffConfig::interactive().max_delay, Duration::from_secs(10));
        assert_eq!(BackoffConfig::default().max_attempts, 3);
    }
}
