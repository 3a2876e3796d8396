use std::time::Duration;

use crate::config::ApiConfig;

/// What drives `tick()` while capturing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    /// A countdown task ticks at this period (one second in practice)
    Interval(Duration),
    /// The caller invokes `tick()` itself
    Manual,
}

/// Configuration for a session controller
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Language of the attempt (1 = English)
    pub language_id: u32,

    /// Target CLB band sent with submissions
    pub targeting_score: u8,

    /// Response time used when neither the slot nor the prompt provides one
    pub default_response_secs: u32,

    /// Upper bound for a scoring submission
    pub submit_timeout: Duration,

    pub clock: Clock,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            language_id: 1,
            targeting_score: 12,
            default_response_secs: 60,
            submit_timeout: Duration::from_secs(60),
            clock: Clock::Interval(Duration::from_secs(1)),
        }
    }
}

impl SessionConfig {
    pub fn from_api(api: &ApiConfig) -> Self {
        Self {
            language_id: api.language_id,
            targeting_score: api.targeting_score,
            submit_timeout: Duration::from_secs(api.submit_timeout_secs),
            ..Self::default()
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}
