//! Scenario Parameter Configuration
//!
//! Limits, intervals and canned identity used when wiring a scenario. Every
//! field has a default, so a configuration file only needs the keys it
//! changes.

use core::time::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

// ----------------------------------------------------------------------------
// Neighbor Configuration
// ----------------------------------------------------------------------------

/// Parameters shared by every scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeighborConfig {
    /// Identity token put in every request and reply
    pub identity: String,
    /// Nickname sent in Greet requests and replies
    pub nickname: String,
    /// Reply count after which a count-limited handler stops the process
    pub reply_limit: u32,
    /// Spacing between periodic requests in milliseconds
    pub request_interval_ms: u64,
    /// Number of requests sent by a bounded request loop
    pub request_bound: u32,
    /// Greet attempts before giving up on a first reply
    pub greet_attempts: u32,
    /// Received Tells per Tell sent back
    pub tell_every_nth_received: u32,
    /// Items in a single Narrate stream
    pub narrate_messages: u32,
    /// Upper bound on one outbound call in milliseconds
    pub call_timeout_ms: u64,
    /// Upper bound on shutdown drain in milliseconds
    pub drain_timeout_ms: u64,
}

impl Default for NeighborConfig {
    fn default() -> Self {
        Self {
            identity: "dummy".to_string(),
            nickname: "dummy".to_string(),
            reply_limit: 10,
            request_interval_ms: 2_000,
            request_bound: 5,
            greet_attempts: 5,
            tell_every_nth_received: 3,
            narrate_messages: 3,
            call_timeout_ms: 1_000,
            drain_timeout_ms: 3_000,
        }
    }
}

impl NeighborConfig {
    /// Short timings for tests
    pub fn testing() -> Self {
        Self {
            request_interval_ms: 20,
            call_timeout_ms: 200,
            drain_timeout_ms: 200,
            ..Self::default()
        }
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Identity must not be empty".to_string(),
            ));
        }

        let counts = [
            ("reply_limit", u64::from(self.reply_limit)),
            ("request_bound", u64::from(self.request_bound)),
            ("greet_attempts", u64::from(self.greet_attempts)),
            ("tell_every_nth_received", u64::from(self.tell_every_nth_received)),
            ("narrate_messages", u64::from(self.narrate_messages)),
            ("request_interval_ms", self.request_interval_ms),
            ("call_timeout_ms", self.call_timeout_ms),
            ("drain_timeout_ms", self.drain_timeout_ms),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(ConfigError::Validation(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        Ok(())
    }
}
