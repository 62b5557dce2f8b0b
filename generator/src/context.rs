//! Run context: everything the build step reads from outside the mapping.
//!
//! Environment variables, the clock and the message identifier are captured
//! once into a [`RunContext`] and passed down explicitly, so tests inject
//! values instead of touching the process environment.

use chrono::{DateTime, SubsecRound, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Values resolved at build time.
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    vars: HashMap<String, String>,
    now: DateTime<Utc>,
    message_id: String,
}

impl RunContext {
    /// Capture the process environment, the current time (whole seconds)
    /// and a fresh message identifier.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
            now: Utc::now().trunc_subsecs(0),
            message_id: Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }

    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// `now` as `YYYY-MM-DDThh:mm:ssZ`.
    pub fn now_iso(&self) -> String {
        self.now.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }
}

impl Default for RunContext {
    /// No variables, the Unix epoch and an all-zero message id.
    fn default() -> Self {
        Self {
            vars: HashMap::new(),
            now: DateTime::<Utc>::UNIX_EPOCH,
            message_id: "0".repeat(32),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_injected_values() {
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 10, 30, 0).unwrap();
        let ctx = RunContext::default()
            .with_var("FIRM_LEI", "5493001KJTIIGC8Y1R12")
            .with_now(now)
            .with_message_id("abc");

        assert_eq!(ctx.var("FIRM_LEI"), Some("5493001KJTIIGC8Y1R12"));
        assert_eq!(ctx.var("TO_LEI"), None);
        assert_eq!(ctx.now_iso(), "2024-01-05T10:30:00Z");
        assert_eq!(ctx.message_id(), "abc");
    }

    #[test]
    fn test_process_context_has_whole_seconds() {
        let ctx = RunContext::from_process();
        assert_eq!(ctx.now().timestamp_subsec_nanos(), 0);
        assert_eq!(ctx.message_id().len(), 32);
    }
}
