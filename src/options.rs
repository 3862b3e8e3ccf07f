//! Harness options.
//!
//! [`TestingOptionsBuilder`] follows the `with_*` builder style and can also
//! be deserialized from JSON; missing fields take their defaults. `build`
//! validates and produces the immutable [`TestingOptions`].

use chrono::Duration;
use serde::Deserialize;

use crate::error::BusError;

pub const DEFAULT_INPUT_QUEUE: &str = "InputQueue";
pub const DEFAULT_SUBSCRIBER_QUEUE: &str = "SubscriberQueue";
pub const DEFAULT_REPLY_QUEUE: &str = "ReplyQueue";
pub const DEFAULT_ERROR_QUEUE: &str = "error";

/// Validated harness options.
#[derive(Debug, Clone, PartialEq)]
pub struct TestingOptions {
    input_queue_name: String,
    subscriber_queue_name: String,
    reply_queue_name: String,
    error_queue_name: String,
    deferral_processing_limit: Duration,
    max_processed_messages: usize,
    max_delivery_attempts: u32,
}

impl Default for TestingOptions {
    fn default() -> Self {
        Self {
            input_queue_name: DEFAULT_INPUT_QUEUE.to_string(),
            subscriber_queue_name: DEFAULT_SUBSCRIBER_QUEUE.to_string(),
            reply_queue_name: DEFAULT_REPLY_QUEUE.to_string(),
            error_queue_name: DEFAULT_ERROR_QUEUE.to_string(),
            deferral_processing_limit: Duration::seconds(1),
            max_processed_messages: 100,
            max_delivery_attempts: 5,
        }
    }
}

impl TestingOptions {
    pub fn builder() -> TestingOptionsBuilder {
        TestingOptionsBuilder::default()
    }

    /// The queue the bus under test receives from.
    pub fn input_queue_name(&self) -> &str {
        &self.input_queue_name
    }

    /// The queue that is always subscribed to every published topic.
    pub fn subscriber_queue_name(&self) -> &str {
        &self.subscriber_queue_name
    }

    /// Return address for messages sent from outside a handler.
    pub fn reply_queue_name(&self) -> &str {
        &self.reply_queue_name
    }

    pub fn error_queue_name(&self) -> &str {
        &self.error_queue_name
    }

    /// Lookahead for deferred messages: one due within this window counts as due.
    pub fn deferral_processing_limit(&self) -> Duration {
        self.deferral_processing_limit
    }

    /// Ceiling on messages processed by a single drain call.
    pub fn max_processed_messages(&self) -> usize {
        self.max_processed_messages
    }

    pub fn max_delivery_attempts(&self) -> u32 {
        self.max_delivery_attempts
    }
}

/// Builder for [`TestingOptions`].
///
/// ## Example
///
/// ```
/// use testbus::TestingOptions;
///
/// let options = TestingOptions::builder()
///     .with_input_queue_name("orders")
///     .with_max_processed_messages(10)
///     .build()
///     .unwrap();
/// assert_eq!(options.input_queue_name(), "orders");
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TestingOptionsBuilder {
    input_queue_name: String,
    subscriber_queue_name: String,
    reply_queue_name: String,
    error_queue_name: String,
    deferral_processing_limit_ms: i64,
    max_processed_messages: usize,
    max_delivery_attempts: u32,
}

impl Default for TestingOptionsBuilder {
    fn default() -> Self {
        let defaults = TestingOptions::default();
        Self {
            input_queue_name: defaults.input_queue_name,
            subscriber_queue_name: defaults.subscriber_queue_name,
            reply_queue_name: defaults.reply_queue_name,
            error_queue_name: defaults.error_queue_name,
            deferral_processing_limit_ms: defaults.deferral_processing_limit.num_milliseconds(),
            max_processed_messages: defaults.max_processed_messages,
            max_delivery_attempts: defaults.max_delivery_attempts,
        }
    }
}

impl TestingOptionsBuilder {
    pub fn with_input_queue_name(mut self, name: impl Into<String>) -> Self {
        self.input_queue_name = name.into();
        self
    }

    pub fn with_subscriber_queue_name(mut self, name: impl Into<String>) -> Self {
        self.subscriber_queue_name = name.into();
        self
    }

    pub fn with_reply_queue_name(mut self, name: impl Into<String>) -> Self {
        self.reply_queue_name = name.into();
        self
    }

    pub fn with_error_queue_name(mut self, name: impl Into<String>) -> Self {
        self.error_queue_name = name.into();
        self
    }

    pub fn with_deferral_processing_limit(mut self, limit: Duration) -> Self {
        self.deferral_processing_limit_ms = limit.num_milliseconds();
        self
    }

    pub fn with_max_processed_messages(mut self, max: usize) -> Self {
        self.max_processed_messages = max;
        self
    }

    pub fn with_max_delivery_attempts(mut self, attempts: u32) -> Self {
        self.max_delivery_attempts = attempts;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<TestingOptions, BusError> {
        if self.deferral_processing_limit_ms < 0 {
            return Err(BusError::Configuration(format!(
                "deferral processing limit must not be negative, got {}ms",
                self.deferral_processing_limit_ms
            )));
        }
        if self.max_processed_messages == 0 {
            return Err(BusError::Configuration(
                "max processed messages must be at least 1".into(),
            ));
        }
        if self.max_delivery_attempts == 0 {
            return Err(BusError::Configuration(
                "max delivery attempts must be at least 1".into(),
            ));
        }

        let names = [
            ("input", &self.input_queue_name),
            ("subscriber", &self.subscriber_queue_name),
            ("reply", &self.reply_queue_name),
            ("error", &self.error_queue_name),
        ];
        for (role, name) in names {
            if name.trim().is_empty() {
                return Err(BusError::Configuration(format!("{role} queue name is empty")));
            }
        }
        for (i, (first, a)) in names.iter().enumerate() {
            for (second, b) in &names[i + 1..] {
                if a.to_lowercase() == b.to_lowercase() {
                    return Err(BusError::ReservedQueueName {
                        first: *first,
                        second: *second,
                        name: a.to_string(),
                    });
                }
            }
        }

        let deferral_processing_limit = Duration::try_milliseconds(self.deferral_processing_limit_ms)
            .ok_or_else(|| {
                BusError::Configuration(format!(
                    "deferral processing limit out of range: {}ms",
                    self.deferral_processing_limit_ms
                ))
            })?;

        Ok(TestingOptions {
            input_queue_name: self.input_queue_name,
            subscriber_queue_name: self.subscriber_queue_name,
            reply_queue_name: self.reply_queue_name,
            error_queue_name: self.error_queue_name,
            deferral_processing_limit,
            max_processed_messages: self.max_processed_messages,
            max_delivery_attempts: self.max_delivery_attempts,
        })
    }
}
