use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{error, warn};

use super::context::IncomingContext;
use super::error::HandlerError;
use super::Pipeline;
use crate::transport::headers;

/// Wraps a pipeline with bounded redelivery and an error queue.
///
/// A failed attempt aborts the handling transaction, so nothing the handler
/// staged is delivered and the message goes back to its queue. Failures are
/// tracked per message id. Once a message has failed
/// `max_delivery_attempts` times, its next delivery copies it to the error
/// queue with an error-details header instead of invoking the inner
/// pipeline, and that transaction commits.
///
/// Messages without an id are not tracked; their failures propagate.
pub struct RetryStep {
    inner: Box<dyn Pipeline>,
    error_queue: String,
    max_delivery_attempts: u32,
    failures: Mutex<HashMap<String, Vec<String>>>,
}

impl RetryStep {
    pub fn new(inner: Box<dyn Pipeline>, error_queue: impl Into<String>, max_delivery_attempts: u32) -> Self {
        Self {
            inner,
            error_queue: error_queue.into(),
            max_delivery_attempts,
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn error_queue(&self) -> &str {
        &self.error_queue
    }

    /// Number of failed attempts recorded for `message_id`.
    pub fn failed_attempts(&self, message_id: &str) -> usize {
        self.failures.lock().get(message_id).map_or(0, Vec::len)
    }

    /// Forget every recorded failure.
    pub fn clear(&self) {
        self.failures.lock().clear();
    }

    fn record_failure(&self, message_id: &str, err: &HandlerError) -> usize {
        let mut failures = self.failures.lock();
        let errors = failures.entry(message_id.to_string()).or_default();
        errors.push(err.to_string());
        errors.len()
    }

    fn exhausted(&self, message_id: &str) -> Option<Vec<String>> {
        let failures = self.failures.lock();
        failures
            .get(message_id)
            .filter(|errors| errors.len() >= self.max_delivery_attempts as usize)
            .cloned()
    }

    fn move_to_error_queue(
        &self,
        context: &IncomingContext<'_>,
        message_id: &str,
        errors: Vec<String>,
    ) -> Result<(), HandlerError> {
        let details = errors
            .iter()
            .enumerate()
            .map(|(i, e)| format!("attempt {}: {}", i + 1, e))
            .collect::<Vec<_>>()
            .join("\n");

        context.forward_with_headers(
            &self.error_queue,
            vec![(headers::ERROR_DETAILS.to_string(), details)],
        )?;
        self.failures.lock().remove(message_id);

        error!(
            message_id,
            attempts = errors.len(),
            error_queue = %self.error_queue,
            "moving message to error queue"
        );
        Ok(())
    }
}

impl Pipeline for RetryStep {
    fn invoke(&self, context: &IncomingContext<'_>) -> Result<(), HandlerError> {
        let Some(message_id) = context.message_id().map(str::to_string) else {
            return self.inner.invoke(context);
        };

        if let Some(errors) = self.exhausted(&message_id) {
            return self.move_to_error_queue(context, &message_id, errors);
        }

        match self.inner.invoke(context) {
            Ok(()) => {
                self.failures.lock().remove(&message_id);
                Ok(())
            }
            Err(err) => {
                let attempts = self.record_failure(&message_id, &err);
                warn!(%message_id, attempts, error = %err, "message handling failed");
                context.transaction().abort();
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for RetryStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryStep")
            .field("error_queue", &self.error_queue)
            .field("max_delivery_attempts", &self.max_delivery_attempts)
            .field("tracked", &self.failures.lock().len())
            .finish()
    }
}
