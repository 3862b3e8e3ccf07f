//! Handler registry keyed by message type.
//!
//! ## Example
//!
//! ```ignore
//! let pipeline = HandlerPipeline::new()
//!     .handle::<PlaceOrder, _>(|ctx, order| {
//!         ctx.reply(&OrderPlaced { id: order.id })?;
//!         Ok(())
//!     });
//! ```

use std::collections::HashMap;

use serde::de::DeserializeOwned;

use super::context::IncomingContext;
use super::error::HandlerError;
use super::Pipeline;
use crate::serialization::{type_name_of, Message};

type Handler = Box<dyn Fn(&IncomingContext<'_>, &Message) -> Result<(), HandlerError> + Send + Sync>;

/// A pipeline that dispatches each message to the handlers registered for
/// its type header, in registration order.
///
/// A message whose type has no handler fails with
/// [`HandlerError::NoHandlers`].
#[derive(Default)]
pub struct HandlerPipeline {
    handlers: HashMap<String, Vec<Handler>>,
}

impl HandlerPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed handler for `T`.
    ///
    /// Returns `self` for chaining. Several handlers may be registered for
    /// the same type; all of them run.
    pub fn handle<T, F>(self, handler: F) -> Self
    where
        T: DeserializeOwned + 'static,
        F: Fn(&IncomingContext<'_>, T) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.handle_type(type_name_of::<T>(), move |ctx, message| {
            let body = message.body_as::<T>()?;
            handler(ctx, body)
        })
    }

    /// Register an untyped handler for messages whose type header equals `message_type`.
    pub fn handle_type<F>(mut self, message_type: &str, handler: F) -> Self
    where
        F: Fn(&IncomingContext<'_>, &Message) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.handlers
            .entry(message_type.to_string())
            .or_default()
            .push(Box::new(handler));
        self
    }

    /// List the message types with at least one handler.
    pub fn message_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }
}

impl Pipeline for HandlerPipeline {
    fn invoke(&self, context: &IncomingContext<'_>) -> Result<(), HandlerError> {
        let message = context.message()?;
        let message_type = message.message_type().unwrap_or_default();

        let handlers = self
            .handlers
            .get(message_type)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| HandlerError::NoHandlers(message_type.to_string()))?;

        for handler in handlers {
            handler(context, &message)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for HandlerPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerPipeline")
            .field("message_types", &self.message_types())
            .finish()
    }
}
