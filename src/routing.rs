//! Destination lookup for messages sent from inside handlers.

use std::collections::HashMap;

use crate::serialization::{type_name_of, Message};

/// Picks the destination queue for an outgoing message.
pub trait Router: Send + Sync {
    /// `None` means the message cannot be routed.
    fn destination_address(&self, message: &Message) -> Option<String>;
}

/// Routes by the message's type header.
///
/// ## Example
///
/// ```
/// use testbus::{Message, Router, TypeBasedRouter};
///
/// let router = TypeBasedRouter::new().map::<u32>("numbers");
/// let message = Message::from_body(&7u32).unwrap();
/// assert_eq!(router.destination_address(&message).as_deref(), Some("numbers"));
/// ```
#[derive(Debug, Default, Clone)]
pub struct TypeBasedRouter {
    routes: HashMap<String, String>,
    fallback: Option<String>,
}

impl TypeBasedRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route messages of type `T` to `destination`.
    pub fn map<T>(self, destination: impl Into<String>) -> Self {
        self.map_type(type_name_of::<T>(), destination)
    }

    pub fn map_type(mut self, message_type: &str, destination: impl Into<String>) -> Self {
        self.routes.insert(message_type.to_string(), destination.into());
        self
    }

    /// Destination for types without an explicit route.
    pub fn map_fallback(mut self, destination: impl Into<String>) -> Self {
        self.fallback = Some(destination.into());
        self
    }
}

impl Router for TypeBasedRouter {
    fn destination_address(&self, message: &Message) -> Option<String> {
        message
            .message_type()
            .and_then(|t| self.routes.get(t))
            .or(self.fallback.as_ref())
            .cloned()
    }
}
