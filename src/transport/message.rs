//! The unit of transport: a header map plus opaque body bytes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A message as it travels through the network.
///
/// Queues store their own copy of every message they accept and hand out
/// copies on receive and listing, so mutating a `TransportMessage` after
/// sending it never changes what a queue holds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportMessage {
    /// Headers (message id, type, visibility, routing, ...)
    pub headers: BTreeMap<String, String>,
    /// Serialized body (JSON for the bundled serializer)
    pub body: Vec<u8>,
}

impl TransportMessage {
    pub fn new(headers: BTreeMap<String, String>, body: Vec<u8>) -> Self {
        Self { headers, body }
    }

    /// Create a message with a string body and no headers.
    pub fn with_string_body(body: impl Into<String>) -> Self {
        Self::new(BTreeMap::new(), body.into().into_bytes())
    }

    /// Add or replace a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|v| v.as_str())
    }

    /// Get the body as a string (if valid UTF-8).
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}
