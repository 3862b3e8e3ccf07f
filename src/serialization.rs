//! Message bodies and their (de)serialization to transport messages.
//!
//! Logical [`Message`]s carry a JSON body; the [`Serializer`] turns them into
//! [`TransportMessage`]s for the network and back for handlers and message
//! views. The network itself never looks at bodies.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::transport::{headers, TransportMessage};

/// Content type stamped by [`JsonSerializer`].
pub const JSON_CONTENT_TYPE: &str = "application/json;charset=utf-8";

/// Error type for serialization operations.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// JSON encoding or decoding failed
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The transport message declares a body encoding this serializer cannot read
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),
}

/// Name used in the type header and the handler registry for `T`.
pub fn type_name_of<T: ?Sized>() -> &'static str {
    std::any::type_name::<T>()
}

/// A deserialized message: headers plus a JSON body.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

impl Message {
    pub fn new(headers: BTreeMap<String, String>, body: Value) -> Self {
        Self { headers, body }
    }

    /// Build a message from a typed body, stamping its type header.
    pub fn from_body<T: Serialize + ?Sized>(body: &T) -> Result<Self, SerializationError> {
        let mut headers = BTreeMap::new();
        headers.insert(headers::TYPE.to_string(), type_name_of::<T>().to_string());
        Ok(Self::new(headers, serde_json::to_value(body)?))
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|v| v.as_str())
    }

    /// The type header, if any.
    pub fn message_type(&self) -> Option<&str> {
        self.header(headers::TYPE)
    }

    /// Whether the type header names `T`.
    pub fn is<T>(&self) -> bool {
        self.message_type() == Some(type_name_of::<T>())
    }

    /// Deserialize the body into a typed struct.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, SerializationError> {
        Ok(serde_json::from_value(self.body.clone())?)
    }
}

/// Anything the bus accepts as an outgoing message.
///
/// Typed bodies go through [`Message::from_body`]; a prepared [`Message`] is
/// used as is, which is how callers attach extra headers.
pub trait IntoMessage {
    fn into_message(self) -> Result<Message, SerializationError>;
}

impl IntoMessage for Message {
    fn into_message(self) -> Result<Message, SerializationError> {
        Ok(self)
    }
}

impl<T: Serialize + ?Sized> IntoMessage for &T {
    fn into_message(self) -> Result<Message, SerializationError> {
        Message::from_body(self)
    }
}

/// Converts between logical messages and transport messages.
pub trait Serializer: Send + Sync {
    fn serialize(&self, message: &Message) -> Result<TransportMessage, SerializationError>;

    fn deserialize(&self, message: &TransportMessage) -> Result<Message, SerializationError>;
}

/// JSON serializer backed by `serde_json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, message: &Message) -> Result<TransportMessage, SerializationError> {
        let mut headers = message.headers.clone();
        headers
            .entry(headers::CONTENT_TYPE.to_string())
            .or_insert_with(|| JSON_CONTENT_TYPE.to_string());
        Ok(TransportMessage::new(headers, serde_json::to_vec(&message.body)?))
    }

    fn deserialize(&self, message: &TransportMessage) -> Result<Message, SerializationError> {
        if let Some(content_type) = message.header(headers::CONTENT_TYPE) {
            if !content_type.starts_with("application/json") {
                return Err(SerializationError::UnsupportedContentType(
                    content_type.to_string(),
                ));
            }
        }
        let body = serde_json::from_slice(&message.body)?;
        Ok(Message::new(message.headers.clone(), body))
    }
}
