use std::fmt;

use crate::serialization::Message;

/// Human-readable rendering of one message: type, sorted headers and the
/// indented JSON body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageDetails {
    name: String,
    headers: String,
    body: String,
}

impl MessageDetails {
    pub fn from_message(message: &Message) -> Self {
        let headers = message
            .headers
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n");
        let body = serde_json::to_string_pretty(&message.body).unwrap_or_else(|_| message.body.to_string());

        Self {
            name: message.message_type().unwrap_or("<unknown>").to_string(),
            headers,
            body,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &str {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

impl fmt::Display for MessageDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f)?;
        writeln!(f, "Headers:")?;
        writeln!(f, "{}", self.headers)?;
        writeln!(f)?;
        writeln!(f, "Body:")?;
        write!(f, "{}", self.body)
    }
}

/// Numbered details of every message, separated by blank lines.
pub fn message_summary(messages: &[Message]) -> String {
    messages
        .iter()
        .enumerate()
        .map(|(i, m)| format!("#{}:\n{}", i + 1, MessageDetails::from_message(m)))
        .collect::<Vec<_>>()
        .join("\n\n")
}
