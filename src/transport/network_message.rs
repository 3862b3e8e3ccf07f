use std::fmt;

use chrono::{DateTime, Duration, Utc};

use super::headers;
use super::{TransportError, TransportMessage};
use crate::clock::{saturating_add, saturating_sub};
use crate::transaction::TransactionId;

/// Network-wide sequence number of a stored message, the ordering tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "message #{}", self.0)
    }
}

/// A stored message plus its visibility window and current owner.
///
/// `visible_after` comes from the deferred-until header (enqueue time when
/// absent). `visible_before` is sent-time (or enqueue time) plus the
/// time-to-be-received header, unbounded when there is no such header.
#[derive(Debug, Clone)]
pub struct NetworkMessage {
    id: MessageId,
    message: TransportMessage,
    visible_after: DateTime<Utc>,
    visible_before: Option<DateTime<Utc>>,
    owner: Option<TransactionId>,
}

impl NetworkMessage {
    /// Wrap a copy of `message`, deriving the visibility window from its headers.
    pub fn new(
        id: MessageId,
        message: TransportMessage,
        now: DateTime<Utc>,
    ) -> Result<Self, TransportError> {
        let visible_after = match message.header(headers::DEFERRED_UNTIL) {
            Some(value) => parse_header(headers::DEFERRED_UNTIL, value, headers::parse_timestamp)?,
            None => now,
        };

        let visible_before = match message.header(headers::TIME_TO_BE_RECEIVED) {
            Some(value) => {
                let ttl = parse_header(headers::TIME_TO_BE_RECEIVED, value, headers::parse_time_span)?;
                let sent = match message.header(headers::SENT_TIME) {
                    Some(value) => parse_header(headers::SENT_TIME, value, headers::parse_timestamp)?,
                    None => now,
                };
                Some(saturating_add(sent, ttl))
            }
            None => None,
        };

        Ok(Self {
            id,
            message,
            visible_after,
            visible_before,
            owner: None,
        })
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn message(&self) -> &TransportMessage {
        &self.message
    }

    pub fn visible_after(&self) -> DateTime<Utc> {
        self.visible_after
    }

    pub fn visible_before(&self) -> Option<DateTime<Utc>> {
        self.visible_before
    }

    pub fn owner(&self) -> Option<TransactionId> {
        self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: Option<TransactionId>) {
        self.owner = owner;
    }

    /// Ordering key for consumption and listing.
    pub fn sort_key(&self) -> (DateTime<Utc>, MessageId) {
        (self.visible_after, self.id)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.visible_before.is_some_and(|before| before < now)
    }

    /// Unowned, not expired at `now`, and due no later than `horizon`.
    pub fn is_receivable(&self, now: DateTime<Utc>, horizon: DateTime<Utc>) -> bool {
        self.owner.is_none() && self.visible_after <= horizon && !self.is_expired(now)
    }

    /// Pretend `delta` has elapsed: move both window edges back and rewrite
    /// the deferred-until and sent-time headers that encode them.
    pub fn shift_time(&mut self, delta: Duration) {
        self.visible_after = saturating_sub(self.visible_after, delta);
        self.visible_before = self.visible_before.map(|before| saturating_sub(before, delta));

        if self.message.headers.contains_key(headers::DEFERRED_UNTIL) {
            self.message.headers.insert(
                headers::DEFERRED_UNTIL.to_string(),
                headers::format_timestamp(self.visible_after),
            );
        }
        let sent = self
            .message
            .header(headers::SENT_TIME)
            .and_then(headers::parse_timestamp);
        if let Some(sent) = sent {
            self.message.headers.insert(
                headers::SENT_TIME.to_string(),
                headers::format_timestamp(saturating_sub(sent, delta)),
            );
        }
    }

    /// Move only the earliest-visible time back by `delta`. Headers are untouched.
    pub fn decrease_deferral(&mut self, delta: Duration) {
        self.visible_after = saturating_sub(self.visible_after, delta);
    }
}

impl fmt::Display for NetworkMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}

fn parse_header<T>(
    name: &str,
    value: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, TransportError> {
    parse(value).ok_or_else(|| TransportError::InvalidHeader {
        name: name.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn plain_message_is_visible_now_and_never_expires() {
        let message = NetworkMessage::new(MessageId(1), TransportMessage::default(), now()).unwrap();
        assert_eq!(message.visible_after(), now());
        assert_eq!(message.visible_before(), None);
        assert!(message.is_receivable(now(), now()));
        assert!(!message.is_expired(now() + Duration::days(365)));
    }

    #[test]
    fn deferred_until_sets_visible_after() {
        let due = now() + Duration::seconds(5);
        let transport = TransportMessage::default()
            .with_header(headers::DEFERRED_UNTIL, headers::format_timestamp(due));
        let message = NetworkMessage::new(MessageId(1), transport, now()).unwrap();

        assert_eq!(message.visible_after(), due);
        assert!(!message.is_receivable(now(), now()));
        assert!(message.is_receivable(now(), now() + Duration::seconds(5)));
    }

    #[test]
    fn ttl_counts_from_sent_time() {
        let sent = now() - Duration::seconds(2);
        let transport = TransportMessage::default()
            .with_header(headers::SENT_TIME, headers::format_timestamp(sent))
            .with_header(headers::TIME_TO_BE_RECEIVED, "00:00:05");
        let message = NetworkMessage::new(MessageId(1), transport, now()).unwrap();

        assert_eq!(message.visible_before(), Some(now() + Duration::seconds(3)));
        assert!(!message.is_expired(now() + Duration::seconds(3)));
        assert!(message.is_expired(now() + Duration::seconds(4)));
    }

    #[test]
    fn malformed_header_is_rejected() {
        let transport = TransportMessage::default().with_header(headers::DEFERRED_UNTIL, "soon");
        let err = NetworkMessage::new(MessageId(1), transport, now()).unwrap_err();
        assert!(matches!(err, TransportError::InvalidHeader { ref name, .. } if name == headers::DEFERRED_UNTIL));
    }

    #[test]
    fn shift_time_moves_window_and_headers() {
        let due = now() + Duration::seconds(10);
        let transport = TransportMessage::default()
            .with_header(headers::DEFERRED_UNTIL, headers::format_timestamp(due))
            .with_header(headers::SENT_TIME, headers::format_timestamp(now()))
            .with_header(headers::TIME_TO_BE_RECEIVED, "00:01:00");
        let mut message = NetworkMessage::new(MessageId(1), transport, now()).unwrap();

        message.shift_time(Duration::seconds(10));

        assert_eq!(message.visible_after(), now());
        assert_eq!(message.visible_before(), Some(now() + Duration::seconds(50)));
        assert_eq!(
            message.message().header(headers::DEFERRED_UNTIL),
            Some(headers::format_timestamp(now()).as_str())
        );
        assert_eq!(
            message.message().header(headers::SENT_TIME),
            Some(headers::format_timestamp(now() - Duration::seconds(10)).as_str())
        );
    }

    #[test]
    fn decrease_deferral_only_touches_visible_after() {
        let due = now() + Duration::seconds(5);
        let header = headers::format_timestamp(due);
        let transport = TransportMessage::default()
            .with_header(headers::DEFERRED_UNTIL, header.clone())
            .with_header(headers::TIME_TO_BE_RECEIVED, "00:00:30");
        let mut message = NetworkMessage::new(MessageId(1), transport, now()).unwrap();

        message.decrease_deferral(Duration::seconds(5));

        assert_eq!(message.visible_after(), now());
        assert_eq!(message.visible_before(), Some(now() + Duration::seconds(30)));
        assert_eq!(message.message().header(headers::DEFERRED_UNTIL), Some(header.as_str()));
    }
}
