//! Well-known header names and their value formats.
//!
//! Timestamps are RFC 3339 in UTC with microsecond precision. Time spans
//! use `hh:mm:ss[.fffffff]`, optionally prefixed with `d.` for whole days.

use chrono::{DateTime, Duration, Utc};

/// Unique id of a logical message (stable across retries and forwards).
pub const MESSAGE_ID: &str = "tb-msg-id";
/// Fully qualified type name of the body.
pub const TYPE: &str = "tb-type";
/// Body encoding, e.g. `application/json`.
pub const CONTENT_TYPE: &str = "tb-content-type";
/// The message must not be received before this instant.
pub const DEFERRED_UNTIL: &str = "tb-deferred-until";
/// Queue a deferred message is eventually delivered to.
pub const DEFERRED_RECIPIENT: &str = "tb-deferred-recipient";
/// Time span after `SENT_TIME` at which the message expires.
pub const TIME_TO_BE_RECEIVED: &str = "tb-time-to-be-received";
/// When the message was sent.
pub const SENT_TIME: &str = "tb-senttime";
/// Where replies to this message go.
pub const RETURN_ADDRESS: &str = "tb-return-address";
/// Correlation id carried through a conversation.
pub const CORRELATION_ID: &str = "tb-corr-id";
/// Message id of the message this one replies to.
pub const IN_REPLY_TO: &str = "tb-in-reply-to";
/// `p2p` for sends and replies, `pub` for publishes.
pub const INTENT: &str = "tb-intent";
/// Queue the message was received from before it was forwarded.
pub const SOURCE_QUEUE: &str = "tb-source-queue";
/// Failure details attached when a message is moved to the error queue.
pub const ERROR_DETAILS: &str = "tb-error-details";

pub const INTENT_POINT_TO_POINT: &str = "p2p";
pub const INTENT_PUBLISH: &str = "pub";

/// Render a timestamp for a header value.
///
/// Years outside 0000-9999 render with a sign and do not parse back.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Parse a timestamp header value.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Render a time span as `[d.]hh:mm:ss[.fffffff]`. Negative spans render as zero.
pub fn format_time_span(span: Duration) -> String {
    let span = span.max(Duration::zero());
    let total_seconds = span.num_seconds();
    let nanos = (span - Duration::seconds(total_seconds))
        .num_nanoseconds()
        .unwrap_or(0);

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;

    let mut out = if days > 0 {
        format!("{}.{:02}:{:02}:{:02}", days, hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    };
    if nanos > 0 {
        let fraction = format!("{:09}", nanos);
        out.push('.');
        out.push_str(fraction.trim_end_matches('0'));
    }
    out
}

/// Parse a `[d.]hh:mm:ss[.fffffff]` time span.
pub fn parse_time_span(value: &str) -> Option<Duration> {
    let mut parts = value.trim().split(':');
    let (first, minutes, seconds) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let (days, hours) = match first.split_once('.') {
        Some((days, hours)) => (parse_component(days)?, parse_component(hours)?),
        None => (0, parse_component(first)?),
    };
    let minutes = parse_component(minutes)?;
    let (whole, fraction) = seconds.split_once('.').unwrap_or((seconds, ""));
    let whole = parse_component(whole)?;
    if minutes >= 60 || whole >= 60 {
        return None;
    }

    let nanos = if fraction.is_empty() {
        0
    } else {
        if fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        format!("{:0<9}", fraction).parse::<i64>().ok()?
    };

    Duration::try_days(days)?
        .checked_add(&Duration::try_hours(hours)?)?
        .checked_add(&Duration::try_minutes(minutes)?)?
        .checked_add(&Duration::try_seconds(whole)?)?
        .checked_add(&Duration::nanoseconds(nanos))
}

fn parse_component(value: &str) -> Option<i64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}
