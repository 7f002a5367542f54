//! Common utilities for web operations.

use chrono::{DateTime, Utc};

/// Format a timestamp in the RFC 1123 shape HTTP headers use
/// (`Tue, 15 Nov 1994 12:45:26 GMT`).
pub fn format_http_date(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse an `If-Modified-Since` style header value. Returns `None` for
/// anything unparseable; a malformed conditional header just disables the
/// conditional check.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}
