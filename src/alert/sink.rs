//! Delivery sink interface.
//!
//! A sink sends a formatted message body to a recipient over some transport
//! (a messaging gateway in production, a recording fake in tests, a
//! log-only stub when nothing is configured). Sink failures distinguish
//! transient conditions, which the dispatcher retries with backoff, from
//! permanent ones, which it drops immediately after logging.

use std::fmt;
use std::future::Future;

use thiserror::Error;
use tracing::info;

use crate::types::RecipientId;

/// The kind of sink failure, categorized for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkErrorKind {
    /// Transient failure - safe to retry with backoff (timeouts, 5xx).
    Transient,

    /// Permanent failure - retrying the same send cannot help
    /// (unknown recipient, rejected payload).
    Permanent,
}

impl SinkErrorKind {
    pub fn is_retriable(&self) -> bool {
        matches!(self, SinkErrorKind::Transient)
    }
}

/// A delivery failure with categorization for retry decisions.
#[derive(Debug, Error)]
pub struct SinkError {
    pub kind: SinkErrorKind,
    pub message: String,
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SinkErrorKind::Transient => write!(f, "transient delivery failure: {}", self.message),
            SinkErrorKind::Permanent => write!(f, "permanent delivery failure: {}", self.message),
        }
    }
}

impl SinkError {
    pub fn transient(message: impl Into<String>) -> Self {
        SinkError {
            kind: SinkErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        SinkError {
            kind: SinkErrorKind::Permanent,
            message: message.into(),
        }
    }
}

/// Transport for outbound messages.
pub trait DeliverySink: Send + Sync + 'static {
    /// Sends one message body to a recipient.
    fn send(
        &self,
        recipient: &RecipientId,
        body: &str,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Sink that logs instead of sending.
///
/// Used when no real transport is configured, so the herald can run end to
/// end (scheduling, persistence, HTTP surface) with alerts visible in the
/// logs only.
#[derive(Debug, Clone, Default)]
pub struct LoggingSink;

impl DeliverySink for LoggingSink {
    async fn send(&self, recipient: &RecipientId, body: &str) -> Result<(), SinkError> {
        info!(%recipient, %body, "dry-run delivery");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_categorize_retriability() {
        assert!(SinkErrorKind::Transient.is_retriable());
        assert!(!SinkErrorKind::Permanent.is_retriable());
    }

    #[test]
    fn display_includes_kind_and_message() {
        let e = SinkError::transient("gateway timeout");
        assert_eq!(e.to_string(), "transient delivery failure: gateway timeout");

        let e = SinkError::permanent("unknown recipient");
        assert_eq!(e.to_string(), "permanent delivery failure: unknown recipient");
    }

    #[tokio::test]
    async fn logging_sink_always_succeeds() {
        let sink = LoggingSink;
        let recipient = RecipientId::new("household");
        assert!(sink.send(&recipient, "hello").await.is_ok());
    }
}
