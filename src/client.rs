//! Client capability: send a [`Message`], get a [`Response`].
//!
//! Implemented by every transport client and by the multi-backend
//! [`ConnectionPool`](crate::pool::ConnectionPool).

use std::time::Duration;

use crate::message::Message;
use crate::response::Response;
use crate::service::BoxFuture;

/// Floor for the send timeout when neither the message nor the client
/// configures one.
pub const MIN_SEND_TIMEOUT: Duration = Duration::from_millis(100);

/// Sends messages to a service.
pub trait Client: Send + Sync {
    /// Response type produced by this client.
    type Response: Response + 'static;

    /// Send `msg` and wait for the response.
    ///
    /// Failures are reported through [`Response::error`], never as a panic.
    fn send(&self, msg: Message) -> BoxFuture<'_, Self::Response>;
}

/// Pick the timeout for one send.
///
/// The message's own timeout wins; otherwise `fallback` (the client's batch
/// delay); otherwise [`MIN_SEND_TIMEOUT`].
#[inline]
pub fn resolve_timeout(message_timeout: Duration, fallback: Duration) -> Duration {
    if !message_timeout.is_zero() {
        message_timeout
    } else if !fallback.is_zero() {
        fallback
    } else {
        MIN_SEND_TIMEOUT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_timeout_wins() {
        assert_eq!(
            resolve_timeout(Duration::from_secs(2), Duration::from_secs(1)),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_fallback_used_when_message_unset() {
        assert_eq!(
            resolve_timeout(Duration::ZERO, Duration::from_millis(300)),
            Duration::from_millis(300)
        );
    }

    #[test]
    fn test_minimum_when_both_unset() {
        assert_eq!(resolve_timeout(Duration::ZERO, Duration::ZERO), MIN_SEND_TIMEOUT);
    }
}
