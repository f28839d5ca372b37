//! Per-exchange message counters.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

use crate::context::message::Message;

/// Error count reported when the counted message was not an error
pub const NO_ERROR_COUNTED: i64 = -1;

/// Snapshot returned by [`MessageCounters::increment`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counters {
    /// Total messages counted so far, this one included
    pub message_count: i64,

    /// Errors counted so far when this message was an error, [`NO_ERROR_COUNTED`] otherwise
    pub error_count: i64,
}

/// Monotonic message and error counters of one exchange
///
/// Request-side and response-side streams may increment concurrently from different
/// tasks. Neither counter is ever reset.
#[derive(Debug, Default)]
pub struct MessageCounters {
    messages: AtomicI64,
    errors: AtomicI64,
}

impl MessageCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count `message` and return the resulting snapshot
    pub fn increment(&self, message: &Message) -> Counters {
        let message_count = self.messages.fetch_add(1, Ordering::SeqCst) + 1;
        let error_count = if message.is_error() {
            self.errors.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            NO_ERROR_COUNTED
        };

        Counters {
            message_count,
            error_count,
        }
    }

    pub fn message_count(&self) -> i64 {
        self.messages.load(Ordering::SeqCst)
    }

    pub fn error_count(&self) -> i64 {
        self.errors.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_error_count_sentinel() {
        let counters = MessageCounters::new();

        assert_eq!(
            counters.increment(&Message::new("ok")),
            Counters { message_count: 1, error_count: NO_ERROR_COUNTED }
        );
        assert_eq!(
            counters.increment(&Message::error("ko")),
            Counters { message_count: 2, error_count: 1 }
        );
        assert_eq!(counters.increment(&Message::new("ok")).error_count, NO_ERROR_COUNTED);
        assert_eq!(counters.error_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_increments_yield_unique_ordinals() {
        let counters = Arc::new(MessageCounters::new());
        let mut handles = Vec::new();

        for _ in 0..8 {
            let counters = counters.clone();
            handles.push(tokio::spawn(async move {
                (0..100)
                    .map(|_| counters.increment(&Message::new("m")).message_count)
                    .collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for ordinal in handle.await.unwrap() {
                assert!(seen.insert(ordinal));
            }
        }

        assert_eq!(seen.len(), 800);
        assert_eq!(counters.message_count(), 800);
    }
}
