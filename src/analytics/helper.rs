//! Recordability decision shared by analytics stages.

use crate::analytics::counters::{Counters, MessageCounters};
use crate::analytics::sampling::MessageSamplingStrategy;
use crate::context::message::{Message, ATTR_INTERNAL_MESSAGE_COUNTERS, ATTR_INTERNAL_MESSAGE_RECORDABLE};

pub struct MessageAnalyticsHelper;

impl MessageAnalyticsHelper {
    /// Decide whether `message` is recorded and store the decision on the message
    ///
    /// Error messages are always recorded, whatever the sampling strategy says. Calling this
    /// twice with the same inputs overwrites the attribute with the same value.
    pub fn compute_recordable(
        message: &mut Message,
        strategy: &dyn MessageSamplingStrategy,
        ordinal: i64,
        elapsed_millis: Option<u64>,
    ) -> bool {
        let recordable = strategy.is_recordable(message, ordinal, elapsed_millis) || message.is_error();
        message.set_attribute(ATTR_INTERNAL_MESSAGE_RECORDABLE, recordable);
        recordable
    }

    /// Decision previously stored on `message`, if any
    pub fn recordable(message: &Message) -> Option<bool> {
        message.bool_attribute(ATTR_INTERNAL_MESSAGE_RECORDABLE)
    }

    /// Reuse the decision stored on `message`, promoting it to recordable when the
    /// message has become an error since
    pub fn reuse_recordable(message: &mut Message, decided: bool) -> bool {
        if decided || !message.is_error() {
            return decided;
        }
        message.set_attribute(ATTR_INTERNAL_MESSAGE_RECORDABLE, true);
        true
    }

    /// Count `message` on the exchange once
    ///
    /// The first call stores the snapshot on the message; later calls, from other analytics
    /// stages seeing the same message, return the stored snapshot without counting again.
    pub fn count_once(message: &mut Message, counters: &MessageCounters) -> Counters {
        if let Some(counted) = message
            .attribute(ATTR_INTERNAL_MESSAGE_COUNTERS)
            .and_then(|value| serde_json::from_value::<Counters>(value.clone()).ok())
        {
            return counted;
        }

        let counted = counters.increment(message);
        if let Ok(value) = serde_json::to_value(counted) {
            message.set_attribute(ATTR_INTERNAL_MESSAGE_COUNTERS, value);
        }
        counted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Fixed(bool);

    impl MessageSamplingStrategy for Fixed {
        fn is_recordable(&self, _message: &Message, _ordinal: i64, _elapsed_millis: Option<u64>) -> bool {
            self.0
        }
    }

    #[test]
    fn test_strategy_decision_is_stored() {
        let mut message = Message::new("m");
        assert!(MessageAnalyticsHelper::compute_recordable(&mut message, &Fixed(true), 1, None));
        assert_eq!(MessageAnalyticsHelper::recordable(&message), Some(true));

        let mut message = Message::new("m");
        assert!(!MessageAnalyticsHelper::compute_recordable(&mut message, &Fixed(false), 2, None));
        assert_eq!(MessageAnalyticsHelper::recordable(&message), Some(false));
    }

    #[test]
    fn test_error_message_is_always_recordable() {
        let mut message = Message::error("boom");
        assert!(MessageAnalyticsHelper::compute_recordable(&mut message, &Fixed(false), 7, Some(5)));
        assert_eq!(MessageAnalyticsHelper::recordable(&message), Some(true));
    }

    #[test]
    fn test_reused_decision_promotes_errors() {
        let mut message = Message::new("m").with_attribute(ATTR_INTERNAL_MESSAGE_RECORDABLE, false);
        assert!(!MessageAnalyticsHelper::reuse_recordable(&mut message, false));

        message.set_error(true);
        assert!(MessageAnalyticsHelper::reuse_recordable(&mut message, false));
        assert_eq!(MessageAnalyticsHelper::recordable(&message), Some(true));
    }

    #[test]
    fn test_message_is_counted_once() {
        let counters = MessageCounters::new();
        let mut first = Message::new("a");
        let mut second = Message::error("b");

        let snapshot = MessageAnalyticsHelper::count_once(&mut first, &counters);
        assert_eq!(MessageAnalyticsHelper::count_once(&mut first, &counters), snapshot);
        assert_eq!(snapshot.message_count, 1);

        let snapshot = MessageAnalyticsHelper::count_once(&mut second, &counters);
        assert_eq!(snapshot.message_count, 2);
        assert_eq!(snapshot.error_count, 1);
        assert_eq!(counters.message_count(), 2);
    }

    #[test]
    fn test_idempotent() {
        let mut message = Message::new("m");
        MessageAnalyticsHelper::compute_recordable(&mut message, &Fixed(false), 3, None);
        MessageAnalyticsHelper::compute_recordable(&mut message, &Fixed(false), 3, None);
        assert_eq!(MessageAnalyticsHelper::recordable(&message), Some(false));
    }
}
