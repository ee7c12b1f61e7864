use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("parley.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("parley.client.request_errors");
pub(crate) static CLIENT_VERIFICATIONS: Counter = Counter::new("parley.client.verifications");

pub(crate) static STREAM_BYTES: Counter = Counter::new("parley.stream.bytes");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("parley.stream.errors");
pub(crate) static STREAM_TTFB: Moments = Moments::new("parley.stream.ttfb_seconds");

pub(crate) static CHAT_SUBMITS: Counter = Counter::new("parley.chat.submits");
pub(crate) static CHAT_FRAGMENTS: Counter = Counter::new("parley.chat.fragments");
pub(crate) static CHAT_COMPLETED: Counter = Counter::new("parley.chat.completed");
pub(crate) static CHAT_ROLLBACKS: Counter = Counter::new("parley.chat.rollbacks");
pub(crate) static CHAT_EMPTY_REPLIES: Counter = Counter::new("parley.chat.empty_replies");
pub(crate) static CHAT_ABANDONED: Counter = Counter::new("parley.chat.abandoned");
pub(crate) static CHAT_REPLY_DURATION: Moments =
    Moments::new("parley.chat.reply_duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_counter(&CLIENT_VERIFICATIONS);

    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_moments(&STREAM_TTFB);

    collector.register_counter(&CHAT_SUBMITS);
    collector.register_counter(&CHAT_FRAGMENTS);
    collector.register_counter(&CHAT_COMPLETED);
    collector.register_counter(&CHAT_ROLLBACKS);
    collector.register_counter(&CHAT_EMPTY_REPLIES);
    collector.register_counter(&CHAT_ABANDONED);
    collector.register_moments(&CHAT_REPLY_DURATION);
}
