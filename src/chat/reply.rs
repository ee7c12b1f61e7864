//! The in-flight half of a conversation turn.

use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Instant;

use futures::stream::{FusedStream, Stream, StreamExt};

use crate::chat::history::History;
use crate::error::{Error, FailureKind, Result};
use crate::observability::{
    CHAT_ABANDONED, CHAT_COMPLETED, CHAT_EMPTY_REPLIES, CHAT_FRAGMENTS, CHAT_REPLY_DURATION,
    CHAT_ROLLBACKS,
};
use crate::transport::FragmentStream;
use crate::types::Turn;

/// Where a [`Reply`] stands.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReplyStatus {
    /// Fragments may still arrive.
    Pending,

    /// The stream ended with text; the assistant turn was appended.
    Completed,

    /// The stream ended without any text.
    Empty,

    /// The transport failed; the user turn was removed.
    Failed(FailureKind),

    /// The reply was dropped before it ended; the user turn was removed.
    Abandoned,
}

impl ReplyStatus {
    /// Why the turn produced no assistant message, if it did not.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ReplyStatus::Failed(kind) => Some(*kind),
            ReplyStatus::Empty => Some(FailureKind::EmptyResponse),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ReplyStatus::Pending)
    }
}

/// What to do with the user turn when the stream ends without text.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum EmptyResponsePolicy {
    /// Leave the unanswered user turn in the history.
    #[default]
    Retain,

    /// Remove the unanswered user turn.
    Rollback,
}

/// Per-session tallies a [`Reply`] updates as it ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SessionCounters {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub empty: u64,
    pub abandoned: u64,
}

/// The assistant's answer to one submitted user turn, as a stream of text.
///
/// A `Reply` holds the session mutably until it is dropped, so there is never
/// more than one in flight.  Polling it to the end settles the history:
///
/// - text arrived: the concatenated fragments become the assistant turn;
/// - nothing arrived: the [`EmptyResponsePolicy`] decides;
/// - the transport failed: the error is yielded once and the user turn is
///   removed.
///
/// Dropping a reply that has not ended removes the user turn as well.
pub struct Reply<'a> {
    history: &'a mut History,
    counters: &'a mut SessionCounters,
    stream: Option<FragmentStream>,
    checkpoint: usize,
    policy: EmptyResponsePolicy,
    buffer: String,
    status: ReplyStatus,
    started: Instant,
}

impl<'a> Reply<'a> {
    pub(crate) fn new(
        history: &'a mut History,
        counters: &'a mut SessionCounters,
        stream: FragmentStream,
        checkpoint: usize,
        policy: EmptyResponsePolicy,
    ) -> Self {
        Self {
            history,
            counters,
            stream: Some(stream),
            checkpoint,
            policy,
            buffer: String::new(),
            status: ReplyStatus::Pending,
            started: Instant::now(),
        }
    }

    /// The text received so far.
    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn status(&self) -> ReplyStatus {
        self.status
    }

    /// Drain the reply and return how it ended.
    ///
    /// A transport failure is returned as the error it was.
    pub async fn finish(mut self) -> Result<ReplyStatus> {
        while let Some(fragment) = self.next().await {
            fragment?;
        }
        Ok(self.status)
    }

    fn rollback(&mut self) {
        self.history.truncate(self.checkpoint);
        CHAT_ROLLBACKS.click();
    }

    fn settle(&mut self, status: ReplyStatus) {
        self.stream = None;
        self.status = status;
        CHAT_REPLY_DURATION.add(self.started.elapsed().as_secs_f64());
    }

    fn fail(&mut self, err: &Error) {
        self.rollback();
        self.counters.failed += 1;
        tracing::warn!(error = %err, "reply failed; user turn rolled back");
        self.settle(ReplyStatus::Failed(err.failure_kind()));
    }

    fn commit(&mut self) {
        if self.buffer.is_empty() {
            CHAT_EMPTY_REPLIES.click();
            self.counters.empty += 1;
            if self.policy == EmptyResponsePolicy::Rollback {
                self.rollback();
            }
            tracing::warn!(policy = ?self.policy, "reply ended without text");
            self.settle(ReplyStatus::Empty);
        } else {
            CHAT_COMPLETED.click();
            self.counters.completed += 1;
            self.history.push(Turn::assistant(self.buffer.clone()));
            tracing::debug!(chars = self.buffer.len(), "reply completed");
            self.settle(ReplyStatus::Completed);
        }
    }
}

impl Stream for Reply<'_> {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(stream) = this.stream.as_mut() else {
            return Poll::Ready(None);
        };
        match ready!(stream.as_mut().poll_next(cx)) {
            Some(Ok(fragment)) => {
                CHAT_FRAGMENTS.click();
                this.buffer.push_str(&fragment);
                Poll::Ready(Some(Ok(fragment)))
            }
            Some(Err(err)) => {
                this.fail(&err);
                Poll::Ready(Some(Err(err)))
            }
            None => {
                this.commit();
                Poll::Ready(None)
            }
        }
    }
}

impl FusedStream for Reply<'_> {
    fn is_terminated(&self) -> bool {
        self.stream.is_none()
    }
}

impl Drop for Reply<'_> {
    fn drop(&mut self) {
        if self.status.is_pending() {
            self.rollback();
            self.counters.abandoned += 1;
            CHAT_ABANDONED.click();
            tracing::debug!("reply abandoned; user turn rolled back");
            self.settle(ReplyStatus::Abandoned);
        }
    }
}
