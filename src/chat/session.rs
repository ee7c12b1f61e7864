//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the conversation
//! history and turns user input into streamed replies.

use std::time::Duration;

use futures::StreamExt;

use crate::Error;
use crate::chat::config::{ChatConfig, DEFAULT_ASSISTANT_LABEL};
use crate::chat::history::History;
use crate::chat::reply::{EmptyResponsePolicy, Reply, ReplyStatus, SessionCounters};
use crate::error::Result;
use crate::observability::CHAT_SUBMITS;
use crate::render::Renderer;
use crate::transport::Transport;
use crate::types::Turn;

/// How often the interrupt flag is checked while waiting on the network.
const INTERRUPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A chat session that owns the conversation and talks to a transport.
///
/// The history always starts with the system turn.  Once no [`Reply`] is
/// alive it holds only completed exchanges, plus at most one unanswered user
/// turn after an empty reply under [`EmptyResponsePolicy::Retain`].
pub struct ChatSession<T: Transport> {
    transport: T,
    history: History,
    policy: EmptyResponsePolicy,
    assistant_label: String,
    counters: SessionCounters,
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// The number of turns in the history, system turn included.
    pub turn_count: usize,
    /// Answered user turns currently in the history.
    pub exchanges: usize,
    /// Messages submitted since the session started.
    pub submitted: u64,
    /// Replies that completed with text.
    pub completed: u64,
    /// Replies that failed in the transport.
    pub failed: u64,
    /// Replies that ended without text.
    pub empty: u64,
    /// Replies dropped before they ended.
    pub abandoned: u64,
    /// The last turn is a user message with no reply in the history.
    pub awaiting_reply: bool,
}

impl<T: Transport> ChatSession<T> {
    /// Creates a new chat session whose history holds only `system_prompt`.
    pub fn new(transport: T, system_prompt: impl Into<String>) -> Self {
        Self {
            transport,
            history: History::new(system_prompt),
            policy: EmptyResponsePolicy::default(),
            assistant_label: DEFAULT_ASSISTANT_LABEL.to_string(),
            counters: SessionCounters::default(),
        }
    }

    /// Creates a new chat session from a resolved configuration.
    pub fn from_config(transport: T, config: &ChatConfig) -> Self {
        Self::new(transport, config.system_prompt.clone())
            .with_empty_response_policy(config.empty_response_policy)
            .with_assistant_label(config.assistant_label.clone())
    }

    /// Sets what happens to the user turn when a reply is empty.
    pub fn with_empty_response_policy(mut self, policy: EmptyResponsePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the label renderers show in front of replies.
    pub fn with_assistant_label(mut self, label: impl Into<String>) -> Self {
        self.assistant_label = label.into();
        self
    }

    /// Discards every turn except the system turn.
    pub fn reset(&mut self) {
        tracing::debug!(dropped = self.history.len() - 1, "conversation reset");
        self.history.reset();
    }

    /// Appends `text` as a user turn and starts streaming the reply.
    ///
    /// The returned [`Reply`] settles the history when it ends or is dropped.
    /// Empty or whitespace-only input is rejected without touching the history.
    pub fn submit(&mut self, text: &str) -> Result<Reply<'_>> {
        if text.trim().is_empty() {
            return Err(Error::validation(
                "message is empty",
                Some("text".to_string()),
            ));
        }

        let checkpoint = self.history.len();
        self.history.push(Turn::user(text));
        let stream = self.transport.complete(self.history.turns());
        self.counters.submitted += 1;
        CHAT_SUBMITS.click();
        tracing::debug!(turns = self.history.len(), "submitted user turn");

        Ok(Reply::new(
            &mut self.history,
            &mut self.counters,
            stream,
            checkpoint,
            self.policy,
        ))
    }

    /// Submits `text` and drives the reply through `renderer`.
    ///
    /// Returns how the reply ended; a transport failure is returned as the
    /// error after the renderer has been told to cancel.
    pub async fn send_streaming(
        &mut self,
        text: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<ReplyStatus> {
        let label = self.assistant_label.clone();
        let mut reply = self.submit(text)?;
        renderer.start_reply(&label);

        let mut ticker = tokio::time::interval(INTERRUPT_POLL_INTERVAL);
        loop {
            tokio::select! {
                item = reply.next() => match item {
                    Some(Ok(fragment)) => renderer.print_fragment(&fragment),
                    Some(Err(err)) => {
                        renderer.cancel_reply();
                        return Err(err);
                    }
                    None => break,
                },
                _ = ticker.tick() => {}
            }
            if renderer.should_interrupt() {
                drop(reply);
                renderer.cancel_reply();
                renderer.print_interrupted();
                return Ok(ReplyStatus::Abandoned);
            }
        }

        let status = reply.status();
        match status {
            ReplyStatus::Completed => renderer.finish_reply(&label, reply.text()),
            ReplyStatus::Empty => renderer.print_no_response(),
            _ => renderer.cancel_reply(),
        }
        Ok(status)
    }

    /// The conversation so far, system turn first.
    pub fn history(&self) -> &[Turn] {
        self.history.turns()
    }

    /// Returns the number of turns in the conversation.
    pub fn turn_count(&self) -> usize {
        self.history.len()
    }

    pub fn system_prompt(&self) -> &str {
        self.history.system().content()
    }

    pub fn assistant_label(&self) -> &str {
        &self.assistant_label
    }

    pub fn empty_response_policy(&self) -> EmptyResponsePolicy {
        self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns aggregated statistics for the session.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            turn_count: self.history.len(),
            exchanges: self.history.exchanges(),
            submitted: self.counters.submitted,
            completed: self.counters.completed,
            failed: self.counters.failed,
            empty: self.counters.empty,
            abandoned: self.counters.abandoned,
            awaiting_reply: self.history.is_dangling(),
        }
    }
}
