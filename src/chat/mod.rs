//! Chat module for interactive conversations with a completion endpoint.
//!
//! This module provides the conversation core and the pieces of the REPL
//! built on top of it. It supports:
//!
//! - Streaming replies that settle the history when they end
//! - Rollback of the user turn on failure or interruption
//! - Slash commands for session control
//! - Configurable provider, model, and system prompt
//!
//! # Architecture
//!
//! - [`session`]: the [`ChatSession`] that owns the history
//! - [`reply`]: the [`Reply`] stream for one in-flight turn
//! - [`history`]: the append-only [`History`] with its system turn
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: slash command parsing

pub mod commands;
pub mod config;
pub mod history;
pub mod reply;
pub mod session;

pub use crate::render::{MarkdownRenderer, PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatArgsError, ChatConfig};
pub use history::History;
pub use reply::{EmptyResponsePolicy, Reply, ReplyStatus};
pub use session::{ChatSession, SessionStats};
