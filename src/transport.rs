//! The seam between a conversation and whatever produces assistant text.

use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::{self, Stream};

use crate::types::{Role, Turn};
use crate::{Error, Result};

/// A lazy, finite, single-pass stream of assistant text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Something that turns a conversation into a stream of assistant text.
///
/// Implementations must not do any work until the returned stream is first
/// polled, must yield fragments in the order they were produced, and must end
/// the stream after yielding an error.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Request a completion for `turns`.
    ///
    /// `turns` is never empty and begins with the system turn; a violation is
    /// reported as a single [`Error::Validation`] item.
    fn complete(&self, turns: &[Turn]) -> FragmentStream;

    /// Check that the transport is usable, e.g. that its credential is accepted.
    async fn verify(&self) -> Result<()> {
        Ok(())
    }
}

/// Check the input constraint every transport shares.
pub fn validate_turns(turns: &[Turn]) -> Result<()> {
    match turns.first() {
        None => Err(Error::validation(
            "a completion needs at least the system turn",
            Some("messages".to_string()),
        )),
        Some(first) if first.role() != Role::System => Err(Error::validation(
            format!("the first turn must be the system turn, not {}", first.role()),
            Some("messages".to_string()),
        )),
        Some(_) => Ok(()),
    }
}

/// A fragment stream that yields `err` and ends.
pub fn failed(err: Error) -> FragmentStream {
    Box::pin(stream::once(async move { Err(err) }))
}
