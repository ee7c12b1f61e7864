// Public modules
pub mod chat;
pub mod client;
pub mod credentials;
pub mod error;
pub mod observability;
pub mod render;
pub mod sse;
pub mod transport;
pub mod types;

// Re-exports
pub use chat::{ChatSession, EmptyResponsePolicy, Reply, ReplyStatus};
pub use client::{ChatClient, ClientOptions};
pub use credentials::{CredentialSource, CredentialStore};
pub use error::{Error, FailureKind, Result};
pub use observability::register_biometrics;
pub use transport::{FragmentStream, Transport};
pub use types::*;
