// Public modules
pub mod chat_completion_chunk;
pub mod chat_completion_request;
pub mod error_object;
pub mod model_list;
pub mod provider;
pub mod role;
pub mod turn;

// Re-exports
pub use chat_completion_chunk::{ChatCompletionChunk, ChunkChoice, ChunkDelta};
pub use chat_completion_request::ChatCompletionRequest;
pub use error_object::{ErrorObject, ErrorResponse};
pub use model_list::{ModelInfo, ModelList};
pub use provider::Provider;
pub use role::{Role, RoleParseError};
pub use turn::Turn;
