use serde::{Deserialize, Serialize};

/// Response of `GET models`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelList {
    /// The models visible to the credential.
    #[serde(default)]
    pub data: Vec<ModelInfo>,
}

/// A single entry of a [`ModelList`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Identifier to pass as `model` in completion requests.
    pub id: String,

    /// Owner reported by the endpoint, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owned_by: Option<String>,
}

impl ModelList {
    /// Returns true if the list contains a model with the given identifier.
    pub fn contains(&self, id: &str) -> bool {
        self.data.iter().any(|model| model.id == id)
    }
}
