use std::fmt;
use std::str::FromStr;

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const OPENROUTER_MODEL: &str = "deepseek/deepseek-chat-v3-0324:free";

const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
const DEEPSEEK_MODEL: &str = "deepseek-chat";

/// A known OpenAI-compatible completion provider.
///
/// Each provider carries a base URL and a default model.  Any other endpoint
/// speaking the same protocol can be reached by overriding the base URL.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum Provider {
    /// OpenRouter (`https://openrouter.ai`).
    #[default]
    OpenRouter,

    /// DeepSeek's first-party API.
    DeepSeek,
}

impl Provider {
    /// All supported providers, in the order they are listed to users.
    pub const ALL: [Provider; 2] = [Provider::OpenRouter, Provider::DeepSeek];

    /// The provider's API base URL (without the `chat/completions` suffix).
    pub fn base_url(&self) -> &'static str {
        match self {
            Provider::OpenRouter => OPENROUTER_BASE_URL,
            Provider::DeepSeek => DEEPSEEK_BASE_URL,
        }
    }

    /// The model requested when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenRouter => OPENROUTER_MODEL,
            Provider::DeepSeek => DEEPSEEK_MODEL,
        }
    }

    /// Whether the provider accepts the OpenRouter attribution headers.
    pub fn wants_attribution(&self) -> bool {
        matches!(self, Provider::OpenRouter)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenRouter => write!(f, "openrouter"),
            Provider::DeepSeek => write!(f, "deepseek"),
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openrouter" => Ok(Provider::OpenRouter),
            "deepseek" => Ok(Provider::DeepSeek),
            _ => Err(format!(
                "Unsupported provider '{}'. Supported values: {}",
                s,
                Provider::ALL
                    .iter()
                    .map(|p| format!("'{p}'"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }
}
