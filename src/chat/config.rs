//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::chat::reply::EmptyResponsePolicy;
use crate::client::ClientOptions;
use crate::credentials::DEFAULT_ENV_FILE;
use crate::types::Provider;

/// System prompt used when none is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Label printed in front of replies when none is configured.
pub const DEFAULT_ASSISTANT_LABEL: &str = "Assistant";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default connect and verification timeout, in seconds.
const DEFAULT_TIMEOUT_SECS: u32 = 60;

/// Command-line arguments for the parley tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Endpoint preset.
    #[arrrg(optional, "Provider preset: openrouter or deepseek (default: openrouter)", "PROVIDER")]
    pub provider: Option<String>,

    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: the provider's preset)", "MODEL")]
    pub model: Option<String>,

    /// Endpoint root, overriding the provider preset.
    #[arrrg(optional, "Base URL of an OpenAI-compatible endpoint", "URL")]
    pub base_url: Option<String>,

    /// System prompt to set context for the conversation.
    #[arrrg(optional, "System prompt for the conversation", "PROMPT")]
    pub system: Option<String>,

    /// File to read the system prompt from.
    #[arrrg(optional, "Read the system prompt from a file", "PATH")]
    pub system_file: Option<String>,

    /// Label for assistant replies.
    #[arrrg(optional, "Label shown in front of replies (default: Assistant)", "NAME")]
    pub name: Option<String>,

    /// Sampling temperature.
    #[arrrg(optional, "Sampling temperature 0.0-2.0 (default: 0.7)", "TEMP")]
    pub temperature: Option<String>,

    /// Env file the API key is read from and stored in.
    #[arrrg(optional, "Env file holding the API key (default: .parley)", "PATH")]
    pub env_file: Option<String>,

    /// Connect timeout in seconds.
    #[arrrg(optional, "Connect timeout in seconds (default: 60)", "SECONDS")]
    pub timeout: Option<u32>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Print fragments as they arrive instead of rendering markdown.
    #[arrrg(flag, "Stream raw text instead of rendered markdown")]
    pub plain: bool,

    /// Log request lifecycle to stderr.
    #[arrrg(flag, "Enable debug logging")]
    pub verbose: bool,

    /// Store a new API key and exit.
    #[arrrg(flag, "Enter and store a new API key, then exit")]
    pub configure: bool,

    /// Skip the startup credential check.
    #[arrrg(flag, "Skip verifying the API key at startup")]
    pub no_verify: bool,

    /// Drop unanswered messages from the history.
    #[arrrg(flag, "Remove a message from the history when the reply is empty")]
    pub discard_unanswered: bool,
}

/// Ways command-line arguments can fail to form a [`ChatConfig`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChatArgsError {
    /// The provider name is not one of the presets.
    InvalidProvider(String),
    /// The temperature is not a number in range.
    InvalidTemperature(String),
    /// Both `--system` and `--system-file` were given.
    ConflictingSystemPrompt,
    /// The system prompt file could not be read.
    SystemFile { path: String, message: String },
    /// The timeout is zero.
    InvalidTimeout,
}

impl fmt::Display for ChatArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatArgsError::InvalidProvider(message) => write!(f, "{message}"),
            ChatArgsError::InvalidTemperature(value) => {
                write!(f, "temperature must be a number between 0.0 and 2.0, got {value:?}")
            }
            ChatArgsError::ConflictingSystemPrompt => {
                write!(f, "--system and --system-file are mutually exclusive")
            }
            ChatArgsError::SystemFile { path, message } => {
                write!(f, "cannot read system prompt from {path}: {message}")
            }
            ChatArgsError::InvalidTimeout => write!(f, "timeout must be at least one second"),
        }
    }
}

impl std::error::Error for ChatArgsError {}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Endpoint preset.
    pub provider: Provider,

    /// Model override; `None` uses the provider's default.
    pub model: Option<String>,

    /// Base URL override; `None` uses the provider's endpoint.
    pub base_url: Option<String>,

    /// The opaque system prompt every conversation starts with.
    pub system_prompt: String,

    /// Label printed in front of replies.
    pub assistant_label: String,

    /// Optional sampling temperature.
    pub temperature: Option<f32>,

    /// Connect and verification timeout.
    pub timeout: Duration,

    /// Env file the API key is read from and stored in.
    pub env_file: PathBuf,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Whether to render replies as markdown once they complete.
    pub markdown: bool,

    /// Whether to check the credential before the first prompt.
    pub verify: bool,

    /// What to do with an unanswered user turn.
    pub empty_response_policy: EmptyResponsePolicy,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Provider: openrouter
    /// - Temperature: 0.7
    /// - Markdown rendering and color: enabled
    /// - Empty replies: retained
    pub fn new() -> Self {
        Self {
            provider: Provider::default(),
            model: None,
            base_url: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            assistant_label: DEFAULT_ASSISTANT_LABEL.to_string(),
            temperature: Some(DEFAULT_TEMPERATURE),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS as u64),
            env_file: PathBuf::from(DEFAULT_ENV_FILE),
            use_color: true,
            markdown: true,
            verify: true,
            empty_response_policy: EmptyResponsePolicy::default(),
        }
    }

    /// Sets the provider preset.
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = provider;
        self
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the endpoint root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Sets the reply label.
    pub fn with_assistant_label(mut self, label: impl Into<String>) -> Self {
        self.assistant_label = label.into();
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Streams raw text instead of rendering markdown.
    pub fn without_markdown(mut self) -> Self {
        self.markdown = false;
        self
    }

    /// Sets the empty-reply policy.
    pub fn with_empty_response_policy(mut self, policy: EmptyResponsePolicy) -> Self {
        self.empty_response_policy = policy;
        self
    }

    /// The model that will be requested.
    pub fn effective_model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or(self.provider.default_model())
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<ChatArgs> for ChatConfig {
    type Error = ChatArgsError;

    fn try_from(args: ChatArgs) -> Result<Self, Self::Error> {
        let provider = match args.provider.as_deref() {
            Some(name) => name.parse::<Provider>().map_err(ChatArgsError::InvalidProvider)?,
            None => Provider::default(),
        };

        let temperature = match args.temperature {
            Some(value) => match value.trim().parse::<f32>() {
                Ok(t) if t.is_finite() && (0.0..=2.0).contains(&t) => Some(t),
                _ => return Err(ChatArgsError::InvalidTemperature(value)),
            },
            None => Some(DEFAULT_TEMPERATURE),
        };

        let system_prompt = match (args.system, args.system_file) {
            (Some(_), Some(_)) => return Err(ChatArgsError::ConflictingSystemPrompt),
            (Some(prompt), None) => prompt,
            (None, Some(path)) => {
                fs::read_to_string(&path).map_err(|e| ChatArgsError::SystemFile {
                    path: path.clone(),
                    message: e.to_string(),
                })?
            }
            (None, None) => DEFAULT_SYSTEM_PROMPT.to_string(),
        };

        let timeout = match args.timeout {
            Some(0) => return Err(ChatArgsError::InvalidTimeout),
            Some(secs) => Duration::from_secs(secs as u64),
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS as u64),
        };

        Ok(ChatConfig {
            provider,
            model: args.model,
            base_url: args.base_url,
            system_prompt,
            assistant_label: args
                .name
                .unwrap_or_else(|| DEFAULT_ASSISTANT_LABEL.to_string()),
            temperature,
            timeout,
            env_file: args
                .env_file
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_FILE)),
            use_color: !args.no_color,
            markdown: !args.plain,
            verify: !args.no_verify,
            empty_response_policy: if args.discard_unanswered {
                EmptyResponsePolicy::Rollback
            } else {
                EmptyResponsePolicy::Retain
            },
        })
    }
}

impl From<&ChatConfig> for ClientOptions {
    fn from(config: &ChatConfig) -> Self {
        let mut options = ClientOptions::new(config.provider)
            .with_temperature(config.temperature)
            .with_timeout(config.timeout);
        if let Some(model) = &config.model {
            options = options.with_model(model.clone());
        }
        if let Some(base_url) = &config.base_url {
            options = options.with_base_url(base_url.clone());
        }
        options
    }
}
