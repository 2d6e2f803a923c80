use thiserror::Error;

/// Failures surfaced to the user by chat operations.
///
/// Storage and startup plumbing use `anyhow`; everything a screen has to
/// show or turn into an in-conversation notice goes through this type.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ChatError {
    // ── Configuration ────────────────────────────────────────────────────────
    #[error("Missing configuration: {0}")]
    MissingConfig(&'static str),

    #[error("Could not read API key: {0}")]
    Credential(String),

    // ── Transport ────────────────────────────────────────────────────────────
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Malformed response from the API")]
    MalformedResponse,

    #[error("The model returned an empty response")]
    EmptyResponse,

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Request failed: {0}")]
    Transport(String),

    // ── Conversations ────────────────────────────────────────────────────────
    #[error("No active conversation")]
    NoActiveConversation,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("No user message to regenerate from")]
    NothingToRegenerate,

    #[error("A response is still being generated")]
    GenerationInProgress,

    #[error("Invalid conversation file: {0}")]
    ImportFormat(String),

    #[error("Attachment error: {0}")]
    Attachment(String),

    #[error("Export failed: {0}")]
    Export(String),

    // ── Settings ─────────────────────────────────────────────────────────────
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),
}

impl ChatError {
    /// Errors the screen shows as a blocking notice rather than a chat message.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            ChatError::MissingConfig(_)
                | ChatError::Credential(_)
                | ChatError::ImportFormat(_)
                | ChatError::InvalidSetting(_)
        )
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Transport(err.to_string())
    }
}
