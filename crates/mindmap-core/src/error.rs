use thiserror::Error;

use crate::validate::{Violation, join_violations};

/// The one message users see for any failed extraction.
pub const USER_FAILURE_MESSAGE: &str = "Failed to analyze PDF. Please try again.";

/// The rejection notice under the default 5 MiB ceiling. Other ceilings use
/// [`crate::document::IntakePolicy::rejection_notice`].
pub const REJECTION_NOTICE: &str = "Only PDF files under 5MB are allowed.";

/// Why the conversation with the generation provider broke down.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportCause {
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    /// The provider answered but refused or reported an error in-stream.
    #[error("provider error: {0}")]
    Upstream(String),
    #[error("request timed out")]
    Timeout,
    #[error("request cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for TransportCause {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportCause::Timeout
        } else {
            TransportCause::Network(e.to_string())
        }
    }
}

/// Terminal failure of one extraction request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The finished payload did not satisfy the schema bounds.
    #[error("extraction result failed validation: {}", join_violations(.violations))]
    Validation { violations: Vec<Violation> },
    #[error("transport error: {cause}")]
    Transport {
        #[from]
        cause: TransportCause,
    },
}

impl ExtractionError {
    pub fn user_message(&self) -> &'static str {
        USER_FAILURE_MESSAGE
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ExtractionError::Transport {
                cause: TransportCause::Cancelled
            }
        )
    }
}

/// Missing or malformed settings, detected once at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "missing model identifier: set GOOGLE_GENERATIVE_AI_MODEL or [provider].model in the config file"
    )]
    MissingModel,
    #[error(
        "missing API key: set GOOGLE_GENERATIVE_AI_API_KEY or [provider].api_key in the config file"
    )]
    MissingApiKey,
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// A file refused by intake. It never reaches the extraction client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputRejected {
    #[error("{name}: only PDF files are allowed (got {media_type})")]
    WrongType { name: String, media_type: String },
    #[error("{name}: file is {size} bytes, the limit is {max} bytes")]
    TooLarge { name: String, size: usize, max: usize },
    #[error("{name}: file is empty")]
    Empty { name: String },
    #[error("{name}: malformed data URL: {reason}")]
    MalformedDataUrl { name: String, reason: String },
    #[error("no file was provided")]
    NoFile,
}
