use std::fmt;

use thiserror::Error;

use crate::extract::ExtractError;

/// Every failure the sourcing operations surface to their caller.
#[derive(Debug, Error)]
pub enum SourcingError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("transport error: {message}")]
    Transport { message: String },
    #[error("model endpoint returned HTTP {status}")]
    Upstream { status: u16, body: String },
    #[error(transparent)]
    Extraction(#[from] ExtractError),
    #[error("model response has unexpected shape: expected {expected}, found {found}")]
    UnexpectedShape {
        expected: &'static str,
        found: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Network,
    Interpretation,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Input => "input",
            Self::Network => "network",
            Self::Interpretation => "interpretation",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SourcingError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::InvalidInput(_) => ErrorCategory::Input,
            Self::Transport { .. } | Self::Upstream { .. } => ErrorCategory::Network,
            Self::Extraction(_) | Self::UnexpectedShape { .. } => ErrorCategory::Interpretation,
        }
    }

    /// Sentence suitable for an end user. Raw diagnostics stay in the log.
    pub fn user_message(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "The sourcing assistant is not configured. Set an API key and try again."
            }
            ErrorCategory::Input => "The request is incomplete. Check the material and image inputs.",
            ErrorCategory::Network => {
                "Could not reach the market intelligence service. Check your connection and try again."
            }
            ErrorCategory::Interpretation => {
                "The response could not be interpreted. Try rephrasing or refining your search."
            }
        }
    }

    /// Log-only detail: the unparseable span or the upstream body.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::Upstream { body, .. } => Some(body.as_str()),
            Self::Extraction(err) => err.candidate(),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::InvalidInput(_) => "invalid_input",
            Self::Transport { .. } => "transport_error",
            Self::Upstream { .. } => "upstream_status",
            Self::Extraction(err) => err.kind(),
            Self::UnexpectedShape { .. } => "unexpected_shape",
        }
    }
}
