//! Error types shared by every KARI component

use thiserror::Error;

/// Errors raised by channels, the transport and the scheduler
#[derive(Debug, Error)]
pub enum KariError {
    /// Opening a publisher or subscription failed (bad name, type clash, dead transport)
    #[error("Failed to register topic '{topic}': {reason}")]
    TopicRegistration { topic: String, reason: String },

    /// A channel was used after `close()`
    #[error("Channel for topic '{topic}' is closed")]
    ChannelClosed { topic: String },

    /// A subscription callback returned an error or panicked
    #[error("Callback for topic '{topic}' failed: {reason}")]
    CallbackFailed { topic: String, reason: String },

    /// Frame encoding or decoding failed
    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result alias used across the crate
pub type KariResult<T> = Result<T, KariError>;

impl KariError {
    pub fn registration(topic: &str, reason: impl Into<String>) -> Self {
        KariError::TopicRegistration {
            topic: topic.to_string(),
            reason: reason.into(),
        }
    }

    pub fn closed(topic: &str) -> Self {
        KariError::ChannelClosed {
            topic: topic.to_string(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        KariError::Config(msg.into())
    }

    /// Errors that must stop the loop instead of being logged per tick.
    ///
    /// Registration failures abort startup and a closed channel means the
    /// node is being driven out of order; everything else is isolated.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            KariError::TopicRegistration { .. } | KariError::ChannelClosed { .. }
        )
    }
}

impl From<bincode::Error> for KariError {
    fn from(err: bincode::Error) -> Self {
        KariError::Codec(err.to_string())
    }
}

impl From<toml::de::Error> for KariError {
    fn from(err: toml::de::Error) -> Self {
        KariError::Config(err.to_string())
    }
}

impl From<ctrlc::Error> for KariError {
    fn from(err: ctrlc::Error) -> Self {
        KariError::Internal(format!("Failed to set signal handler: {}", err))
    }
}
