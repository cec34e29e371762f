//! Error types for the protocol engine.
//!
//! Decode-time failures ([`Error::InvalidResponse`], [`Error::InvalidCrc`],
//! [`Error::Decode`]) are recoverable: they are captured into an error
//! [`CommandResult`](crate::protocols::result::CommandResult) rather than
//! propagated, since devices return garbage on noisy links. Only
//! [`Error::Config`] is fatal - a broken protocol table cannot produce a
//! valid decode for any input.

/// The error type for all protocol engine operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or unknown protocol/command table at construction time.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The requested code did not resolve via direct, alias or regex match.
    #[error("no command definition found for command: {0}")]
    MissingCommandDefinition(String),

    /// A structural check on a raw response failed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Recomputed integrity code did not match the one on the wire.
    #[error("response has invalid CRC - got '{got}', calculated '{calculated}'")]
    InvalidCrc { got: String, calculated: String },

    /// A reading's raw value could not be parsed under its declared encoding.
    #[error("for reading definition '{description}', {reason}")]
    Decode { description: String, reason: String },
}

impl Error {
    pub fn decode(description: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            description: description.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
