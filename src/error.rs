//! Error types.
//!
//! A missing entry is never an error: lookups report absence through `Option`
//! and `bool`. The types here cover keys that cannot be fingerprinted,
//! fingerprints that cannot be revived, and codec registration mistakes.

use thiserror::Error;

/// A key, or some part nested inside it, is outside the supported domain.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// A custom value that no registered codec accepts.
    #[error("unsupported key value of type `{type_name}`: no registered codec accepts it")]
    Unsupported { type_name: &'static str },

    /// The key nests deeper than the configured limit.
    #[error("key nesting exceeds the maximum depth of {max_depth}")]
    DepthExceeded { max_depth: usize },

    /// NaN and the infinities have no canonical text form.
    #[error("non-finite number {0} cannot be used as a key")]
    NonFiniteNumber(f64),

    #[error("codec `{tag}` failed to encode key: {source}")]
    Codec {
        tag: String,
        #[source]
        source: CodecError,
    },

    /// Conversion of a `Serialize` type into a key failed.
    #[error("failed to convert value into a key: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A fingerprint could not be turned back into a key.
#[derive(Debug, Error)]
pub enum ReviveError {
    #[error("malformed fingerprint: {0}")]
    Json(#[from] serde_json::Error),

    /// The fingerprint nests deeper than the canonicalizer could have written.
    #[error("fingerprint nesting exceeds the maximum depth of {max_depth}")]
    DepthExceeded { max_depth: usize },

    #[error("unknown type tag `${0}`")]
    UnknownTag(String),

    #[error("invalid instant `{text}`: {source}")]
    InvalidInstant {
        text: String,
        #[source]
        source: chrono::ParseError,
    },

    /// A type wrapper whose payload is not a string.
    #[error("type wrapper `${0}` must hold a string")]
    MalformedWrapper(String),

    #[error("codec `{tag}` failed to decode `{text}`: {source}")]
    Codec {
        tag: String,
        text: String,
        #[source]
        source: CodecError,
    },
}

/// Rejected codec registration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegisterError {
    #[error("tag `{0}` is reserved for built-in key types")]
    Reserved(String),

    #[error("tag `{0}` must be non-empty and use only ASCII letters, digits, `_` and `-`")]
    InvalidTag(String),

    #[error("a codec with tag `{0}` is already registered")]
    Duplicate(String),
}

/// Failure reported by a [`KeyCodec`](crate::codec::KeyCodec).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CodecError {
    message: String,
}

impl CodecError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
