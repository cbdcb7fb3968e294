//! Core error types.

use thiserror::Error;

/// Core audit engine errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Protocol error (including value rendering failures).
    #[error("protocol error: {0}")]
    Protocol(#[from] changetrail_proto::Error),

    /// Invalid tracking configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An audit log observer rejected a draft.
    #[error("audit log observer failed for {type_full_name}: {source}")]
    Observer {
        /// Entity type of the draft being dispatched.
        type_full_name: String,
        /// Error raised by the observer.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The persistence session failed.
    #[error("session error: {0}")]
    Session(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Record not found.
    #[error("record not found")]
    NotFound,
}
