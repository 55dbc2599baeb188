//! Error types for the vmdisk core library.

use std::path::PathBuf;

/// The main error type for VMDK operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error with optional path context.
    #[error("I/O error{}: {source}", path.as_ref().map(|p| format!(" at '{}'", p.display())).unwrap_or_default())]
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },

    /// The input is neither a textual descriptor nor a valid sparse extent.
    #[error("not a VMDK: {message}")]
    NotAVmdk { message: String },

    /// The API was misused (bad filename, wrong disk variant, unknown token).
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A known create type with no implementation here.
    #[error("unsupported create type: {create_type}")]
    UnsupportedCreateType { create_type: String },

    /// A known extent type with no implementation here.
    #[error("unsupported extent type: {extent_type}")]
    UnsupportedExtentType { extent_type: String },

    /// On-disk structures are self-inconsistent.
    #[error("corrupt VMDK: {message}")]
    Corrupt { message: String },
}

/// A specialized Result type for VMDK operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an I/O error with path context.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: Some(path.into()),
        }
    }

    /// Create an I/O error without path context.
    pub fn io_simple(source: std::io::Error) -> Self {
        Self::Io { source, path: None }
    }

    /// Create a not-a-VMDK error.
    pub fn not_a_vmdk(message: impl Into<String>) -> Self {
        Self::NotAVmdk {
            message: message.into(),
        }
    }

    /// Create an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an unsupported-create-type error.
    pub fn unsupported_create_type(create_type: impl Into<String>) -> Self {
        Self::UnsupportedCreateType {
            create_type: create_type.into(),
        }
    }

    /// Create an unsupported-extent-type error.
    pub fn unsupported_extent_type(extent_type: impl Into<String>) -> Self {
        Self::UnsupportedExtentType {
            extent_type: extent_type.into(),
        }
    }

    /// Create a corruption error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::io_simple(source)
    }
}
