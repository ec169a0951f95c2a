//! Error types for the tzgrep crate

use std::process::ExitStatus;

use crate::format::Compression;

/// Result type for search operations
pub type Result<T> = std::result::Result<T, SearchError>;

/// Error type for search operations.
///
/// Apart from [`SearchError::InvalidPattern`], every variant is reported
/// per path chain inside a [`crate::SearchResult::Failure`] and only ends the
/// branch of the traversal where it happened.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// A root path could not be opened
    #[error("failed to open: {source}")]
    Open {
        #[source]
        source: std::io::Error,
    },

    /// A decoder rejected the compressed data, or the compressed input could
    /// not be read
    #[error("failed to decompress {compression} stream: {source}")]
    Decompression {
        compression: Compression,
        #[source]
        source: std::io::Error,
    },

    /// An external decompressor could not be started
    #[error("failed to start decompressor `{program}`: {source}")]
    SpawnDecompressor {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// An external decompressor exited unsuccessfully
    #[error("decompressor `{program}` failed: {status}")]
    DecompressorExited { program: String, status: ExitStatus },

    /// The tar reader found an invalid entry
    #[error("failed to read tar archive: {source}")]
    ContainerRead {
        #[source]
        source: std::io::Error,
    },

    /// The search pattern is not a valid regular expression
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

impl SearchError {
    /// Create a new open error
    pub fn open(source: std::io::Error) -> Self {
        Self::Open { source }
    }

    /// Create a new decompression error
    pub fn decompression(compression: Compression, source: std::io::Error) -> Self {
        Self::Decompression {
            compression,
            source,
        }
    }

    /// Create a new spawn error for an external decompressor
    pub fn spawn_decompressor(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::SpawnDecompressor {
            program: program.into(),
            source,
        }
    }

    /// Create a new exit status error for an external decompressor
    pub fn decompressor_exited(program: impl Into<String>, status: ExitStatus) -> Self {
        Self::DecompressorExited {
            program: program.into(),
            status,
        }
    }

    /// Classify an error returned by the tar reader.
    ///
    /// Read errors raised by an in-process decoder are tagged on their way up,
    /// so they are reported as decompression failures rather than as a broken
    /// tar header.
    pub fn container_read(source: std::io::Error) -> Self {
        match crate::decompress::decode_failure(&source) {
            Some(compression) => Self::decompression(compression, source),
            None => Self::ContainerRead { source },
        }
    }

    /// Whether this error came from decompressing a container
    pub fn is_decompression(&self) -> bool {
        matches!(
            self,
            Self::Decompression { .. }
                | Self::SpawnDecompressor { .. }
                | Self::DecompressorExited { .. }
        )
    }

    /// Whether this error aborts the whole search instead of a single branch
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidPattern(_))
    }
}
