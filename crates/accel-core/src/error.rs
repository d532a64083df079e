//! Error types shared across the pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for raw file decoding.
pub type FormatResult<T> = std::result::Result<T, FormatError>;

/// Errors raised while decoding a binary raw file.
///
/// A file that fails with any of these is never processed; the processor
/// logs it and deletes it.
#[derive(Error, Debug)]
pub enum FormatError {
    /// Fewer bytes than a complete header
    #[error("File too small ({size} bytes, header needs {expected})")]
    TooSmall { size: usize, expected: usize },

    /// Magic bytes are not `ACLB`
    #[error("Bad magic {found:?}")]
    BadMagic { found: [u8; 4] },

    /// Header version is not one we understand
    #[error("Unsupported version {version}")]
    UnsupportedVersion { version: u8 },

    /// Header is valid but there is no complete record
    #[error("File has no complete records")]
    Empty,

    /// A text line that does not match the sample line layout
    #[error("Malformed sample line: {message}")]
    MalformedLine { message: String },

    /// I/O error while reading the file
    #[error("I/O error reading '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file was given explicitly but does not exist
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// Parse or type error from any provider (TOML, environment)
    #[error("Failed to parse config: {0}")]
    Parse(#[from] Box<figment::Error>),

    /// Semantically invalid values
    #[error("Config validation failed:\n{0}")]
    Validation(String),
}
