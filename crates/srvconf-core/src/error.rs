//! Error types for srvconf
//!
//! Structural failures (a root document that cannot be read or parsed, a typed
//! value that does not coerce) are reported as [`Error`]. Everything that
//! degrades gracefully is a [`Diagnostic`](crate::diagnostic::Diagnostic)
//! instead.

use std::fmt;
use std::path::Path;

/// Result type alias for srvconf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for srvconf operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// File the error relates to, if any
    pub file: Option<String>,
    /// Variable name the error relates to, if any
    pub key: Option<String>,
    /// Source position (line, column) inside `file`, if known
    pub position: Option<(u32, u32)>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed XML or a document that is not a server configuration
    Parse,
    /// A file exists but could not be read
    Io,
    /// A value that must be well-formed is not
    ConfigurationFormat,
}

impl Error {
    /// Create a new parse error
    pub fn parse(file: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Parse,
            file: Some(file.as_ref().display().to_string()),
            key: None,
            position: None,
            help: Some("Check that the file is well-formed XML with a <server> root".into()),
            cause: Some(message.into()),
        }
    }

    /// Create an I/O error for a file that could not be read
    pub fn io(file: impl AsRef<Path>, err: &std::io::Error) -> Self {
        Self {
            kind: ErrorKind::Io,
            file: Some(file.as_ref().display().to_string()),
            key: None,
            position: None,
            help: Some("Check that the file exists and is readable".into()),
            cause: Some(err.to_string()),
        }
    }

    /// Create a configuration format error for a value that failed to coerce
    pub fn configuration_format(
        key: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self {
            kind: ErrorKind::ConfigurationFormat,
            file: None,
            key: Some(key.into()),
            position: None,
            help: Some(format!("Ensure the value can be read as {}", expected.into())),
            cause: Some(format!("Got: \"{}\"", value.into())),
        }
    }

    /// Add source position to the error
    pub fn with_position(mut self, line: u32, column: u32) -> Self {
        self.position = Some((line, column));
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Parse => write!(f, "Parse error")?,
            ErrorKind::Io => write!(f, "I/O error")?,
            ErrorKind::ConfigurationFormat => write!(f, "Configuration format error")?,
        }

        if let Some(file) = &self.file {
            write!(f, "\n  File: {}", file)?;
            if let Some((line, column)) = self.position {
                write!(f, ":{}:{}", line, column)?;
            }
        }

        if let Some(key) = &self.key {
            write!(f, "\n  Variable: {}", key)?;
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}
