use std::fmt;

use thiserror::Error;

/// Semantic error kinds that can occur during preprocessing
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// A file ended with open conditionals, or `#else`/`#elif`/`#endif` arrived
    /// with no matching `#if`
    #[error("unbalanced conditional: {0}")]
    UnbalancedConditional(String),
    /// A `#`-prefixed line whose keyword is not in the recognized set
    #[error("unknown directive: {0}")]
    UnknownDirective(String),
    /// Malformed `#if`/`#elif` expression
    #[error("error in expression: {0}")]
    ExpressionParse(String),
    /// `#define` of an already-defined identifier without override
    #[error("already defined: {0}")]
    Redefinition(String),
    /// A recognized directive whose body could not be parsed
    #[error("malformed directive: {0}")]
    MalformedDirective(String),
    /// An `#error` directive fired
    #[error("{0}")]
    User(String),
    /// The file loader failed to resolve an include path
    #[error("include not found: {0}")]
    IncludeNotFound(String),
    /// I/O error while loading a file
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An error produced while preprocessing, located at a logical line
///
/// The line number is the logical line counter of the file being processed
/// when the failure occurred, so errors inside an `#include` carry the
/// position within the included file.
#[derive(Debug)]
pub struct PreprocessError {
    /// The specific kind of error that occurred
    pub kind: ErrorKind,
    /// Source file (or pseudo-file) being processed
    pub file: String,
    /// Logical line number where the error occurred
    pub line: usize,
}

impl PreprocessError {
    /// Create an error located at `file`:`line`
    #[must_use]
    pub fn new(kind: ErrorKind, file: String, line: usize) -> Self {
        PreprocessError { kind, file, line }
    }
}

impl fmt::Display for PreprocessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "macronium ERR [{:04}] {}", self.line, self.kind)?;
        if !self.file.is_empty() && self.file != crate::DEFAULT_FILE {
            write!(f, " (in {})", self.file)?;
        }
        Ok(())
    }
}

impl std::error::Error for PreprocessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PreprocessError {
    fn from(err: std::io::Error) -> Self {
        PreprocessError::new(ErrorKind::Io(err), String::new(), 0)
    }
}
