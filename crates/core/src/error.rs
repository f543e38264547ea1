//! Error types for braid.
//!
//! Every failure the engine reports belongs to one of four kinds: compile
//! (the query cannot be built), catalog (a data source failed at runtime),
//! evaluation (an expression failed for the current row) and cleanup (closing
//! iterators failed).

use thiserror::Error;

/// Result type alias for braid operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Compile,
    Catalog,
    Evaluation,
    Cleanup,
}

/// Error types for braid operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A qualified reference or table source names an alias that is not in scope.
    #[error("unknown alias: {alias}")]
    UnknownAlias { alias: String },
    /// The same alias is declared twice in one scope.
    #[error("duplicate alias: {alias}")]
    DuplicateAlias { alias: String },
    /// No catalog is registered under the alias and there is no default.
    #[error("no catalog found for {alias}")]
    CatalogNotFound { alias: String },
    /// The catalog cannot build an operator for the table.
    #[error("catalog {catalog} has no operator for table {table}")]
    MissingOperatorFactory { catalog: String, table: String },
    /// A table option the catalog does not understand.
    #[error("catalog {catalog} does not support option {option}")]
    UnsupportedOption { catalog: String, option: String },
    /// No function is registered under the name.
    #[error("unknown function: {name}")]
    UnknownFunction { name: String },
    /// A function was called with arguments it cannot accept.
    #[error("invalid arguments for {name}: {message}")]
    InvalidArguments { name: String, message: String },
    /// A catalog needs credentials the session does not hold.
    #[error("missing credentials for catalog {catalog} (alias {alias})")]
    MissingCredentials { catalog: String, alias: String },
    /// A catalog failed to reach its backend.
    #[error("connection failed for catalog {catalog} (alias {alias}): {message}")]
    ConnectionFailed {
        catalog: String,
        alias: String,
        message: String,
    },
    /// A seek key expression evaluated to null.
    #[error("seek key {expression} for alias {alias} evaluated to null")]
    NullSeekKey { alias: String, expression: String },
    /// Operands outside the defined coercions.
    #[error("type mismatch in {expression}: {message}")]
    TypeMismatch { expression: String, message: String },
    /// One or more iterators failed to close.
    #[error("failed to close {} iterator(s): {}", .errors.len(), join_messages(.errors))]
    Close { errors: Vec<Error> },
    /// Execution stopped by the abort predicate.
    #[error("query aborted")]
    Aborted,
    /// Invalid operation.
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },
}

fn join_messages(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownAlias { .. }
            | Error::DuplicateAlias { .. }
            | Error::CatalogNotFound { .. }
            | Error::MissingOperatorFactory { .. }
            | Error::UnsupportedOption { .. }
            | Error::UnknownFunction { .. }
            | Error::InvalidArguments { .. } => ErrorKind::Compile,
            Error::MissingCredentials { .. } | Error::ConnectionFailed { .. } => ErrorKind::Catalog,
            Error::NullSeekKey { .. }
            | Error::TypeMismatch { .. }
            | Error::Aborted
            | Error::InvalidOperation { .. } => ErrorKind::Evaluation,
            Error::Close { .. } => ErrorKind::Cleanup,
        }
    }

    /// True when the caller may fix the session (credentials, connectivity)
    /// and run the same statement again.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Catalog
    }

    /// The alias the error originates from, when known.
    pub fn alias(&self) -> Option<&str> {
        match self {
            Error::UnknownAlias { alias }
            | Error::DuplicateAlias { alias }
            | Error::CatalogNotFound { alias }
            | Error::MissingCredentials { alias, .. }
            | Error::ConnectionFailed { alias, .. }
            | Error::NullSeekKey { alias, .. } => Some(alias),
            _ => None,
        }
    }

    /// Creates an unknown alias error.
    pub fn unknown_alias(alias: impl Into<String>) -> Self {
        Error::UnknownAlias {
            alias: alias.into(),
        }
    }

    /// Creates a duplicate alias error.
    pub fn duplicate_alias(alias: impl Into<String>) -> Self {
        Error::DuplicateAlias {
            alias: alias.into(),
        }
    }

    /// Creates a catalog not found error.
    pub fn catalog_not_found(alias: impl Into<String>) -> Self {
        Error::CatalogNotFound {
            alias: alias.into(),
        }
    }

    /// Creates a missing operator factory error.
    pub fn missing_operator(catalog: impl Into<String>, table: impl Into<String>) -> Self {
        Error::MissingOperatorFactory {
            catalog: catalog.into(),
            table: table.into(),
        }
    }

    /// Creates an unsupported option error.
    pub fn unsupported_option(catalog: impl Into<String>, option: impl Into<String>) -> Self {
        Error::UnsupportedOption {
            catalog: catalog.into(),
            option: option.into(),
        }
    }

    /// Creates an unknown function error.
    pub fn unknown_function(name: impl Into<String>) -> Self {
        Error::UnknownFunction { name: name.into() }
    }

    /// Creates an invalid arguments error.
    pub fn invalid_arguments(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidArguments {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a null seek key error.
    pub fn null_seek_key(alias: impl Into<String>, expression: impl Into<String>) -> Self {
        Error::NullSeekKey {
            alias: alias.into(),
            expression: expression.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Error::TypeMismatch {
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }

    /// Folds close failures into one result. A single failure is returned
    /// as is.
    pub fn from_close_errors(mut errors: Vec<Error>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Error::Close { errors }),
        }
    }
}
