//! Row store error types.
//!
//! Failures raised by the storage engine itself, plus a carrier for
//! whatever the underlying database reports.

use std::fmt;
use thiserror::Error;

/// Error codes for categorizing errors.
///
/// These codes can be used for programmatic error handling and
/// are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Internal error (bug).
    Internal = 0x0001,
    /// Invalid configuration.
    InvalidConfig = 0x0002,
    /// I/O error.
    Io = 0x0003,

    // Value errors (0x0100 - 0x01FF)
    /// Value has no rank in the active dialect.
    UnsupportedValueType = 0x0100,
    /// Identifier cannot be quoted safely.
    InvalidIdentifier = 0x0101,

    // Key errors (0x0200 - 0x02FF)
    /// Insert without a key on a table that does not generate keys.
    MissingKeyValue = 0x0200,
    /// Compound key lacks a component.
    MalformedCompoundKey = 0x0201,

    // Schema errors (0x0300 - 0x03FF)
    /// Fluid mode cannot generate a column for the value.
    UnsupportedColumnType = 0x0300,

    // Row errors (0x0400 - 0x04FF)
    /// Update matched no row.
    RowNotFound = 0x0400,

    // Transaction errors (0x0500 - 0x05FF)
    /// Transaction frame misuse.
    Transaction = 0x0500,

    // Database errors (0x0600 - 0x06FF)
    /// Native error from the underlying database.
    Database = 0x0600,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "General",
            0x01 => "Value",
            0x02 => "Key",
            0x03 => "Schema",
            0x04 => "Row",
            0x05 => "Transaction",
            0x06 => "Database",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The main error type for fluidb.
///
/// The engine never retries; every variant propagates to the caller as is.
/// Schema mismatches outside fluid mode are not produced here but arrive
/// as [`FluidError::Database`] from the driver.
#[derive(Debug, Error)]
pub enum FluidError {
    // ==========================================================================
    // General Errors
    // ==========================================================================
    /// Internal error - this indicates a bug.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },

    /// I/O error from the underlying system.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    // ==========================================================================
    // Value Errors
    // ==========================================================================
    /// The value's runtime category has no rank in the active dialect.
    #[error("unsupported value type {type_name} for dialect {dialect}")]
    UnsupportedValueType {
        /// Name of the value category.
        type_name: &'static str,
        /// Dialect that rejected it.
        dialect: &'static str,
    },

    /// An identifier contains the dialect's own quote character.
    #[error("invalid identifier: {name}")]
    InvalidIdentifier {
        /// The rejected identifier.
        name: String,
    },

    // ==========================================================================
    // Key Errors
    // ==========================================================================
    /// Insert attempted on a non auto-increment table without a key.
    #[error("missing key value for table '{table}'")]
    MissingKeyValue {
        /// The table name.
        table: String,
    },

    /// A compound key lacks one of its components.
    #[error("malformed compound key: {message}")]
    MalformedCompoundKey {
        /// What is wrong with the key.
        message: String,
    },

    // ==========================================================================
    // Schema Errors
    // ==========================================================================
    /// Fluid mode would have to create a column of custom rank.
    #[error("cannot generate a column type for '{table}.{column}'")]
    UnsupportedColumnType {
        /// The table name.
        table: String,
        /// The column name.
        column: String,
    },

    // ==========================================================================
    // Row Errors
    // ==========================================================================
    /// An update's WHERE clause matched no rows.
    #[error("row not found in table '{table}'")]
    RowNotFound {
        /// The table name.
        table: String,
    },

    // ==========================================================================
    // Transaction Errors
    // ==========================================================================
    /// Transaction frame misuse, such as committing with no open frame.
    #[error("transaction error: {message}")]
    Transaction {
        /// Error message.
        message: String,
    },

    // ==========================================================================
    // Database Errors
    // ==========================================================================
    /// Error raised by the underlying database or its driver.
    #[error("database error: {message}")]
    Database {
        /// Rendered driver message.
        message: String,
        /// The native error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl FluidError {
    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Internal { .. } => ErrorCode::Internal,
            Self::InvalidConfig { .. } => ErrorCode::InvalidConfig,
            Self::Io { .. } => ErrorCode::Io,
            Self::UnsupportedValueType { .. } => ErrorCode::UnsupportedValueType,
            Self::InvalidIdentifier { .. } => ErrorCode::InvalidIdentifier,
            Self::MissingKeyValue { .. } => ErrorCode::MissingKeyValue,
            Self::MalformedCompoundKey { .. } => ErrorCode::MalformedCompoundKey,
            Self::UnsupportedColumnType { .. } => ErrorCode::UnsupportedColumnType,
            Self::RowNotFound { .. } => ErrorCode::RowNotFound,
            Self::Transaction { .. } => ErrorCode::Transaction,
            Self::Database { .. } => ErrorCode::Database,
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a transaction error.
    #[must_use]
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Creates a malformed compound key error.
    #[must_use]
    pub fn malformed_key(message: impl Into<String>) -> Self {
        Self::MalformedCompoundKey {
            message: message.into(),
        }
    }

    /// Wraps a native database error.
    #[must_use]
    pub fn database<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Database {
            message: source.to_string(),
            source: Box::new(source),
        }
    }
}
