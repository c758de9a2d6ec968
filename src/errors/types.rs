//! # Error Types
//!
//! Error taxonomy for the strongroom persistence and crypto core, built on `thiserror`.

/// Custom result type for strongroom operations
pub type Result<T> = std::result::Result<T, StrongroomError>;

/// Main error type for the persistence and crypto core
#[derive(thiserror::Error, Debug)]
pub enum StrongroomError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database and storage errors that are not retried
    #[error("Database error: {context}")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// Connection attempts kept failing with a transient error until the retry bound ran out
    #[error("Storage unavailable after {attempts} connection attempts: {source}")]
    TransientStorage {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Resource not found errors
    #[error("Resource not found: {resource_type} with {lookup}")]
    NotFound {
        resource_type: String,
        lookup: String,
    },

    /// Uniqueness constraint violations
    #[error("Duplicate {resource_type}: {message}")]
    Duplicate {
        message: String,
        resource_type: String,
    },

    /// Lookup the entity type has no concept of
    #[error("Operation '{operation}' is not supported for {resource_type}")]
    UnsupportedOperation {
        operation: String,
        resource_type: String,
    },

    /// No registered crypto plugin handles the content type
    #[error("No crypto plugin supports secret type '{secret_type}'")]
    CryptoUnsupported { secret_type: String },

    /// Stored ciphertext could not be reversed
    #[error("Decryption failed: {message}")]
    Decryption { message: String },

    /// Encryption or key generation failures
    #[error("Crypto error: {message}")]
    Crypto { message: String },

    /// Internal errors
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StrongroomError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a database error with context
    pub fn database<S: Into<String>>(source: sqlx::Error, context: S) -> Self {
        Self::Database {
            source,
            context: context.into(),
        }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a not found error for an id lookup
    pub fn not_found<R: Into<String>, I: AsRef<str>>(resource_type: R, id: I) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            lookup: format!("ID '{}'", id.as_ref()),
        }
    }

    /// Create a not found error for a lookup by some other attribute
    pub fn not_found_by<R: Into<String>, V: AsRef<str>>(
        resource_type: R,
        attribute: &str,
        value: V,
    ) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            lookup: format!("{} '{}'", attribute, value.as_ref()),
        }
    }

    /// Create a duplicate error
    pub fn duplicate<M: Into<String>, R: Into<String>>(message: M, resource_type: R) -> Self {
        Self::Duplicate {
            message: message.into(),
            resource_type: resource_type.into(),
        }
    }

    /// Create an unsupported operation error
    pub fn unsupported<O: Into<String>, R: Into<String>>(operation: O, resource_type: R) -> Self {
        Self::UnsupportedOperation {
            operation: operation.into(),
            resource_type: resource_type.into(),
        }
    }

    /// Create a crypto-unsupported error
    pub fn crypto_unsupported<S: Into<String>>(secret_type: S) -> Self {
        Self::CryptoUnsupported {
            secret_type: secret_type.into(),
        }
    }

    /// Create a decryption error
    pub fn decryption<S: Into<String>>(message: S) -> Self {
        Self::Decryption {
            message: message.into(),
        }
    }

    /// Create a crypto error
    pub fn crypto<S: Into<String>>(message: S) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Get the HTTP status code a request layer should return for this error
    pub fn status_code(&self) -> u16 {
        match self {
            StrongroomError::Config { .. } => 500,
            StrongroomError::Database { .. } => 500,
            StrongroomError::TransientStorage { .. } => 500,
            StrongroomError::Serialization { .. } => 500,
            StrongroomError::Validation { .. } => 400,
            StrongroomError::NotFound { .. } => 404,
            StrongroomError::Duplicate { .. } => 400,
            StrongroomError::UnsupportedOperation { .. } => 400,
            StrongroomError::CryptoUnsupported { .. } => 500,
            StrongroomError::Decryption { .. } => 500,
            StrongroomError::Crypto { .. } => 500,
            StrongroomError::Internal { .. } => 500,
        }
    }

    /// Check if the caller may retry the whole operation later.
    ///
    /// Write-time integrity failures are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StrongroomError::TransientStorage { .. })
    }
}

// Error conversions for common external error types
impl From<sqlx::Error> for StrongroomError {
    fn from(error: sqlx::Error) -> Self {
        Self::Database {
            source: error,
            context: "Database operation failed".to_string(),
        }
    }
}

impl From<serde_json::Error> for StrongroomError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization {
            source: error,
            context: "JSON serialization failed".to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for StrongroomError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(format!("Validation failed: {}", message))
    }
}
