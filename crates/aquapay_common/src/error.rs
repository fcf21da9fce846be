// --- File: crates/aquapay_common/src/error.rs ---
use std::fmt;
use thiserror::Error;

/// The base error type shared across all Aquapay crates.
///
/// Feature crates define their own error enums (checkout, reconciliation,
/// ledger, providers) and convert into this type at the crate boundary via
/// `From` implementations.
#[derive(Error, Debug)]
pub enum AquapayError {
    /// Error occurred during an HTTP request
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Error occurred while parsing data
    #[error("Failed to parse data: {0}")]
    ParseError(String),

    /// Error occurred due to missing or invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error occurred during authentication or authorization
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Error occurred during validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error occurred during external service call
    #[error("External service error: {service_name} - {message}")]
    ExternalServiceError {
        service_name: String,
        message: String,
    },

    /// Error occurred due to a conflict (e.g., resource already exists)
    #[error("Conflict: {0}")]
    ConflictError(String),

    /// Error occurred due to a resource not being found
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Error occurred due to a timeout
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// Error occurred due to rate limiting
    #[error("Rate limited: {0}")]
    RateLimitError(String),

    /// Error occurred due to an internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// A trait for converting errors to HTTP status codes.
///
/// Implemented by every error enum in the workspace so handlers can map
/// domain errors to responses uniformly.
pub trait HttpStatusCode {
    /// Returns the HTTP status code for this error.
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for AquapayError {
    fn status_code(&self) -> u16 {
        match self {
            AquapayError::HttpError(_) => 500,
            AquapayError::ParseError(_) => 400,
            AquapayError::ConfigError(_) => 500,
            AquapayError::AuthError(_) => 401,
            AquapayError::ValidationError(_) => 422,
            AquapayError::ExternalServiceError { .. } => 502,
            AquapayError::ConflictError(_) => 409,
            AquapayError::NotFoundError(_) => 404,
            AquapayError::TimeoutError(_) => 504,
            AquapayError::RateLimitError(_) => 429,
            AquapayError::InternalError(_) => 500,
        }
    }
}

// Common error conversions
impl From<reqwest::Error> for AquapayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AquapayError::TimeoutError(err.to_string())
        } else {
            AquapayError::HttpError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AquapayError {
    fn from(err: serde_json::Error) -> Self {
        AquapayError::ParseError(err.to_string())
    }
}

// Utility functions for error handling
pub fn config_error<T: fmt::Display>(message: T) -> AquapayError {
    AquapayError::ConfigError(message.to_string())
}

pub fn validation_error<T: fmt::Display>(message: T) -> AquapayError {
    AquapayError::ValidationError(message.to_string())
}

pub fn not_found<T: fmt::Display>(message: T) -> AquapayError {
    AquapayError::NotFoundError(message.to_string())
}

pub fn conflict<T: fmt::Display>(message: T) -> AquapayError {
    AquapayError::ConflictError(message.to_string())
}

pub fn external_service_error<T: fmt::Display>(service_name: &str, message: T) -> AquapayError {
    AquapayError::ExternalServiceError {
        service_name: service_name.to_string(),
        message: message.to_string(),
    }
}

pub fn internal_error<T: fmt::Display>(message: T) -> AquapayError {
    AquapayError::InternalError(message.to_string())
}
