//! Error types for idverify.
//!
//! This module defines the error types used throughout the idverify crate.
//! Verification itself never surfaces these to callers; its failures are
//! folded into [`crate::verify::VerificationOutcome`] values instead.

use thiserror::Error;

use crate::transport::TransportError;

/// Message shown when the login service rejects the supplied credentials.
pub const INVALID_CREDENTIALS: &str = "Invalid Officer ID or Password";

/// The main error type for idverify operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// A required service endpoint is not configured.
    #[error("API configuration missing ({key}). Please contact admin.")]
    MissingEndpoint {
        /// Configuration key that was left unset.
        key: &'static str,
    },

    // === Authentication Errors ===
    /// The login service rejected the credentials.
    #[error("{message}")]
    Auth {
        /// Message to show on the login screen.
        message: String,
    },

    /// An officer must be signed in first.
    #[error("Please log in first.")]
    NotSignedIn,

    // === Transport Errors ===
    /// An HTTP exchange failed before a response was received.
    #[error("request failed: {0}")]
    Transport(#[from] TransportError),

    // === Camera Errors ===
    /// The camera could not be opened.
    #[error("camera '{name}' unavailable: {message}")]
    CameraUnavailable {
        /// Name of the camera.
        name: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    /// A frame could not be read from the live stream.
    #[error("failed to grab frame: {0}")]
    CameraFrame(String),

    /// A still frame could not be encoded.
    #[error("failed to encode image: {0}")]
    ImageEncode(#[from] image::ImageError),
}

/// A specialized Result type for idverify operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create an authentication error with the given message.
    #[must_use]
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create the default invalid-credentials error.
    #[must_use]
    pub fn invalid_credentials() -> Self {
        Self::auth(INVALID_CREDENTIALS)
    }

    /// Create a camera unavailable error.
    #[must_use]
    pub fn camera_unavailable(name: &'static str, message: impl Into<String>) -> Self {
        Self::CameraUnavailable {
            name,
            message: message.into(),
        }
    }

    /// Create a frame grab error.
    #[must_use]
    pub fn camera_frame(message: impl Into<String>) -> Self {
        Self::CameraFrame(message.into())
    }

    /// Check if this error comes from missing or invalid configuration.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad(_) | Self::ConfigValidation { .. } | Self::MissingEndpoint { .. }
        )
    }

    /// Check if this error is a credential rejection or a missing session.
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Auth { .. } | Self::NotSignedIn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_display_is_verbatim() {
        let err = Error::invalid_credentials();
        assert_eq!(err.to_string(), "Invalid Officer ID or Password");

        let err = Error::auth("Account locked");
        assert_eq!(err.to_string(), "Account locked");
    }

    #[test]
    fn test_missing_endpoint_display() {
        let err = Error::MissingEndpoint {
            key: "endpoints.login_base_url",
        };
        let msg = err.to_string();
        assert!(msg.contains("API configuration missing"));
        assert!(msg.contains("endpoints.login_base_url"));
    }

    #[test]
    fn test_is_configuration_error() {
        assert!(Error::MissingEndpoint { key: "x" }.is_configuration_error());
        assert!(Error::ConfigValidation {
            message: "bad".to_string()
        }
        .is_configuration_error());
        assert!(!Error::invalid_credentials().is_configuration_error());
    }

    #[test]
    fn test_is_auth_error() {
        assert!(Error::invalid_credentials().is_auth_error());
        assert!(Error::NotSignedIn.is_auth_error());
        assert!(!Error::MissingEndpoint { key: "x" }.is_auth_error());
    }

    #[test]
    fn test_camera_errors_display() {
        let err = Error::camera_unavailable("still", "no such file");
        let msg = err.to_string();
        assert!(msg.contains("still"));
        assert!(msg.contains("no such file"));

        let err = Error::camera_frame("stream closed");
        assert!(err.to_string().contains("stream closed"));
    }

    #[test]
    fn test_from_transport_error() {
        let err: Error = TransportError::Connect("connection refused".to_string()).into();
        assert!(matches!(err, Error::Transport(_)));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_not_signed_in_display() {
        assert_eq!(Error::NotSignedIn.to_string(), "Please log in first.");
    }
}
