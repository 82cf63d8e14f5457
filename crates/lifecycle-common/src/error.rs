//! Error types for the lifecycle operator
//!
//! Errors are structured with fields to aid debugging in production.

use thiserror::Error;

/// Main error type for lifecycle operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Validation error for CRD specs
    #[error("validation error for {resource}: {message}")]
    Validation {
        /// Name of the resource with invalid configuration
        resource: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "spec.channels")
        field: String,
    },

    /// Internal/operational error
    #[error("internal error: {message}")]
    Internal {
        /// Description of what failed
        message: String,
    },
}

impl Error {
    /// Create a validation error with resource context and field path
    pub fn validation_for_field(
        resource: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            resource: resource.into(),
            message: msg.into(),
            field: field.into(),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Validation errors need a config fix and are not retryable.
    /// Kubernetes errors are retryable unless the API answered 4xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => {
                !matches!(
                    source,
                    kube::Error::Api(ae) if (400..500).contains(&ae.code)
                )
            }
            Error::Validation { .. } => false,
            Error::Internal { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Story: a ModuleReleaseMeta assigning one channel twice is caught by
    /// validation with the offending field named.
    #[test]
    fn story_validation_names_resource_and_field() {
        let err = Error::validation_for_field(
            "serverless",
            "spec.channels",
            "channel regular is assigned more than once",
        );
        assert!(err.to_string().contains("validation error for serverless"));
        match &err {
            Error::Validation { resource, field, .. } => {
                assert_eq!(resource, "serverless");
                assert_eq!(field, "spec.channels");
            }
            _ => panic!("Expected Validation variant"),
        }
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_internal_error_is_retryable() {
        let err = Error::internal("unexpected state");
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "internal error: unexpected state");
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        let rejected = Error::from(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "forbidden".to_string(),
            reason: "Forbidden".to_string(),
            code: 403,
        }));
        assert!(!rejected.is_retryable());

        let unavailable = Error::from(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "etcdserver: request timed out".to_string(),
            reason: "InternalError".to_string(),
            code: 500,
        }));
        assert!(unavailable.is_retryable());
    }
}
