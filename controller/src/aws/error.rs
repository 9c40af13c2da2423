use aws_sdk_eks::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use snafu::Snafu;

const NOT_FOUND: &str = "ResourceNotFoundException";
const IN_USE: &str = "ResourceInUseException";
const INVALID_REQUEST: &str = "InvalidRequestException";
const THROTTLED: &[&str] = &[
    "ThrottlingException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
];

/// A failed call against the EKS API.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum EksError {
    /// The service answered with an error code.
    #[snafu(display("EKS {} failed with '{}': {}", operation, code, message))]
    Service {
        operation: String,
        code: String,
        message: String,
    },

    /// The request never produced a service response.
    #[snafu(display("EKS {} failed: {}", operation, message))]
    Transport { operation: String, message: String },

    /// The request could not be built from the desired state.
    #[snafu(display("Invalid EKS {} request: {}", operation, message))]
    InvalidInput { operation: String, message: String },
}

impl EksError {
    /// Classifies an SDK error by its AWS error code.
    pub fn from_sdk<E, R>(operation: &str, err: SdkError<E, R>) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
        R: std::fmt::Debug,
    {
        match err.code() {
            Some(code) => EksError::Service {
                operation: operation.to_string(),
                code: code.to_string(),
                message: err.message().unwrap_or_default().to_string(),
            },
            None => EksError::Transport {
                operation: operation.to_string(),
                message: DisplayErrorContext(&err).to_string(),
            },
        }
    }

    /// An error for a describe call that returned no object.
    pub fn not_found(operation: &str, name: &str) -> Self {
        EksError::Service {
            operation: operation.to_string(),
            code: NOT_FOUND.to_string(),
            message: format!("'{}' not found", name),
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            EksError::Service { code, .. } => Some(code),
            EksError::Transport { .. } | EksError::InvalidInput { .. } => None,
        }
    }

    fn message(&self) -> &str {
        match self {
            EksError::Service { message, .. }
            | EksError::Transport { message, .. }
            | EksError::InvalidInput { message, .. } => message,
        }
    }

    /// The external object does not exist.
    pub fn is_not_found(&self) -> bool {
        self.code() == Some(NOT_FOUND)
    }

    /// The external object is busy or already exists.
    pub fn is_in_use(&self) -> bool {
        self.code() == Some(IN_USE)
    }

    pub fn is_throttled(&self) -> bool {
        self.code().map_or(false, |code| THROTTLED.contains(&code))
    }

    /// EKS rejected a mutation because another update is still in flight.
    pub fn is_update_in_progress(&self) -> bool {
        self.code() == Some(INVALID_REQUEST)
            && self.message().to_lowercase().contains("in progress")
    }

    /// Errors that resolve themselves once the next poll comes around.
    pub fn is_conflict(&self) -> bool {
        self.is_in_use() || self.is_throttled() || self.is_update_in_progress()
    }
}

#[cfg(test)]
pub(crate) fn service_error(code: &str, message: &str) -> EksError {
    EksError::Service {
        operation: "Test".to_string(),
        code: code.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        // (code, message, not_found, in_use, throttled, in_progress, conflict)
        let test_cases = vec![
            ("ResourceNotFoundException", "No cluster found", true, false, false, false, false),
            ("ResourceInUseException", "Cluster is busy", false, true, false, false, true),
            ("ThrottlingException", "Rate exceeded", false, false, true, false, true),
            ("TooManyRequestsException", "slow down", false, false, true, false, true),
            ("RequestLimitExceeded", "slow down", false, false, true, false, true),
            (
                "InvalidRequestException",
                "An update is already In Progress for this cluster",
                false,
                false,
                false,
                true,
                true,
            ),
            ("InvalidRequestException", "Unsupported Kubernetes version", false, false, false, false, false),
            ("InvalidParameterException", "subnet-1 does not exist", false, false, false, false, false),
        ];

        for (code, message, not_found, in_use, throttled, in_progress, conflict) in test_cases {
            let err = service_error(code, message);
            assert_eq!(err.is_not_found(), not_found, "{}", code);
            assert_eq!(err.is_in_use(), in_use, "{}", code);
            assert_eq!(err.is_throttled(), throttled, "{}", code);
            assert_eq!(err.is_update_in_progress(), in_progress, "{}", code);
            assert_eq!(err.is_conflict(), conflict, "{}", code);
        }
    }

    #[test]
    fn test_transport_errors_are_never_classified() {
        let err = EksError::Transport {
            operation: "DescribeCluster".to_string(),
            message: "dispatch failure".to_string(),
        };
        assert_eq!(err.code(), None);
        assert!(!err.is_not_found());
        assert!(!err.is_conflict());
    }
}
