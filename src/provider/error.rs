use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("{operation} failed: {message}")]
    Call { operation: String, message: String },

    #[error("{operation}: resource not found: {resource}")]
    NotFound { operation: String, resource: String },

    #[error("authentication failed: {0}")]
    Authentication(String),
}

impl ProviderError {
    pub fn call(operation: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::Call {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn not_found(operation: impl Into<String>, resource: impl Into<String>) -> Self {
        ProviderError::NotFound {
            operation: operation.into(),
            resource: resource.into(),
        }
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, ProviderError::Authentication(_))
    }
}
