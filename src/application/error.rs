use thiserror::Error;

use crate::{
    application::api::BackendError, cache::FetchError, domain::envelope::ApiResponse,
    domain::error::DomainError, infra::error::InfraError,
};

/// Failure of a client operation. Cloneable so one failure can be handed to
/// every caller that shared the request.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("backend rejected `{operation}`: {message}")]
    Rejected {
        operation: &'static str,
        message: String,
    },
    #[error("backend response for `{operation}` carried no data")]
    MissingData { operation: &'static str },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Cache(FetchError),
}

impl From<FetchError> for ApiError {
    /// Unwrap producer failures back into the `ApiError` they started as.
    fn from(error: FetchError) -> Self {
        match error.downcast_producer::<ApiError>() {
            Some(original) => original.clone(),
            None => ApiError::Cache(error),
        }
    }
}

impl ApiError {
    pub fn is_rejection(&self) -> bool {
        matches!(self, ApiError::Rejected { .. })
    }
}

impl<T> ApiResponse<T> {
    /// A response counts as successful only when `success` is true and a
    /// payload is present.
    pub fn into_result(self, operation: &'static str) -> Result<T, ApiError> {
        if !self.is_success() {
            return Err(rejected(operation, self.error));
        }
        self.data.ok_or(ApiError::MissingData { operation })
    }

    /// Like [`into_result`](Self::into_result) for operations without a payload.
    pub fn into_ack(self, operation: &'static str) -> Result<(), ApiError> {
        if self.is_success() {
            Ok(())
        } else {
            Err(rejected(operation, self.error))
        }
    }
}

fn rejected(operation: &'static str, message: Option<String>) -> ApiError {
    ApiError::Rejected {
        operation,
        message: message.unwrap_or_else(|| String::from("unspecified error")),
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
