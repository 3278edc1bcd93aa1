use thiserror::Error;

use crate::api_spec::editor::EditError;
use crate::store::StoreError;

/// Failure taxonomy shared by every service operation.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error(transparent)]
    Storage(StoreError),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RowMissing { entity, id } => CoreError::NotFound { entity, id },
            other => CoreError::Storage(other),
        }
    }
}

impl From<EditError> for CoreError {
    fn from(err: EditError) -> Self {
        match err {
            EditError::OperationExists { .. } => CoreError::Conflict(err.to_string()),
            EditError::OperationMissing { path, method } => {
                CoreError::not_found("operation", format!("{} {path}", method.as_upper()))
            }
            other => CoreError::Validation(other.to_string()),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
