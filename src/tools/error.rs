use thiserror::Error;

use crate::vectra::{ErrorKind, VectraApiError};

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    Validation(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error(transparent)]
    Api(#[from] VectraApiError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::Validation(_) | ToolError::UnknownTool(_) => ErrorKind::ValidationError,
            ToolError::Api(e) => e.kind(),
            ToolError::Internal(_) => ErrorKind::InternalError,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Tool '{0}' is already registered")]
    Duplicate(String),
}
