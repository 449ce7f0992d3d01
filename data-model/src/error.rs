//! Error kinds carried inside [anyhow::Error] chains.
//!
//! Operations return `anyhow::Result` with the owning record and field
//! attached as context. The typed kind below can be recovered with
//! [DataModelError::find].

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataModelError {
    /// A value violates the declared type, shape or dtype of its field.
    #[error("invalid value for '{field}': {reason}")]
    Validation { field: String, reason: String },
    /// A data shape that the operation explicitly refuses to handle.
    #[error("unsupported structure in '{field}': {reason}")]
    Unsupported { field: String, reason: String },
    /// The operation is not allowed in the current record state.
    #[error("illegal state: {0}")]
    IllegalState(String),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    /// A local resource does not exist. Not retryable.
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },
    /// A remote fetch failed. Retryable.
    #[error("failed to fetch '{url}': {reason}")]
    FetchFailed { url: String, reason: String },
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
}

impl DataModelError {
    pub fn validation(field: impl Into<String>, reason: impl ToString) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.to_string(),
        }
    }

    pub fn unsupported(field: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unsupported {
            field: field.into(),
            reason: reason.to_string(),
        }
    }

    pub fn illegal_state(reason: impl ToString) -> Self {
        Self::IllegalState(reason.to_string())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::FetchFailed { .. })
    }

    /// Finds the first error kind in the chain of an [anyhow::Error].
    pub fn find(error: &anyhow::Error) -> Option<&DataModelError> {
        error.chain().find_map(|cause| cause.downcast_ref::<Self>())
    }
}

/// Failures while resolving a record path of the form `module.Class`.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("malformed record path '{0}'")]
    MalformedPath(String),
    #[error("module '{module}' of record path '{path}' is not registered")]
    ModuleNotFound { path: String, module: String },
    #[error("record '{class}' is not found in module '{module}'")]
    ClassNotFound { module: String, class: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn find_error_kind_through_context() {
        let result: anyhow::Result<()> = Err(DataModelError::FetchFailed {
            url: "http://localhost/a.png".into(),
            reason: "status 503".into(),
        }
        .into());
        let error = result
            .context("failed to load 'content'")
            .context("failed to load 'Image'")
            .unwrap_err();

        let kind = DataModelError::find(&error).unwrap();
        assert!(kind.is_retryable());
        assert!(format!("{:#}", error).contains("status 503"));
    }
}
