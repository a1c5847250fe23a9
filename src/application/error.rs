use std::error::Error as StdError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    application::repos::RepoError, compare::CompareError, domain::error::DomainError,
    infra::error::InfraError, query::QueryError,
};

/// Caller-visible outcome class of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Full error chain of a failure, kept for logs only.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub kind: ErrorKind,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, kind: ErrorKind, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            kind,
            messages,
        }
    }

    pub fn log(&self) {
        match self.kind {
            ErrorKind::Internal => tracing::error!(
                source = self.source,
                kind = self.kind.as_str(),
                chain = ?self.messages,
                "request failed"
            ),
            _ => tracing::info!(
                source = self.source,
                kind = self.kind.as_str(),
                chain = ?self.messages,
                "request rejected"
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("storage failure")]
    Storage(#[source] RepoError),
    #[error("resource not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Domain(DomainError::NotFound { .. }) | AppError::NotFound => {
                ErrorKind::NotFound
            }
            AppError::Validation(_) => ErrorKind::InvalidInput,
            AppError::Storage(_) | AppError::Infra(_) | AppError::Unexpected(_) => {
                ErrorKind::Internal
            }
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::NotFound => "Resource not found",
            ErrorKind::InvalidInput => "Request could not be processed",
            ErrorKind::Internal => "Internal server error",
        }
    }

    /// Short, user-safe message. Only validation failures add a reason, and
    /// those reasons are produced by this crate, never by storage.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(message) => format!("{}: {message}", self.presentation_message()),
            _ => self.presentation_message().to_string(),
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::from_error("application::error::AppError", self.kind(), self)
    }
}

impl From<RepoError> for AppError {
    fn from(error: RepoError) -> Self {
        match error {
            RepoError::NotFound => AppError::NotFound,
            other => AppError::Storage(other),
        }
    }
}

impl From<QueryError> for AppError {
    fn from(error: QueryError) -> Self {
        AppError::Validation(error.to_string())
    }
}

impl From<CompareError> for AppError {
    fn from(error: CompareError) -> Self {
        AppError::Validation(error.to_string())
    }
}
