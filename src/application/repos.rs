//! Storage collaborator contract.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::EntityRecord;
use crate::query::PreparedQuery;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Runs a prepared, fully parameterized query and returns its rows.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self, query: &PreparedQuery) -> Result<Vec<EntityRecord>, RepoError>;
}
