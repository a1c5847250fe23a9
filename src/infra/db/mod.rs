//! Postgres-backed record source.

mod rows;
mod util;

pub use rows::row_to_record;
pub use util::map_sqlx_error;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{
    Postgres,
    postgres::{PgArguments, PgPool, PgPoolOptions},
    query,
    query::Query,
};
use tracing::debug;

use crate::application::repos::{RecordSource, RepoError};
use crate::domain::entities::EntityRecord;
use crate::query::{BindValue, PreparedQuery};

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }
}

/// Bind `value` to the next placeholder. Lists travel as Postgres arrays.
fn bind_value<'q>(
    statement: Query<'q, Postgres, PgArguments>,
    value: &'q BindValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        BindValue::Int(value) => statement.bind(*value),
        BindValue::Float(value) => statement.bind(*value),
        BindValue::Text(value) => statement.bind(value.as_str()),
        BindValue::Date(value) => statement.bind(*value),
        BindValue::IntList(values) => statement.bind(values.as_slice()),
        BindValue::TextList(values) => statement.bind(values.as_slice()),
    }
}

#[async_trait]
impl RecordSource for PostgresRepositories {
    async fn fetch(&self, prepared: &PreparedQuery) -> Result<Vec<EntityRecord>, RepoError> {
        debug!(params = prepared.params.len(), "Running prepared query");

        let statement = prepared
            .params
            .iter()
            .fold(query(&prepared.sql), bind_value);

        let rows = statement
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.iter().map(row_to_record).collect()
    }
}
