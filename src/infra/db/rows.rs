//! Row decoding into [`EntityRecord`]s.
//!
//! A column named `id` becomes the record id. Integer and float columns
//! become metrics, with SQL NULL kept as an explicit missing metric; text,
//! boolean, date and timestamp columns become attributes. Any other type
//! (`NUMERIC`, arrays, JSON) is rejected, so select lists cast such columns
//! to `int8`/`float8`/`text` first.

use sqlx::{Column, Row, TypeInfo, postgres::PgRow};
use time::{OffsetDateTime, PrimitiveDateTime, format_description::well_known::Rfc3339};

use super::util::map_sqlx_error;
use crate::application::repos::RepoError;
use crate::domain::entities::EntityRecord;

const ID_COLUMN: &str = "id";

/// How a Postgres column type is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnKind {
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Bool,
    Date,
    TimestampTz,
    Timestamp,
    Text,
    Unsupported,
}

pub(crate) fn column_kind(type_name: &str) -> ColumnKind {
    match type_name {
        "INT2" => ColumnKind::Int2,
        "INT4" => ColumnKind::Int4,
        "INT8" => ColumnKind::Int8,
        "FLOAT4" => ColumnKind::Float4,
        "FLOAT8" => ColumnKind::Float8,
        "BOOL" => ColumnKind::Bool,
        "DATE" => ColumnKind::Date,
        "TIMESTAMPTZ" => ColumnKind::TimestampTz,
        "TIMESTAMP" => ColumnKind::Timestamp,
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => ColumnKind::Text,
        _ => ColumnKind::Unsupported,
    }
}

pub fn row_to_record(row: &PgRow) -> Result<EntityRecord, RepoError> {
    let mut record = EntityRecord::default();

    for column in row.columns() {
        let name = column.name();
        let index = column.ordinal();

        if name == ID_COLUMN {
            record.id = row
                .try_get::<Option<String>, _>(index)
                .map_err(map_sqlx_error)?
                .unwrap_or_default();
            continue;
        }

        let type_name = column.type_info().name();
        match column_kind(type_name) {
            ColumnKind::Int2 => {
                let value: Option<i16> = row.try_get(index).map_err(map_sqlx_error)?;
                record.metrics.insert(name.to_string(), value.map(f64::from));
            }
            ColumnKind::Int4 => {
                let value: Option<i32> = row.try_get(index).map_err(map_sqlx_error)?;
                record.metrics.insert(name.to_string(), value.map(f64::from));
            }
            ColumnKind::Int8 => {
                let value: Option<i64> = row.try_get(index).map_err(map_sqlx_error)?;
                record
                    .metrics
                    .insert(name.to_string(), value.map(|value| value as f64));
            }
            ColumnKind::Float4 => {
                let value: Option<f32> = row.try_get(index).map_err(map_sqlx_error)?;
                record.metrics.insert(name.to_string(), value.map(f64::from));
            }
            ColumnKind::Float8 => {
                let value: Option<f64> = row.try_get(index).map_err(map_sqlx_error)?;
                record.metrics.insert(name.to_string(), value);
            }
            ColumnKind::Bool => {
                let value: Option<bool> = row.try_get(index).map_err(map_sqlx_error)?;
                insert_attribute(&mut record, name, value.map(|flag| flag.to_string()));
            }
            ColumnKind::Date => {
                let value: Option<time::Date> = row.try_get(index).map_err(map_sqlx_error)?;
                insert_attribute(&mut record, name, value.map(|date| date.to_string()));
            }
            ColumnKind::TimestampTz => {
                let value: Option<OffsetDateTime> =
                    row.try_get(index).map_err(map_sqlx_error)?;
                let text = value
                    .map(|at| at.format(&Rfc3339))
                    .transpose()
                    .map_err(RepoError::from_persistence)?;
                insert_attribute(&mut record, name, text);
            }
            ColumnKind::Timestamp => {
                let value: Option<PrimitiveDateTime> =
                    row.try_get(index).map_err(map_sqlx_error)?;
                insert_attribute(&mut record, name, value.map(|at| at.to_string()));
            }
            ColumnKind::Text => {
                let value: Option<String> = row.try_get(index).map_err(map_sqlx_error)?;
                insert_attribute(&mut record, name, value);
            }
            ColumnKind::Unsupported => return Err(unsupported_column(name, type_name)),
        }
    }

    Ok(record)
}

fn unsupported_column(name: &str, type_name: &str) -> RepoError {
    RepoError::from_persistence(format!(
        "column `{name}` has undecodable type {type_name}; cast it to int8, float8 or text"
    ))
}

fn insert_attribute(record: &mut EntityRecord, name: &str, value: Option<String>) {
    if let Some(value) = value {
        record.attributes.insert(name.to_string(), value);
    }
}
