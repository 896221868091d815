//! Repository layer: entity-scoped database operations.
//!
//! Free functions over a borrowed `Connection`, so callers can run them inside
//! a transaction.

mod diagnosis;
mod lab_result;
mod medication;
mod report;
mod vital_sign;

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use super::DatabaseError;

pub use diagnosis::*;
pub use lab_result::*;
pub use medication::*;
pub use report::*;
pub use vital_sign::*;

pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

fn conversion_error(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

pub(crate) fn uuid_column(row: &rusqlite::Row, idx: usize) -> Result<Uuid, rusqlite::Error> {
    let s: String = row.get(idx)?;
    Uuid::parse_str(&s).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn enum_column<T>(row: &rusqlite::Row, idx: usize) -> Result<T, rusqlite::Error>
where
    T: FromStr<Err = DatabaseError>,
{
    let s: String = row.get(idx)?;
    T::from_str(&s).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn optional_enum_column<T>(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<Option<T>, rusqlite::Error>
where
    T: FromStr<Err = DatabaseError>,
{
    let s: Option<String> = row.get(idx)?;
    s.map(|v| T::from_str(&v).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn datetime_column(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<NaiveDateTime, rusqlite::Error> {
    let s: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn date_column(row: &rusqlite::Row, idx: usize) -> Result<NaiveDate, rusqlite::Error> {
    let s: String = row.get(idx)?;
    NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn optional_date_column(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<Option<NaiveDate>, rusqlite::Error> {
    let s: Option<String> = row.get(idx)?;
    s.map(|v| NaiveDate::parse_from_str(&v, DATE_FORMAT).map_err(|e| conversion_error(idx, e)))
        .transpose()
}
