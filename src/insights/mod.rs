//! Clinical insights over a patient's stored records.
//!
//! Each insight loads the patient aggregate, renders it as prompt context and
//! asks the model for one structured answer: a medication safety check, a
//! guideline adherence check, a vital-sign trend analysis or a SOAP note
//! draft. Unlike extraction runs,
//! failures are returned to the caller.

pub mod prompt;
pub mod schema;
pub mod service;
pub mod types;

pub use service::ClinicalInsights;
pub use types::*;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::pipeline::model::ModelError;

#[derive(Error, Debug)]
pub enum InsightError {
    #[error("No {0} recorded for this patient")]
    NoData(&'static str),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),
}
