pub mod agents;
pub mod parser;
pub mod prompt;
pub mod sanitize;
pub mod schema;
pub mod types;
pub mod validation;

pub use agents::{ImageExtractionAgent, MultiImageExtractionAgent, TextExtractionAgent};
pub use types::*;

use thiserror::Error;

use crate::pipeline::model::ModelError;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),
}
