use super::parser::parse_extraction_response;
use super::prompt::{
    build_image_instruction, build_pages_instruction, build_text_instruction, truncate_chars,
    MAX_TEXT_CHARS,
};
use super::schema::{extraction_schema, SchemaVariant};
use super::types::{AgentInput, ExtractionAgent, ExtractionResult};
use super::validation::{dedup_records, validate_extraction};
use super::AgentError;
use crate::models::report::BinaryPart;
use crate::pipeline::model::{Credentials, ModelClient, ModelRequest};

/// One model call, then sanitize, parse and validate.
fn run_model(
    client: &dyn ModelClient,
    credentials: &Credentials,
    instruction: String,
    parts: Vec<BinaryPart>,
    variant: SchemaVariant,
) -> Result<ExtractionResult, AgentError> {
    let request = ModelRequest::with_parts(instruction, parts, extraction_schema(variant));
    let response = client.generate(&request, credentials)?;
    let raw = parse_extraction_response(&response)?;
    Ok(validate_extraction(raw))
}

/// Transcribes and extracts a single image, scanned PDF or DICOM part.
#[derive(Debug, Default)]
pub struct ImageExtractionAgent;

impl ExtractionAgent for ImageExtractionAgent {
    fn name(&self) -> &'static str {
        "image"
    }

    fn extract(
        &self,
        input: &AgentInput<'_>,
        document_type: &str,
        client: &dyn ModelClient,
        credentials: &Credentials,
    ) -> ExtractionResult {
        let AgentInput::Image(part) = input else {
            tracing::warn!(kind = input.kind(), "Image agent received non-image input");
            return ExtractionResult::failed_ocr();
        };

        let _span = tracing::info_span!(
            "image_extraction",
            mime = %part.mime_type,
            bytes = part.data.len(),
            model = client.model_name(),
        )
        .entered();

        let instruction = build_image_instruction(document_type);
        match run_model(
            client,
            credentials,
            instruction,
            vec![(*part).clone()],
            SchemaVariant::WithTranscription,
        ) {
            Ok(mut result) => {
                result.raw_text.get_or_insert_with(String::new);
                tracing::info!(records = result.record_count(), "Image extraction complete");
                result
            }
            Err(e) => {
                tracing::warn!(error = %e, "Image extraction failed");
                ExtractionResult::failed_ocr()
            }
        }
    }
}

/// Reads the ordered pages of one document in a single call.
#[derive(Debug, Default)]
pub struct MultiImageExtractionAgent;

impl ExtractionAgent for MultiImageExtractionAgent {
    fn name(&self) -> &'static str {
        "multi_image"
    }

    fn extract(
        &self,
        input: &AgentInput<'_>,
        document_type: &str,
        client: &dyn ModelClient,
        credentials: &Credentials,
    ) -> ExtractionResult {
        let pages: &[BinaryPart] = match input {
            AgentInput::Pages(pages) => *pages,
            AgentInput::Image(part) => std::slice::from_ref(*part),
            AgentInput::Text(_) => {
                tracing::warn!("Multi-image agent received text input");
                return ExtractionResult::failed_ocr();
            }
        };

        let _span = tracing::info_span!(
            "multi_image_extraction",
            pages = pages.len(),
            model = client.model_name(),
        )
        .entered();

        let instruction = build_pages_instruction(document_type, pages.len());
        match run_model(
            client,
            credentials,
            instruction,
            pages.to_vec(),
            SchemaVariant::WithTranscription,
        ) {
            Ok(mut result) => {
                result.raw_text.get_or_insert_with(String::new);
                let removed = dedup_records(&mut result);
                if removed > 0 {
                    result
                        .warnings
                        .push(format!("{removed} record(s) repeated across pages merged"));
                }
                tracing::info!(
                    records = result.record_count(),
                    duplicates = removed,
                    "Multi-image extraction complete"
                );
                result
            }
            Err(e) => {
                tracing::warn!(error = %e, "Multi-image extraction failed");
                ExtractionResult::failed_ocr()
            }
        }
    }
}

/// Extracts entities from document text. The text is its own transcription.
#[derive(Debug)]
pub struct TextExtractionAgent {
    max_chars: usize,
}

impl TextExtractionAgent {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

impl Default for TextExtractionAgent {
    fn default() -> Self {
        Self::new(MAX_TEXT_CHARS)
    }
}

impl ExtractionAgent for TextExtractionAgent {
    fn name(&self) -> &'static str {
        "text"
    }

    fn extract(
        &self,
        input: &AgentInput<'_>,
        document_type: &str,
        client: &dyn ModelClient,
        credentials: &Credentials,
    ) -> ExtractionResult {
        let AgentInput::Text(text) = input else {
            tracing::warn!(kind = input.kind(), "Text agent received binary input");
            return ExtractionResult::empty();
        };

        let embedded = truncate_chars(text, self.max_chars);
        let _span = tracing::info_span!(
            "text_extraction",
            chars = embedded.chars().count(),
            truncated = embedded.len() < text.len(),
            model = client.model_name(),
        )
        .entered();

        let instruction = build_text_instruction(document_type, embedded);
        let mut result = match run_model(
            client,
            credentials,
            instruction,
            Vec::new(),
            SchemaVariant::EntitiesOnly,
        ) {
            Ok(result) => {
                tracing::info!(records = result.record_count(), "Text extraction complete");
                result
            }
            Err(e) => {
                tracing::warn!(error = %e, "Text extraction failed");
                ExtractionResult::empty()
            }
        };

        result.raw_text = Some(text.to_string());
        result.confidence = Some(1.0);
        result
    }
}
