//! Extraction pipeline: one report in, structured records out.
//!
//! Drives `idle → extracting → saving → completed` (or `→ failed`) for a
//! single report. Every transition is persisted best-effort and emitted to
//! the run's progress sink. Uses trait-based DI for the model client and the
//! database gateway so runs are fully testable with mocks.

use std::sync::Arc;

use uuid::Uuid;

use super::classify::{classify, ContentKind};
use super::extraction::{
    AgentInput, ExtractionAgent, ExtractionResult, ImageExtractionAgent,
    MultiImageExtractionAgent, TextExtractionAgent,
};
use super::fingerprint::compute_fingerprint;
use super::model::{build_client, Credentials, ModelClient, ModelError};
use super::progress::{ProgressEvent, ProgressSink};
use crate::config::AppConfig;
use crate::insights::ClinicalInsights;
use crate::db::{DatabaseError, DatabaseGateway, SqliteGateway};
use crate::models::enums::ExtractionStatus;
use crate::models::report::{BinaryPart, Report, ReportContent, UploadedFile};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("No extractable content found in this report")]
    NoExtractableContent,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Model client setup failed: {0}")]
    Model(#[from] ModelError),

    #[error("Report {report_id} does not belong to patient {patient_id}")]
    PatientMismatch { report_id: Uuid, patient_id: Uuid },
}

pub const ALREADY_ANALYZED_MESSAGE: &str = "Report already analyzed";
pub const NO_CLINICAL_DATA_MESSAGE: &str = "No clinical data could be extracted";

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Holds no per-run state; share it freely across threads.
pub struct ExtractionPipeline {
    gateway: Arc<dyn DatabaseGateway>,
    client: Arc<dyn ModelClient>,
    image_agent: ImageExtractionAgent,
    multi_image_agent: MultiImageExtractionAgent,
    text_agent: TextExtractionAgent,
    fingerprint_dedup: bool,
}

impl ExtractionPipeline {
    pub fn new(gateway: Arc<dyn DatabaseGateway>, client: Arc<dyn ModelClient>) -> Self {
        Self {
            gateway,
            client,
            image_agent: ImageExtractionAgent,
            multi_image_agent: MultiImageExtractionAgent,
            text_agent: TextExtractionAgent::default(),
            fingerprint_dedup: true,
        }
    }

    pub fn with_fingerprint_dedup(mut self, enabled: bool) -> Self {
        self.fingerprint_dedup = enabled;
        self
    }

    pub fn with_max_text_chars(mut self, max_chars: usize) -> Self {
        self.text_agent = TextExtractionAgent::new(max_chars);
        self
    }

    pub fn gateway(&self) -> &Arc<dyn DatabaseGateway> {
        &self.gateway
    }

    /// Insights over the same database and model client.
    pub fn insights(&self) -> ClinicalInsights {
        ClinicalInsights::new(self.gateway.clone(), self.client.clone())
    }

    /// Extract one report. Never returns an error: failures end in a
    /// `failed` status and an empty result. A report owned by another
    /// patient is refused without touching the database.
    pub fn run(
        &self,
        patient_id: &Uuid,
        report: &Report,
        credentials: &Credentials,
        file: Option<&UploadedFile>,
        sink: &dyn ProgressSink,
    ) -> ExtractionResult {
        let _span = tracing::info_span!(
            "extraction_run",
            report_id = %report.id,
            patient_id = %patient_id,
            model = self.client.model_name(),
        )
        .entered();

        if report.patient_id != *patient_id {
            let e = PipelineError::PatientMismatch {
                report_id: report.id,
                patient_id: *patient_id,
            };
            tracing::warn!(report_patient_id = %report.patient_id, error = %e, "Refusing extraction");
            emit(sink, ProgressEvent::failed(report.id, &e.to_string()));
            return ExtractionResult::empty();
        }

        match self.run_inner(patient_id, report, credentials, file, sink) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "Extraction run failed");
                self.persist_status(patient_id, &report.id, ExtractionStatus::Failed, None);
                emit(sink, ProgressEvent::failed(report.id, &e.to_string()));
                ExtractionResult::empty()
            }
        }
    }

    fn run_inner(
        &self,
        patient_id: &Uuid,
        report: &Report,
        credentials: &Credentials,
        file: Option<&UploadedFile>,
        sink: &dyn ProgressSink,
    ) -> Result<ExtractionResult, PipelineError> {
        // 1. Already extracted: nothing to do.
        if report.is_smart_extracted() {
            tracing::info!("Report already smart-extracted, skipping");
            emit(
                sink,
                ProgressEvent::completed(report.id, ALREADY_ANALYZED_MESSAGE, ExtractionResult::empty()),
            );
            return Ok(ExtractionResult::empty());
        }

        self.transition(
            sink,
            patient_id,
            &report.id,
            ExtractionStatus::Extracting,
            "Analyzing document",
        );

        // 2. Fingerprint the uploaded bytes.
        let fingerprint = file.map(|f| compute_fingerprint(&f.data));
        if let (true, Some(fp)) = (self.fingerprint_dedup, fingerprint.as_deref()) {
            if let Some(previous) =
                self.gateway
                    .find_completed_report_by_fingerprint(patient_id, fp, &report.id)?
            {
                tracing::info!(
                    previous_report_id = %previous.id,
                    "Identical file already extracted, reusing"
                );
                self.persist_status(
                    patient_id,
                    &report.id,
                    ExtractionStatus::Completed,
                    previous.raw_text.as_deref(),
                );
                emit(
                    sink,
                    ProgressEvent::completed(
                        report.id,
                        "Identical document already analyzed",
                        ExtractionResult::empty(),
                    ),
                );
                return Ok(ExtractionResult::empty());
            }
        }

        // 3. Route by content kind, falling back to the raw file.
        let fallback = file.map(UploadedFile::as_part);
        let (agent, input) = self
            .route(report, fallback.as_ref())
            .ok_or(PipelineError::NoExtractableContent)?;

        // 4. Exactly one agent call.
        tracing::info!(agent = agent.name(), input = input.kind(), "Dispatching extraction agent");
        let result = agent.extract(&input, &report.document_type, self.client.as_ref(), credentials);

        // 5. Persist records.
        let mut saved = false;
        if !result.is_empty() {
            self.transition(
                sink,
                patient_id,
                &report.id,
                ExtractionStatus::Saving,
                "Saving extracted data",
            );
            match self.gateway.save_extracted_data(
                patient_id,
                &report.id,
                &result,
                fingerprint.as_deref(),
            ) {
                Ok(()) => saved = true,
                Err(e) => tracing::warn!(error = %e, "Failed to save extracted data"),
            }
        }

        // 6. Final status.
        if !result.is_empty() || result.has_raw_text() {
            self.persist_status(
                patient_id,
                &report.id,
                ExtractionStatus::Completed,
                result.raw_text.as_deref(),
            );
            let summary = summarize(&result, saved);
            tracing::info!(records = result.record_count(), "Extraction completed");
            emit(sink, ProgressEvent::completed(report.id, &summary, result.clone()));
        } else {
            self.persist_status(patient_id, &report.id, ExtractionStatus::Failed, None);
            emit(sink, ProgressEvent::failed(report.id, NO_CLINICAL_DATA_MESSAGE));
        }

        Ok(result)
    }

    /// Pick the agent and its input. `None` when nothing can be read.
    fn route<'a>(
        &'a self,
        report: &'a Report,
        fallback: Option<&'a BinaryPart>,
    ) -> Option<(&'a dyn ExtractionAgent, AgentInput<'a>)> {
        let kind = classify(&report.content);
        tracing::debug!(kind = kind.as_str(), "Report classified");

        let image: &dyn ExtractionAgent = &self.image_agent;
        let pages_agent: &dyn ExtractionAgent = &self.multi_image_agent;
        let text_agent: &dyn ExtractionAgent = &self.text_agent;

        let primary = match &report.content {
            ReportContent::Image { pages } if pages.len() == 1 => {
                Some((image, AgentInput::Image(&pages[0])))
            }
            ReportContent::Image { pages } if pages.len() > 1 => {
                Some((pages_agent, AgentInput::Pages(pages)))
            }
            ReportContent::Dicom { part } if kind == ContentKind::Dicom => {
                Some((image, AgentInput::Image(part)))
            }
            ReportContent::Pdf { text } => non_blank(text.as_deref())
                .or_else(|| non_blank(report.raw_text.as_deref()))
                .map(|t| (text_agent, AgentInput::Text(t))),
            ReportContent::Text { body } => {
                non_blank(Some(body.as_str())).map(|t| (text_agent, AgentInput::Text(t)))
            }
            _ => None,
        };

        primary.or_else(|| {
            let part = fallback?;
            tracing::info!(
                kind = kind.as_str(),
                mime = %part.mime_type,
                "No primary content, falling back to image extraction on the uploaded file"
            );
            Some((image, AgentInput::Image(part)))
        })
    }

    fn transition(
        &self,
        sink: &dyn ProgressSink,
        patient_id: &Uuid,
        report_id: &Uuid,
        status: ExtractionStatus,
        message: &str,
    ) {
        self.persist_status(patient_id, report_id, status, None);
        emit(sink, ProgressEvent::status(*report_id, status, message));
    }

    fn persist_status(
        &self,
        patient_id: &Uuid,
        report_id: &Uuid,
        status: ExtractionStatus,
        raw_text: Option<&str>,
    ) {
        if let Err(e) = self
            .gateway
            .update_report_extraction_status(patient_id, report_id, status, raw_text)
        {
            tracing::warn!(status = status.as_str(), error = %e, "Failed to persist report status");
        }
    }
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.trim().is_empty())
}

fn emit(sink: &dyn ProgressSink, event: ProgressEvent) {
    let status = event.status;
    if let Err(e) = sink.emit(event) {
        tracing::warn!(status = status.as_str(), error = %e, "Progress event not delivered");
    }
}

/// Human-readable outcome, e.g. "Extracted: 2 medication(s), 1 lab result(s). Data saved to health profile."
/// `saved` is false when the records never reached the database.
pub fn summarize(result: &ExtractionResult, saved: bool) -> String {
    let counts = [
        (result.medications.len(), "medication(s)"),
        (result.labs.len(), "lab result(s)"),
        (result.vitals.len(), "vital sign(s)"),
        (result.diagnoses.len(), "diagnosis(es)"),
    ];
    let parts: Vec<String> = counts
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, label)| format!("{n} {label}"))
        .collect();

    if parts.is_empty() {
        "No structured clinical data found.".to_string()
    } else if saved {
        format!("Extracted: {}. Data saved to health profile.", parts.join(", "))
    } else {
        format!(
            "Extracted: {}. Data could not be saved to health profile.",
            parts.join(", ")
        )
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Wire the configured model client and an SQLite gateway at the configured path.
pub fn build_pipeline(config: &AppConfig) -> Result<ExtractionPipeline, PipelineError> {
    let client = build_client(config)?;
    let gateway: Arc<dyn DatabaseGateway> = Arc::new(SqliteGateway::open(&config.db_path)?);

    tracing::info!(
        provider = config.provider.as_str(),
        model = %config.model,
        db = %config.db_path.display(),
        fingerprint_dedup = config.fingerprint_dedup,
        "Extraction pipeline ready"
    );

    Ok(ExtractionPipeline::new(gateway, client)
        .with_fingerprint_dedup(config.fingerprint_dedup)
        .with_max_text_chars(config.max_text_chars))
}
