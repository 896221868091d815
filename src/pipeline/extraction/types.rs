use serde::{Deserialize, Serialize};

use crate::models::enums::{DiagnosisStatus, LabFlag, MedicationStatus};
use crate::models::report::BinaryPart;
use crate::models::vital_sign::format_vital_reading;
use crate::pipeline::model::{Credentials, ModelClient};

/// Output of a single agent invocation. Records are not yet timestamped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub medications: Vec<ExtractedMedication>,
    pub labs: Vec<ExtractedLabResult>,
    pub vitals: Vec<ExtractedVitalSign>,
    pub diagnoses: Vec<ExtractedDiagnosis>,
    pub raw_text: Option<String>,
    /// OCR confidence in [0, 1]; `1.0` for plain text input.
    pub confidence: Option<f32>,
    /// Notes from post-parse validation (dropped or normalized records).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ExtractionResult {
    /// The all-empty result the pipeline returns when it stops early.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Safe default for a failed image extraction: no records, no text, zero confidence.
    pub fn failed_ocr() -> Self {
        Self {
            raw_text: Some(String::new()),
            confidence: Some(0.0),
            ..Self::default()
        }
    }

    /// True when none of the four record collections has an entry.
    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }

    pub fn record_count(&self) -> usize {
        self.medications.len() + self.labs.len() + self.vitals.len() + self.diagnoses.len()
    }

    pub fn has_raw_text(&self) -> bool {
        self.raw_text.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedMedication {
    pub name: String,
    pub dose: String,
    pub frequency: String,
    pub route: Option<String>,
    pub status: MedicationStatus,
    pub indication: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedLabResult {
    pub test_name: String,
    pub value: String,
    pub unit: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    pub reference_range: Option<String>,
    pub flag: Option<LabFlag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedVitalSign {
    #[serde(rename = "type")]
    pub vital_type: String,
    pub value: f64,
    pub value2: Option<f64>,
    pub unit: String,
    /// `YYYY-MM-DD`.
    pub date: String,
}

impl ExtractedVitalSign {
    pub fn display(&self) -> String {
        format_vital_reading(&self.vital_type, self.value, self.value2)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedDiagnosis {
    pub name: String,
    pub status: DiagnosisStatus,
    pub icd_code: Option<String>,
    pub diagnosed_date: Option<String>,
}

/// What an agent is asked to read.
#[derive(Debug, Clone, Copy)]
pub enum AgentInput<'a> {
    /// One image, scanned PDF or DICOM part.
    Image(&'a BinaryPart),
    /// Ordered pages of one logical document.
    Pages(&'a [BinaryPart]),
    Text(&'a str),
}

impl AgentInput<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Image(_) => "image",
            Self::Pages(_) => "pages",
            Self::Text(_) => "text",
        }
    }
}

/// Converts document content into clinical records through one model call.
///
/// Implementations recover from every model or parse failure locally, so the
/// caller always receives a well-formed result.
pub trait ExtractionAgent: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(
        &self,
        input: &AgentInput<'_>,
        document_type: &str,
        client: &dyn ModelClient,
        credentials: &Credentials,
    ) -> ExtractionResult;
}
