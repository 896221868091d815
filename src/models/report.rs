use std::collections::BTreeSet;

use base64::Engine as _;
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use super::enums::ExtractionStatus;

/// Tag set on a report once the pipeline has extracted it.
pub const SMART_EXTRACTED_TAG: &str = "smart-extracted";

/// MIME type used for DICOM parts sent to the model.
pub const DICOM_MIME: &str = "application/dicom";

/// An uploaded clinical document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub title: String,
    /// Free-text label ("Lab Report", "Discharge Summary") handed to the agents.
    pub document_type: String,
    pub content: ReportContent,
    pub status: ExtractionStatus,
    pub tags: BTreeSet<String>,
    /// Text cached by a previous extraction.
    pub raw_text: Option<String>,
    pub fingerprint: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Report {
    pub fn new(patient_id: Uuid, title: &str, document_type: &str, content: ReportContent) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            title: title.to_string(),
            document_type: document_type.to_string(),
            content,
            status: ExtractionStatus::Idle,
            tags: BTreeSet::new(),
            raw_text: None,
            fingerprint: None,
            created_at: chrono::Local::now().naive_local(),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Already extracted by a previous run and flagged as such.
    pub fn is_smart_extracted(&self) -> bool {
        self.status == ExtractionStatus::Completed && self.has_tag(SMART_EXTRACTED_TAG)
    }
}

/// Content shape of a report, decided once at upload time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReportContent {
    /// One or more page images of a single document.
    Image { pages: Vec<BinaryPart> },
    /// A PDF; `text` holds its text layer when one was available.
    Pdf { text: Option<String> },
    Text { body: String },
    Dicom { part: BinaryPart },
}

impl ReportContent {
    pub fn single_image(mime_type: &str, data: Vec<u8>) -> Self {
        Self::Image {
            pages: vec![BinaryPart::new(mime_type, data)],
        }
    }

    pub fn text(body: &str) -> Self {
        Self::Text {
            body: body.to_string(),
        }
    }
}

/// Binary payload with its MIME type. Serialized as base64.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryPart {
    pub mime_type: String,
    #[serde(serialize_with = "encode_base64", deserialize_with = "decode_base64")]
    pub data: Vec<u8>,
}

impl BinaryPart {
    pub fn new(mime_type: &str, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            data,
        }
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }
}

impl std::fmt::Debug for BinaryPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinaryPart")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// The raw file behind a report, as received from the upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: &str, mime_type: &str, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            data,
        }
    }

    pub fn as_part(&self) -> BinaryPart {
        BinaryPart::new(&self.mime_type, self.data.clone())
    }
}

fn encode_base64<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(data))
}

fn decode_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    base64::engine::general_purpose::STANDARD
        .decode(encoded.as_bytes())
        .map_err(serde::de::Error::custom)
}
