use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::report::{BinaryPart, ReportContent, UploadedFile, DICOM_MIME};

/// Content categories the pipeline routes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Image,
    Pdf,
    Text,
    Dicom,
    Unknown,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Pdf => "pdf",
            Self::Text => "text",
            Self::Dicom => "dicom",
            Self::Unknown => "unknown",
        }
    }
}

/// Classify stored report content. Empty image and DICOM variants are `Unknown`.
pub fn classify(content: &ReportContent) -> ContentKind {
    match content {
        ReportContent::Image { pages } if pages.is_empty() => ContentKind::Unknown,
        ReportContent::Image { .. } => ContentKind::Image,
        ReportContent::Pdf { .. } => ContentKind::Pdf,
        ReportContent::Text { .. } => ContentKind::Text,
        ReportContent::Dicom { part } if part.data.is_empty() => ContentKind::Unknown,
        ReportContent::Dicom { .. } => ContentKind::Dicom,
    }
}

/// DICOM Part 10: 128-byte preamble, then "DICM".
const DICOM_MAGIC_OFFSET: usize = 128;

/// ISO-BMFF major brands that mark a HEIF still image.
const HEIF_BRANDS: [&[u8; 4]; 6] = [b"heic", b"heix", b"hevc", b"heif", b"mif1", b"msf1"];

/// MIME type from magic bytes, when the signature is known.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.get(DICOM_MAGIC_OFFSET..DICOM_MAGIC_OFFSET + 4) == Some(&b"DICM"[..]) {
        return Some(DICOM_MIME);
    }
    match bytes {
        // PDF: starts with %PDF
        [0x25, 0x50, 0x44, 0x46, ..] => Some("application/pdf"),
        // JPEG: starts with FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        // PNG: starts with 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        // TIFF: little-endian (49 49 2A 00) or big-endian (4D 4D 00 2A)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Some("image/tiff"),
        // WebP: RIFF....WEBP
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        // HEIC/HEIF: "ftyp" at offset 4 with a HEIF major brand; MP4/MOV use other brands
        [_, _, _, _, b'f', b't', b'y', b'p', b0, b1, b2, b3, ..]
            if HEIF_BRANDS.contains(&&[*b0, *b1, *b2, *b3]) =>
        {
            Some("image/heic")
        }
        _ => None,
    }
}

fn kind_from_mime(mime: &str) -> ContentKind {
    let mime = mime.trim().to_ascii_lowercase();
    let essence = mime.split(';').next().unwrap_or_default().trim();
    match essence {
        "application/pdf" => ContentKind::Pdf,
        "application/dicom" => ContentKind::Dicom,
        m if m.starts_with("image/") => ContentKind::Image,
        m if m.starts_with("text/") => ContentKind::Text,
        _ => ContentKind::Unknown,
    }
}

fn kind_from_file_name(file_name: &str) -> ContentKind {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    if matches!(ext.as_deref(), Some("dcm" | "dicom")) {
        return ContentKind::Dicom;
    }
    mime_guess::from_path(file_name)
        .first_raw()
        .map(kind_from_mime)
        .unwrap_or(ContentKind::Unknown)
}

/// Valid UTF-8 and mostly printable, judged on the first 4 KiB.
fn is_likely_text(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(4096)];
    if head.is_empty() {
        return false;
    }

    let text = match std::str::from_utf8(head) {
        Ok(t) => t,
        // A multi-byte character cut at the 4 KiB boundary is fine.
        Err(e) if e.error_len().is_none() => {
            std::str::from_utf8(&head[..e.valid_up_to()]).unwrap_or_default()
        }
        Err(_) => return false,
    };

    let total = text.chars().count();
    if total == 0 {
        return false;
    }
    // At least 80% printable characters (or whitespace)
    let printable = text
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .count();
    printable as f64 / total as f64 > 0.80
}

/// Decide the content kind of an upload.
///
/// Magic bytes win over the declared MIME type, which wins over the file
/// extension; a printable-text check is the last resort.
pub fn detect_kind(declared_mime: &str, file_name: &str, bytes: &[u8]) -> ContentKind {
    if bytes.is_empty() {
        return ContentKind::Unknown;
    }
    if let Some(mime) = sniff_mime(bytes) {
        return kind_from_mime(mime);
    }

    let from_mime = kind_from_mime(declared_mime);
    if from_mime != ContentKind::Unknown {
        return from_mime;
    }

    let from_name = kind_from_file_name(file_name);
    if from_name != ContentKind::Unknown {
        return from_name;
    }

    if is_likely_text(bytes) {
        ContentKind::Text
    } else {
        ContentKind::Unknown
    }
}

/// Build report content from an upload. `None` when nothing is recognizable.
///
/// The PDF text layer is left empty; image parts carry the sniffed MIME type
/// when the signature is known.
pub fn content_from_upload(file: &UploadedFile) -> Option<ReportContent> {
    let kind = detect_kind(&file.mime_type, &file.file_name, &file.data);
    tracing::debug!(
        file_name = %file.file_name,
        kind = kind.as_str(),
        bytes = file.data.len(),
        "Upload classified"
    );

    match kind {
        ContentKind::Image => {
            let mime = sniff_mime(&file.data).unwrap_or(file.mime_type.as_str());
            Some(ReportContent::Image {
                pages: vec![BinaryPart::new(mime, file.data.clone())],
            })
        }
        ContentKind::Pdf => Some(ReportContent::Pdf { text: None }),
        ContentKind::Text => Some(ReportContent::Text {
            body: String::from_utf8_lossy(&file.data).into_owned(),
        }),
        ContentKind::Dicom => Some(ReportContent::Dicom {
            part: BinaryPart::new(DICOM_MIME, file.data.clone()),
        }),
        ContentKind::Unknown => None,
    }
}
