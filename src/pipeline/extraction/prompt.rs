/// Default cap on text embedded in a prompt, in characters.
pub const MAX_TEXT_CHARS: usize = 12_000;

const ENTITY_RULES: &str = "\
Extract every clinical entity into the JSON schema provided:
- medications: name, dose, frequency, optional route, status (active, stopped or held), optional indication
- labs: testName, value, unit, date, optional referenceRange, optional flag (normal, low, high or critical)
- vitals: type (BP, HR, Temp, RR, SpO2, Weight, Height), numeric value, optional value2 for the diastolic reading, unit, date
- diagnoses: name, status (active, resolved or chronic), optional icdCode, optional diagnosedDate

Rules:
- Write every date as YYYY-MM-DD.
- Only report what the document states. Do not infer or invent values.
- Use an empty array for any category with no entries.";

/// Keep the first `max_chars` Unicode scalar values of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Instruction for a single image, scanned page or DICOM part.
pub fn build_image_instruction(document_type: &str) -> String {
    format!(
        "You are reading a medical document of type \"{document_type}\".\n\
         1. Transcribe all visible text verbatim into rawText, preserving line breaks.\n\
         2. Report your transcription confidence between 0 and 1 in confidence.\n\
         3. {ENTITY_RULES}"
    )
}

/// Instruction for several pages of one document.
pub fn build_pages_instruction(document_type: &str, page_count: usize) -> String {
    format!(
        "You are reading {page_count} pages of one medical document of type \"{document_type}\", in order.\n\
         1. Transcribe the text of every page verbatim into rawText, pages in order.\n\
         2. Report your overall transcription confidence between 0 and 1 in confidence.\n\
         3. An entity repeated on several pages (for example a medication list printed on each page) is reported once.\n\
         4. {ENTITY_RULES}"
    )
}

/// Instruction embedding document text, already truncated by the caller.
pub fn build_text_instruction(document_type: &str, text: &str) -> String {
    format!(
        "You are reading the text of a medical document of type \"{document_type}\".\n\
         {ENTITY_RULES}\n\n\
         <document>\n{text}\n</document>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 5), "hello");
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        let text = "é".repeat(10);
        let cut = truncate_chars(&text, 4);
        assert_eq!(cut.chars().count(), 4);
        assert_eq!(cut, "éééé");
    }

    #[test]
    fn truncate_to_default_cap() {
        let text = "a".repeat(MAX_TEXT_CHARS + 1);
        assert_eq!(truncate_chars(&text, MAX_TEXT_CHARS).len(), MAX_TEXT_CHARS);
    }

    #[test]
    fn image_instruction_asks_for_transcription() {
        let prompt = build_image_instruction("Lab Report");
        assert!(prompt.contains("\"Lab Report\""));
        assert!(prompt.contains("rawText"));
        assert!(prompt.contains("YYYY-MM-DD"));
    }

    #[test]
    fn pages_instruction_mentions_deduplication() {
        let prompt = build_pages_instruction("Discharge Summary", 3);
        assert!(prompt.contains("3 pages"));
        assert!(prompt.contains("reported once"));
    }

    #[test]
    fn text_instruction_embeds_document() {
        let prompt = build_text_instruction("Clinical Note", "Lisinopril 10mg daily");
        assert!(prompt.contains("<document>\nLisinopril 10mg daily\n</document>"));
        assert!(!prompt.contains("rawText"));
    }
}
