//! Structured-output schemas handed to the model with every request.

use serde_json::{json, Value};

/// Which response shape the agent asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVariant {
    /// Image and DICOM input: verbatim transcription, confidence and entities.
    WithTranscription,
    /// Text input: entities only.
    EntitiesOnly,
}

pub fn extraction_schema(variant: SchemaVariant) -> Value {
    let mut properties = json!({
        "medications": { "type": "array", "items": medication_schema() },
        "labs": { "type": "array", "items": lab_schema() },
        "vitals": { "type": "array", "items": vital_schema() },
        "diagnoses": { "type": "array", "items": diagnosis_schema() },
    });
    let mut required = vec!["medications", "labs", "vitals", "diagnoses"];

    if variant == SchemaVariant::WithTranscription {
        if let Some(props) = properties.as_object_mut() {
            props.insert(
                "rawText".into(),
                json!({ "type": "string", "description": "Verbatim transcription of the document" }),
            );
            props.insert(
                "confidence".into(),
                json!({ "type": "number", "description": "Transcription confidence between 0 and 1" }),
            );
        }
        required.extend(["rawText", "confidence"]);
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn medication_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": { "type": "string" },
            "dose": { "type": "string" },
            "frequency": { "type": "string" },
            "route": { "type": "string" },
            "status": { "type": "string", "enum": ["active", "stopped", "held"] },
            "indication": { "type": "string" },
        },
        "required": ["name", "dose", "frequency", "status"],
    })
}

fn lab_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "testName": { "type": "string" },
            "value": { "type": "string" },
            "unit": { "type": "string" },
            "date": { "type": "string", "description": "YYYY-MM-DD" },
            "referenceRange": { "type": "string" },
            "flag": { "type": "string", "enum": ["normal", "low", "high", "critical"] },
        },
        "required": ["testName", "value", "unit", "date"],
    })
}

fn vital_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "type": { "type": "string", "description": "BP, HR, Temp, RR, SpO2, Weight, Height" },
            "value": { "type": "number" },
            "value2": { "type": "number", "description": "Second reading, e.g. diastolic pressure" },
            "unit": { "type": "string" },
            "date": { "type": "string", "description": "YYYY-MM-DD" },
        },
        "required": ["type", "value", "unit", "date"],
    })
}

fn diagnosis_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": { "type": "string" },
            "status": { "type": "string", "enum": ["active", "resolved", "chronic"] },
            "icdCode": { "type": "string" },
            "diagnosedDate": { "type": "string", "description": "YYYY-MM-DD" },
        },
        "required": ["name", "status"],
    })
}
