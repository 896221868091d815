//! Response schemas for the insight requests, in the same JSON-schema
//! dialect as the extraction schema.

use serde_json::{json, Value};

fn string_list() -> Value {
    json!({ "type": "array", "items": { "type": "string" } })
}

pub fn medication_safety_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "interactions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "pair": { "type": "string" },
                        "severity": { "type": "string", "enum": ["major", "moderate", "minor"] },
                        "description": { "type": "string" },
                    },
                    "required": ["pair", "severity", "description"],
                },
            },
            "contraindications": string_list(),
            "safe": { "type": "boolean" },
        },
        "required": ["interactions", "safe"],
    })
}

pub fn guideline_adherence_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "guidelineName": { "type": "string" },
            "adherenceStatus": {
                "type": "string",
                "enum": ["fully adherent", "partial", "non-adherent"],
            },
            "missingTherapies": string_list(),
            "recommendations": string_list(),
        },
        "required": ["guidelineName", "adherenceStatus", "missingTherapies", "recommendations"],
    })
}

pub fn vital_trends_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "trends": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "metric": { "type": "string" },
                        "trend": { "type": "string" },
                        "significance": { "type": "string" },
                    },
                    "required": ["metric", "trend", "significance"],
                },
            },
            "assessment": {
                "type": "string",
                "enum": ["stable", "unstable", "improving", "deteriorating"],
            },
            "recommendations": string_list(),
        },
        "required": ["trends", "assessment", "recommendations"],
    })
}

pub fn clinical_note_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "subjective": { "type": "string" },
            "objective": { "type": "string" },
            "assessment": { "type": "string" },
            "plan": { "type": "string" },
        },
        "required": ["subjective", "objective", "assessment", "plan"],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::model::gemini::to_gemini_schema;

    #[test]
    fn safety_schema_requires_verdict() {
        let schema = medication_safety_schema();
        assert_eq!(schema["required"], json!(["interactions", "safe"]));
        assert_eq!(schema["properties"]["safe"]["type"], "boolean");
    }

    #[test]
    fn schemas_convert_for_gemini() {
        for schema in [
            medication_safety_schema(),
            guideline_adherence_schema(),
            vital_trends_schema(),
            clinical_note_schema(),
        ] {
            let converted = to_gemini_schema(&schema);
            assert_eq!(converted["type"], "OBJECT");
        }
        let trends = to_gemini_schema(&vital_trends_schema());
        assert_eq!(trends["properties"]["trends"]["items"]["type"], "OBJECT");
    }
}
