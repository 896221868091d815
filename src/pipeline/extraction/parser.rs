use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::sanitize::{first_json_object, sanitize_model_output};
use super::AgentError;

/// Records as the model wrote them. Enums and dates are still free text.
#[derive(Debug, Clone, Default)]
pub struct RawExtraction {
    pub medications: Vec<RawMedication>,
    pub labs: Vec<RawLabResult>,
    pub vitals: Vec<RawVitalSign>,
    pub diagnoses: Vec<RawDiagnosis>,
    pub raw_text: Option<String>,
    pub confidence: Option<f64>,
    /// One note per item dropped for a missing or empty required field.
    pub dropped: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMedication {
    pub name: String,
    pub dose: String,
    pub frequency: String,
    pub route: Option<String>,
    pub status: String,
    pub indication: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLabResult {
    pub test_name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
    pub unit: String,
    pub date: String,
    pub reference_range: Option<String>,
    pub flag: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVitalSign {
    #[serde(rename = "type")]
    pub vital_type: String,
    #[serde(deserialize_with = "number_lenient")]
    pub value: f64,
    #[serde(default, deserialize_with = "optional_number_lenient")]
    pub value2: Option<f64>,
    pub unit: String,
    pub date: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDiagnosis {
    pub name: String,
    pub status: String,
    pub icd_code: Option<String>,
    pub diagnosed_date: Option<String>,
}

/// Items with an empty required string are treated like missing ones.
trait RequiredFields {
    fn has_required(&self) -> bool;
}

fn filled(s: &str) -> bool {
    !s.trim().is_empty()
}

impl RequiredFields for RawMedication {
    fn has_required(&self) -> bool {
        filled(&self.name) && filled(&self.dose) && filled(&self.frequency) && filled(&self.status)
    }
}

impl RequiredFields for RawLabResult {
    fn has_required(&self) -> bool {
        filled(&self.test_name) && filled(&self.value) && filled(&self.unit) && filled(&self.date)
    }
}

impl RequiredFields for RawVitalSign {
    fn has_required(&self) -> bool {
        filled(&self.vital_type) && filled(&self.unit) && filled(&self.date)
    }
}

impl RequiredFields for RawDiagnosis {
    fn has_required(&self) -> bool {
        filled(&self.name) && filled(&self.status)
    }
}

/// Parse a model response into raw records.
///
/// Fails only when no JSON object can be found or it does not parse; bad
/// items inside the collections and prose after the object are skipped.
pub fn parse_extraction_response(response: &str) -> Result<RawExtraction, AgentError> {
    let cleaned = sanitize_model_output(response);
    let root = first_json_object(&cleaned)
        .ok_or_else(|| AgentError::MalformedResponse("No JSON object found".into()))?
        .map_err(|e| AgentError::JsonParsing(e.to_string()))?;
    let obj = root
        .as_object()
        .ok_or_else(|| AgentError::MalformedResponse("Top-level JSON is not an object".into()))?;

    let mut dropped = Vec::new();
    let medications = parse_array_lenient(obj.get("medications"), "medication", &mut dropped);
    let labs = parse_array_lenient(obj.get("labs"), "lab result", &mut dropped);
    let vitals = parse_array_lenient(obj.get("vitals"), "vital sign", &mut dropped);
    let diagnoses = parse_array_lenient(obj.get("diagnoses"), "diagnosis", &mut dropped);

    Ok(RawExtraction {
        medications,
        labs,
        vitals,
        diagnoses,
        raw_text: obj.get("rawText").and_then(Value::as_str).map(str::to_string),
        confidence: obj.get("confidence").and_then(Value::as_f64),
        dropped,
    })
}

/// Parse an array leniently: skip items that fail to deserialize.
fn parse_array_lenient<T>(items: Option<&Value>, label: &str, dropped: &mut Vec<String>) -> Vec<T>
where
    T: for<'de> Deserialize<'de> + RequiredFields,
{
    let Some(arr) = items.and_then(Value::as_array) else {
        return vec![];
    };

    let parsed: Vec<T> = arr
        .iter()
        .filter_map(|v| serde_json::from_value::<T>(v.clone()).ok())
        .filter(|item: &T| item.has_required())
        .collect();

    let skipped = arr.len() - parsed.len();
    if skipped > 0 {
        dropped.push(format!("{skipped} {label} item(s) missing required fields removed"));
    }
    parsed
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected string or number, got {other}"))),
    }
}

fn number_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn number_lenient<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    number_from_value(&value).ok_or_else(|| serde::de::Error::custom("expected a number"))
}

fn optional_number_lenient<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<f64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(number_from_value(&value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response() -> &'static str {
        r#"{
  "rawText": "Lisinopril 10mg once daily\nBP 120/80",
  "confidence": 0.93,
  "medications": [
    {"name": "Lisinopril", "dose": "10mg", "frequency": "once daily", "route": "oral", "status": "active"}
  ],
  "labs": [
    {"testName": "HbA1c", "value": 7.2, "unit": "%", "date": "2024-02-01", "flag": "high"}
  ],
  "vitals": [
    {"type": "BP", "value": 120, "value2": 80, "unit": "mmHg", "date": "2024-02-01"}
  ],
  "diagnoses": [
    {"name": "Hypertension", "status": "chronic", "icdCode": "I10"}
  ]
}"#
    }

    #[test]
    fn parses_full_response() {
        let raw = parse_extraction_response(sample_response()).unwrap();
        assert_eq!(raw.medications.len(), 1);
        assert_eq!(raw.medications[0].name, "Lisinopril");
        assert_eq!(raw.labs[0].value, "7.2");
        assert_eq!(raw.vitals[0].value2, Some(80.0));
        assert_eq!(raw.diagnoses[0].icd_code.as_deref(), Some("I10"));
        assert_eq!(raw.confidence, Some(0.93));
        assert!(raw.raw_text.unwrap().starts_with("Lisinopril"));
        assert!(raw.dropped.is_empty());
    }

    #[test]
    fn item_missing_required_field_is_dropped() {
        let response = r#"{"medications": [
            {"name": "Metformin", "dose": "500mg", "frequency": "BID", "status": "active"},
            {"name": "Aspirin", "frequency": "daily", "status": "active"},
            {"name": "", "dose": "5mg", "frequency": "daily", "status": "active"}
        ]}"#;
        let raw = parse_extraction_response(response).unwrap();
        assert_eq!(raw.medications.len(), 1);
        assert_eq!(raw.medications[0].name, "Metformin");
        assert_eq!(raw.dropped.len(), 1);
        assert!(raw.dropped[0].starts_with("2 medication"));
    }

    #[test]
    fn missing_collections_are_empty() {
        let raw = parse_extraction_response(r#"{"rawText": "blurry"}"#).unwrap();
        assert!(raw.medications.is_empty());
        assert!(raw.vitals.is_empty());
        assert_eq!(raw.raw_text.as_deref(), Some("blurry"));
        assert_eq!(raw.confidence, None);
    }

    #[test]
    fn wrong_collection_type_is_empty() {
        let raw = parse_extraction_response(r#"{"labs": "none"}"#).unwrap();
        assert!(raw.labs.is_empty());
    }

    #[test]
    fn numeric_strings_accepted_for_vitals() {
        let response = r#"{"vitals": [{"type": "HR", "value": "72", "unit": "bpm", "date": "2024-01-01"}]}"#;
        let raw = parse_extraction_response(response).unwrap();
        assert_eq!(raw.vitals[0].value, 72.0);
        assert_eq!(raw.vitals[0].value2, None);
    }

    #[test]
    fn fenced_response_with_thinking() {
        let response = "<unused94>thought\nchecking<unused95>```json\n{\"diagnoses\": [{\"name\": \"Asthma\", \"status\": \"active\"}]}\n```";
        let raw = parse_extraction_response(response).unwrap();
        assert_eq!(raw.diagnoses.len(), 1);
    }

    #[test]
    fn prose_only_is_malformed() {
        let err = parse_extraction_response("I am unable to read this document.").unwrap_err();
        assert!(matches!(err, AgentError::MalformedResponse(_)));
    }

    #[test]
    fn broken_json_is_parse_error() {
        let err = parse_extraction_response("{\"medications\": [}").unwrap_err();
        assert!(matches!(err, AgentError::JsonParsing(_)));
    }

    #[test]
    fn trailing_note_with_braces_still_parses() {
        let response = "{\"medications\": [{\"name\": \"Metformin\", \"dose\": \"500mg\", \"frequency\": \"bid\", \"status\": \"active\"}]}\nNote: dose {approx}.";
        let raw = parse_extraction_response(response).unwrap();
        assert_eq!(raw.medications.len(), 1);
        assert_eq!(raw.medications[0].name, "Metformin");
    }
}
