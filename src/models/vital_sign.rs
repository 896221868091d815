use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single stored vital sign measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalSign {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub report_id: Uuid,
    /// Short type label as extracted: "BP", "HR", "Temp", "SpO2", ...
    #[serde(rename = "type")]
    pub vital_type: String,
    pub value: f64,
    /// Second component of paired readings (diastolic for BP).
    pub value2: Option<f64>,
    pub unit: String,
    pub date: NaiveDate,
    pub extracted_at: NaiveDateTime,
}

impl VitalSign {
    pub fn display(&self) -> String {
        format_vital_reading(&self.vital_type, self.value, self.value2)
    }
}

/// Render a reading the way the dashboard lists it: `BP 120/80`, `HR 72`.
///
/// `f64` display already drops the fractional part of integral values.
pub fn format_vital_reading(vital_type: &str, value: f64, value2: Option<f64>) -> String {
    match value2 {
        Some(second) => format!("{vital_type} {value}/{second}"),
        None => format!("{vital_type} {value}"),
    }
}
