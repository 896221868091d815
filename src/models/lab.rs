use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::LabFlag;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabResult {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub report_id: Uuid,
    pub test_name: String,
    /// Kept as text: results may be qualitative ("positive", "<5").
    pub value: String,
    pub unit: String,
    pub date: NaiveDate,
    pub reference_range: Option<String>,
    pub flag: Option<LabFlag>,
    pub extracted_at: NaiveDateTime,
}
