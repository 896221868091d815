use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::DiagnosisStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnosis {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub report_id: Uuid,
    pub name: String,
    pub status: DiagnosisStatus,
    pub icd_code: Option<String>,
    pub diagnosed_date: Option<NaiveDate>,
    pub extracted_at: NaiveDateTime,
}
