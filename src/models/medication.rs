use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::MedicationStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub report_id: Uuid,
    pub name: String,
    pub dose: String,
    pub frequency: String,
    pub route: Option<String>,
    pub status: MedicationStatus,
    pub indication: Option<String>,
    pub extracted_at: NaiveDateTime,
}
