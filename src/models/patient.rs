use serde::{Deserialize, Serialize};

use super::diagnosis::Diagnosis;
use super::lab::LabResult;
use super::medication::Medication;
use super::vital_sign::VitalSign;

/// All structured records of one patient, merged across their reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientAggregate {
    pub medications: Vec<Medication>,
    pub labs: Vec<LabResult>,
    pub vitals: Vec<VitalReading>,
    pub diagnoses: Vec<Diagnosis>,
}

impl PatientAggregate {
    pub fn is_empty(&self) -> bool {
        self.medications.is_empty()
            && self.labs.is_empty()
            && self.vitals.is_empty()
            && self.diagnoses.is_empty()
    }
}

/// A vital sign together with its rendered reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalReading {
    #[serde(flatten)]
    pub vital: VitalSign,
    pub display: String,
}

impl From<VitalSign> for VitalReading {
    fn from(vital: VitalSign) -> Self {
        let display = vital.display();
        Self { vital, display }
    }
}
