use std::sync::Arc;

use uuid::Uuid;

use crate::db::{DatabaseError, DatabaseGateway};
use crate::models::PatientAggregate;

/// Read-through to the gateway's aggregate view. No caching.
pub struct PatientDataLoader {
    gateway: Arc<dyn DatabaseGateway>,
}

impl PatientDataLoader {
    pub fn new(gateway: Arc<dyn DatabaseGateway>) -> Self {
        Self { gateway }
    }

    pub fn load(&self, patient_id: &Uuid) -> Result<PatientAggregate, DatabaseError> {
        let aggregate = self.gateway.fetch_extracted_data(patient_id)?;
        tracing::debug!(
            patient_id = %patient_id,
            medications = aggregate.medications.len(),
            labs = aggregate.labs.len(),
            vitals = aggregate.vitals.len(),
            diagnoses = aggregate.diagnoses.len(),
            "Patient data loaded"
        );
        Ok(aggregate)
    }
}
