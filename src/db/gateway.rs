//! Database gateway: the persistence seam the pipeline writes through.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use uuid::Uuid;

use super::repository::*;
use super::sqlite::{open_database, open_memory_database};
use super::DatabaseError;
use crate::models::enums::ExtractionStatus;
use crate::models::{
    Diagnosis, LabResult, Medication, PatientAggregate, Report, VitalReading, VitalSign,
};
use crate::pipeline::extraction::ExtractionResult;

/// Per-patient record store (allows mocking).
pub trait DatabaseGateway: Send + Sync {
    /// Store the records of one report, replacing any it had before, and
    /// attach the raw text and fingerprint to the report.
    fn save_extracted_data(
        &self,
        patient_id: &Uuid,
        report_id: &Uuid,
        data: &ExtractionResult,
        fingerprint: Option<&str>,
    ) -> Result<(), DatabaseError>;

    fn update_report_extraction_status(
        &self,
        patient_id: &Uuid,
        report_id: &Uuid,
        status: ExtractionStatus,
        raw_text: Option<&str>,
    ) -> Result<(), DatabaseError>;

    /// Merged view of every record of the patient, in insertion order.
    fn fetch_extracted_data(&self, patient_id: &Uuid) -> Result<PatientAggregate, DatabaseError>;

    /// Another completed report of the patient with the same fingerprint.
    fn find_completed_report_by_fingerprint(
        &self,
        patient_id: &Uuid,
        fingerprint: &str,
        exclude_report_id: &Uuid,
    ) -> Result<Option<Report>, DatabaseError>;
}

/// SQLite-backed gateway. One connection, serialized behind a mutex.
pub struct SqliteGateway {
    conn: Mutex<Connection>,
}

impl SqliteGateway {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::new(open_database(path)?))
    }

    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::new(open_memory_database()?))
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)
    }

    pub fn insert_report(&self, report: &Report) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        insert_report(&conn, report)
    }

    pub fn get_report(&self, id: &Uuid) -> Result<Option<Report>, DatabaseError> {
        let conn = self.conn()?;
        get_report(&conn, id)
    }
}

fn parse_record_date(value: &str, label: &str, name: &str) -> Option<NaiveDate> {
    let parsed = NaiveDate::parse_from_str(value, DATE_FORMAT).ok();
    if parsed.is_none() {
        tracing::warn!(record = label, name, date = value, "Skipping record with unparseable date");
    }
    parsed
}

fn insert_records(
    conn: &Connection,
    patient_id: &Uuid,
    report_id: &Uuid,
    data: &ExtractionResult,
    extracted_at: NaiveDateTime,
) -> Result<usize, DatabaseError> {
    let mut inserted = 0;

    for m in &data.medications {
        insert_medication(
            conn,
            &Medication {
                id: Uuid::new_v4(),
                patient_id: *patient_id,
                report_id: *report_id,
                name: m.name.clone(),
                dose: m.dose.clone(),
                frequency: m.frequency.clone(),
                route: m.route.clone(),
                status: m.status,
                indication: m.indication.clone(),
                extracted_at,
            },
        )?;
        inserted += 1;
    }

    for l in &data.labs {
        let Some(date) = parse_record_date(&l.date, "lab_result", &l.test_name) else {
            continue;
        };
        insert_lab_result(
            conn,
            &LabResult {
                id: Uuid::new_v4(),
                patient_id: *patient_id,
                report_id: *report_id,
                test_name: l.test_name.clone(),
                value: l.value.clone(),
                unit: l.unit.clone(),
                date,
                reference_range: l.reference_range.clone(),
                flag: l.flag,
                extracted_at,
            },
        )?;
        inserted += 1;
    }

    for v in &data.vitals {
        let Some(date) = parse_record_date(&v.date, "vital_sign", &v.vital_type) else {
            continue;
        };
        insert_vital_sign(
            conn,
            &VitalSign {
                id: Uuid::new_v4(),
                patient_id: *patient_id,
                report_id: *report_id,
                vital_type: v.vital_type.clone(),
                value: v.value,
                value2: v.value2,
                unit: v.unit.clone(),
                date,
                extracted_at,
            },
        )?;
        inserted += 1;
    }

    for d in &data.diagnoses {
        let diagnosed_date = d
            .diagnosed_date
            .as_deref()
            .and_then(|s| parse_record_date(s, "diagnosis", &d.name));
        insert_diagnosis(
            conn,
            &Diagnosis {
                id: Uuid::new_v4(),
                patient_id: *patient_id,
                report_id: *report_id,
                name: d.name.clone(),
                status: d.status,
                icd_code: d.icd_code.clone(),
                diagnosed_date,
                extracted_at,
            },
        )?;
        inserted += 1;
    }

    Ok(inserted)
}

impl DatabaseGateway for SqliteGateway {
    fn save_extracted_data(
        &self,
        patient_id: &Uuid,
        report_id: &Uuid,
        data: &ExtractionResult,
        fingerprint: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let replaced = delete_medications_by_report(&tx, report_id)?
            + delete_lab_results_by_report(&tx, report_id)?
            + delete_vital_signs_by_report(&tx, report_id)?
            + delete_diagnoses_by_report(&tx, report_id)?;

        let extracted_at = chrono::Local::now().naive_local();
        let inserted = insert_records(&tx, patient_id, report_id, data, extracted_at)?;
        update_report_extraction_metadata(&tx, report_id, data.raw_text.as_deref(), fingerprint)?;
        tx.commit()?;

        tracing::info!(
            patient_id = %patient_id,
            report_id = %report_id,
            inserted,
            replaced,
            "Extracted records saved"
        );
        Ok(())
    }

    fn update_report_extraction_status(
        &self,
        patient_id: &Uuid,
        report_id: &Uuid,
        status: ExtractionStatus,
        raw_text: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        update_report_status(&conn, report_id, status, raw_text)?;
        tracing::debug!(
            patient_id = %patient_id,
            report_id = %report_id,
            status = status.as_str(),
            "Report status updated"
        );
        Ok(())
    }

    fn fetch_extracted_data(&self, patient_id: &Uuid) -> Result<PatientAggregate, DatabaseError> {
        let conn = self.conn()?;
        Ok(PatientAggregate {
            medications: get_medications_by_patient(&conn, patient_id)?,
            labs: get_lab_results_by_patient(&conn, patient_id)?,
            vitals: get_vital_signs_by_patient(&conn, patient_id)?
                .into_iter()
                .map(VitalReading::from)
                .collect(),
            diagnoses: get_diagnoses_by_patient(&conn, patient_id)?,
        })
    }

    fn find_completed_report_by_fingerprint(
        &self,
        patient_id: &Uuid,
        fingerprint: &str,
        exclude_report_id: &Uuid,
    ) -> Result<Option<Report>, DatabaseError> {
        let conn = self.conn()?;
        find_completed_report_by_fingerprint(&conn, patient_id, fingerprint, exclude_report_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{DiagnosisStatus, LabFlag, MedicationStatus};
    use crate::models::report::ReportContent;
    use crate::pipeline::extraction::{
        ExtractedDiagnosis, ExtractedLabResult, ExtractedMedication, ExtractedVitalSign,
    };

    fn gateway_with_report(patient_id: Uuid) -> (SqliteGateway, Report) {
        let gateway = SqliteGateway::in_memory().unwrap();
        let report = Report::new(patient_id, "Visit", "Clinical Note", ReportContent::text("x"));
        gateway.insert_report(&report).unwrap();
        (gateway, report)
    }

    fn sample_result() -> ExtractionResult {
        ExtractionResult {
            medications: vec![ExtractedMedication {
                name: "Lisinopril".into(),
                dose: "10mg".into(),
                frequency: "daily".into(),
                route: Some("oral".into()),
                status: MedicationStatus::Active,
                indication: Some("Hypertension".into()),
            }],
            labs: vec![ExtractedLabResult {
                test_name: "HbA1c".into(),
                value: "7.2".into(),
                unit: "%".into(),
                date: "2024-02-01".into(),
                reference_range: None,
                flag: Some(LabFlag::High),
            }],
            vitals: vec![ExtractedVitalSign {
                vital_type: "BP".into(),
                value: 120.0,
                value2: Some(80.0),
                unit: "mmHg".into(),
                date: "2024-02-01".into(),
            }],
            diagnoses: vec![ExtractedDiagnosis {
                name: "Hypertension".into(),
                status: DiagnosisStatus::Chronic,
                icd_code: Some("I10".into()),
                diagnosed_date: Some("2019-05-01".into()),
            }],
            raw_text: Some("Lisinopril 10mg daily. BP 120/80.".into()),
            confidence: Some(1.0),
            warnings: vec![],
        }
    }

    #[test]
    fn save_then_fetch_aggregate() {
        let patient = Uuid::new_v4();
        let (gateway, report) = gateway_with_report(patient);
        gateway
            .save_extracted_data(&patient, &report.id, &sample_result(), Some("fp="))
            .unwrap();

        let aggregate = gateway.fetch_extracted_data(&patient).unwrap();
        assert_eq!(aggregate.medications.len(), 1);
        assert_eq!(aggregate.medications[0].name, "Lisinopril");
        assert_eq!(aggregate.medications[0].report_id, report.id);
        assert_eq!(aggregate.labs[0].flag, Some(LabFlag::High));
        assert_eq!(aggregate.vitals[0].display, "BP 120/80");
        assert_eq!(
            aggregate.diagnoses[0].diagnosed_date,
            NaiveDate::from_ymd_opt(2019, 5, 1)
        );

        let stored = gateway.get_report(&report.id).unwrap().unwrap();
        assert_eq!(stored.fingerprint.as_deref(), Some("fp="));
        assert_eq!(stored.raw_text.as_deref(), Some("Lisinopril 10mg daily. BP 120/80."));
    }

    #[test]
    fn resave_replaces_report_records() {
        let patient = Uuid::new_v4();
        let (gateway, report) = gateway_with_report(patient);
        gateway
            .save_extracted_data(&patient, &report.id, &sample_result(), None)
            .unwrap();
        gateway
            .save_extracted_data(&patient, &report.id, &sample_result(), None)
            .unwrap();

        let aggregate = gateway.fetch_extracted_data(&patient).unwrap();
        assert_eq!(aggregate.medications.len(), 1);
        assert_eq!(aggregate.vitals.len(), 1);
    }

    #[test]
    fn aggregate_spans_reports_in_insertion_order() {
        let patient = Uuid::new_v4();
        let (gateway, first) = gateway_with_report(patient);
        let second = Report::new(patient, "Follow-up", "Clinical Note", ReportContent::text("y"));
        gateway.insert_report(&second).unwrap();

        gateway
            .save_extracted_data(&patient, &first.id, &sample_result(), None)
            .unwrap();
        let mut later = sample_result();
        later.medications[0].name = "Amlodipine".into();
        gateway
            .save_extracted_data(&patient, &second.id, &later, None)
            .unwrap();

        let names: Vec<_> = gateway
            .fetch_extracted_data(&patient)
            .unwrap()
            .medications
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["Lisinopril", "Amlodipine"]);
    }

    #[test]
    fn other_patients_are_isolated() {
        let patient = Uuid::new_v4();
        let (gateway, report) = gateway_with_report(patient);
        gateway
            .save_extracted_data(&patient, &report.id, &sample_result(), None)
            .unwrap();
        assert!(gateway.fetch_extracted_data(&Uuid::new_v4()).unwrap().is_empty());
    }

    #[test]
    fn save_for_unknown_report_fails_and_rolls_back() {
        let patient = Uuid::new_v4();
        let (gateway, _) = gateway_with_report(patient);
        let result = gateway.save_extracted_data(&patient, &Uuid::new_v4(), &sample_result(), None);
        assert!(result.is_err());
        assert!(gateway.fetch_extracted_data(&patient).unwrap().is_empty());
    }

    #[test]
    fn unparseable_record_date_is_skipped() {
        let patient = Uuid::new_v4();
        let (gateway, report) = gateway_with_report(patient);
        let mut data = sample_result();
        data.labs[0].date = "sometime".into();
        gateway
            .save_extracted_data(&patient, &report.id, &data, None)
            .unwrap();

        let aggregate = gateway.fetch_extracted_data(&patient).unwrap();
        assert!(aggregate.labs.is_empty());
        assert_eq!(aggregate.medications.len(), 1);
    }

    #[test]
    fn status_update_marks_smart_extracted() {
        let patient = Uuid::new_v4();
        let (gateway, report) = gateway_with_report(patient);
        gateway
            .update_report_extraction_status(&patient, &report.id, ExtractionStatus::Completed, Some("text"))
            .unwrap();
        assert!(gateway.get_report(&report.id).unwrap().unwrap().is_smart_extracted());
    }

    #[test]
    fn completed_report_is_found_by_fingerprint() {
        let patient = Uuid::new_v4();
        let (gateway, first) = gateway_with_report(patient);
        gateway
            .save_extracted_data(&patient, &first.id, &sample_result(), Some("same-bytes"))
            .unwrap();
        gateway
            .update_report_extraction_status(&patient, &first.id, ExtractionStatus::Completed, None)
            .unwrap();

        let second = Report::new(patient, "Copy", "Clinical Note", ReportContent::text("x"));
        gateway.insert_report(&second).unwrap();

        let found = gateway
            .find_completed_report_by_fingerprint(&patient, "same-bytes", &second.id)
            .unwrap()
            .unwrap();
        assert_eq!(found.id, first.id);
        assert!(gateway
            .find_completed_report_by_fingerprint(&patient, "same-bytes", &first.id)
            .unwrap()
            .is_none());
        assert!(gateway.get_report(&second.id).unwrap().is_some());
    }
}
