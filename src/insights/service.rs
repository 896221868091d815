use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use super::prompt::{
    build_clinical_note_instruction, build_guideline_adherence_instruction,
    build_medication_safety_instruction, build_vital_trends_instruction, current_medications,
    open_diagnoses,
};
use super::schema::{
    clinical_note_schema, guideline_adherence_schema, medication_safety_schema,
    vital_trends_schema,
};
use super::types::{
    AdherenceStatus, ClinicalNote, GuidelineAdherenceReport, MedicationSafetyReport,
    VitalTrendReport,
};
use super::InsightError;
use crate::db::DatabaseGateway;
use crate::pipeline::extraction::sanitize::{first_json_object, sanitize_model_output};
use crate::pipeline::loader::PatientDataLoader;
use crate::pipeline::model::{Credentials, ModelClient, ModelRequest};

/// Model-backed analyses of one patient's aggregate. Stateless between calls.
pub struct ClinicalInsights {
    loader: PatientDataLoader,
    client: Arc<dyn ModelClient>,
}

impl ClinicalInsights {
    pub fn new(gateway: Arc<dyn DatabaseGateway>, client: Arc<dyn ModelClient>) -> Self {
        Self {
            loader: PatientDataLoader::new(gateway),
            client,
        }
    }

    /// Interactions, contraindications and dosage concerns across the current
    /// medications. No model call when nothing is being taken.
    pub fn check_medication_safety(
        &self,
        patient_id: &Uuid,
        query: &str,
        credentials: &Credentials,
    ) -> Result<MedicationSafetyReport, InsightError> {
        let _span = tracing::info_span!("medication_safety", patient_id = %patient_id).entered();
        let aggregate = self.loader.load(patient_id)?;

        if current_medications(&aggregate).is_empty() {
            tracing::info!("No current medications, nothing to check");
            return Ok(MedicationSafetyReport::nothing_to_check());
        }

        let instruction = build_medication_safety_instruction(&aggregate, query);
        let mut report: MedicationSafetyReport =
            self.ask(instruction, medication_safety_schema(), credentials)?;

        report.interactions.sort_by_key(|i| i.severity);
        if report.safe && report.has_major_interaction() {
            tracing::warn!("Model marked regimen safe despite a major interaction, overriding");
            report.safe = false;
        }

        tracing::info!(
            interactions = report.interactions.len(),
            contraindications = report.contraindications.len(),
            safe = report.safe,
            "Medication safety check completed"
        );
        Ok(report)
    }

    /// Current medications against the guideline for the open diagnoses.
    pub fn check_guideline_adherence(
        &self,
        patient_id: &Uuid,
        query: &str,
        credentials: &Credentials,
    ) -> Result<GuidelineAdherenceReport, InsightError> {
        let _span = tracing::info_span!("guideline_adherence", patient_id = %patient_id).entered();
        let aggregate = self.loader.load(patient_id)?;
        if open_diagnoses(&aggregate).is_empty() {
            return Err(InsightError::NoData("active diagnoses"));
        }

        let instruction = build_guideline_adherence_instruction(&aggregate, query);
        let mut report: GuidelineAdherenceReport =
            self.ask(instruction, guideline_adherence_schema(), credentials)?;

        if report.adherence_status == AdherenceStatus::FullyAdherent
            && !report.missing_therapies.is_empty()
        {
            tracing::warn!(
                missing = report.missing_therapies.len(),
                "Model marked regimen fully adherent with missing therapies, downgrading"
            );
            report.adherence_status = AdherenceStatus::Partial;
        }

        tracing::info!(
            guideline = %report.guideline_name,
            status = ?report.adherence_status,
            missing = report.missing_therapies.len(),
            "Guideline adherence check completed"
        );
        Ok(report)
    }

    /// Trend per vital metric plus an overall assessment.
    pub fn analyze_vital_trends(
        &self,
        patient_id: &Uuid,
        query: &str,
        credentials: &Credentials,
    ) -> Result<VitalTrendReport, InsightError> {
        let _span = tracing::info_span!("vital_trends", patient_id = %patient_id).entered();
        let aggregate = self.loader.load(patient_id)?;
        if aggregate.vitals.is_empty() {
            return Err(InsightError::NoData("vital signs"));
        }

        let instruction = build_vital_trends_instruction(&aggregate, query);
        let mut report: VitalTrendReport =
            self.ask(instruction, vital_trends_schema(), credentials)?;
        report.assessment = report.assessment.trim().to_lowercase();

        tracing::info!(
            trends = report.trends.len(),
            assessment = %report.assessment,
            "Vital trend analysis completed"
        );
        Ok(report)
    }

    /// SOAP note drafted from everything stored for the patient.
    pub fn generate_clinical_note(
        &self,
        patient_id: &Uuid,
        query: &str,
        credentials: &Credentials,
    ) -> Result<ClinicalNote, InsightError> {
        let _span = tracing::info_span!("clinical_note", patient_id = %patient_id).entered();
        let aggregate = self.loader.load(patient_id)?;
        if aggregate.is_empty() {
            return Err(InsightError::NoData("clinical records"));
        }

        let instruction = build_clinical_note_instruction(&aggregate, query);
        let note = self.ask(instruction, clinical_note_schema(), credentials)?;
        tracing::info!("Clinical note generated");
        Ok(note)
    }

    fn ask<T: DeserializeOwned>(
        &self,
        instruction: String,
        schema: Value,
        credentials: &Credentials,
    ) -> Result<T, InsightError> {
        let request = ModelRequest::text(instruction, schema);
        let response = self.client.generate(&request, credentials)?;

        let cleaned = sanitize_model_output(&response);
        let value = first_json_object(&cleaned)
            .ok_or_else(|| InsightError::MalformedResponse("No JSON object found".into()))?
            .map_err(|e| InsightError::JsonParsing(e.to_string()))?;
        serde_json::from_value(value).map_err(|e| InsightError::JsonParsing(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteGateway;
    use crate::insights::InteractionSeverity;
    use crate::models::report::{Report, ReportContent};
    use crate::models::enums::{DiagnosisStatus, MedicationStatus};
    use crate::pipeline::extraction::{
        ExtractedDiagnosis, ExtractedMedication, ExtractedVitalSign, ExtractionResult,
    };
    use crate::pipeline::model::{MockModelClient, ModelError};

    const SAFETY_RESPONSE: &str = r#"```json
    {
        "interactions": [
            {"pair": "Lisinopril + Ibuprofen", "severity": "Moderate", "description": "Reduced antihypertensive effect"},
            {"pair": "Lisinopril + Spironolactone", "severity": "Major", "description": "Hyperkalemia risk"}
        ],
        "contraindications": [],
        "safe": true
    }
    ```"#;

    const TRENDS_RESPONSE: &str = r#"{
        "trends": [{"metric": "BP", "trend": "Downtrend", "significance": "Responding to ACE inhibitor"}],
        "assessment": "Improving",
        "recommendations": ["Continue current dose"]
    }"#;

    const NOTE_RESPONSE: &str = r#"{
        "subjective": "Follow-up for hypertension.",
        "objective": "BP 132/84.",
        "assessment": "Hypertension, improving.",
        "plan": "Continue Lisinopril."
    }"#;

    const ADHERENCE_RESPONSE: &str = r#"{
        "guidelineName": "ACC/AHA 2022 Heart Failure",
        "adherenceStatus": "Fully Adherent",
        "missingTherapies": ["SGLT2 inhibitor", "MRA"],
        "recommendations": ["Start dapagliflozin 10mg daily"]
    }"#;

    fn diagnosis(name: &str, status: DiagnosisStatus) -> ExtractedDiagnosis {
        ExtractedDiagnosis {
            name: name.into(),
            status,
            icd_code: None,
            diagnosed_date: None,
        }
    }

    fn medication(name: &str, status: MedicationStatus) -> ExtractedMedication {
        ExtractedMedication {
            name: name.into(),
            dose: "10mg".into(),
            frequency: "daily".into(),
            route: None,
            status,
            indication: None,
        }
    }

    fn bp(value: f64, value2: f64, date: &str) -> ExtractedVitalSign {
        ExtractedVitalSign {
            vital_type: "BP".into(),
            value,
            value2: Some(value2),
            unit: "mmHg".into(),
            date: date.into(),
        }
    }

    fn seeded(data: ExtractionResult) -> (Arc<SqliteGateway>, Uuid) {
        let gateway = Arc::new(SqliteGateway::in_memory().unwrap());
        let patient = Uuid::new_v4();
        let report = Report::new(patient, "Visit", "Clinical Note", ReportContent::text("x"));
        gateway.insert_report(&report).unwrap();
        gateway
            .save_extracted_data(&patient, &report.id, &data, None)
            .unwrap();
        (gateway, patient)
    }

    fn insights(gateway: Arc<SqliteGateway>, client: Arc<MockModelClient>) -> ClinicalInsights {
        ClinicalInsights::new(gateway, client)
    }

    #[test]
    fn safety_check_sorts_and_overrides_safe_flag() {
        let (gateway, patient) = seeded(ExtractionResult {
            medications: vec![
                medication("Lisinopril", MedicationStatus::Active),
                medication("Atenolol", MedicationStatus::Stopped),
            ],
            ..ExtractionResult::default()
        });
        let client = Arc::new(MockModelClient::new(SAFETY_RESPONSE));
        let report = insights(gateway, client.clone())
            .check_medication_safety(&patient, "Adding spironolactone?", &Credentials::none())
            .unwrap();

        assert_eq!(report.interactions[0].severity, InteractionSeverity::Major);
        assert_eq!(report.interactions[1].severity, InteractionSeverity::Moderate);
        assert!(!report.safe);

        let request = &client.requests()[0];
        assert!(request.parts.is_empty());
        assert!(request.instruction.contains("Lisinopril"));
        assert!(!request.instruction.contains("Atenolol"));
        assert_eq!(request.schema["properties"]["safe"]["type"], "boolean");
    }

    #[test]
    fn safety_check_without_current_medications_skips_model() {
        let (gateway, patient) = seeded(ExtractionResult {
            medications: vec![medication("Atenolol", MedicationStatus::Stopped)],
            ..ExtractionResult::default()
        });
        let client = Arc::new(MockModelClient::new(SAFETY_RESPONSE));
        let report = insights(gateway, client.clone())
            .check_medication_safety(&patient, "", &Credentials::none())
            .unwrap();

        assert_eq!(report, MedicationSafetyReport::nothing_to_check());
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn adherence_with_missing_therapies_is_partial() {
        let (gateway, patient) = seeded(ExtractionResult {
            diagnoses: vec![
                diagnosis("Heart failure with reduced ejection fraction", DiagnosisStatus::Chronic),
                diagnosis("Community-acquired pneumonia", DiagnosisStatus::Resolved),
            ],
            medications: vec![medication("Lisinopril", MedicationStatus::Active)],
            ..ExtractionResult::default()
        });
        let client = Arc::new(MockModelClient::new(ADHERENCE_RESPONSE));
        let report = insights(gateway, client.clone())
            .check_guideline_adherence(&patient, "", &Credentials::none())
            .unwrap();

        assert_eq!(report.adherence_status, AdherenceStatus::Partial);
        assert_eq!(report.missing_therapies, vec!["SGLT2 inhibitor", "MRA"]);
        let request = &client.requests()[0];
        assert!(request.instruction.contains("Heart failure with reduced ejection fraction"));
        assert!(!request.instruction.contains("pneumonia"));
        assert_eq!(request.schema["required"][0], "guidelineName");
    }

    #[test]
    fn adherence_needs_an_open_diagnosis() {
        let (gateway, patient) = seeded(ExtractionResult {
            diagnoses: vec![diagnosis("Pneumonia", DiagnosisStatus::Resolved)],
            medications: vec![medication("Lisinopril", MedicationStatus::Active)],
            ..ExtractionResult::default()
        });
        let client = Arc::new(MockModelClient::new(ADHERENCE_RESPONSE));
        let err = insights(gateway, client.clone())
            .check_guideline_adherence(&patient, "", &Credentials::none())
            .unwrap_err();
        assert!(matches!(err, InsightError::NoData("active diagnoses")));
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn vital_trends_send_series_in_date_order() {
        let (gateway, patient) = seeded(ExtractionResult {
            vitals: vec![bp(132.0, 84.0, "2024-03-01"), bp(150.0, 95.0, "2024-01-10")],
            medications: vec![medication("Lisinopril", MedicationStatus::Active)],
            ..ExtractionResult::default()
        });
        let client = Arc::new(MockModelClient::new(TRENDS_RESPONSE));
        let report = insights(gateway, client.clone())
            .analyze_vital_trends(&patient, "", &Credentials::none())
            .unwrap();

        assert_eq!(report.assessment, "improving");
        assert_eq!(report.trends[0].metric, "BP");
        let instruction = &client.requests()[0].instruction;
        assert!(instruction.contains("- BP (mmHg): 150/95 on 2024-01-10, 132/84 on 2024-03-01"));
    }

    #[test]
    fn vital_trends_need_vitals() {
        let (gateway, patient) = seeded(ExtractionResult {
            medications: vec![medication("Lisinopril", MedicationStatus::Active)],
            ..ExtractionResult::default()
        });
        let client = Arc::new(MockModelClient::new(TRENDS_RESPONSE));
        let err = insights(gateway, client.clone())
            .analyze_vital_trends(&patient, "", &Credentials::none())
            .unwrap_err();
        assert!(matches!(err, InsightError::NoData("vital signs")));
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn clinical_note_parses_soap_sections() {
        let (gateway, patient) = seeded(ExtractionResult {
            medications: vec![medication("Lisinopril", MedicationStatus::Active)],
            vitals: vec![bp(132.0, 84.0, "2024-03-01")],
            ..ExtractionResult::default()
        });
        let client = Arc::new(MockModelClient::new(NOTE_RESPONSE));
        let note = insights(gateway, client)
            .generate_clinical_note(&patient, "Focus on blood pressure", &Credentials::none())
            .unwrap();
        assert_eq!(note.plan, "Continue Lisinopril.");
    }

    #[test]
    fn clinical_note_for_unknown_patient_is_no_data() {
        let (gateway, _) = seeded(ExtractionResult::default());
        let client = Arc::new(MockModelClient::new(NOTE_RESPONSE));
        let err = insights(gateway, client)
            .generate_clinical_note(&Uuid::new_v4(), "", &Credentials::none())
            .unwrap_err();
        assert!(matches!(err, InsightError::NoData(_)));
    }

    #[test]
    fn model_and_parse_failures_are_returned() {
        let data = ExtractionResult {
            vitals: vec![bp(132.0, 84.0, "2024-03-01")],
            ..ExtractionResult::default()
        };
        let (gateway, patient) = seeded(data.clone());
        let failing = Arc::new(MockModelClient::failing(|| ModelError::MissingCredentials));
        let err = insights(gateway, failing)
            .analyze_vital_trends(&patient, "", &Credentials::none())
            .unwrap_err();
        assert!(matches!(err, InsightError::Model(ModelError::MissingCredentials)));

        let (gateway, patient) = seeded(data.clone());
        let prose = Arc::new(MockModelClient::new("Blood pressure looks better."));
        let err = insights(gateway, prose)
            .analyze_vital_trends(&patient, "", &Credentials::none())
            .unwrap_err();
        assert!(matches!(err, InsightError::MalformedResponse(_)));

        let (gateway, patient) = seeded(data);
        let wrong_shape = Arc::new(MockModelClient::new(r#"{"trends": "none"}"#));
        let err = insights(gateway, wrong_shape)
            .analyze_vital_trends(&patient, "", &Credentials::none())
            .unwrap_err();
        assert!(matches!(err, InsightError::JsonParsing(_)));
    }
}
