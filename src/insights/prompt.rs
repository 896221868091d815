//! Renders a patient's stored records as prompt context.

use crate::models::enums::{DiagnosisStatus, MedicationStatus};
use crate::models::{Diagnosis, LabResult, Medication, PatientAggregate, VitalSign};

/// Most recent lab results quoted in a prompt.
pub const MAX_LAB_LINES: usize = 40;

const NONE_RECORDED: &str = "- none recorded";

/// Medications still being taken (active or held).
pub fn current_medications(aggregate: &PatientAggregate) -> Vec<&Medication> {
    aggregate
        .medications
        .iter()
        .filter(|m| m.status != MedicationStatus::Stopped)
        .collect()
}

/// Diagnoses not marked resolved.
pub fn open_diagnoses(aggregate: &PatientAggregate) -> Vec<&Diagnosis> {
    aggregate
        .diagnoses
        .iter()
        .filter(|d| d.status != DiagnosisStatus::Resolved)
        .collect()
}

pub fn medication_line(m: &Medication) -> String {
    let mut line = format!("- {} {} {}", m.name, m.dose, m.frequency);
    if let Some(route) = &m.route {
        line.push_str(&format!(" ({route})"));
    }
    line.push_str(&format!(", {}", m.status));
    if let Some(indication) = &m.indication {
        line.push_str(&format!(", for {indication}"));
    }
    line
}

pub fn diagnosis_line(d: &Diagnosis) -> String {
    let mut line = format!("- {}", d.name);
    if let Some(code) = &d.icd_code {
        line.push_str(&format!(" ({code})"));
    }
    line.push_str(&format!(", {}", d.status));
    if let Some(date) = d.diagnosed_date {
        line.push_str(&format!(", since {date}"));
    }
    line
}

pub fn lab_line(l: &LabResult) -> String {
    let mut line = format!("- {} {} {} on {}", l.test_name, l.value, l.unit, l.date);
    if let Some(flag) = l.flag {
        line.push_str(&format!(" [{flag}]"));
    }
    if let Some(range) = &l.reference_range {
        line.push_str(&format!(" (ref {range})"));
    }
    line
}

/// One metric's readings in date order.
#[derive(Debug, Clone, PartialEq)]
pub struct VitalSeries<'a> {
    pub metric: &'a str,
    pub unit: &'a str,
    pub readings: Vec<&'a VitalSign>,
}

impl VitalSeries<'_> {
    pub fn line(&self) -> String {
        let points: Vec<String> = self
            .readings
            .iter()
            .map(|v| match v.value2 {
                Some(second) => format!("{}/{} on {}", v.value, second, v.date),
                None => format!("{} on {}", v.value, v.date),
            })
            .collect();
        format!("- {} ({}): {}", self.metric, self.unit, points.join(", "))
    }
}

/// Group readings by metric (case-insensitive, first spelling wins), keeping
/// first-seen metric order and sorting each series by date.
pub fn vital_series(vitals: &[VitalSign]) -> Vec<VitalSeries<'_>> {
    let mut series: Vec<VitalSeries<'_>> = Vec::new();
    for vital in vitals {
        let existing = series
            .iter_mut()
            .find(|s| s.metric.eq_ignore_ascii_case(&vital.vital_type));
        match existing {
            Some(s) => s.readings.push(vital),
            None => series.push(VitalSeries {
                metric: &vital.vital_type,
                unit: &vital.unit,
                readings: vec![vital],
            }),
        }
    }
    for s in &mut series {
        s.readings.sort_by_key(|v| v.date);
    }
    series
}

fn section(title: &str, lines: Vec<String>) -> String {
    if lines.is_empty() {
        format!("{title}:\n{NONE_RECORDED}")
    } else {
        format!("{title}:\n{}", lines.join("\n"))
    }
}

fn recent_labs(aggregate: &PatientAggregate) -> Vec<String> {
    let mut labs: Vec<&LabResult> = aggregate.labs.iter().collect();
    labs.sort_by(|a, b| b.date.cmp(&a.date));
    labs.into_iter().take(MAX_LAB_LINES).map(lab_line).collect()
}

fn vitals_section(aggregate: &PatientAggregate) -> String {
    let vitals: Vec<VitalSign> = aggregate.vitals.iter().map(|r| r.vital.clone()).collect();
    section(
        "Vital signs",
        vital_series(&vitals).iter().map(VitalSeries::line).collect(),
    )
}

fn question_block(query: &str) -> String {
    let query = query.trim();
    if query.is_empty() {
        String::new()
    } else {
        format!("\n\nClinician question:\n<question>\n{query}\n</question>")
    }
}

pub fn build_medication_safety_instruction(aggregate: &PatientAggregate, query: &str) -> String {
    let medications = current_medications(aggregate)
        .into_iter()
        .map(medication_line)
        .collect();
    let diagnoses = aggregate.diagnoses.iter().map(diagnosis_line).collect();
    format!(
        "You are a clinical pharmacist reviewing a patient's current medications.\n\
         Check for drug-drug interactions (major or moderate), drug-disease interactions \
         against the listed diagnoses, and dosage concerns, using renal function from the \
         lab results when present.\n\
         Set \"safe\" to false when any major interaction or contraindication exists. \
         Only report issues supported by the records below.\n\n\
         {}\n\n{}\n\n{}\n\n{}{}",
        section("Current medications", medications),
        section("Diagnoses", diagnoses),
        section("Recent lab results", recent_labs(aggregate)),
        vitals_section(aggregate),
        question_block(query),
    )
}

pub fn build_guideline_adherence_instruction(aggregate: &PatientAggregate, query: &str) -> String {
    let diagnoses = open_diagnoses(aggregate).into_iter().map(diagnosis_line).collect();
    let medications = current_medications(aggregate)
        .into_iter()
        .map(medication_line)
        .collect();
    format!(
        "You are an expert in clinical guidelines (ACC/AHA/ESC/ADA).\n\
         Identify the guideline that applies to the patient's conditions, check whether \
         the current medications cover every recommended therapy class, list the missing \
         classes and give recommendations. Note contraindications found in the records.\n\n\
         {}\n\n{}{}",
        section("Active conditions", diagnoses),
        section("Current medications", medications),
        question_block(query),
    )
}

pub fn build_vital_trends_instruction(aggregate: &PatientAggregate, query: &str) -> String {
    let medications = current_medications(aggregate)
        .into_iter()
        .map(medication_line)
        .collect();
    format!(
        "You are a cardiologist reviewing a patient's vital sign history.\n\
         For each metric identify the trend over time and its clinical significance, \
         correlate changes with the current medications where possible, then give an \
         overall assessment (stable, unstable, improving or deteriorating) with \
         recommendations.\n\n\
         {}\n\n{}{}",
        vitals_section(aggregate),
        section("Current medications", medications),
        question_block(query),
    )
}

pub fn build_clinical_note_instruction(aggregate: &PatientAggregate, query: &str) -> String {
    let medications = aggregate.medications.iter().map(medication_line).collect();
    let diagnoses = aggregate.diagnoses.iter().map(diagnosis_line).collect();
    format!(
        "You are drafting a SOAP clinical note from a patient's extracted records.\n\
         Write professional, concise subjective, objective, assessment and plan sections. \
         Do not invent findings that are not in the records.\n\n\
         {}\n\n{}\n\n{}\n\n{}{}",
        section("Diagnoses", diagnoses),
        section("Medications", medications),
        section("Recent lab results", recent_labs(aggregate)),
        vitals_section(aggregate),
        question_block(query),
    )
}
