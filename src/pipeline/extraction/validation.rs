// Post-parse validation for model-extracted records.
// Applied between parse_extraction_response() and the agent result.
// Normalizes dates and enumerations, drops implausible records, caps counts.

use std::collections::HashSet;
use std::ops::RangeInclusive;

use chrono::{Datelike, NaiveDate};

use super::parser::{RawDiagnosis, RawExtraction, RawLabResult, RawMedication, RawVitalSign};
use super::types::{
    ExtractedDiagnosis, ExtractedLabResult, ExtractedMedication, ExtractedVitalSign,
    ExtractionResult,
};
use crate::models::enums::{DiagnosisStatus, LabFlag, MedicationStatus};

/// Maximum plausible records per collection from a single document.
pub const MAX_RECORDS_PER_COLLECTION: usize = 50;

/// Accepted input date layouts, tried in order. Day-first wins on ambiguity.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%m/%d/%Y", "%Y/%m/%d"];

/// Validate raw records and build the agent result.
///
/// `raw_text` passes through; confidence is clamped to [0, 1].
pub fn validate_extraction(raw: RawExtraction) -> ExtractionResult {
    let mut warnings = raw.dropped;

    let mut medications: Vec<_> = raw
        .medications
        .into_iter()
        .filter_map(|m| validate_medication(m, &mut warnings))
        .collect();
    let mut labs: Vec<_> = raw
        .labs
        .into_iter()
        .filter_map(|l| validate_lab(l, &mut warnings))
        .collect();
    let mut vitals: Vec<_> = raw
        .vitals
        .into_iter()
        .filter_map(|v| validate_vital(v, &mut warnings))
        .collect();
    let mut diagnoses: Vec<_> = raw
        .diagnoses
        .into_iter()
        .filter_map(|d| validate_diagnosis(d, &mut warnings))
        .collect();

    cap(&mut medications, "medications", &mut warnings);
    cap(&mut labs, "lab results", &mut warnings);
    cap(&mut vitals, "vital signs", &mut warnings);
    cap(&mut diagnoses, "diagnoses", &mut warnings);

    if !warnings.is_empty() {
        tracing::warn!(
            warning_count = warnings.len(),
            "Extraction validation warnings detected"
        );
    }

    ExtractionResult {
        medications,
        labs,
        vitals,
        diagnoses,
        raw_text: raw.raw_text,
        confidence: raw.confidence.map(clamp_confidence),
        warnings,
    }
}

/// Parse any accepted date layout. Years outside 1900..=2100 are rejected.
pub fn normalize_date(input: &str) -> Option<NaiveDate> {
    let s = input.trim();
    // ISO timestamp: keep the date part.
    let s = match s.get(..10) {
        Some(head) if s.len() > 10 && s.as_bytes().get(10) == Some(&b'T') => head,
        _ => s,
    };
    DATE_FORMATS
        .iter()
        .filter_map(|f| NaiveDate::parse_from_str(s, f).ok())
        .find(|d| (1900..=2100).contains(&d.year()))
}

fn normalize_date_string(input: &str) -> Option<String> {
    normalize_date(input).map(|d| d.format("%Y-%m-%d").to_string())
}

/// Clamp to [0, 1]; NaN becomes 0.
pub fn clamp_confidence(value: f64) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0) as f32
    }
}

fn enum_key(s: &str) -> String {
    s.trim().to_lowercase().replace(['_', '-'], " ")
}

pub fn normalize_medication_status(s: &str) -> Option<MedicationStatus> {
    match enum_key(s).as_str() {
        "active" | "current" | "ongoing" | "continue" | "continued" | "taking" => {
            Some(MedicationStatus::Active)
        }
        "stopped" | "discontinued" | "ceased" | "inactive" | "completed" => {
            Some(MedicationStatus::Stopped)
        }
        "held" | "on hold" | "hold" | "paused" | "suspended" => Some(MedicationStatus::Held),
        _ => None,
    }
}

pub fn normalize_diagnosis_status(s: &str) -> Option<DiagnosisStatus> {
    match enum_key(s).as_str() {
        "active" | "ongoing" | "current" | "acute" => Some(DiagnosisStatus::Active),
        "resolved" | "past" | "historical" | "inactive" | "remission" => {
            Some(DiagnosisStatus::Resolved)
        }
        "chronic" | "long term" => Some(DiagnosisStatus::Chronic),
        _ => None,
    }
}

pub fn normalize_lab_flag(s: &str) -> Option<LabFlag> {
    match enum_key(s).as_str() {
        "normal" | "n" | "within range" | "in range" => Some(LabFlag::Normal),
        "low" | "l" | "abnormal low" => Some(LabFlag::Low),
        "high" | "h" | "abnormal high" | "elevated" => Some(LabFlag::High),
        "critical" | "critical high" | "critical low" | "panic" | "c" => Some(LabFlag::Critical),
        _ => None,
    }
}

/// Plausible primary and secondary ranges for a vital type.
/// Unknown types only need a finite, non-negative value.
fn vital_ranges(vital_type: &str, unit: &str) -> (RangeInclusive<f64>, RangeInclusive<f64>) {
    let unit = unit.trim().trim_end_matches('.').to_lowercase();
    match enum_key(vital_type).as_str() {
        "bp" | "blood pressure" => (40.0..=300.0, 20.0..=200.0),
        "hr" | "heart rate" | "pulse" => (20.0..=250.0, 0.0..=f64::MAX),
        "temp" | "temperature" if unit.contains('f') => (86.0..=113.0, 0.0..=f64::MAX),
        "temp" | "temperature" => (30.0..=45.0, 0.0..=f64::MAX),
        "rr" | "respiratory rate" | "resp" => (4.0..=80.0, 0.0..=f64::MAX),
        "spo2" | "oxygen saturation" | "o2 sat" => (50.0..=100.0, 0.0..=f64::MAX),
        "weight" | "wt" => (weight_range(&unit), 0.0..=f64::MAX),
        "height" | "ht" | "length" => (height_range(&unit), 0.0..=f64::MAX),
        _ => (0.0..=f64::MAX, 0.0..=f64::MAX),
    }
}

fn weight_range(unit: &str) -> RangeInclusive<f64> {
    match unit {
        "kg" | "kgs" | "kilogram" | "kilograms" => 0.2..=700.0,
        "g" | "gm" | "gram" | "grams" => 200.0..=700_000.0,
        "lb" | "lbs" | "pound" | "pounds" => 0.5..=1500.0,
        _ => 0.2..=1500.0,
    }
}

fn height_range(unit: &str) -> RangeInclusive<f64> {
    match unit {
        "cm" | "centimeter" | "centimeters" | "centimetre" | "centimetres" => 20.0..=275.0,
        "m" | "meter" | "meters" | "metre" | "metres" => 0.2..=2.75,
        "mm" => 200.0..=2750.0,
        "in" | "inch" | "inches" | "\"" => 8.0..=108.0,
        "ft" | "feet" | "foot" | "'" => 0.7..=9.0,
        _ => 0.2..=300.0,
    }
}

fn optional(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn validate_medication(raw: RawMedication, warnings: &mut Vec<String>) -> Option<ExtractedMedication> {
    let name = raw.name.trim().to_string();
    let Some(status) = normalize_medication_status(&raw.status) else {
        warnings.push(format!(
            "Medication '{name}' with unknown status '{}' removed",
            raw.status
        ));
        return None;
    };
    Some(ExtractedMedication {
        name,
        dose: raw.dose.trim().to_string(),
        frequency: raw.frequency.trim().to_string(),
        route: optional(raw.route),
        status,
        indication: optional(raw.indication),
    })
}

fn validate_lab(raw: RawLabResult, warnings: &mut Vec<String>) -> Option<ExtractedLabResult> {
    let test_name = raw.test_name.trim().to_string();
    let Some(date) = normalize_date_string(&raw.date) else {
        warnings.push(format!(
            "Lab result '{test_name}' with unreadable date '{}' removed",
            raw.date
        ));
        return None;
    };
    let flag = match optional(raw.flag) {
        None => None,
        Some(f) => {
            let parsed = normalize_lab_flag(&f);
            if parsed.is_none() {
                warnings.push(format!("Lab result '{test_name}' flag '{f}' not recognized, cleared"));
            }
            parsed
        }
    };
    Some(ExtractedLabResult {
        test_name,
        value: raw.value.trim().to_string(),
        unit: raw.unit.trim().to_string(),
        date,
        reference_range: optional(raw.reference_range),
        flag,
    })
}

fn validate_vital(raw: RawVitalSign, warnings: &mut Vec<String>) -> Option<ExtractedVitalSign> {
    let vital_type = raw.vital_type.trim().to_string();
    let Some(date) = normalize_date_string(&raw.date) else {
        warnings.push(format!(
            "Vital sign '{vital_type}' with unreadable date '{}' removed",
            raw.date
        ));
        return None;
    };

    let (primary, secondary) = vital_ranges(&vital_type, &raw.unit);
    let in_range = raw.value.is_finite()
        && primary.contains(&raw.value)
        && raw.value2.map_or(true, |v| v.is_finite() && secondary.contains(&v));
    if !in_range {
        warnings.push(format!(
            "Vital sign '{vital_type}' with implausible value {} removed",
            format_reading(raw.value, raw.value2)
        ));
        return None;
    }

    Some(ExtractedVitalSign {
        vital_type,
        value: raw.value,
        value2: raw.value2,
        unit: raw.unit.trim().to_string(),
        date,
    })
}

fn format_reading(value: f64, value2: Option<f64>) -> String {
    match value2 {
        Some(v2) => format!("{value}/{v2}"),
        None => value.to_string(),
    }
}

fn validate_diagnosis(raw: RawDiagnosis, warnings: &mut Vec<String>) -> Option<ExtractedDiagnosis> {
    let name = raw.name.trim().to_string();
    let Some(status) = normalize_diagnosis_status(&raw.status) else {
        warnings.push(format!(
            "Diagnosis '{name}' with unknown status '{}' removed",
            raw.status
        ));
        return None;
    };
    let diagnosed_date = match optional(raw.diagnosed_date) {
        None => None,
        Some(d) => {
            let parsed = normalize_date_string(&d);
            if parsed.is_none() {
                warnings.push(format!("Diagnosis '{name}' date '{d}' unreadable, cleared"));
            }
            parsed
        }
    };
    Some(ExtractedDiagnosis {
        name,
        status,
        icd_code: optional(raw.icd_code).map(|c| c.to_uppercase()),
        diagnosed_date,
    })
}

fn cap<T>(records: &mut Vec<T>, label: &str, warnings: &mut Vec<String>) {
    if records.len() > MAX_RECORDS_PER_COLLECTION {
        warnings.push(format!(
            "Excessive {label} ({}) capped to {MAX_RECORDS_PER_COLLECTION}",
            records.len()
        ));
        records.truncate(MAX_RECORDS_PER_COLLECTION);
    }
}

/// Drop records repeated across pages. Returns how many were removed.
pub fn dedup_records(result: &mut ExtractionResult) -> usize {
    let before = result.record_count();

    let mut seen = HashSet::new();
    result
        .medications
        .retain(|m| seen.insert((m.name.to_lowercase(), m.dose.to_lowercase())));

    let mut seen = HashSet::new();
    result
        .labs
        .retain(|l| seen.insert((l.test_name.to_lowercase(), l.value.clone(), l.date.clone())));

    let mut seen = HashSet::new();
    result.vitals.retain(|v| {
        seen.insert((
            v.vital_type.to_lowercase(),
            v.value.to_bits(),
            v.value2.map(f64::to_bits),
            v.date.clone(),
        ))
    });

    let mut seen = HashSet::new();
    result
        .diagnoses
        .retain(|d| seen.insert(d.name.to_lowercase()));

    before - result.record_count()
}
