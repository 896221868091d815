use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{date_column, datetime_column, optional_enum_column, uuid_column, DATETIME_FORMAT};
use crate::db::DatabaseError;
use crate::models::LabResult;

pub fn insert_lab_result(conn: &Connection, lab: &LabResult) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO lab_results (id, patient_id, report_id, test_name, value, unit, date, reference_range, flag, extracted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            lab.id.to_string(),
            lab.patient_id.to_string(),
            lab.report_id.to_string(),
            lab.test_name,
            lab.value,
            lab.unit,
            lab.date.to_string(),
            lab.reference_range,
            lab.flag.map(|f| f.as_str()),
            lab.extracted_at.format(DATETIME_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

/// All lab results of a patient in insertion order.
pub fn get_lab_results_by_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<LabResult>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, report_id, test_name, value, unit, date, reference_range, flag, extracted_at
         FROM lab_results WHERE patient_id = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string()], |row| {
        Ok(LabResult {
            id: uuid_column(row, 0)?,
            patient_id: uuid_column(row, 1)?,
            report_id: uuid_column(row, 2)?,
            test_name: row.get(3)?,
            value: row.get(4)?,
            unit: row.get(5)?,
            date: date_column(row, 6)?,
            reference_range: row.get(7)?,
            flag: optional_enum_column(row, 8)?,
            extracted_at: datetime_column(row, 9)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn delete_lab_results_by_report(conn: &Connection, report_id: &Uuid) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "DELETE FROM lab_results WHERE report_id = ?1",
        params![report_id.to_string()],
    )?;
    Ok(affected)
}
