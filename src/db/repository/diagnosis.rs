use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{datetime_column, enum_column, optional_date_column, uuid_column, DATETIME_FORMAT};
use crate::db::DatabaseError;
use crate::models::Diagnosis;

pub fn insert_diagnosis(conn: &Connection, diag: &Diagnosis) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO diagnoses (id, patient_id, report_id, name, status, icd_code, diagnosed_date, extracted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            diag.id.to_string(),
            diag.patient_id.to_string(),
            diag.report_id.to_string(),
            diag.name,
            diag.status.as_str(),
            diag.icd_code,
            diag.diagnosed_date.map(|d| d.to_string()),
            diag.extracted_at.format(DATETIME_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_diagnoses_by_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Diagnosis>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, report_id, name, status, icd_code, diagnosed_date, extracted_at
         FROM diagnoses WHERE patient_id = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string()], |row| {
        Ok(Diagnosis {
            id: uuid_column(row, 0)?,
            patient_id: uuid_column(row, 1)?,
            report_id: uuid_column(row, 2)?,
            name: row.get(3)?,
            status: enum_column(row, 4)?,
            icd_code: row.get(5)?,
            diagnosed_date: optional_date_column(row, 6)?,
            extracted_at: datetime_column(row, 7)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn delete_diagnoses_by_report(conn: &Connection, report_id: &Uuid) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "DELETE FROM diagnoses WHERE report_id = ?1",
        params![report_id.to_string()],
    )?;
    Ok(affected)
}
