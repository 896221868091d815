use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{date_column, datetime_column, uuid_column, DATETIME_FORMAT};
use crate::db::DatabaseError;
use crate::models::VitalSign;

/// Insert a vital sign record.
pub fn insert_vital_sign(conn: &Connection, vs: &VitalSign) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO vital_signs (id, patient_id, report_id, vital_type, value_primary, value_secondary, unit, date, extracted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            vs.id.to_string(),
            vs.patient_id.to_string(),
            vs.report_id.to_string(),
            vs.vital_type,
            vs.value,
            vs.value2,
            vs.unit,
            vs.date.to_string(),
            vs.extracted_at.format(DATETIME_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

/// All vital signs of a patient in insertion order.
pub fn get_vital_signs_by_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<VitalSign>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, report_id, vital_type, value_primary, value_secondary, unit, date, extracted_at
         FROM vital_signs WHERE patient_id = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string()], row_to_vital_sign)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Delete every vital sign extracted from one report.
pub fn delete_vital_signs_by_report(conn: &Connection, report_id: &Uuid) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "DELETE FROM vital_signs WHERE report_id = ?1",
        params![report_id.to_string()],
    )?;
    Ok(affected)
}

fn row_to_vital_sign(row: &rusqlite::Row) -> Result<VitalSign, rusqlite::Error> {
    Ok(VitalSign {
        id: uuid_column(row, 0)?,
        patient_id: uuid_column(row, 1)?,
        report_id: uuid_column(row, 2)?,
        vital_type: row.get(3)?,
        value: row.get(4)?,
        value2: row.get(5)?,
        unit: row.get(6)?,
        date: date_column(row, 7)?,
        extracted_at: datetime_column(row, 8)?,
    })
}
