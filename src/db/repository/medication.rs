use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{datetime_column, enum_column, uuid_column, DATETIME_FORMAT};
use crate::db::DatabaseError;
use crate::models::Medication;

pub fn insert_medication(conn: &Connection, med: &Medication) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medications (id, patient_id, report_id, name, dose, frequency, route, status, indication, extracted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            med.id.to_string(),
            med.patient_id.to_string(),
            med.report_id.to_string(),
            med.name,
            med.dose,
            med.frequency,
            med.route,
            med.status.as_str(),
            med.indication,
            med.extracted_at.format(DATETIME_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

/// All medications of a patient in insertion order.
pub fn get_medications_by_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Medication>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, report_id, name, dose, frequency, route, status, indication, extracted_at
         FROM medications WHERE patient_id = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string()], row_to_medication)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn delete_medications_by_report(conn: &Connection, report_id: &Uuid) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "DELETE FROM medications WHERE report_id = ?1",
        params![report_id.to_string()],
    )?;
    Ok(affected)
}

fn row_to_medication(row: &rusqlite::Row) -> Result<Medication, rusqlite::Error> {
    Ok(Medication {
        id: uuid_column(row, 0)?,
        patient_id: uuid_column(row, 1)?,
        report_id: uuid_column(row, 2)?,
        name: row.get(3)?,
        dose: row.get(4)?,
        frequency: row.get(5)?,
        route: row.get(6)?,
        status: enum_column(row, 7)?,
        indication: row.get(8)?,
        extracted_at: datetime_column(row, 9)?,
    })
}
