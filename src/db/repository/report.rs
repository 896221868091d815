use std::collections::BTreeSet;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{conversion_error, datetime_column, enum_column, uuid_column, DATETIME_FORMAT};
use crate::db::DatabaseError;
use crate::models::enums::ExtractionStatus;
use crate::models::report::{Report, ReportContent, SMART_EXTRACTED_TAG};

const REPORT_COLUMNS: &str = "id, patient_id, title, document_type, content, status, tags, raw_text, fingerprint, created_at";

pub fn insert_report(conn: &Connection, report: &Report) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO reports (id, patient_id, title, document_type, content, status, tags, raw_text, fingerprint, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            report.id.to_string(),
            report.patient_id.to_string(),
            report.title,
            report.document_type,
            serde_json::to_string(&report.content)?,
            report.status.as_str(),
            serde_json::to_string(&report.tags)?,
            report.raw_text,
            report.fingerprint,
            report.created_at.format(DATETIME_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_report(conn: &Connection, id: &Uuid) -> Result<Option<Report>, DatabaseError> {
    let report = conn
        .query_row(
            &format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?1"),
            params![id.to_string()],
            row_to_report,
        )
        .optional()?;
    Ok(report)
}

/// Earliest completed report of the patient with this fingerprint, other than `exclude`.
pub fn find_completed_report_by_fingerprint(
    conn: &Connection,
    patient_id: &Uuid,
    fingerprint: &str,
    exclude: &Uuid,
) -> Result<Option<Report>, DatabaseError> {
    let report = conn
        .query_row(
            &format!(
                "SELECT {REPORT_COLUMNS} FROM reports
                 WHERE patient_id = ?1 AND fingerprint = ?2 AND status = 'completed' AND id != ?3
                 ORDER BY created_at ASC, rowid ASC
                 LIMIT 1"
            ),
            params![patient_id.to_string(), fingerprint, exclude.to_string()],
            row_to_report,
        )
        .optional()?;
    Ok(report)
}

/// Set the extraction status. `completed` also adds the smart-extracted tag;
/// `raw_text` replaces the cached text only when given.
pub fn update_report_status(
    conn: &Connection,
    id: &Uuid,
    status: ExtractionStatus,
    raw_text: Option<&str>,
) -> Result<(), DatabaseError> {
    let tags_json: Option<String> = conn
        .query_row(
            "SELECT tags FROM reports WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    let Some(tags_json) = tags_json else {
        return Err(DatabaseError::NotFound {
            entity_type: "report".into(),
            id: id.to_string(),
        });
    };

    let mut tags: BTreeSet<String> = serde_json::from_str(&tags_json)?;
    if status == ExtractionStatus::Completed {
        tags.insert(SMART_EXTRACTED_TAG.to_string());
    }

    conn.execute(
        "UPDATE reports SET status = ?2, tags = ?3, raw_text = COALESCE(?4, raw_text) WHERE id = ?1",
        params![
            id.to_string(),
            status.as_str(),
            serde_json::to_string(&tags)?,
            raw_text,
        ],
    )?;
    Ok(())
}

/// Attach extraction metadata after a save. `None` leaves a column unchanged.
pub fn update_report_extraction_metadata(
    conn: &Connection,
    id: &Uuid,
    raw_text: Option<&str>,
    fingerprint: Option<&str>,
) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE reports SET raw_text = COALESCE(?2, raw_text), fingerprint = COALESCE(?3, fingerprint)
         WHERE id = ?1",
        params![id.to_string(), raw_text, fingerprint],
    )?;
    if affected == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "report".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

fn row_to_report(row: &rusqlite::Row) -> Result<Report, rusqlite::Error> {
    let content_json: String = row.get(4)?;
    let tags_json: String = row.get(6)?;

    let content: ReportContent =
        serde_json::from_str(&content_json).map_err(|e| conversion_error(4, e))?;
    let tags: BTreeSet<String> =
        serde_json::from_str(&tags_json).map_err(|e| conversion_error(6, e))?;

    Ok(Report {
        id: uuid_column(row, 0)?,
        patient_id: uuid_column(row, 1)?,
        title: row.get(2)?,
        document_type: row.get(3)?,
        content,
        status: enum_column(row, 5)?,
        tags,
        raw_text: row.get(7)?,
        fingerprint: row.get(8)?,
        created_at: datetime_column(row, 9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn report(patient_id: Uuid) -> Report {
        Report::new(patient_id, "Blood work", "Lab Report", ReportContent::text("HbA1c 7.2%"))
    }

    #[test]
    fn insert_and_get_round_trip() {
        let conn = open_memory_database().unwrap();
        let mut r = report(Uuid::new_v4());
        r.tags.insert("imported".into());
        insert_report(&conn, &r).unwrap();

        let loaded = get_report(&conn, &r.id).unwrap().unwrap();
        assert_eq!(loaded.title, "Blood work");
        assert_eq!(loaded.content, r.content);
        assert!(loaded.has_tag("imported"));
        assert_eq!(loaded.status, ExtractionStatus::Idle);
    }

    #[test]
    fn missing_report_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_report(&conn, &Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn completed_status_adds_smart_tag_and_text() {
        let conn = open_memory_database().unwrap();
        let r = report(Uuid::new_v4());
        insert_report(&conn, &r).unwrap();

        update_report_status(&conn, &r.id, ExtractionStatus::Extracting, None).unwrap();
        let mid = get_report(&conn, &r.id).unwrap().unwrap();
        assert!(mid.tags.is_empty());

        update_report_status(&conn, &r.id, ExtractionStatus::Completed, Some("HbA1c 7.2%")).unwrap();
        let done = get_report(&conn, &r.id).unwrap().unwrap();
        assert!(done.is_smart_extracted());
        assert_eq!(done.raw_text.as_deref(), Some("HbA1c 7.2%"));
    }

    #[test]
    fn status_without_text_keeps_cached_text() {
        let conn = open_memory_database().unwrap();
        let mut r = report(Uuid::new_v4());
        r.raw_text = Some("cached".into());
        insert_report(&conn, &r).unwrap();

        update_report_status(&conn, &r.id, ExtractionStatus::Failed, None).unwrap();
        let loaded = get_report(&conn, &r.id).unwrap().unwrap();
        assert_eq!(loaded.raw_text.as_deref(), Some("cached"));
        assert_eq!(loaded.status, ExtractionStatus::Failed);
    }

    #[test]
    fn status_update_on_missing_report_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = update_report_status(&conn, &Uuid::new_v4(), ExtractionStatus::Saving, None)
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn fingerprint_lookup_matches_completed_reports_of_same_patient() {
        let conn = open_memory_database().unwrap();
        let patient = Uuid::new_v4();

        let mut first = report(patient);
        first.fingerprint = Some("abc=".into());
        first.status = ExtractionStatus::Completed;
        insert_report(&conn, &first).unwrap();

        let mut pending = report(patient);
        pending.fingerprint = Some("abc=".into());
        insert_report(&conn, &pending).unwrap();

        let mut other_patient = report(Uuid::new_v4());
        other_patient.fingerprint = Some("abc=".into());
        other_patient.status = ExtractionStatus::Completed;
        insert_report(&conn, &other_patient).unwrap();

        let hit = find_completed_report_by_fingerprint(&conn, &patient, "abc=", &pending.id)
            .unwrap()
            .unwrap();
        assert_eq!(hit.id, first.id);

        // A report never matches itself.
        assert!(find_completed_report_by_fingerprint(&conn, &patient, "abc=", &first.id)
            .unwrap()
            .is_none());
        assert!(find_completed_report_by_fingerprint(&conn, &patient, "zzz=", &pending.id)
            .unwrap()
            .is_none());
    }

    #[test]
    fn metadata_update_sets_fingerprint() {
        let conn = open_memory_database().unwrap();
        let r = report(Uuid::new_v4());
        insert_report(&conn, &r).unwrap();

        update_report_extraction_metadata(&conn, &r.id, None, Some("fp=")).unwrap();
        let loaded = get_report(&conn, &r.id).unwrap().unwrap();
        assert_eq!(loaded.fingerprint.as_deref(), Some("fp="));
        assert!(loaded.raw_text.is_none());
    }
}
