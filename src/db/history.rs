//! History record repository: transactional create, blob-first delete with
//! ownership filter, list/get/stats.
//!
//! Records are create-once, read-many, delete-once. Deletion removes the
//! backing blob first and the rows second; the two removals do not share a
//! transaction, so a crash between them can leave the record without its
//! blob. That inconsistency window is inherited from the product design and
//! intentionally not papered over here.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use super::DatabaseError;
use crate::config::LOCAL_TZ_OFFSET_SECS;
use crate::media::{MediaError, MediaStore};
use crate::models::{Diagnosis, HistoryRecord, HistoryStats};

const MAX_PATIENT_NAME_LEN: usize = 255;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Invalid record field: {0}")]
    Validation(String),

    #[error("Blob store error: {0}")]
    Media(#[from] MediaError),
}

impl From<rusqlite::Error> for HistoryError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.into())
    }
}

/// Fields for a new record; the id and local timestamp are assigned here.
#[derive(Debug)]
pub struct NewHistory<'a> {
    pub user_id: i64,
    pub storage_key: &'a str,
    pub paciente_nombre: &'a str,
    pub grupo: Diagnosis,
    pub porcentaje: f64,
    /// Source-image upload instant (UTC); converted to the fixed local
    /// zone at creation time.
    pub uploaded_at: DateTime<Utc>,
}

/// Create a history record and its image row in one transaction.
///
/// Field validation runs before any write; a validation or storage failure
/// aborts the whole unit and propagates.
pub fn create_history(
    conn: &mut Connection,
    new: &NewHistory<'_>,
) -> Result<HistoryRecord, HistoryError> {
    validate_fields(new)?;

    let local_tz = FixedOffset::east_opt(LOCAL_TZ_OFFSET_SECS)
        .ok_or_else(|| HistoryError::Validation("invalid local offset".into()))?;
    let fecha_imagen = new.uploaded_at.with_timezone(&local_tz);
    let created_at = new.uploaded_at.to_rfc3339();

    let tx = conn.transaction().map_err(DatabaseError::from)?;

    tx.execute(
        "INSERT INTO uploaded_images (user_id, storage_key, created_at)
         VALUES (?1, ?2, ?3)",
        params![new.user_id, new.storage_key, created_at],
    )?;
    let image_id = tx.last_insert_rowid();

    tx.execute(
        "INSERT INTO history (user_id, image_id, storage_key, paciente_nombre, grupo, porcentaje, fecha_imagen)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            new.user_id,
            image_id,
            new.storage_key,
            new.paciente_nombre,
            new.grupo.as_str(),
            new.porcentaje,
            fecha_imagen.to_rfc3339(),
        ],
    )?;
    let id = tx.last_insert_rowid();

    let username: String = tx.query_row(
        "SELECT username FROM users WHERE id = ?1",
        params![new.user_id],
        |row| row.get(0),
    )?;

    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(
        id,
        paciente = new.paciente_nombre,
        grupo = new.grupo.as_str(),
        "History record created"
    );

    Ok(HistoryRecord {
        id,
        user_id: new.user_id,
        username,
        image_id,
        storage_key: new.storage_key.to_string(),
        paciente_nombre: new.paciente_nombre.to_string(),
        grupo: new.grupo,
        porcentaje: new.porcentaje,
        fecha_imagen,
    })
}

fn validate_fields(new: &NewHistory<'_>) -> Result<(), HistoryError> {
    let name = new.paciente_nombre.trim();
    if name.is_empty() {
        return Err(HistoryError::Validation("paciente_nombre vacío".into()));
    }
    if name.len() > MAX_PATIENT_NAME_LEN {
        return Err(HistoryError::Validation(format!(
            "paciente_nombre excede {MAX_PATIENT_NAME_LEN} caracteres"
        )));
    }
    if !(0.0..=100.0).contains(&new.porcentaje) {
        return Err(HistoryError::Validation(format!(
            "porcentaje fuera de rango: {}",
            new.porcentaje
        )));
    }
    Ok(())
}

/// Delete a record. With an owner filter, the record is located by
/// `(id, owner)` — a mismatch reads as "not found" (`Ok(false)`), never a
/// permission error. The backing blob is removed first; a blob removal
/// failure propagates and leaves the record in place.
pub fn delete_history(
    conn: &mut Connection,
    media: &MediaStore,
    id: i64,
    owner: Option<i64>,
) -> Result<bool, HistoryError> {
    let found: Option<(i64, String)> = match owner {
        Some(user_id) => conn
            .query_row(
                "SELECT image_id, storage_key FROM history WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?,
        None => conn
            .query_row(
                "SELECT image_id, storage_key FROM history WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?,
    };

    let Some((image_id, storage_key)) = found else {
        tracing::warn!(id, "History record not found for deletion");
        return Ok(false);
    };

    media.delete(&storage_key)?;

    let tx = conn.transaction().map_err(DatabaseError::from)?;
    tx.execute("DELETE FROM history WHERE id = ?1", params![id])?;
    tx.execute(
        "DELETE FROM uploaded_images WHERE id = ?1",
        params![image_id],
    )?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(id, "History record deleted");
    Ok(true)
}

const SELECT_COLUMNS: &str = "h.id, h.user_id, u.username, h.image_id, h.storage_key,
     h.paciente_nombre, h.grupo, h.porcentaje, h.fecha_imagen";

/// List records, newest first. `owner = None` lists across all users
/// (privileged views).
pub fn list_history(
    conn: &Connection,
    owner: Option<i64>,
) -> Result<Vec<HistoryRecord>, HistoryError> {
    let base = format!(
        "SELECT {SELECT_COLUMNS} FROM history h JOIN users u ON h.user_id = u.id"
    );
    let mut records = Vec::new();

    match owner {
        Some(user_id) => {
            let mut stmt = conn.prepare(&format!(
                "{base} WHERE h.user_id = ?1 ORDER BY h.fecha_imagen DESC"
            ))?;
            let rows = stmt.query_map(params![user_id], record_from_row)?;
            for row in rows {
                records.push(finish_record(row?)?);
            }
        }
        None => {
            let mut stmt = conn.prepare(&format!("{base} ORDER BY h.fecha_imagen DESC"))?;
            let rows = stmt.query_map([], record_from_row)?;
            for row in rows {
                records.push(finish_record(row?)?);
            }
        }
    }

    Ok(records)
}

/// Fetch one record, optionally scoped to an owner.
pub fn get_history(
    conn: &Connection,
    id: i64,
    owner: Option<i64>,
) -> Result<Option<HistoryRecord>, HistoryError> {
    let base = format!(
        "SELECT {SELECT_COLUMNS} FROM history h JOIN users u ON h.user_id = u.id WHERE h.id = ?1"
    );

    let row = match owner {
        Some(user_id) => conn
            .query_row(
                &format!("{base} AND h.user_id = ?2"),
                params![id, user_id],
                record_from_row,
            )
            .optional()?,
        None => conn.query_row(&base, params![id], record_from_row).optional()?,
    };

    row.map(finish_record).transpose()
}

/// Summary statistics over a record set (per owner, or global).
pub fn history_stats(
    conn: &Connection,
    owner: Option<i64>,
) -> Result<HistoryStats, HistoryError> {
    let (clause, owner_id) = match owner {
        Some(user_id) => ("WHERE user_id = ?1", user_id),
        None => ("WHERE 1 = ?1", 1),
    };

    let (total, promedio): (i64, Option<f64>) = conn.query_row(
        &format!("SELECT COUNT(*), AVG(porcentaje) FROM history {clause}"),
        params![owner_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let hernias: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM history {clause} AND grupo = 'Hernia'"),
        params![owner_id],
        |row| row.get(0),
    )?;
    let sin_hernias: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM history {clause} AND grupo = 'Sin Hernia'"),
        params![owner_id],
        |row| row.get(0),
    )?;

    let porcentaje_hernias = if total > 0 {
        round2(hernias as f64 / total as f64 * 100.0)
    } else {
        0.0
    };

    Ok(HistoryStats {
        total,
        promedio_confianza: round2(promedio.unwrap_or(0.0)),
        hernias,
        sin_hernias,
        porcentaje_hernias,
    })
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// Internal row type, converted to the typed record outside the rusqlite
// closure so enum/date parse failures surface as HistoryError.
struct HistoryRow {
    id: i64,
    user_id: i64,
    username: String,
    image_id: i64,
    storage_key: String,
    paciente_nombre: String,
    grupo: String,
    porcentaje: f64,
    fecha_imagen: String,
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryRow> {
    Ok(HistoryRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        image_id: row.get(3)?,
        storage_key: row.get(4)?,
        paciente_nombre: row.get(5)?,
        grupo: row.get(6)?,
        porcentaje: row.get(7)?,
        fecha_imagen: row.get(8)?,
    })
}

fn finish_record(row: HistoryRow) -> Result<HistoryRecord, HistoryError> {
    Ok(HistoryRecord {
        id: row.id,
        user_id: row.user_id,
        username: row.username,
        image_id: row.image_id,
        storage_key: row.storage_key,
        paciente_nombre: row.paciente_nombre,
        grupo: Diagnosis::from_str(&row.grupo).map_err(HistoryError::Database)?,
        porcentaje: row.porcentaje,
        fecha_imagen: DateTime::parse_from_rfc3339(&row.fecha_imagen)
            .map_err(|e| HistoryError::Validation(format!("fecha_imagen: {e}")))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::TimeZone;

    fn seed_user(conn: &Connection, username: &str) -> i64 {
        conn.execute(
            "INSERT INTO users (username, email, password_hash, created_at)
             VALUES (?1, ?2, 'x', '2025-01-01')",
            params![username, format!("{username}@clinic.ec")],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    fn media_store() -> (tempfile::TempDir, MediaStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path()).unwrap();
        (dir, store)
    }

    fn new_record<'a>(user_id: i64, key: &'a str, at: DateTime<Utc>) -> NewHistory<'a> {
        NewHistory {
            user_id,
            storage_key: key,
            paciente_nombre: "Juan Pérez",
            grupo: Diagnosis::Hernia,
            porcentaje: 87.0,
            uploaded_at: at,
        }
    }

    #[test]
    fn create_assigns_id_and_local_timestamp() {
        let mut conn = open_memory_database().unwrap();
        let user = seed_user(&conn, "doc");
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 15, 30, 0).unwrap();

        let record = create_history(&mut conn, &new_record(user, "k.jpg", at)).unwrap();

        assert!(record.id > 0);
        assert_eq!(record.username, "doc");
        // 15:30 UTC is 10:30 in Guayaquil.
        assert_eq!(record.fecha_imagen.offset().local_minus_utc(), -18000);
        assert_eq!(
            record.fecha_imagen.naive_local(),
            chrono::NaiveDate::from_ymd_opt(2025, 3, 1)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap()
        );
    }

    #[test]
    fn create_rejects_out_of_range_percentage() {
        let mut conn = open_memory_database().unwrap();
        let user = seed_user(&conn, "doc");
        let mut new = new_record(user, "k.jpg", Utc::now());
        new.porcentaje = 100.01;

        let err = create_history(&mut conn, &new).unwrap_err();
        assert!(matches!(err, HistoryError::Validation(_)));

        // Nothing committed, including the image row.
        let images: i64 = conn
            .query_row("SELECT COUNT(*) FROM uploaded_images", [], |r| r.get(0))
            .unwrap();
        assert_eq!(images, 0);
    }

    #[test]
    fn create_rejects_empty_patient_name() {
        let mut conn = open_memory_database().unwrap();
        let user = seed_user(&conn, "doc");
        let mut new = new_record(user, "k.jpg", Utc::now());
        new.paciente_nombre = "   ";
        assert!(matches!(
            create_history(&mut conn, &new),
            Err(HistoryError::Validation(_))
        ));
    }

    #[test]
    fn list_orders_newest_first_and_scopes_to_owner() {
        let mut conn = open_memory_database().unwrap();
        let doc = seed_user(&conn, "doc");
        let other = seed_user(&conn, "other");

        let older = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap();
        create_history(&mut conn, &new_record(doc, "a.jpg", older)).unwrap();
        create_history(&mut conn, &new_record(doc, "b.jpg", newer)).unwrap();
        create_history(&mut conn, &new_record(other, "c.jpg", newer)).unwrap();

        let own = list_history(&conn, Some(doc)).unwrap();
        assert_eq!(own.len(), 2);
        assert_eq!(own[0].storage_key, "b.jpg");
        assert_eq!(own[1].storage_key, "a.jpg");

        let all = list_history(&conn, None).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn delete_with_wrong_owner_is_not_found_not_an_error() {
        let mut conn = open_memory_database().unwrap();
        let (_dir, media) = media_store();
        let doc = seed_user(&conn, "doc");
        let intruder = seed_user(&conn, "intruder");

        let record = create_history(&mut conn, &new_record(doc, "k.jpg", Utc::now())).unwrap();
        media.store("k.jpg", b"bytes").unwrap();

        // Owner filter mismatch: Ok(false), record untouched.
        let deleted = delete_history(&mut conn, &media, record.id, Some(intruder)).unwrap();
        assert!(!deleted);
        assert!(get_history(&conn, record.id, None).unwrap().is_some());
        assert!(media.read("k.jpg").is_ok());
    }

    #[test]
    fn delete_removes_blob_and_both_rows() {
        let mut conn = open_memory_database().unwrap();
        let (_dir, media) = media_store();
        let doc = seed_user(&conn, "doc");

        let record = create_history(&mut conn, &new_record(doc, "k.jpg", Utc::now())).unwrap();
        media.store("k.jpg", b"bytes").unwrap();

        assert!(delete_history(&mut conn, &media, record.id, Some(doc)).unwrap());
        assert!(get_history(&conn, record.id, None).unwrap().is_none());
        assert!(media.read("k.jpg").is_err());

        let images: i64 = conn
            .query_row("SELECT COUNT(*) FROM uploaded_images", [], |r| r.get(0))
            .unwrap();
        assert_eq!(images, 0);
    }

    #[test]
    fn delete_of_unknown_id_returns_false() {
        let mut conn = open_memory_database().unwrap();
        let (_dir, media) = media_store();
        assert!(!delete_history(&mut conn, &media, 999, None).unwrap());
    }

    #[test]
    fn get_scoped_to_non_owner_is_none() {
        let mut conn = open_memory_database().unwrap();
        let doc = seed_user(&conn, "doc");
        let other = seed_user(&conn, "other");
        let record = create_history(&mut conn, &new_record(doc, "k.jpg", Utc::now())).unwrap();

        assert!(get_history(&conn, record.id, Some(other)).unwrap().is_none());
        assert!(get_history(&conn, record.id, Some(doc)).unwrap().is_some());
    }

    #[test]
    fn stats_aggregate_counts_and_average() {
        let mut conn = open_memory_database().unwrap();
        let doc = seed_user(&conn, "doc");
        let at = Utc::now();

        let mut hernia = new_record(doc, "a.jpg", at);
        hernia.porcentaje = 90.0;
        create_history(&mut conn, &hernia).unwrap();

        let mut sin = new_record(doc, "b.jpg", at);
        sin.grupo = Diagnosis::SinHernia;
        sin.porcentaje = 70.0;
        create_history(&mut conn, &sin).unwrap();

        let stats = history_stats(&conn, Some(doc)).unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.promedio_confianza, 80.0);
        assert_eq!(stats.hernias, 1);
        assert_eq!(stats.sin_hernias, 1);
        assert_eq!(stats.porcentaje_hernias, 50.0);
    }

    #[test]
    fn stats_on_empty_set_are_zero() {
        let conn = open_memory_database().unwrap();
        let stats = history_stats(&conn, None).unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.promedio_confianza, 0.0);
        assert_eq!(stats.porcentaje_hernias, 0.0);
    }
}
