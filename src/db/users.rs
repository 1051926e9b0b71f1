//! User accounts, bearer sessions, and password-reset tokens.
//!
//! Sessions are opaque tokens stored as SHA-256 hex; they live until
//! logout (no expiry sweep — single-process deployment). Reset tokens are
//! recorded here and their dispatch is logged by the auth service; no mail
//! leaves this system.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::DatabaseError;

/// Authenticated principal as read by the rest of the system: username and
/// superuser flag, nothing more.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        is_superuser: row.get::<_, i64>(3)? != 0,
        created_at: row.get(4)?,
    })
}

const USER_COLUMNS: &str = "id, username, email, is_superuser, created_at";

pub fn insert_user(
    conn: &Connection,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<User, DatabaseError> {
    conn.execute(
        "INSERT INTO users (username, email, password_hash, is_superuser, created_at)
         VALUES (?1, ?2, ?3, 0, ?4)",
        params![username, email, password_hash, Utc::now()],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DatabaseError::ConstraintViolation("username or email already registered".into())
        }
        other => other.into(),
    })?;

    let id = conn.last_insert_rowid();
    get_user_by_id(conn, id)?.ok_or(DatabaseError::NotFound {
        entity_type: "User".into(),
        id: id.to_string(),
    })
}

pub fn get_user_by_id(conn: &Connection, id: i64) -> Result<Option<User>, DatabaseError> {
    Ok(conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()?)
}

/// Look up a user by email together with the stored password hash.
pub fn get_user_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<(User, String)>, DatabaseError> {
    Ok(conn
        .query_row(
            &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?1"),
            params![email],
            |row| Ok((user_from_row(row)?, row.get::<_, String>(5)?)),
        )
        .optional()?)
}

pub fn set_superuser(conn: &Connection, id: i64, value: bool) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE users SET is_superuser = ?2 WHERE id = ?1",
        params![id, value as i64],
    )?;
    Ok(())
}

// ─── Sessions ─────────────────────────────────────────────────────────────────

pub fn insert_session(
    conn: &Connection,
    token_hash: &str,
    user_id: i64,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR REPLACE INTO sessions (token_hash, user_id, created_at)
         VALUES (?1, ?2, ?3)",
        params![token_hash, user_id, Utc::now()],
    )?;
    Ok(())
}

/// Resolve a session token hash to its user, if the session is live.
pub fn get_session_user(
    conn: &Connection,
    token_hash: &str,
) -> Result<Option<User>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT u.id, u.username, u.email, u.is_superuser, u.created_at
             FROM sessions s JOIN users u ON s.user_id = u.id
             WHERE s.token_hash = ?1",
            params![token_hash],
            user_from_row,
        )
        .optional()?)
}

/// Remove a session. Returns whether a session existed.
pub fn delete_session(conn: &Connection, token_hash: &str) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM sessions WHERE token_hash = ?1",
        params![token_hash],
    )?;
    Ok(changed > 0)
}

// ─── Password reset ───────────────────────────────────────────────────────────

pub fn insert_password_reset(
    conn: &Connection,
    token_hash: &str,
    user_id: i64,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR REPLACE INTO password_reset_tokens (token_hash, user_id, created_at)
         VALUES (?1, ?2, ?3)",
        params![token_hash, user_id, Utc::now()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn insert_and_look_up_user() {
        let conn = open_memory_database().unwrap();
        let user = insert_user(&conn, "doc", "doc@clinic.ec", "hash").unwrap();
        assert!(!user.is_superuser);

        let (found, hash) = get_user_by_email(&conn, "doc@clinic.ec").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(hash, "hash");
    }

    #[test]
    fn duplicate_email_is_constraint_violation() {
        let conn = open_memory_database().unwrap();
        insert_user(&conn, "doc", "doc@clinic.ec", "hash").unwrap();
        let err = insert_user(&conn, "doc2", "doc@clinic.ec", "hash").unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn unknown_email_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_user_by_email(&conn, "nobody@clinic.ec").unwrap().is_none());
    }

    #[test]
    fn session_round_trip() {
        let conn = open_memory_database().unwrap();
        let user = insert_user(&conn, "doc", "doc@clinic.ec", "hash").unwrap();

        insert_session(&conn, "tokhash", user.id).unwrap();
        let found = get_session_user(&conn, "tokhash").unwrap().unwrap();
        assert_eq!(found.username, "doc");

        assert!(delete_session(&conn, "tokhash").unwrap());
        assert!(get_session_user(&conn, "tokhash").unwrap().is_none());
        assert!(!delete_session(&conn, "tokhash").unwrap());
    }

    #[test]
    fn superuser_flag_persists() {
        let conn = open_memory_database().unwrap();
        let user = insert_user(&conn, "admin", "admin@clinic.ec", "hash").unwrap();
        set_superuser(&conn, user.id, true).unwrap();
        assert!(get_user_by_id(&conn, user.id).unwrap().unwrap().is_superuser);
    }
}
