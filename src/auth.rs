//! Authentication: email+password accounts, opaque bearer sessions, and
//! the password-reset request flow.
//!
//! Passwords are stored as PBKDF2 PHC strings. Session tokens are random
//! 32-byte values handed to the client once and kept server-side only as
//! SHA-256 hex. Password-reset dispatch is recorded and logged — no mail
//! actually leaves this system (identity mail delivery is an external
//! collaborator).

use std::sync::OnceLock;

use base64::Engine;
use pbkdf2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Pbkdf2,
};
use regex::Regex;
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::db::users::{self, User};
use crate::db::DatabaseError;

const MIN_PASSWORD_LEN: usize = 8;
const MIN_USERNAME_LEN: usize = 3;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Correo electrónico o contraseña incorrectos.")]
    InvalidCredentials,

    #[error("El correo electrónico no está registrado en nuestro sistema.")]
    EmailNotRegistered,

    #[error("Registro inválido: {0}")]
    InvalidRegistration(String),

    #[error("Error al procesar la autenticación.")]
    Hashing,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a bearer token for storage, SHA-256 hex.
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("static email pattern")
    })
}

pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// Authenticate by email and password; opens a new session on success.
/// Unknown email and wrong password are indistinguishable to the caller.
pub fn authenticate_by_email(
    conn: &Connection,
    email: &str,
    password: &str,
) -> Result<(User, String), AuthError> {
    let Some((user, stored_hash)) = users::get_user_by_email(conn, email)? else {
        tracing::warn!(email, "Login attempt for unknown email");
        return Err(AuthError::InvalidCredentials);
    };

    let parsed = PasswordHash::new(&stored_hash).map_err(|_| AuthError::Hashing)?;
    if Pbkdf2.verify_password(password.as_bytes(), &parsed).is_err() {
        tracing::warn!(username = %user.username, "Failed login attempt");
        return Err(AuthError::InvalidCredentials);
    }

    let token = open_session(conn, &user)?;
    tracing::info!(username = %user.username, "User authenticated");
    Ok((user, token))
}

/// Register a new account and log it in.
pub fn register_user(
    conn: &Connection,
    username: &str,
    email: &str,
    password: &str,
) -> Result<(User, String), AuthError> {
    let username = username.trim();
    if username.len() < MIN_USERNAME_LEN || username.contains(char::is_whitespace) {
        return Err(AuthError::InvalidRegistration(
            "nombre de usuario inválido".into(),
        ));
    }
    if !is_valid_email(email) {
        return Err(AuthError::InvalidRegistration(
            "el formato del email no es válido".into(),
        ));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::InvalidRegistration(format!(
            "la contraseña requiere al menos {MIN_PASSWORD_LEN} caracteres"
        )));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Pbkdf2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| AuthError::Hashing)?
        .to_string();

    let user = users::insert_user(conn, username, email, &password_hash).map_err(|e| match e {
        DatabaseError::ConstraintViolation(msg) => AuthError::InvalidRegistration(msg),
        other => AuthError::Database(other),
    })?;

    let token = open_session(conn, &user)?;
    tracing::info!(username = %user.username, "User registered");
    Ok((user, token))
}

fn open_session(conn: &Connection, user: &User) -> Result<String, AuthError> {
    let token = generate_token();
    users::insert_session(conn, &hash_token(&token), user.id)?;
    Ok(token)
}

/// Resolve a presented bearer token to its user.
pub fn resolve_session(conn: &Connection, token: &str) -> Result<Option<User>, AuthError> {
    Ok(users::get_session_user(conn, &hash_token(token))?)
}

/// Destroy the session behind a presented token.
pub fn logout(conn: &Connection, token: &str) -> Result<bool, AuthError> {
    Ok(users::delete_session(conn, &hash_token(token))?)
}

/// Record a password-reset request. The reset link dispatch is logged
/// only; mail delivery belongs to the external identity provider.
pub fn request_password_reset(conn: &Connection, email: &str) -> Result<(), AuthError> {
    let Some((user, _)) = users::get_user_by_email(conn, email)? else {
        tracing::warn!(email, "Password reset requested for unregistered email");
        return Err(AuthError::EmailNotRegistered);
    };

    let token = generate_token();
    users::insert_password_reset(conn, &hash_token(&token), user.id)?;
    tracing::info!(username = %user.username, "Password reset link requested");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn register_then_login_round_trip() {
        let conn = open_memory_database().unwrap();
        let (user, token) =
            register_user(&conn, "doc", "doc@clinic.ec", "secret-pass-123").unwrap();
        assert_eq!(user.username, "doc");
        assert!(resolve_session(&conn, &token).unwrap().is_some());

        let (again, second_token) =
            authenticate_by_email(&conn, "doc@clinic.ec", "secret-pass-123").unwrap();
        assert_eq!(again.id, user.id);
        assert_ne!(token, second_token);
    }

    #[test]
    fn wrong_password_and_unknown_email_are_indistinguishable() {
        let conn = open_memory_database().unwrap();
        register_user(&conn, "doc", "doc@clinic.ec", "secret-pass-123").unwrap();

        let wrong_pass = authenticate_by_email(&conn, "doc@clinic.ec", "nope").unwrap_err();
        let unknown = authenticate_by_email(&conn, "ghost@clinic.ec", "nope").unwrap_err();
        assert!(matches!(wrong_pass, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
    }

    #[test]
    fn registration_validates_fields() {
        let conn = open_memory_database().unwrap();
        assert!(matches!(
            register_user(&conn, "ab", "doc@clinic.ec", "secret-pass-123"),
            Err(AuthError::InvalidRegistration(_))
        ));
        assert!(matches!(
            register_user(&conn, "doc", "not-an-email", "secret-pass-123"),
            Err(AuthError::InvalidRegistration(_))
        ));
        assert!(matches!(
            register_user(&conn, "doc", "doc@clinic.ec", "short"),
            Err(AuthError::InvalidRegistration(_))
        ));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let conn = open_memory_database().unwrap();
        register_user(&conn, "doc", "doc@clinic.ec", "secret-pass-123").unwrap();
        assert!(matches!(
            register_user(&conn, "doc", "doc@clinic.ec", "secret-pass-123"),
            Err(AuthError::InvalidRegistration(_))
        ));
    }

    #[test]
    fn logout_invalidates_the_session() {
        let conn = open_memory_database().unwrap();
        let (_, token) = register_user(&conn, "doc", "doc@clinic.ec", "secret-pass-123").unwrap();
        assert!(logout(&conn, &token).unwrap());
        assert!(resolve_session(&conn, &token).unwrap().is_none());
        assert!(!logout(&conn, &token).unwrap());
    }

    #[test]
    fn password_reset_distinguishes_unregistered_email() {
        let conn = open_memory_database().unwrap();
        register_user(&conn, "doc", "doc@clinic.ec", "secret-pass-123").unwrap();

        assert!(request_password_reset(&conn, "doc@clinic.ec").is_ok());
        assert!(matches!(
            request_password_reset(&conn, "ghost@clinic.ec"),
            Err(AuthError::EmailNotRegistered)
        ));
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("doc@clinic.ec"));
        assert!(is_valid_email("a.b+c@sub.domain.org"));
        assert!(!is_valid_email("doc@clinic"));
        assert!(!is_valid_email("doc clinic.ec"));
        assert!(!is_valid_email("@clinic.ec"));
    }

    #[test]
    fn tokens_are_unique_and_hash_deterministically() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(hash_token(&a), hash_token(&a));
        assert_eq!(hash_token(&a).len(), 64);
    }
}
