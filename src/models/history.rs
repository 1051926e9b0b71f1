use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::enums::Diagnosis;

/// A persisted diagnosis outcome: one user, one image, one verdict.
/// Create-once, read-many, delete-once; there is no update path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub user_id: i64,
    /// Username of the requesting clinician, joined in for display and
    /// report rendering.
    pub username: String,
    pub image_id: i64,
    /// Blob key: `sha256(original filename)` hex + the original extension.
    /// The blob content is the annotated JPEG; the original pixels are not
    /// retained.
    pub storage_key: String,
    pub paciente_nombre: String,
    pub grupo: Diagnosis,
    /// Confidence percentage, 0..=100, two-decimal precision.
    pub porcentaje: f64,
    /// Upload timestamp converted to the fixed local zone at creation time.
    pub fecha_imagen: DateTime<FixedOffset>,
}

impl HistoryRecord {
    /// Record number as printed on reports: zero-padded to six digits.
    pub fn numero(&self) -> String {
        format!("{:06}", self.id)
    }
}

/// Aggregate view over a set of history records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryStats {
    pub total: i64,
    pub promedio_confianza: f64,
    pub hernias: i64,
    pub sin_hernias: i64,
    pub porcentaje_hernias: f64,
}
