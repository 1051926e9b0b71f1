//! Verdict extraction: reduce a prediction list to the stored outcome.
//!
//! The policy is first-match, not best-match: only the first element of
//! the list is consulted, whatever the confidence of later entries. Tests
//! pin this position bias.

use crate::models::{Diagnosis, Prediction};

/// Sentinel label reported when the model returns no predictions.
pub const NOT_FOUND_LABEL: &str = "Predicción no encontrada";

#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Verdict {
        diagnosis: Diagnosis,
        /// Percentage, 0..=100, rounded to two decimals.
        porcentaje: f64,
    },
    /// Empty prediction list. Cannot be persisted: the history schema only
    /// admits the two-value diagnosis enumeration, so the upload pipeline
    /// aborts with a validation error instead.
    NotFound,
}

impl Extraction {
    pub fn label(&self) -> &str {
        match self {
            Self::Verdict { diagnosis, .. } => diagnosis.as_str(),
            Self::NotFound => NOT_FOUND_LABEL,
        }
    }

    pub fn porcentaje(&self) -> f64 {
        match self {
            Self::Verdict { porcentaje, .. } => *porcentaje,
            Self::NotFound => 0.0,
        }
    }
}

/// Extract the verdict from a prediction list.
pub fn extract(predictions: &[Prediction]) -> Extraction {
    let Some(first) = predictions.first() else {
        return Extraction::NotFound;
    };

    let porcentaje = (first.confidence * 100.0 * 100.0).round() / 100.0;
    Extraction::Verdict {
        diagnosis: Diagnosis::from_class_token(&first.class),
        porcentaje,
    }
}
