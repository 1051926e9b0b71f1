use serde::{Deserialize, Serialize};

/// One polygon vertex as returned by the inference API. Coordinates arrive
/// as floats and are truncated to pixel positions when drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionPoint {
    pub x: f64,
    pub y: f64,
}

/// One detected region. Transient: predictions are consumed by the
/// annotation renderer and the extractor, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub class: String,
    /// Fraction in 0.0..=1.0 as received; scaled to a percentage on
    /// extraction.
    pub confidence: f64,
    #[serde(default)]
    pub points: Option<Vec<PredictionPoint>>,
}

impl Prediction {
    pub fn label(&self) -> String {
        format!("{} {:.2}%", self.class, self.confidence * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_formats_percentage_with_two_decimals() {
        let pred = Prediction {
            class: "Hernia".into(),
            confidence: 0.87,
            points: None,
        };
        assert_eq!(pred.label(), "Hernia 87.00%");
    }

    #[test]
    fn wire_format_tolerates_missing_points() {
        let pred: Prediction =
            serde_json::from_str(r#"{"class":"Hernia","confidence":0.5}"#).unwrap();
        assert!(pred.points.is_none());
    }
}
