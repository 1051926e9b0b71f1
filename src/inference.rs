//! External inference client.
//!
//! One synchronous-in-spirit call per upload: POST the stored image URL to
//! the configured model endpoint, parse the prediction list. No retry, no
//! fallback; every failure cause is logged here and collapses to an
//! `InferenceError` the pipeline treats uniformly.

use serde::Deserialize;
use thiserror::Error;

use crate::config::{InferenceConfig, HTTP_TIMEOUT};
use crate::models::Prediction;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Inference API key is not configured")]
    MissingApiKey,

    #[error("Inference request failed: {0}")]
    Transport(String),

    #[error("Inference API returned status {0}")]
    Status(u16),

    #[error("Inference response could not be parsed: {0}")]
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

pub struct InferenceClient {
    http: reqwest::Client,
    config: InferenceConfig,
}

impl InferenceClient {
    pub fn new(config: InferenceConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { http, config }
    }

    pub fn model_id(&self) -> &str {
        &self.config.model_id
    }

    /// Run the model against a fetchable image URL.
    pub async fn infer(&self, image_url: &str) -> Result<Vec<Prediction>, InferenceError> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            tracing::error!("Inference requested without a configured API key");
            InferenceError::MissingApiKey
        })?;

        let endpoint = format!(
            "{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.model_id
        );

        let response = self
            .http
            .post(&endpoint)
            .query(&[("api_key", api_key), ("image", image_url)])
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, endpoint = %endpoint, "Inference transport error");
                InferenceError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(
                status = status.as_u16(),
                endpoint = %endpoint,
                "Inference API rejected call"
            );
            return Err(InferenceError::Status(status.as_u16()));
        }

        let parsed: InferenceResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Inference response malformed");
            InferenceError::Malformed(e.to_string())
        })?;

        tracing::info!(
            predictions = parsed.predictions.len(),
            model = %self.config.model_id,
            "Inference completed"
        );
        Ok(parsed.predictions)
    }
}
