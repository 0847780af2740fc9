//! Spread-width providers.
//!
//! The maker either uses the configured base width or asks an external
//! model for one. A model failure never stalls quoting; it falls back to the
//! base width.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{MakerConfig, PredictorConfig};

#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("Predictor request failed: {0}")]
    Request(String),

    #[error("Predictor returned invalid width: {0}")]
    InvalidWidth(f64),
}

/// Features handed to the width model
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MarketSnapshot {
    pub token_id: String,
    pub midpoint: f64,
    pub position: f64,
    pub skew: f64,
    pub skew_ratio: f64,
}

#[async_trait]
pub trait SpreadPredictor: Send + Sync {
    /// Predicted half-spread in [0, 1]
    async fn predict_width(&self, snapshot: &MarketSnapshot) -> Result<f64, PredictorError>;
}

// ======================= HTTP MODEL =======================

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    width: f64,
}

/// Posts the snapshot to a model-serving endpoint and reads `{"width": ..}`.
pub struct HttpSpreadPredictor {
    client: Client,
    url: String,
}

impl HttpSpreadPredictor {
    pub fn new(config: &PredictorConfig) -> Result<Self, PredictorError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| PredictorError::Request(e.to_string()))?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl SpreadPredictor for HttpSpreadPredictor {
    async fn predict_width(&self, snapshot: &MarketSnapshot) -> Result<f64, PredictorError> {
        let resp = self
            .client
            .post(&self.url)
            .json(snapshot)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PredictorError::Request(e.to_string()))?;
        let parsed: PredictionResponse = resp
            .json()
            .await
            .map_err(|e| PredictorError::Request(e.to_string()))?;
        validate_width(parsed.width)
    }
}

fn validate_width(width: f64) -> Result<f64, PredictorError> {
    if width.is_finite() && (0.0..=1.0).contains(&width) {
        Ok(width)
    } else {
        Err(PredictorError::InvalidWidth(width))
    }
}

// ======================= PROVIDER =======================

/// Where the base spread width comes from, chosen by configuration.
#[derive(Clone)]
pub enum WidthProvider {
    Fixed,
    Predicted(Arc<dyn SpreadPredictor>),
}

impl WidthProvider {
    /// `None` means "use the configured base width".
    pub async fn predicted_width(&self, config: &MakerConfig, snapshot: &MarketSnapshot) -> Option<f64> {
        match self {
            WidthProvider::Fixed => None,
            WidthProvider::Predicted(model) => match model.predict_width(snapshot).await {
                Ok(width) => {
                    debug!("[QUOTE] Predicted width {:.4} for {}", width, config.token_id);
                    Some(width)
                }
                Err(e) => {
                    warn!(
                        "[QUOTE] {} - falling back to base width {:.4}",
                        e, config.base_spread_width
                    );
                    None
                }
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WidthProvider::Fixed => "fixed",
            WidthProvider::Predicted(_) => "predicted",
        }
    }
}

impl std::fmt::Debug for WidthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
