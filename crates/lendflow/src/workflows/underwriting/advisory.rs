use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::domain::ModelDecision;

/// Default ceiling on a single model call.
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_millis(1500);

/// Feature vector sent to the scoring model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelFeatures {
    pub income: f64,
    pub debt: f64,
    pub credit_score: u16,
    pub loan_amount: f64,
    pub dti_ratio: f64,
}

/// Raw model response. Deployed model versions disagree on field names, so
/// every field is optional and interpretation happens in the scorer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ModelPrediction {
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub probability: Option<f64>,
    #[serde(default)]
    pub approved: Option<bool>,
    #[serde(default)]
    pub decision: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model endpoint unreachable: {0}")]
    Transport(String),
    #[error("model returned an unusable payload")]
    Malformed,
}

/// Transport seam for the scoring model.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn predict(&self, features: &ModelFeatures) -> Result<ModelPrediction, ModelError>;
}

/// HTTP client for the scoring service's `/predict` endpoint.
pub struct HttpModelClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpModelClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn predict(&self, features: &ModelFeatures) -> Result<ModelPrediction, ModelError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(features)
            .send()
            .await
            .map_err(|error| ModelError::Transport(error.to_string()))?;
        if !response.status().is_success() {
            return Err(ModelError::Transport(format!(
                "model endpoint returned {}",
                response.status()
            )));
        }
        response
            .json::<ModelPrediction>()
            .await
            .map_err(|_| ModelError::Malformed)
    }
}

/// Normalized advisory verdict attached to the application at intake.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdvisoryScore {
    pub score: f64,
    pub decision: ModelDecision,
}

/// Scores applications through the model when one is configured, falling
/// back to a deterministic credit-and-DTI estimate on any failure. Scoring
/// never blocks intake: the call is advisory and bounded by a timeout.
pub struct AdvisoryScorer {
    client: Option<Arc<dyn ModelClient>>,
    timeout: Duration,
}

impl AdvisoryScorer {
    pub fn new(client: Arc<dyn ModelClient>, timeout: Duration) -> Self {
        Self {
            client: Some(client),
            timeout,
        }
    }

    /// Scorer with no model endpoint; every request takes the fallback path.
    pub fn offline() -> Self {
        Self {
            client: None,
            timeout: DEFAULT_MODEL_TIMEOUT,
        }
    }

    pub async fn score(&self, features: &ModelFeatures) -> AdvisoryScore {
        if let Some(client) = &self.client {
            match tokio::time::timeout(self.timeout, client.predict(features)).await {
                Ok(Ok(prediction)) => {
                    if let Some(advisory) = Self::interpret(&prediction) {
                        return advisory;
                    }
                    tracing::warn!("model response unusable, falling back to heuristic score");
                }
                Ok(Err(error)) => {
                    tracing::warn!(%error, "model call failed, falling back to heuristic score");
                }
                Err(_) => {
                    tracing::warn!(
                        timeout_ms = self.timeout.as_millis() as u64,
                        "model call timed out, falling back to heuristic score"
                    );
                }
            }
        }
        Self::fallback(features)
    }

    /// Maps a raw prediction onto the normalized `[0, 1]` scale, trusting an
    /// explicit decision label when the model sends one.
    fn interpret(prediction: &ModelPrediction) -> Option<AdvisoryScore> {
        let raw = prediction
            .score
            .or(prediction.probability)
            .or_else(|| prediction.approved.map(|ok| if ok { 1.0 } else { 0.0 }))?;
        if !raw.is_finite() {
            return None;
        }
        let score = Self::normalize_score(raw);
        let decision = prediction
            .decision
            .as_deref()
            .and_then(ModelDecision::parse)
            .unwrap_or_else(|| ModelDecision::from_score(score));
        Some(AdvisoryScore { score, decision })
    }

    /// Percentages land on `[0, 1]`; anything above 100 saturates at 1.
    fn normalize_score(raw: f64) -> f64 {
        if raw > 100.0 {
            1.0
        } else if raw > 1.0 {
            raw / 100.0
        } else {
            raw.clamp(0.0, 1.0)
        }
    }

    /// Deterministic estimate weighting credit history over indebtedness.
    fn fallback(features: &ModelFeatures) -> AdvisoryScore {
        let credit = ((f64::from(features.credit_score) - 300.0) / 550.0).clamp(0.0, 1.0);
        let headroom = (1.0 - features.dti_ratio).clamp(0.0, 1.0);
        let score = (0.7 * credit + 0.3 * headroom).clamp(0.0, 1.0);
        AdvisoryScore {
            score,
            decision: ModelDecision::from_score(score),
        }
    }
}
