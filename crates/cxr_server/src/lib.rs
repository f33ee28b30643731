//! # cxr_server
//!
//! HTTP screening service: upload a chest X-ray, get back the predicted
//! class, a Grad-CAM heatmap URL, and explanations for two audiences.
//!
//! # Endpoints
//!
//! - `POST /predict` - multipart upload under the `image` field
//! - `GET /health` - liveness probe
//! - `GET /static/...` - saved heatmap composites
//!
//! # Example
//!
//! ```ignore
//! use cxr_server::{run, Screener, ServerConfig};
//!
//! let screener = Screener::untrained();
//! run(ServerConfig::default(), screener).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod explain;
mod handlers;
mod screener;
mod state;

pub use explain::{Explanation, ExplanationClient};
pub use handlers::{health, predict};
pub use screener::{ScreenBackend, ScreenOutcome, Screener};
pub use state::AppState;

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("bind error: {0}")]
    Bind(String),

    /// Filesystem failure while preparing or serving heatmaps.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Upload could not be decoded or preprocessed.
    #[error("imaging error: {0}")]
    Imaging(#[from] cxr_imaging::ImagingError),

    /// Classifier failure.
    #[error("model error: {0}")]
    Model(#[from] cxr_models::ModelError),

    /// Attribution failure that the engine does not absorb.
    #[error("attribution error: {0}")]
    Explain(#[from] cxr_explain::ExplainError),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address.
    pub address: SocketAddr,
    /// Directory served under `/static`; heatmaps land in its
    /// `heatmaps/` subdirectory.
    pub static_dir: PathBuf,
    /// Blend weight of the colorized heatmap over the original scan.
    pub alpha: f32,
    /// Explanation service API key. `None` runs with canned offline
    /// explanations.
    pub api_key: Option<String>,
    /// Explanation model name.
    pub explanation_model: String,
    /// Enable permissive CORS for browser frontends.
    pub cors_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8000".parse().expect("valid literal address"),
            static_dir: PathBuf::from("static"),
            alpha: 0.45,
            api_key: None,
            explanation_model: "gemini-2.5-flash".to_string(),
            cors_enabled: true,
        }
    }
}

impl ServerConfig {
    /// Set the listen address.
    #[must_use]
    pub fn with_address(mut self, address: SocketAddr) -> Self {
        self.address = address;
        self
    }

    /// Set the static file directory.
    #[must_use]
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = dir.into();
        self
    }

    /// Set the heatmap blend weight.
    #[must_use]
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the explanation service API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the explanation model name.
    #[must_use]
    pub fn with_explanation_model(mut self, model: impl Into<String>) -> Self {
        self.explanation_model = model.into();
        self
    }

    /// Disable CORS.
    #[must_use]
    pub fn without_cors(mut self) -> Self {
        self.cors_enabled = false;
        self
    }
}

/// Response body of `POST /predict`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    /// Predicted class name.
    pub prediction: String,
    /// Confidence of the predicted class, rounded to two decimals.
    pub confidence: f32,
    /// URL of the saved heatmap composite, relative to the server root.
    pub heatmap_url: String,
    /// Legacy alias of `explanation_doctor`, kept for older frontends.
    pub explanation: String,
    /// Technical explanation aimed at clinicians.
    pub explanation_doctor: String,
    /// Plain-language explanation aimed at patients.
    pub explanation_patient: String,
}

/// Build the service router.
pub fn router(config: &ServerConfig, state: AppState) -> Router {
    let mut router = Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .with_state(state);

    if config.cors_enabled {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
}

/// Run the screening server until the listener fails.
pub async fn run(config: ServerConfig, screener: Screener) -> Result<()> {
    let heatmap_dir = config.static_dir.join("heatmaps");
    std::fs::create_dir_all(&heatmap_dir)?;

    let explainer = ExplanationClient::new(config.api_key.clone())
        .with_model(config.explanation_model.clone());
    let state = AppState::new(screener, explainer, heatmap_dir, config.alpha);

    let app = router(&config, state);
    let listener = tokio::net::TcpListener::bind(config.address)
        .await
        .map_err(|e| ServerError::Bind(e.to_string()))?;
    info!(address = %config.address, "screening server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.address.port(), 8000);
        assert!((config.alpha - 0.45).abs() < f32::EPSILON);
        assert!(config.api_key.is_none());
        assert!(config.cors_enabled);
    }

    #[test]
    fn test_config_builders() {
        let addr: SocketAddr = "0.0.0.0:9000".parse().unwrap();
        let config = ServerConfig::default()
            .with_address(addr)
            .with_static_dir("/tmp/cxr-static")
            .with_alpha(0.3)
            .with_api_key("key-123")
            .without_cors();

        assert_eq!(config.address.port(), 9000);
        assert_eq!(config.static_dir, PathBuf::from("/tmp/cxr-static"));
        assert!((config.alpha - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.api_key.as_deref(), Some("key-123"));
        assert!(!config.cors_enabled);
    }

    #[test]
    fn test_predict_response_serialize() {
        let response = PredictResponse {
            prediction: "Tuberculosis".to_string(),
            confidence: 0.91,
            heatmap_url: "/static/heatmaps/heatmap_20260101_000000_ab12cd.png".to_string(),
            explanation: "doctor text".to_string(),
            explanation_doctor: "doctor text".to_string(),
            explanation_patient: "patient text".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"prediction\":\"Tuberculosis\""));
        assert!(json.contains("heatmap_url"));
        assert!(json.contains("explanation_patient"));
    }
}
