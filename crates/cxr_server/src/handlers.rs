//! Request handlers.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use rand::Rng;
use serde_json::{json, Value};
use tracing::{error, info};

use cxr_imaging::save_heatmap;

use crate::state::AppState;
use crate::PredictResponse;

/// Handler error: an HTTP status and a `{"detail": ...}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

/// `GET /health`: liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `POST /predict`: screen an uploaded chest X-ray.
///
/// Expects a multipart form with an `image` field carrying an `image/*`
/// content type. Returns the prediction, the saved heatmap's URL, and
/// the two-audience explanation.
pub async fn predict(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<PredictResponse>, ApiError> {
    let mut image_bytes = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let is_image = field
            .content_type()
            .is_some_and(|ct| ct.starts_with("image/"));
        if !is_image {
            return Err(ApiError::bad_request(
                "Invalid file type. Please upload an image.",
            ));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {e}")))?;
        image_bytes = Some(bytes);
        break;
    }

    let bytes = image_bytes.ok_or_else(|| ApiError::bad_request("Missing 'image' field."))?;
    if bytes.is_empty() {
        return Err(ApiError::bad_request("Empty file uploaded."));
    }

    // The screening pass is CPU-heavy and synchronous; keep it off the
    // async runtime and serialized behind the screener mutex.
    let screener = state.screener.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let screener = screener.lock().unwrap_or_else(|p| p.into_inner());
        screener.screen(&bytes)
    })
    .await
    .map_err(|e| ApiError::internal(format!("Screening task failed: {e}")))?
    .map_err(|e| ApiError::internal(format!("Prediction failed: {e}")))?;

    let filename = heatmap_filename();
    let path = state.heatmap_dir.join(&filename);
    save_heatmap(&outcome.heatmap, &path, Some(&outcome.original), state.alpha).map_err(|e| {
        error!(error = %e, "failed to save heatmap");
        ApiError::internal(format!("Failed to save heatmap: {e}"))
    })?;

    // The explainer sees the same composite the frontend will display.
    let composite = tokio::fs::read(&path)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to read heatmap: {e}")))?;
    let explanation = state
        .explainer
        .explain(&composite, &outcome.prediction.label, outcome.prediction.confidence)
        .await;

    info!(
        prediction = %outcome.prediction.label,
        confidence = outcome.prediction.confidence,
        heatmap = %filename,
        "screening complete"
    );

    Ok(Json(PredictResponse {
        prediction: outcome.prediction.label,
        confidence: round2(outcome.prediction.confidence),
        heatmap_url: format!("/static/heatmaps/{filename}"),
        explanation: explanation.doctor.clone(),
        explanation_doctor: explanation.doctor,
        explanation_patient: explanation.patient,
    }))
}

/// Timestamped heatmap filename with a random suffix against same-second
/// collisions.
fn heatmap_filename() -> String {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let suffix: u32 = rand::thread_rng().gen_range(0..0x100_0000);
    format!("heatmap_{stamp}_{suffix:06x}.png")
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{router, AppState, ExplanationClient, Screener, ServerConfig};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[test]
    fn test_heatmap_filename_shape() {
        let name = heatmap_filename();
        assert!(name.starts_with("heatmap_"));
        assert!(name.ends_with(".png"));
        // heatmap_YYYYmmdd_HHMMSS_xxxxxx.png
        let parts: Vec<&str> = name
            .trim_start_matches("heatmap_")
            .trim_end_matches(".png")
            .split('_')
            .collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1].len(), 6);
        assert_eq!(parts[2].len(), 6);
    }

    #[test]
    fn test_heatmap_filenames_are_distinct() {
        let a = heatmap_filename();
        let b = heatmap_filename();
        // Random suffix keeps same-second names apart.
        assert_ne!(a, b);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(0.9149), 0.91);
        assert_eq!(round2(0.915), 0.92);
        assert_eq!(round2(1.0), 1.0);
    }

    #[test]
    fn test_api_error_status() {
        let response = ApiError::bad_request("nope").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = ApiError::internal("boom").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    // The `TempDir` cleans the static directory up when the test drops it.
    fn test_app() -> (axum::Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(
            Screener::untrained(),
            ExplanationClient::new(None),
            dir.path().join("heatmaps"),
            0.45,
        );
        let config = ServerConfig::default().with_static_dir(dir.path());
        (router(&config, state), dir)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _dir) = test_app();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_predict_rejects_non_image_field() {
        let body = concat!(
            "--boundary\r\n",
            "Content-Disposition: form-data; name=\"image\"; filename=\"a.txt\"\r\n",
            "Content-Type: text/plain\r\n\r\n",
            "hello\r\n",
            "--boundary--\r\n",
        );
        let request = Request::post("/predict")
            .header("content-type", "multipart/form-data; boundary=boundary")
            .body(Body::from(body))
            .unwrap();

        let (app, _dir) = test_app();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_predict_rejects_missing_field() {
        let body = "--boundary\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nx\r\n--boundary--\r\n";
        let request = Request::post("/predict")
            .header("content-type", "multipart/form-data; boundary=boundary")
            .body(Body::from(body))
            .unwrap();

        let (app, _dir) = test_app();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
