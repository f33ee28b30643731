//! Shared per-request state.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::explain::ExplanationClient;
use crate::screener::Screener;

/// State handed to every handler.
///
/// The screener sits behind a mutex: a screening pass runs a
/// forward/backward/capture sequence that must not interleave with
/// another request against the same model instance.
#[derive(Clone)]
pub struct AppState {
    /// The classifier and attribution pipeline.
    pub screener: Arc<Mutex<Screener>>,
    /// Explanation service client.
    pub explainer: Arc<ExplanationClient>,
    /// Directory heatmap composites are written to.
    pub heatmap_dir: PathBuf,
    /// Blend weight of the colorized heatmap over the original scan.
    pub alpha: f32,
}

impl AppState {
    /// Assemble the state shared across requests.
    pub fn new(
        screener: Screener,
        explainer: ExplanationClient,
        heatmap_dir: PathBuf,
        alpha: f32,
    ) -> Self {
        Self {
            screener: Arc::new(Mutex::new(screener)),
            explainer: Arc::new(explainer),
            heatmap_dir,
            alpha,
        }
    }
}
