//! Explanation service client.
//!
//! Sends the heatmap composite to the Gemini `generateContent` endpoint
//! and asks for a two-audience explanation of the highlighted regions.
//! Explanations are best-effort: with no API key the client produces
//! canned offline text, and any request or parse failure degrades to an
//! unavailable-service fallback. A `/predict` call never fails because
//! of this client.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use tracing::{debug, warn};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// A two-audience explanation of one screening result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explanation {
    /// Technical interpretation for clinicians.
    pub doctor: String,
    /// Plain-language interpretation for patients.
    pub patient: String,
}

/// Client for the explanation service.
pub struct ExplanationClient {
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

impl ExplanationClient {
    /// Create a client. `None` disables remote calls entirely.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            model: "gemini-2.5-flash".to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the model name.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Explain one screening result given its heatmap composite PNG.
    pub async fn explain(&self, png: &[u8], prediction: &str, confidence: f32) -> Explanation {
        let Some(key) = self.api_key.as_deref() else {
            debug!("no explanation API key, using offline text");
            return offline_explanation(prediction, confidence);
        };

        match self.request(key, png, prediction, confidence).await {
            Ok(text) => parse_explanation(&text),
            Err(err) => {
                warn!(error = %err, "explanation request failed");
                unavailable_explanation(prediction, confidence)
            }
        }
    }

    async fn request(
        &self,
        key: &str,
        png: &[u8],
        prediction: &str,
        confidence: f32,
    ) -> std::result::Result<String, String> {
        let url = format!("{API_BASE}/{}:generateContent?key={key}", self.model);
        let body = json!({
            "contents": [{
                "parts": [
                    { "text": prompt(prediction, confidence) },
                    { "inline_data": { "mime_type": "image/png", "data": BASE64.encode(png) } },
                ]
            }]
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?;

        let payload: Value = response.json().await.map_err(|e| e.to_string())?;
        let text = payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| "response carries no text part".to_string())?;
        if text.is_empty() {
            return Err("empty response text".to_string());
        }
        Ok(text.to_string())
    }
}

fn prompt(prediction: &str, confidence: f32) -> String {
    format!(
        "You are a medical assistant AI. I will provide you:\n\
         1. A chest X-ray image with an overlaid Grad-CAM heatmap.\n\
         2. The model's prediction: {prediction}\n\
         3. The confidence score: {confidence:.3}\n\n\
         Your task:\n\
         - Explain what the highlighted regions in the heatmap mean, in simple language.\n\
         - Relate those highlighted areas to possible tuberculosis indicators or normal \
         structures in the lungs.\n\
         - Provide two levels of explanation:\n\
           (a) For doctors: a more technical interpretation of why the model focused on \
         those lung regions.\n\
           (b) For patients: a simple, reassuring explanation of what the highlighted \
         regions suggest, without technical jargon.\n\
         - If confidence is low (below 0.7), clearly say that the result may not be \
         reliable and that further medical examination is needed.\n\
         - Keep the tone professional, clear, and supportive.\n\n\
         Please respond in this exact JSON format:\n\
         {{\"explanation_doctor\": \"technical explanation here\", \
         \"explanation_patient\": \"simple explanation here\"}}"
    )
}

/// Recover the two sections from whatever shape the model answered in:
/// a JSON object, a JSON object buried in prose, labeled prose sections,
/// or as a last resort the full text for both audiences.
fn parse_explanation(text: &str) -> Explanation {
    if let Some(parsed) = parse_json_object(text) {
        return parsed;
    }

    // JSON buried in surrounding prose or markdown fences.
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Some(parsed) = parse_json_object(&text[start..=end]) {
                return parsed;
            }
        }
    }

    if let Some((_, after)) = text.split_once("For doctors:") {
        if let Some((doctor, patient)) = after.split_once("For patients:") {
            return Explanation {
                doctor: doctor.trim().to_string(),
                patient: patient.trim().to_string(),
            };
        }
    }

    Explanation {
        doctor: text.to_string(),
        patient: text.to_string(),
    }
}

fn parse_json_object(candidate: &str) -> Option<Explanation> {
    let value: Value = serde_json::from_str(candidate).ok()?;
    let doctor = value.get("explanation_doctor")?.as_str()?;
    let patient = value.get("explanation_patient")?.as_str()?;
    Some(Explanation {
        doctor: doctor.to_string(),
        patient: patient.to_string(),
    })
}

fn offline_explanation(prediction: &str, confidence: f32) -> Explanation {
    let percent = confidence * 100.0;
    Explanation {
        doctor: format!(
            "Grad-CAM heatmap analysis for {prediction} prediction (confidence: \
             {percent:.1}%). Highlighted regions indicate areas of high model attention, \
             potentially corresponding to pulmonary opacities, consolidation patterns, or \
             cavitary lesions consistent with tuberculosis. Correlate these findings with \
             clinical presentation and consider additional imaging if confidence is low."
        ),
        patient: format!(
            "The AI analysis shows {} findings with {percent:.1}% confidence. The colored \
             areas highlight regions where the AI detected patterns that may indicate \
             tuberculosis. Please consult with your healthcare provider for proper \
             diagnosis and treatment planning.",
            prediction.to_lowercase()
        ),
    }
}

fn unavailable_explanation(prediction: &str, confidence: f32) -> Explanation {
    let percent = confidence * 100.0;
    Explanation {
        doctor: format!(
            "Grad-CAM analysis for {prediction} (confidence: {percent:.1}%). AI \
             explanation service temporarily unavailable. Correlate heatmap findings with \
             clinical presentation."
        ),
        patient: format!(
            "The AI analysis indicates {} with {percent:.1}% confidence. Please consult \
             your healthcare provider for proper medical evaluation and diagnosis.",
            prediction.to_lowercase()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let text = r#"{"explanation_doctor": "apical opacity", "explanation_patient": "a bright spot"}"#;
        let parsed = parse_explanation(text);
        assert_eq!(parsed.doctor, "apical opacity");
        assert_eq!(parsed.patient, "a bright spot");
    }

    #[test]
    fn test_parse_json_wrapped_in_prose() {
        let text = "Here is my analysis:\n```json\n{\"explanation_doctor\": \"d\", \
                    \"explanation_patient\": \"p\"}\n```\nHope this helps.";
        let parsed = parse_explanation(text);
        assert_eq!(parsed.doctor, "d");
        assert_eq!(parsed.patient, "p");
    }

    #[test]
    fn test_parse_labeled_sections() {
        let text = "For doctors: upper-lobe consolidation drives the score.\n\
                    For patients: the bright area is what the AI looked at.";
        let parsed = parse_explanation(text);
        assert_eq!(parsed.doctor, "upper-lobe consolidation drives the score.");
        assert_eq!(parsed.patient, "the bright area is what the AI looked at.");
    }

    #[test]
    fn test_parse_unstructured_text_duplicates() {
        let text = "The model attended to the left upper lobe.";
        let parsed = parse_explanation(text);
        assert_eq!(parsed.doctor, text);
        assert_eq!(parsed.patient, text);
    }

    #[test]
    fn test_parse_json_missing_key_falls_through() {
        // Valid JSON but the wrong shape: treated as unstructured text.
        let text = r#"{"summary": "whatever"}"#;
        let parsed = parse_explanation(text);
        assert_eq!(parsed.doctor, text);
        assert_eq!(parsed.patient, text);
    }

    #[test]
    fn test_offline_explanation_mentions_prediction() {
        let explanation = offline_explanation("Tuberculosis", 0.92);
        assert!(explanation.doctor.contains("Tuberculosis"));
        assert!(explanation.doctor.contains("92.0%"));
        assert!(explanation.patient.contains("tuberculosis"));
    }

    #[tokio::test]
    async fn test_explain_without_key_is_offline() {
        let client = ExplanationClient::new(None);
        let explanation = client.explain(b"png", "Normal", 0.5).await;
        assert!(explanation.doctor.contains("Normal"));
        assert!(explanation.patient.contains("normal"));
    }
}
