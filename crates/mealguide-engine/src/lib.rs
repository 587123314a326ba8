use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};

use mealguide_contracts::guidance::ChatMessage;
use mealguide_contracts::metrics::{InferenceMetrics, ResponseShape};

pub mod session;

pub const DEFAULT_HOST: &str = "http://localhost:11434";
pub const DEFAULT_VISION_MODEL: &str = "gemma3:12b";
pub const DEFAULT_CLINICAL_MODEL: &str = "hf.co/unsloth/medgemma-4b-it-GGUF:Q4_K_M";

/// Vision calls are short-lived; the clinical model stays warm longer so a
/// corrected resubmission does not pay the load cost again.
pub const DEFAULT_VISION_KEEP_ALIVE: &str = "60s";
pub const DEFAULT_CLINICAL_KEEP_ALIVE: &str = "120s";

/// Explicit client configuration: the inference host and the two model
/// identifiers, plus how long the server should keep each model resident
/// after a call. Models are never explicitly unloaded; they age out when
/// the keep-alive window lapses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OllamaConfig {
    pub host: String,
    pub vision_model: String,
    pub clinical_model: String,
    pub vision_keep_alive: String,
    pub clinical_keep_alive: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            clinical_model: DEFAULT_CLINICAL_MODEL.to_string(),
            vision_keep_alive: DEFAULT_VISION_KEEP_ALIVE.to_string(),
            clinical_keep_alive: DEFAULT_CLINICAL_KEEP_ALIVE.to_string(),
        }
    }
}

/// Result of one inference call, distinguishing "the call worked" from the
/// two ways it can fail. Callers that want the original degrade-to-empty
/// behavior use [`InferenceOutcome::text`] and [`InferenceOutcome::metrics`],
/// which collapse failures to empty text and all-absent metrics.
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceOutcome {
    Success {
        text: String,
        metrics: InferenceMetrics,
    },
    /// The request never produced an HTTP response (connect, timeout,
    /// request build).
    TransportFailure(String),
    /// The server answered, but with a non-success status or a body that
    /// was not valid JSON.
    ServerFailure(String),
}

impl InferenceOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Success { text, .. } => text.as_str(),
            _ => "",
        }
    }

    pub fn metrics(&self) -> InferenceMetrics {
        match self {
            Self::Success { metrics, .. } => metrics.clone(),
            _ => InferenceMetrics::absent(),
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::TransportFailure(cause) | Self::ServerFailure(cause) => Some(cause.as_str()),
        }
    }
}

/// Blocking client for the two inference endpoints.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    config: OllamaConfig,
    http: HttpClient,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            config,
            http: HttpClient::new(),
        }
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Sends the meal photo (base64 JPEG) and prompt to `/api/generate`
    /// against the vision model.
    pub fn describe(&self, image_base64: &str, prompt: &str) -> InferenceOutcome {
        let payload = build_generate_payload(&self.config, prompt, image_base64);
        self.post(&self.endpoint("/api/generate"), &payload, ResponseShape::Completion)
    }

    /// Sends the classification exchange to `/api/chat` against the
    /// clinical model.
    pub fn classify(&self, messages: &[ChatMessage]) -> InferenceOutcome {
        let payload = build_chat_payload(&self.config, messages);
        self.post(&self.endpoint("/api/chat"), &payload, ResponseShape::Chat)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.host.trim_end_matches('/'), path)
    }

    fn post(&self, endpoint: &str, payload: &Value, shape: ResponseShape) -> InferenceOutcome {
        let response = match self.http.post(endpoint).json(payload).send() {
            Ok(response) => response,
            Err(err) => {
                return InferenceOutcome::TransportFailure(format!(
                    "request to {endpoint} failed: {err}"
                ))
            }
        };
        let status = response.status();
        let body = match response.text() {
            Ok(body) => body,
            Err(err) => {
                return InferenceOutcome::TransportFailure(format!(
                    "response body read failed ({endpoint}): {err}"
                ))
            }
        };
        if !status.is_success() {
            return InferenceOutcome::ServerFailure(format!(
                "{endpoint} returned {}: {}",
                status.as_u16(),
                truncate_text(&body, 512)
            ));
        }
        match serde_json::from_str::<Value>(&body) {
            Ok(parsed) => outcome_from_payload(&parsed, shape),
            Err(err) => InferenceOutcome::ServerFailure(format!(
                "{endpoint} returned invalid JSON: {err}"
            )),
        }
    }
}

/// Body for `/api/generate`: single-turn prompt plus the image payload.
pub fn build_generate_payload(config: &OllamaConfig, prompt: &str, image_base64: &str) -> Value {
    json!({
        "model": config.vision_model,
        "prompt": prompt,
        "images": [image_base64],
        "stream": false,
        "keep_alive": config.vision_keep_alive,
    })
}

/// Body for `/api/chat`: the ordered message sequence.
pub fn build_chat_payload(config: &OllamaConfig, messages: &[ChatMessage]) -> Value {
    json!({
        "model": config.clinical_model,
        "messages": messages,
        "stream": false,
        "keep_alive": config.clinical_keep_alive,
    })
}

/// Maps a parsed server payload to an outcome. Generated text missing from
/// the payload is still a success with empty text; only transport and
/// server faults are failures.
pub fn outcome_from_payload(payload: &Value, shape: ResponseShape) -> InferenceOutcome {
    let metrics = InferenceMetrics::from_response(payload, shape);
    InferenceOutcome::Success {
        text: metrics.response_text.clone().unwrap_or_default(),
        metrics,
    }
}

/// Re-encodes the image as a self-contained base64 JPEG for the `images`
/// field of the generate payload.
pub fn encode_jpeg_base64(image: &DynamicImage) -> Result<String> {
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, 90);
    encoder
        .encode_image(&DynamicImage::ImageRgb8(image.to_rgb8()))
        .context("failed encoding meal image as JPEG")?;
    Ok(BASE64.encode(bytes))
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn generate_payload_has_the_wire_shape() {
        let config = OllamaConfig::default();
        let payload = build_generate_payload(&config, "list the food", "aGVsbG8=");
        assert_eq!(payload["model"], json!(DEFAULT_VISION_MODEL));
        assert_eq!(payload["prompt"], json!("list the food"));
        assert_eq!(payload["images"], json!(["aGVsbG8="]));
        assert_eq!(payload["stream"], json!(false));
        assert_eq!(payload["keep_alive"], json!("60s"));
    }

    #[test]
    fn chat_payload_serializes_messages_in_order() {
        let config = OllamaConfig::default();
        let messages = vec![
            ChatMessage::system("instructions"),
            ChatMessage::user("classify: Rice"),
        ];
        let payload = build_chat_payload(&config, &messages);
        assert_eq!(payload["model"], json!(DEFAULT_CLINICAL_MODEL));
        assert_eq!(payload["keep_alive"], json!("120s"));
        assert_eq!(payload["messages"][0]["role"], json!("system"));
        assert_eq!(payload["messages"][1]["content"], json!("classify: Rice"));
    }

    #[test]
    fn outcome_carries_text_and_metrics_on_success() {
        let payload = json!({
            "response": "1. Rice - 90",
            "eval_count": 30,
            "eval_duration": 1_000_000_000u64,
        });
        let outcome = outcome_from_payload(&payload, ResponseShape::Completion);
        assert!(outcome.is_success());
        assert_eq!(outcome.text(), "1. Rice - 90");
        assert_eq!(outcome.metrics().tokens_per_second, Some(30.0));
    }

    #[test]
    fn empty_payload_is_success_with_empty_text() {
        let outcome = outcome_from_payload(&json!({}), ResponseShape::Chat);
        assert!(outcome.is_success());
        assert_eq!(outcome.text(), "");
        assert_eq!(outcome.metrics(), InferenceMetrics::absent());
    }

    #[test]
    fn failures_degrade_to_empty_text_and_absent_metrics() {
        let outcome = InferenceOutcome::TransportFailure("connection refused".to_string());
        assert!(!outcome.is_success());
        assert_eq!(outcome.text(), "");
        assert_eq!(outcome.metrics(), InferenceMetrics::absent());
        assert_eq!(outcome.failure(), Some("connection refused"));

        let outcome = InferenceOutcome::ServerFailure("returned 500".to_string());
        assert_eq!(outcome.text(), "");
        assert_eq!(outcome.failure(), Some("returned 500"));
    }

    #[test]
    fn encode_jpeg_base64_produces_a_jpeg() -> Result<()> {
        let image = DynamicImage::ImageRgb8(image::RgbImage::new(4, 4));
        let encoded = encode_jpeg_base64(&image)?;
        let bytes = BASE64.decode(encoded)?;
        // JPEG SOI marker
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        Ok(())
    }

    #[test]
    fn truncate_text_caps_long_bodies() {
        assert_eq!(truncate_text("short", 512), "short");
        let long = "x".repeat(600);
        let truncated = truncate_text(&long, 512);
        assert_eq!(truncated.chars().count(), 513);
        assert!(truncated.ends_with('…'));
    }
}
