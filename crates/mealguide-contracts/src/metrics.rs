use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where the generated text lives in an Ollama response.
///
/// `/api/generate` puts it at the top-level `response` key;
/// `/api/chat` nests it under `message.content`. The timing and
/// token counters sit at the top level in both shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    Completion,
    Chat,
}

/// Counters reported by the inference server for one call.
///
/// Every field is optional: the server may omit any of them, and a
/// failed call yields the all-absent record from [`InferenceMetrics::absent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct InferenceMetrics {
    pub total_duration_ns: Option<u64>,
    pub load_duration_ns: Option<u64>,
    pub prompt_eval_count: Option<u64>,
    pub prompt_eval_duration_ns: Option<u64>,
    pub eval_count: Option<u64>,
    pub eval_duration_ns: Option<u64>,
    pub tokens_per_second: Option<f64>,
    pub response_text: Option<String>,
}

impl InferenceMetrics {
    /// The record logged when a call failed before producing a response.
    pub fn absent() -> Self {
        Self::default()
    }

    /// Pulls the metric fields out of a raw server response. Missing or
    /// mistyped fields become `None`; this never fails.
    pub fn from_response(payload: &Value, shape: ResponseShape) -> Self {
        let eval_count = field_u64(payload, "eval_count");
        let eval_duration_ns = field_u64(payload, "eval_duration");
        let response_text = match shape {
            ResponseShape::Completion => payload
                .get("response")
                .and_then(Value::as_str)
                .map(str::to_string),
            ResponseShape::Chat => payload
                .get("message")
                .and_then(|message| message.get("content"))
                .and_then(Value::as_str)
                .map(str::to_string),
        };
        Self {
            total_duration_ns: field_u64(payload, "total_duration"),
            load_duration_ns: field_u64(payload, "load_duration"),
            prompt_eval_count: field_u64(payload, "prompt_eval_count"),
            prompt_eval_duration_ns: field_u64(payload, "prompt_eval_duration"),
            eval_count,
            eval_duration_ns,
            tokens_per_second: tokens_per_second(eval_count, eval_duration_ns),
            response_text,
        }
    }
}

fn field_u64(payload: &Value, key: &str) -> Option<u64> {
    payload.get(key).and_then(Value::as_u64)
}

fn tokens_per_second(eval_count: Option<u64>, eval_duration_ns: Option<u64>) -> Option<f64> {
    match (eval_count, eval_duration_ns) {
        (Some(count), Some(duration_ns)) if duration_ns > 0 => {
            Some(count as f64 / (duration_ns as f64 / 1e9))
        }
        _ => None,
    }
}
