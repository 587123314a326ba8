use anyhow::Result;
use image::DynamicImage;
use uuid::Uuid;

use mealguide_contracts::guidance::{
    compose_guidance_messages, ChatMessage, NO_CONDITION_PHRASE, VISION_PROMPT,
};
use mealguide_contracts::items::{DetectionResult, ItemList};
use mealguide_contracts::metrics::InferenceMetrics;
use mealguide_contracts::metrics_log::{MetricsLogRow, MetricsLogger};

use crate::{encode_jpeg_base64, InferenceOutcome, OllamaClient};

/// Image reference logged when the photo has no usable filesystem path.
pub const UNKNOWN_IMAGE_REF: &str = "N/A";

/// State for one meal analysis: detect, review/correct (repeatable), then
/// one guidance request. Everything the pipeline stages need travels on
/// this one object instead of being threaded through callbacks.
#[derive(Debug, Clone)]
pub struct MealSession {
    id: Uuid,
    condition: String,
    image_ref: String,
    detection: Option<DetectionResult>,
    items: ItemList,
    vision_metrics: InferenceMetrics,
    transcript: Vec<ChatMessage>,
    warnings: Vec<String>,
}

impl MealSession {
    pub fn new(condition: impl Into<String>, image_ref: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            condition: condition.into(),
            image_ref: image_ref.into(),
            detection: None,
            items: ItemList::default(),
            vision_metrics: InferenceMetrics::absent(),
            transcript: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn condition(&self) -> &str {
        &self.condition
    }

    /// Condition text as it reaches the clinical model and the metrics log:
    /// the fixed no-condition phrase when the field was left blank.
    pub fn effective_condition(&self) -> &str {
        let trimmed = self.condition.trim();
        if trimmed.is_empty() {
            NO_CONDITION_PHRASE
        } else {
            trimmed
        }
    }

    pub fn image_ref(&self) -> &str {
        &self.image_ref
    }

    pub fn detection(&self) -> Option<&DetectionResult> {
        self.detection.as_ref()
    }

    pub fn items(&self) -> &ItemList {
        &self.items
    }

    pub fn vision_metrics(&self) -> &InferenceMetrics {
        &self.vision_metrics
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Runs the vision call and replaces any previous detection. With a
    /// blank condition no network call is made and the detection comes back
    /// empty, mirroring the original's short-circuit. A failed call also
    /// yields an empty detection; the cause lands in `warnings`.
    pub fn detect(&mut self, client: &OllamaClient, image: &DynamicImage) -> &DetectionResult {
        self.items = ItemList::default();
        self.vision_metrics = InferenceMetrics::absent();
        self.transcript.clear();

        if self.condition.trim().is_empty() {
            return self.detection.insert(DetectionResult::default());
        }

        let image_base64 = match encode_jpeg_base64(image) {
            Ok(encoded) => encoded,
            Err(err) => {
                self.push_warning(format!("image encoding failed: {err:#}"));
                return self.detection.insert(DetectionResult::default());
            }
        };

        let outcome = client.describe(&image_base64, VISION_PROMPT);
        if let Some(cause) = outcome.failure() {
            self.push_warning(format!("vision inference failed: {cause}"));
        }
        self.vision_metrics = outcome.metrics();
        let detection = DetectionResult::from_raw(outcome.text());
        self.items = ItemList::new(detection.items.clone());
        self.detection.insert(detection)
    }

    /// Whether the review/correction step is reachable: detection ran and
    /// found at least one item.
    pub fn review_ready(&self) -> bool {
        self.detection
            .as_ref()
            .map(|detection| !detection.is_empty())
            .unwrap_or(false)
    }

    /// Appends user-supplied additions (comma separated) that are not
    /// already on the list. Repeatable; repeating identical additions is a
    /// no-op.
    pub fn correct(&mut self, additions: &str) -> &ItemList {
        self.items.add_missing(additions);
        &self.items
    }

    /// Runs the clinical call on the corrected list, records the exchange,
    /// and appends one row to the metrics log. A failed call degrades to
    /// empty guidance text; only the log append itself can error.
    pub fn request_guidance(
        &mut self,
        client: &OllamaClient,
        logger: &MetricsLogger,
    ) -> Result<String> {
        let messages = compose_guidance_messages(&self.condition, self.items.items());
        let outcome = client.classify(&messages);
        self.record_guidance(client, logger, messages, outcome)
    }

    fn record_guidance(
        &mut self,
        client: &OllamaClient,
        logger: &MetricsLogger,
        messages: Vec<ChatMessage>,
        outcome: InferenceOutcome,
    ) -> Result<String> {
        if let Some(cause) = outcome.failure() {
            self.push_warning(format!("clinical inference failed: {cause}"));
        }
        let guidance = outcome.text().to_string();
        let med_metrics = outcome.metrics();

        self.transcript = messages;
        self.transcript.push(ChatMessage::assistant(&guidance));

        logger.append(&MetricsLogRow {
            vlm_model: client.config().vision_model.clone(),
            med_model: client.config().clinical_model.clone(),
            user_condition: self.effective_condition().to_string(),
            image_path: self.image_ref.clone(),
            vlm_metrics: self.vision_metrics.clone(),
            med_metrics,
        })?;

        Ok(guidance)
    }

    fn push_warning(&mut self, message: String) {
        if message.trim().is_empty() {
            return;
        }
        if self.warnings.iter().any(|existing| existing == &message) {
            return;
        }
        self.warnings.push(message);
    }
}
