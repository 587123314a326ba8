use serde::{Deserialize, Serialize};

/// Prompt sent with the meal photo to the vision model.
pub const VISION_PROMPT: &str = "Carefully and comprehensively analyze the given image. \
List every visible food, fruit, drink, salt, condiment, packaged, prepared, or edible item present on any platter, plate, bowl, tray, glass, cup, or the table surface. \
Include all main dishes, sides, breads, grains, vegetables, fruits, salads, sauces, dips, garnishes, snacks, beverages, salts, spices, and any packaged or processed foods or drinks you can visually identify. \
Do not list non-edible items such as cup, glass, spoon etc.\
For each item, provide its exact name and your confidence score (0-100) of correct identification. \
Do not omit or merge similar items\u{2014}list every distinguishable edible item, even if multiple of the same type appear. \
Do not describe the scene or background, do not output in JSON, just output a clean, numbered list in this format:\n\
1. <item> - <confidence score>\n\
2. <item> - <confidence score>\n";

/// System instruction for the clinical model. Invariant across calls; the
/// worked example rows anchor the expected markdown table shape.
pub const CLINICAL_SYSTEM_PROMPT: &str = "You are MedGemma, an expert clinical nutrition and gastrointestinal dietary advisor. \
Your role is to provide clear, evidence-based dietary guidance for patients with diverticulitis, considering their current phase (flare or remission) and any other context given. \
Given a list of food, fruit, drink, or edible items\u{2014}including any regional, less-known, or international foods\u{2014}confidently classify each item as Safe, Unsafe, or Caution for this patient, based on the best medical knowledge for diverticulitis. \
For each item: \
\u{2022} Use medical evidence about fiber, fat, seeds, skin, acidity, and food preparation relevant for diverticulitis. \
\u{2022} If the food is unknown or highly regional, make your best assessment based on its ingredients or category (e.g., 'fermented rice cake' or 'local spiced pickle'). \
\u{2022} Never skip or merge items: If unsure, label as 'Caution' and explain why. \
Output as a markdown table:\n\
| Food Item | Classification | Rationale |\n\
|---|---|---|\n\
After the table, provide a clear and practical summary of overall dietary advice for this meal, tailored to diverticulitis (note if the patient is in flare or remission, if specified).\n\
Example rows:\n\
| Food Item         | Classification | Rationale |\n\
|-------------------|---------------|-----------|\n\
| White rice        | Safe          | Low in fiber, gentle on the gut, well-tolerated during flare. |\n\
| Whole wheat bread | Caution       | May be high in fiber; better tolerated in remission phase. |\n\
| Spicy mango pickle| Unsafe        | Spicy, acidic, may trigger symptoms and cause irritation. |\n\
| Ragi dosa         | Caution       | Regional, usually high in fiber; introduce slowly and monitor tolerance. |\n\
| Bael fruit juice  | Safe          | Traditionally used for digestive health, low residue. |\n\
| Gondhoraj lemon   | Caution       | Regional citrus, may aggravate symptoms if patient is sensitive to acidity. |\n\
\n\
Classify the following items for this patient:";

/// Substituted when the patient left the condition field blank.
pub const NO_CONDITION_PHRASE: &str = "no reported digestive condition or symptoms";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Builds the system + user message pair for one classification request.
/// Deterministic: the same condition and item list always produce the same
/// messages.
pub fn compose_guidance_messages(condition: &str, items: &[String]) -> Vec<ChatMessage> {
    let condition = condition.trim();
    let condition = if condition.is_empty() {
        NO_CONDITION_PHRASE
    } else {
        condition
    };
    let user_prompt = format!(
        "A patient with {condition} has the following food, fruit, and drink items detected: {}.",
        items.join(", ")
    );
    vec![
        ChatMessage::system(CLINICAL_SYSTEM_PROMPT),
        ChatMessage::user(user_prompt),
    ]
}
