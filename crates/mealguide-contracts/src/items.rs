use serde::{Deserialize, Serialize};

/// One detect request's worth of vision output: the raw model text and
/// the item names extracted from it, in the order the model produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DetectionResult {
    pub raw_text: String,
    pub items: Vec<String>,
}

impl DetectionResult {
    pub fn from_raw(raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        let items = parse_detected_items(&raw_text);
        Self { raw_text, items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Extracts item names from the vision model's numbered list.
///
/// Expected line format is `<n>. <item> - <confidence>`, but nothing is
/// guaranteed: a line contributes an item only when it contains both a
/// period and a hyphen, the name being the trimmed text between the first
/// period and the first hyphen. Everything else is skipped. Duplicates are
/// kept and order is preserved.
pub fn parse_detected_items(raw_text: &str) -> Vec<String> {
    let mut items = Vec::new();
    for line in raw_text.trim().lines() {
        if !(line.contains('.') && line.contains('-')) {
            continue;
        }
        let after_period = match line.split_once('.') {
            Some((_, rest)) => rest,
            None => continue,
        };
        // The hyphen may sit before the period ("Pre-heated. Rice");
        // then the whole remainder is the candidate name.
        let name = after_period
            .split_once('-')
            .map(|(name, _)| name)
            .unwrap_or(after_period)
            .trim();
        if !name.is_empty() {
            items.push(name.to_string());
        }
    }
    items
}

/// The item list under review for one meal analysis.
///
/// Grows only by appending user additions that are not already present.
/// Membership is exact string match; `"rice"` and `"Rice"` are distinct
/// entries on purpose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ItemList {
    items: Vec<String>,
}

impl ItemList {
    pub fn new(items: Vec<String>) -> Self {
        Self { items }
    }

    /// Appends each comma-separated addition that is non-empty after
    /// trimming and not already in the list. Repeating the same additions
    /// leaves the list unchanged.
    pub fn add_missing(&mut self, additions: &str) {
        for addition in additions.split(',').map(str::trim) {
            if addition.is_empty() {
                continue;
            }
            if !self.items.iter().any(|existing| existing == addition) {
                self.items.push(addition.to_string());
            }
        }
    }

    pub fn items(&self) -> &[String] {
        self.items.as_slice()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn joined(&self) -> String {
        self.items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_numbered_list_in_order() {
        let items = parse_detected_items("1. Rice - 90\n2. Pickle - 70\n");
        assert_eq!(items, vec!["Rice", "Pickle"]);
    }

    #[test]
    fn skips_lines_without_period_or_hyphen() {
        let items = parse_detected_items("Here is the scene.\n1. Rice - 90");
        assert_eq!(items, vec!["Rice"]);

        let items = parse_detected_items("no markers at all\njust prose");
        assert!(items.is_empty());
    }

    #[test]
    fn splits_on_first_period_and_first_hyphen_only() {
        let items = parse_detected_items("1. Whole-wheat bread - 80");
        assert_eq!(items, vec!["Whole"]);

        let items = parse_detected_items("10. Bael fruit juice - 65 - approx");
        assert_eq!(items, vec!["Bael fruit juice"]);
    }

    #[test]
    fn hyphen_before_the_period_keeps_the_remainder() {
        let items = parse_detected_items("Pre-heated plate. Rice 90");
        assert_eq!(items, vec!["Rice 90"]);
    }

    #[test]
    fn drops_names_that_trim_to_empty() {
        let items = parse_detected_items("1.  - 90\n2. Dal - 85");
        assert_eq!(items, vec!["Dal"]);
    }

    #[test]
    fn keeps_exact_duplicates_from_the_model() {
        let items = parse_detected_items("1. Rice - 90\n2. Rice - 88");
        assert_eq!(items, vec!["Rice", "Rice"]);
    }

    #[test]
    fn detection_result_is_empty_for_unparseable_text() {
        let detection = DetectionResult::from_raw("The table is empty.");
        assert!(detection.is_empty());
        assert_eq!(detection.raw_text, "The table is empty.");
    }

    #[test]
    fn add_missing_appends_once_and_is_idempotent() {
        let mut list = ItemList::new(vec!["Rice".to_string(), "Dal".to_string()]);
        list.add_missing("Rice");
        assert_eq!(list.items(), ["Rice", "Dal"]);

        list.add_missing("Naan");
        assert_eq!(list.items(), ["Rice", "Dal", "Naan"]);

        list.add_missing("Naan, Rice");
        assert_eq!(list.items(), ["Rice", "Dal", "Naan"]);
    }

    #[test]
    fn add_missing_trims_and_ignores_empty_segments() {
        let mut list = ItemList::default();
        list.add_missing("  Curd ,, , Papad  ");
        assert_eq!(list.items(), ["Curd", "Papad"]);
    }

    #[test]
    fn membership_is_case_sensitive() {
        let mut list = ItemList::new(vec!["Rice".to_string()]);
        list.add_missing("rice");
        assert_eq!(list.items(), ["Rice", "rice"]);
    }

    #[test]
    fn joined_uses_comma_space() {
        let list = ItemList::new(vec!["Rice".to_string(), "Pickle".to_string()]);
        assert_eq!(list.joined(), "Rice, Pickle");
    }
}
