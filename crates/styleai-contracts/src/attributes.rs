use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::vocabulary::{BodyShape, Category, Fit, Pattern, SizeEstimate, Style, Vocabulary};

const UNKNOWN: &str = "unknown";
pub const NO_NOTES: &str = "No additional notes.";
const MIN_HEIGHT_CM: f64 = 50.0;
const MAX_HEIGHT_CM: f64 = 272.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    Person,
    Garment,
}

impl AttributeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Garment => "garment",
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Self-reported values the person analyzer falls back on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonHints {
    pub height: Option<String>,
    pub body_shape: Option<BodyShape>,
}

impl PersonHints {
    pub fn height_cm(&self) -> Option<u32> {
        self.height.as_deref().and_then(parse_height_cm)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonAttributes {
    pub has_photo: bool,
    pub skin_tone: String,
    pub body_shape: BodyShape,
    pub height_cm: Option<u32>,
    pub ethnicity: String,
    pub size_estimate: SizeEstimate,
    pub notes: String,
}

impl PersonAttributes {
    /// Builds the record from a loosely shaped model reply. Each field is
    /// read if present and usable, otherwise it takes its fixed fallback.
    pub fn from_model_json(raw: &Map<String, Value>, has_photo: bool, hints: &PersonHints) -> Self {
        let body_shape = vocabulary_field::<BodyShape>(raw, "bodyShape")
            .filter(|shape| *shape != BodyShape::Unknown)
            .or(hints.body_shape)
            .unwrap_or(BodyShape::Unknown);
        let height_cm = raw
            .get("heightCm")
            .and_then(height_from_value)
            .or_else(|| hints.height_cm());

        Self {
            has_photo,
            skin_tone: text_field(raw, "skinTone").unwrap_or_else(|| UNKNOWN.to_string()),
            body_shape,
            height_cm,
            ethnicity: text_field(raw, "ethnicity").unwrap_or_else(|| UNKNOWN.to_string()),
            size_estimate: vocabulary_field(raw, "sizeEstimate").unwrap_or(SizeEstimate::Unknown),
            notes: text_field(raw, "notes").unwrap_or_else(|| NO_NOTES.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GarmentAttributes {
    pub has_image: bool,
    pub category: Category,
    pub color: String,
    pub pattern: Pattern,
    pub material: String,
    pub fit: Fit,
    pub style: Style,
    pub occasion: String,
    pub notes: String,
}

impl GarmentAttributes {
    pub fn from_model_json(raw: &Map<String, Value>, has_image: bool) -> Self {
        Self {
            has_image,
            category: vocabulary_field(raw, "category").unwrap_or(Category::Unknown),
            color: text_field(raw, "color").unwrap_or_else(|| UNKNOWN.to_string()),
            pattern: vocabulary_field(raw, "pattern").unwrap_or(Pattern::Solid),
            material: text_field(raw, "material").unwrap_or_else(|| UNKNOWN.to_string()),
            fit: vocabulary_field(raw, "fit").unwrap_or(Fit::Regular),
            style: vocabulary_field(raw, "style").unwrap_or(Style::Casual),
            occasion: text_field(raw, "occasion").unwrap_or_else(|| "everyday".to_string()),
            notes: text_field(raw, "notes").unwrap_or_else(|| NO_NOTES.to_string()),
        }
    }

    /// One-line description built from the extracted attributes, used in
    /// place of the user's raw garment text when calling the synthesizer.
    pub fn summary(&self) -> String {
        format!(
            "{} {} with {} pattern, made of {}, {} fit, {} style",
            self.color, self.category, self.pattern, self.material, self.fit, self.style
        )
    }
}

fn text_field(raw: &Map<String, Value>, key: &str) -> Option<String> {
    let text = match raw.get(key)? {
        Value::String(value) => value.trim().to_string(),
        Value::Number(value) => value.to_string(),
        Value::Array(rows) => rows
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .collect::<Vec<&str>>()
            .join(", "),
        _ => return None,
    };
    if text.is_empty() || text.eq_ignore_ascii_case("null") {
        return None;
    }
    Some(text)
}

fn vocabulary_field<V: Vocabulary>(raw: &Map<String, Value>, key: &str) -> Option<V> {
    raw.get(key).and_then(Value::as_str).and_then(V::parse)
}

fn height_from_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_f64().and_then(plausible_height),
        Value::String(text) => parse_height_cm(text),
        _ => None,
    }
}

fn plausible_height(cm: f64) -> Option<u32> {
    if !(MIN_HEIGHT_CM..=MAX_HEIGHT_CM).contains(&cm) {
        return None;
    }
    Some(cm.round() as u32)
}

/// Reads a height in centimeters out of free text.
///
/// Accepts plain centimeters (`"170"`, `"170 cm"`), meters (`"1.75m"`) and
/// feet/inches (`"5'7\""`, `"5 ft 7 in"`). Values outside a human range are
/// rejected.
pub fn parse_height_cm(raw: &str) -> Option<u32> {
    let lowered = raw.trim().to_ascii_lowercase();
    if lowered.is_empty() {
        return None;
    }
    let numbers = leading_numbers(&lowered);
    let first = *numbers.first()?;

    if lowered.contains('\'') || lowered.contains("ft") || lowered.contains("feet") {
        let inches = numbers.get(1).copied().unwrap_or(0.0);
        return plausible_height((first * 12.0 + inches) * 2.54);
    }
    if first < 3.0 && (lowered.ends_with('m') && !lowered.ends_with("cm")) {
        return plausible_height(first * 100.0);
    }
    plausible_height(first)
}

fn leading_numbers(text: &str) -> Vec<f64> {
    let mut out = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_ascii_digit() || (ch == '.' && !current.is_empty()) {
            current.push(ch);
        } else if !current.is_empty() {
            if let Ok(value) = current.trim_end_matches('.').parse::<f64>() {
                out.push(value);
            }
            current.clear();
        }
    }
    if let Ok(value) = current.trim_end_matches('.').parse::<f64>() {
        out.push(value);
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn person_fallbacks_fill_every_field() {
        let attrs = PersonAttributes::from_model_json(&Map::new(), false, &PersonHints::default());
        assert_eq!(attrs.skin_tone, "unknown");
        assert_eq!(attrs.body_shape, BodyShape::Unknown);
        assert_eq!(attrs.height_cm, None);
        assert_eq!(attrs.ethnicity, "unknown");
        assert_eq!(attrs.size_estimate, SizeEstimate::Unknown);
        assert_eq!(attrs.notes, NO_NOTES);
    }

    #[test]
    fn person_prefers_model_values_then_hints() {
        let hints = PersonHints {
            height: Some("168".to_string()),
            body_shape: Some(BodyShape::Pear),
        };
        let from_model = PersonAttributes::from_model_json(
            &object(json!({
                "skinTone": "medium, warm undertone",
                "bodyShape": "Hourglass",
                "heightCm": 171.6,
                "ethnicity": "Latino",
                "sizeEstimate": "m",
                "notes": "long legs",
            })),
            true,
            &hints,
        );
        assert!(from_model.has_photo);
        assert_eq!(from_model.body_shape, BodyShape::Hourglass);
        assert_eq!(from_model.height_cm, Some(172));
        assert_eq!(from_model.size_estimate, SizeEstimate::M);

        let from_hints = PersonAttributes::from_model_json(
            &object(json!({ "bodyShape": "unknown", "heightCm": null })),
            false,
            &hints,
        );
        assert_eq!(from_hints.body_shape, BodyShape::Pear);
        assert_eq!(from_hints.height_cm, Some(168));
    }

    #[test]
    fn garment_fallbacks_match_documented_constants() {
        let attrs = GarmentAttributes::from_model_json(
            &object(json!({ "color": "  ", "pattern": "tie-dye", "fit": null })),
            true,
        );
        assert!(attrs.has_image);
        assert_eq!(attrs.category, Category::Unknown);
        assert_eq!(attrs.color, "unknown");
        assert_eq!(attrs.pattern, Pattern::Solid);
        assert_eq!(attrs.material, "unknown");
        assert_eq!(attrs.fit, Fit::Regular);
        assert_eq!(attrs.style, Style::Casual);
        assert_eq!(attrs.occasion, "everyday");
        assert_eq!(attrs.notes, NO_NOTES);
    }

    #[test]
    fn garment_summary_reads_as_a_description() {
        let attrs = GarmentAttributes::from_model_json(
            &object(json!({
                "category": "dress",
                "color": "red",
                "pattern": "floral",
                "material": "silk",
                "fit": "fitted",
                "style": "formal",
                "occasion": ["date night", "wedding guest"],
            })),
            false,
        );
        assert_eq!(attrs.occasion, "date night, wedding guest");
        assert_eq!(
            attrs.summary(),
            "red dress with floral pattern, made of silk, fitted fit, formal style"
        );
    }

    #[test]
    fn height_parser_handles_common_units() {
        assert_eq!(parse_height_cm("170"), Some(170));
        assert_eq!(parse_height_cm("170 cm"), Some(170));
        assert_eq!(parse_height_cm("1.75m"), Some(175));
        assert_eq!(parse_height_cm("5'7\""), Some(170));
        assert_eq!(parse_height_cm("6 ft"), Some(183));
        assert_eq!(parse_height_cm("tall"), None);
        assert_eq!(parse_height_cm("12"), None);
    }

    #[test]
    fn records_serialize_with_camel_case_keys() -> anyhow::Result<()> {
        let attrs = PersonAttributes::from_model_json(
            &object(json!({ "bodyShape": "inverted triangle" })),
            true,
            &PersonHints::default(),
        );
        let value = serde_json::to_value(&attrs)?;
        assert_eq!(value["hasPhoto"], json!(true));
        assert_eq!(value["bodyShape"], json!("inverted-triangle"));
        assert_eq!(value["heightCm"], Value::Null);
        let back: PersonAttributes = serde_json::from_value(value)?;
        assert_eq!(back, attrs);
        Ok(())
    }
}
