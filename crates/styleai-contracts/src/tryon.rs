use serde::{Deserialize, Serialize};

use crate::attributes::{GarmentAttributes, PersonAttributes, PersonHints};
use crate::vocabulary::BodyShape;

/// An image carried inline as a `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InlineImage(String);

impl InlineImage {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn from_base64(mime_type: &str, payload: &str) -> Self {
        Self(format!("data:{mime_type};base64,{payload}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_data_url(&self) -> bool {
        self.0.starts_with("data:")
    }

    pub fn mime_type(&self) -> Option<&str> {
        let header = self.0.strip_prefix("data:")?.split(',').next()?;
        let mime = header.split(';').next()?.trim();
        if mime.is_empty() {
            return None;
        }
        Some(mime)
    }

    pub fn base64_payload(&self) -> Option<&str> {
        let (header, payload) = self.0.strip_prefix("data:")?.split_once(',')?;
        if !header.ends_with(";base64") {
            return None;
        }
        Some(payload)
    }
}

/// Everything the caller hands in for one Generate action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateInput {
    pub person_image: Option<InlineImage>,
    #[serde(default)]
    pub person_text: String,
    pub garment_image: Option<InlineImage>,
    #[serde(default)]
    pub garment_text: String,
    pub height_hint: Option<String>,
    pub body_shape_hint: Option<BodyShape>,
}

impl GenerateInput {
    pub fn has_person_input(&self) -> bool {
        self.person_image.is_some() || !self.person_text.trim().is_empty()
    }

    pub fn has_garment_input(&self) -> bool {
        self.garment_image.is_some() || !self.garment_text.trim().is_empty()
    }

    pub fn is_ready(&self) -> bool {
        self.has_person_input() && self.has_garment_input()
    }

    pub fn person_hints(&self) -> PersonHints {
        PersonHints {
            height: self
                .height_hint
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            body_shape: self.body_shape_hint,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TryOnRequest {
    pub person_image: Option<InlineImage>,
    #[serde(default)]
    pub person_text: String,
    pub garment_image: Option<InlineImage>,
    #[serde(default)]
    pub garment_text: String,
    pub person_attrs: Option<PersonAttributes>,
    pub garment_attrs: Option<GarmentAttributes>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TryOnResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<InlineImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TryOnResult {
    pub fn succeeded(image: InlineImage) -> Self {
        Self {
            success: true,
            image: Some(image),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            image: None,
            error: Some(error.into()),
        }
    }
}

/// What a Generate action hands back to the caller.
///
/// `error` is only set for blocking failures; anything that went wrong
/// without invalidating the rest of the result lands in `warnings`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_attrs: Option<PersonAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub garment_attrs: Option<GarmentAttributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_image: Option<InlineImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl GenerationOutcome {
    pub fn blocked(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_image_splits_data_url() {
        let image = InlineImage::from_base64("image/png", "aGVsbG8=");
        assert!(image.is_data_url());
        assert_eq!(image.mime_type(), Some("image/png"));
        assert_eq!(image.base64_payload(), Some("aGVsbG8="));

        let remote = InlineImage::new("https://cdn.example.com/a.png");
        assert!(!remote.is_data_url());
        assert_eq!(remote.mime_type(), None);
        assert_eq!(remote.base64_payload(), None);
    }

    #[test]
    fn readiness_needs_both_sides() {
        let empty = GenerateInput::default();
        assert!(!empty.is_ready());

        let whitespace = GenerateInput {
            person_text: "   ".to_string(),
            garment_text: "red dress".to_string(),
            ..GenerateInput::default()
        };
        assert!(!whitespace.is_ready());

        let texts = GenerateInput {
            person_text: "tall athletic build".to_string(),
            garment_text: "red dress".to_string(),
            ..GenerateInput::default()
        };
        assert!(texts.is_ready());

        let images = GenerateInput {
            person_image: Some(InlineImage::from_base64("image/png", "AA==")),
            garment_image: Some(InlineImage::from_base64("image/png", "AA==")),
            ..GenerateInput::default()
        };
        assert!(images.is_ready());
    }

    #[test]
    fn blank_height_hint_is_dropped() {
        let input = GenerateInput {
            height_hint: Some("  ".to_string()),
            body_shape_hint: Some(BodyShape::Apple),
            ..GenerateInput::default()
        };
        let hints = input.person_hints();
        assert_eq!(hints.height, None);
        assert_eq!(hints.body_shape, Some(BodyShape::Apple));
    }

    #[test]
    fn outcome_omits_empty_fields() -> anyhow::Result<()> {
        let outcome = GenerationOutcome::blocked("Please provide both your photo/description and clothing details");
        let value = serde_json::to_value(&outcome)?;
        assert_eq!(value["success"], serde_json::json!(false));
        assert!(value.get("generatedImage").is_none());
        assert!(value.get("warnings").is_none());
        assert!(outcome.is_blocked());
        Ok(())
    }
}
