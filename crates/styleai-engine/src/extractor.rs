use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Map, Value};
use styleai_contracts::vocabulary::{BodyShape, Category, Fit, Pattern, SizeEstimate, Style};
use styleai_contracts::{
    AttributeKind, GarmentAttributes, InlineImage, PersonAttributes, PersonHints, Vocabulary,
};
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, RetryPolicy};
use crate::error::{Result, StyleError};
use crate::gateway::{ChatGateway, GATEWAY_SERVICE};
use crate::http::{check_status, parse_json_body, with_retries};

const PARSE_FAILURE: &str = "Failed to parse AI response as JSON";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attributes {
    Person(PersonAttributes),
    Garment(GarmentAttributes),
}

pub struct AttributeExtractor {
    gateway: Arc<dyn ChatGateway>,
    person_model: String,
    person_temperature: Option<f64>,
    garment_model: String,
    retry: RetryPolicy,
}

impl AttributeExtractor {
    pub fn new(gateway: Arc<dyn ChatGateway>, config: &EngineConfig) -> Self {
        Self {
            gateway,
            person_model: config.person_model.clone(),
            person_temperature: config.person_temperature,
            garment_model: config.garment_model.clone(),
            retry: config.retry.clone(),
        }
    }

    pub fn extract(
        &self,
        kind: AttributeKind,
        image: Option<&InlineImage>,
        text: Option<&str>,
        hints: &PersonHints,
    ) -> Result<Attributes> {
        match kind {
            AttributeKind::Person => self
                .extract_person(image, text, hints)
                .map(Attributes::Person),
            AttributeKind::Garment => self.extract_garment(image, text).map(Attributes::Garment),
        }
    }

    pub fn extract_person(
        &self,
        image: Option<&InlineImage>,
        text: Option<&str>,
        hints: &PersonHints,
    ) -> Result<PersonAttributes> {
        let raw = self.request_attributes(AttributeKind::Person, image, text, hints)?;
        Ok(PersonAttributes::from_model_json(
            &raw,
            image.is_some(),
            hints,
        ))
    }

    pub fn extract_garment(
        &self,
        image: Option<&InlineImage>,
        text: Option<&str>,
    ) -> Result<GarmentAttributes> {
        let raw =
            self.request_attributes(AttributeKind::Garment, image, text, &PersonHints::default())?;
        Ok(GarmentAttributes::from_model_json(&raw, image.is_some()))
    }

    fn request_attributes(
        &self,
        kind: AttributeKind,
        image: Option<&InlineImage>,
        text: Option<&str>,
        hints: &PersonHints,
    ) -> Result<Map<String, Value>> {
        let (model, temperature) = match kind {
            AttributeKind::Person => (self.person_model.as_str(), self.person_temperature),
            AttributeKind::Garment => (self.garment_model.as_str(), None),
        };
        let text = text.map(str::trim).filter(|value| !value.is_empty());
        let payload = build_payload(kind, model, temperature, image, text, hints);
        let started = Instant::now();
        debug!(
            %kind,
            model,
            has_image = image.is_some(),
            has_text = text.is_some(),
            gateway = self.gateway.name(),
            "requesting attribute extraction"
        );

        let body = with_retries(GATEWAY_SERVICE, &self.retry, |attempt| {
            debug!(%kind, attempt, "sending chat completion");
            let reply = self.gateway.send(kind, &payload)?;
            check_status(GATEWAY_SERVICE, reply.status, &reply.body)?;
            parse_json_body(GATEWAY_SERVICE, &reply.body)
        })
        .map_err(|err| {
            warn!(%kind, error = %err, error_kind = err.kind(), "attribute extraction failed");
            err
        })?;

        let content = reply_content(&body)?;
        let raw = parse_attribute_json(&content).map_err(|err| {
            warn!(%kind, content_len = content.len(), "model reply was not valid attribute JSON");
            err
        })?;
        info!(
            %kind,
            model,
            duration_ms = started.elapsed().as_millis() as u64,
            "attributes extracted"
        );
        Ok(raw)
    }
}

pub fn build_payload(
    kind: AttributeKind,
    model: &str,
    temperature: Option<f64>,
    image: Option<&InlineImage>,
    text: Option<&str>,
    hints: &PersonHints,
) -> Value {
    let message = user_message(kind, image.is_some(), text, hints);
    let user_content = match image {
        Some(image) => json!([
            {
                "type": "image_url",
                "image_url": { "url": image.as_str() },
            },
            {
                "type": "text",
                "text": message,
            },
        ]),
        None => Value::String(message),
    };
    let mut payload = json!({
        "model": model,
        "messages": [
            { "role": "system", "content": system_prompt(kind) },
            { "role": "user", "content": user_content },
        ],
    });
    if let (Some(temperature), Some(obj)) = (temperature, payload.as_object_mut()) {
        obj.insert("temperature".to_string(), json!(temperature));
    }
    payload
}

fn quoted_choices<V: Vocabulary>() -> String {
    V::choices()
        .into_iter()
        .map(|label| format!("\"{label}\""))
        .collect::<Vec<String>>()
        .join(", ")
}

pub fn system_prompt(kind: AttributeKind) -> String {
    match kind {
        AttributeKind::Person => format!(
            "You are an AI fashion stylist assistant. Analyze the provided information about a person and build a structured profile for fashion recommendations.

CRITICAL INSTRUCTION: never answer \"unknown\" or null when any visual or textual clue exists. Use context and fashion knowledge to give your best estimate for EVERY field.

Fields:
- skinTone: skin tone with undertone (e.g. \"fair, cool undertone\", \"medium-deep, warm undertone\")
- bodyShape: one of {shapes}
- heightCm: height in centimeters as a number; null only if nothing hints at it
- ethnicity: inferred or described ethnicity (e.g. \"Black\", \"East Asian\", \"Latino\", \"Mixed\")
- sizeEstimate: one of {sizes}
- notes: styling notes about proportions, features or fit considerations

Be respectful and objective.

Respond ONLY with a valid JSON object in this exact format:
{{
  \"skinTone\": \"string\",
  \"bodyShape\": \"string\",
  \"heightCm\": number or null,
  \"ethnicity\": \"string\",
  \"sizeEstimate\": \"string\",
  \"notes\": \"string\"
}}",
            shapes = quoted_choices::<BodyShape>(),
            sizes = quoted_choices::<SizeEstimate>(),
        ),
        AttributeKind::Garment => format!(
            "You are an expert AI fashion analyst. Analyze the provided clothing information and build a structured clothing profile.

CRITICAL INSTRUCTION: never answer \"unknown\" or null unless it is truly impossible to estimate. Use context clues, fashion knowledge and inference to give your best estimate for EVERY field.

Fields:
- category: one of {categories}
- color: primary color(s), including secondary colors (e.g. \"navy blue\", \"black with white stripes\")
- pattern: one of {patterns}
- material: best estimate of fabric (e.g. \"cotton\", \"denim\", \"polyester blend\")
- fit: one of {fits}
- style: one of {styles}
- occasion: best suited occasion(s) (e.g. \"everyday casual\", \"office wear\", \"date night\")
- notes: styling recommendations, flattering body types, pairings and care

Respond ONLY with a valid JSON object:
{{
  \"category\": \"string\",
  \"color\": \"string\",
  \"pattern\": \"string\",
  \"material\": \"string\",
  \"fit\": \"string\",
  \"style\": \"string\",
  \"occasion\": \"string\",
  \"notes\": \"string\"
}}",
            categories = quoted_choices::<Category>(),
            patterns = quoted_choices::<Pattern>(),
            fits = quoted_choices::<Fit>(),
            styles = quoted_choices::<Style>(),
        ),
    }
}

pub fn user_message(
    kind: AttributeKind,
    has_image: bool,
    text: Option<&str>,
    hints: &PersonHints,
) -> String {
    let mut parts = Vec::new();
    match kind {
        AttributeKind::Person => {
            if has_image {
                parts.push("I have provided an image of the person.".to_string());
            }
            if let Some(text) = text {
                parts.push(format!("Person description: {text}"));
            }
            if let Some(height) = hints.height.as_deref() {
                parts.push(format!("Self-reported height: {height}"));
            }
            if let Some(shape) = hints.body_shape {
                parts.push(format!("Self-reported body shape: {shape}"));
            }
        }
        AttributeKind::Garment => {
            if has_image {
                parts.push("I have provided an image of the clothing item.".to_string());
            }
            if let Some(text) = text {
                parts.push(format!("Clothing description: {text}"));
            }
        }
    }
    if parts.is_empty() {
        return format!(
            "No specific details provided. Please return a generic {} profile with your best default estimates.",
            match kind {
                AttributeKind::Person => "person",
                AttributeKind::Garment => "clothing",
            }
        );
    }
    parts.join("\n")
}

/// Pulls `choices[0].message.content` out of a chat-completion body.
pub fn reply_content(body: &Value) -> Result<String> {
    let content = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())
        .and_then(|row| row.get("message"))
        .and_then(|message| message.get("content"));
    let text = match content {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<&str>>()
            .join(""),
        _ => String::new(),
    };
    if text.trim().is_empty() {
        return Err(StyleError::MalformedResponse(
            "No content in AI response".to_string(),
        ));
    }
    Ok(text)
}

pub fn strip_code_fences(content: &str) -> &str {
    let mut trimmed = content.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        trimmed = match rest.find('\n') {
            Some(idx) => &rest[idx + 1..],
            None => rest.trim_start_matches("json"),
        };
    }
    if let Some(rest) = trimmed.trim_end().strip_suffix("```") {
        trimmed = rest;
    }
    trimmed.trim()
}

pub fn parse_attribute_json(content: &str) -> Result<Map<String, Value>> {
    let cleaned = strip_code_fences(content);
    let parsed = serde_json::from_str::<Value>(cleaned).or_else(|_| {
        let start = cleaned.find('{');
        let end = cleaned.rfind('}');
        match (start, end) {
            (Some(start), Some(end)) if start < end => {
                serde_json::from_str::<Value>(&cleaned[start..=end])
            }
            _ => serde_json::from_str::<Value>(cleaned),
        }
    });
    match parsed {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(StyleError::MalformedResponse(PARSE_FAILURE.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use styleai_contracts::vocabulary::{BodyShape, Pattern};

    use super::*;
    use crate::gateway::GatewayReply;

    struct ScriptedGateway {
        replies: Mutex<Vec<GatewayReply>>,
        calls: Mutex<Vec<Value>>,
    }

    impl ScriptedGateway {
        /// Replies are served in order; the last one repeats forever.
        fn new(replies: Vec<GatewayReply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn last_payload(&self) -> Value {
            self.calls.lock().unwrap().last().cloned().unwrap_or(Value::Null)
        }
    }

    impl ChatGateway for ScriptedGateway {
        fn name(&self) -> &str {
            "scripted"
        }

        fn send(&self, _kind: AttributeKind, payload: &Value) -> Result<GatewayReply> {
            self.calls.lock().unwrap().push(payload.clone());
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                Ok(replies.remove(0))
            } else {
                Ok(replies[0].clone())
            }
        }
    }

    fn completion(content: &str) -> GatewayReply {
        GatewayReply::new(
            200,
            json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
                .to_string(),
        )
    }

    fn extractor(gateway: Arc<ScriptedGateway>) -> AttributeExtractor {
        let config = EngineConfig {
            retry: RetryPolicy {
                max_attempts: 3,
                backoff: Duration::ZERO,
            },
            ..EngineConfig::default()
        };
        AttributeExtractor::new(gateway, &config)
    }

    #[test]
    fn retries_server_errors_up_to_the_ceiling() {
        let gateway = ScriptedGateway::new(vec![GatewayReply::new(503, "unavailable")]);
        let err = extractor(gateway.clone())
            .extract_person(None, Some("tall"), &PersonHints::default())
            .unwrap_err();
        assert_eq!(gateway.call_count(), 3);
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn rate_limit_is_never_retried() {
        let gateway = ScriptedGateway::new(vec![GatewayReply::new(429, "slow down")]);
        let err = extractor(gateway.clone())
            .extract_garment(None, Some("red dress"))
            .unwrap_err();
        assert_eq!(gateway.call_count(), 1);
        assert!(matches!(err, StyleError::RateLimited));
    }

    #[test]
    fn payment_required_is_never_retried() {
        let gateway = ScriptedGateway::new(vec![GatewayReply::new(402, "no credits")]);
        let err = extractor(gateway.clone())
            .extract_garment(None, Some("red dress"))
            .unwrap_err();
        assert_eq!(gateway.call_count(), 1);
        assert!(matches!(err, StyleError::PaymentRequired));
    }

    #[test]
    fn recovers_after_a_transient_failure() {
        let gateway = ScriptedGateway::new(vec![
            GatewayReply::new(500, "oops"),
            completion("{\"pattern\": \"striped\", \"category\": \"top\"}"),
        ]);
        let attrs = extractor(gateway.clone())
            .extract_garment(None, Some("striped shirt"))
            .unwrap();
        assert_eq!(gateway.call_count(), 2);
        assert_eq!(attrs.pattern, Pattern::Striped);
    }

    #[test]
    fn unparsable_content_is_terminal() {
        let gateway = ScriptedGateway::new(vec![completion("I think it is a nice shirt.")]);
        let err = extractor(gateway.clone())
            .extract_garment(None, Some("shirt"))
            .unwrap_err();
        assert_eq!(gateway.call_count(), 1);
        assert_eq!(err.to_string(), PARSE_FAILURE);
    }

    #[test]
    fn missing_inputs_still_produce_a_full_record() {
        let gateway = ScriptedGateway::new(vec![completion("```json\n{}\n```")]);
        let extractor = extractor(gateway.clone());
        let person = extractor
            .extract_person(None, None, &PersonHints::default())
            .unwrap();
        let payload = gateway.last_payload();
        let user = payload["messages"][1]["content"].as_str().unwrap_or_default();
        assert!(user.starts_with("No specific details provided"));
        assert_eq!(person.height_cm, None);

        let garment = extractor.extract_garment(None, None).unwrap();
        for (field, value) in [
            ("person.skinTone", person.skin_tone.as_str()),
            ("person.bodyShape", person.body_shape.as_str()),
            ("person.ethnicity", person.ethnicity.as_str()),
            ("person.sizeEstimate", person.size_estimate.as_str()),
            ("person.notes", person.notes.as_str()),
            ("garment.category", garment.category.as_str()),
            ("garment.color", garment.color.as_str()),
            ("garment.pattern", garment.pattern.as_str()),
            ("garment.material", garment.material.as_str()),
            ("garment.fit", garment.fit.as_str()),
            ("garment.style", garment.style.as_str()),
            ("garment.occasion", garment.occasion.as_str()),
            ("garment.notes", garment.notes.as_str()),
        ] {
            assert!(!value.trim().is_empty(), "{field} was empty");
        }
    }

    #[test]
    fn extract_dispatches_on_kind() {
        let gateway = ScriptedGateway::new(vec![completion(
            "{\"category\": \"bottom\", \"bodyShape\": \"apple\"}",
        )]);
        let extractor = extractor(gateway.clone());
        let hints = PersonHints {
            height: Some("170".to_string()),
            body_shape: Some(BodyShape::Pear),
        };

        match extractor
            .extract(AttributeKind::Garment, None, Some("wide-leg trousers"), &hints)
            .unwrap()
        {
            Attributes::Garment(garment) => assert_eq!(garment.category, Category::Bottom),
            other => panic!("expected garment attributes, got {other:?}"),
        }
        let payload = gateway.last_payload();
        assert_eq!(payload["model"], json!("openai/gpt-5-mini"));
        assert_eq!(
            payload["messages"][1]["content"],
            json!("Clothing description: wide-leg trousers")
        );

        match extractor
            .extract(AttributeKind::Person, None, Some("tall"), &hints)
            .unwrap()
        {
            Attributes::Person(person) => {
                assert_eq!(person.body_shape, BodyShape::Apple);
                assert_eq!(person.height_cm, Some(170));
            }
            other => panic!("expected person attributes, got {other:?}"),
        }
        let user = gateway.last_payload()["messages"][1]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        assert!(user.contains("Self-reported height: 170"));
    }

    #[test]
    fn identical_input_normalizes_identically() {
        let reply = completion("```json\n{\"skinTone\": \"fair\", \"bodyShape\": \"pear\"}\n```");
        let gateway = ScriptedGateway::new(vec![reply]);
        let extractor = extractor(gateway);
        let hints = PersonHints {
            height: Some("165 cm".to_string()),
            body_shape: None,
        };
        let first = extractor.extract_person(None, Some("petite"), &hints).unwrap();
        let second = extractor.extract_person(None, Some("petite"), &hints).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.body_shape, BodyShape::Pear);
        assert_eq!(first.height_cm, Some(165));
    }

    #[test]
    fn image_is_attached_as_multimodal_content() {
        let gateway = ScriptedGateway::new(vec![completion("{}")]);
        let image = InlineImage::from_base64("image/png", "AAAA");
        extractor(gateway.clone())
            .extract_person(Some(&image), Some("smiling"), &PersonHints::default())
            .unwrap();
        let payload = gateway.last_payload();
        assert_eq!(payload["model"], json!("google/gemini-2.5-flash"));
        assert_eq!(payload["temperature"], json!(0.3));
        let content = &payload["messages"][1]["content"];
        assert_eq!(content[0]["type"], json!("image_url"));
        assert_eq!(content[0]["image_url"]["url"], json!(image.as_str()));
        assert!(content[1]["text"]
            .as_str()
            .unwrap_or_default()
            .contains("Person description: smiling"));
    }

    #[test]
    fn garment_payload_has_no_temperature() {
        let payload = build_payload(
            AttributeKind::Garment,
            "openai/gpt-5-mini",
            None,
            None,
            Some("jeans"),
            &PersonHints::default(),
        );
        assert!(payload.get("temperature").is_none());
        assert!(payload["messages"][0]["content"]
            .as_str()
            .unwrap_or_default()
            .contains("\"animal print\""));
    }

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```\n"), "{}");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
        assert!(parse_attribute_json("Here you go: {\"fit\": \"slim\"} enjoy").is_ok());
        assert!(parse_attribute_json("[1, 2]").is_err());
    }

    #[test]
    fn empty_choices_are_malformed() {
        let err = reply_content(&json!({ "choices": [] })).unwrap_err();
        assert!(matches!(err, StyleError::MalformedResponse(_)));
    }
}
