use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::blocking::Client as HttpClient;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};
use styleai_contracts::vocabulary::{BodyShape, Category, Pattern, SizeEstimate, Vocabulary};
use styleai_contracts::{
    GarmentAttributes, InlineImage, PersonAttributes, TryOnRequest, TryOnResult,
};
use tracing::{debug, info, warn};

use crate::config::{
    non_empty_env, EditParams, EngineConfig, RetryPolicy, SynthesisEndpoints, TextToImageParams,
};
use crate::error::{Result, StyleError};
use crate::gateway::KeyLookup;
use crate::http::{
    response_json_or_error, status_error, truncate_text, with_retries, ERROR_BODY_MAX_CHARS,
};
use crate::inline::{encode_stream, ENCODE_CHUNK_BYTES};

pub(crate) const IMAGE_SERVICE: &str = "Image provider";
const DOWNLOAD_SERVICE: &str = "Image download";
const NO_IMAGE_PRODUCED: &str = "No image produced by the image provider";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisRoute {
    GarmentTransfer,
    ImageEdit,
    TextToImage,
}

impl SynthesisRoute {
    pub fn select(has_person_image: bool, has_garment_image: bool) -> Self {
        match (has_person_image, has_garment_image) {
            (true, true) => Self::GarmentTransfer,
            (true, false) => Self::ImageEdit,
            (false, _) => Self::TextToImage,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GarmentTransfer => "garment-transfer",
            Self::ImageEdit => "image-edit",
            Self::TextToImage => "text-to-image",
        }
    }
}

/// A fully-built provider call, before anything is sent.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisPlan {
    pub route: SynthesisRoute,
    pub endpoint: String,
    pub payload: Value,
}

/// A hosted image-generation provider.
pub trait ImageBackend: Send + Sync {
    fn name(&self) -> &str;
    /// Posts `payload` to `endpoint` and returns the decoded JSON reply.
    fn submit(&self, endpoint: &str, payload: &Value) -> Result<Value>;
    /// Downloads a generated image and inlines it.
    fn fetch_inline(&self, url: &str) -> Result<InlineImage>;
}

pub struct FalBackend {
    api_base: String,
    request_timeout: Duration,
    download_timeout: Duration,
    api_key: KeyLookup,
    http: HttpClient,
}

impl FalBackend {
    pub fn new(
        api_base: impl Into<String>,
        request_timeout: Duration,
        download_timeout: Duration,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            request_timeout,
            download_timeout,
            api_key: Arc::new(|| {
                non_empty_env("FAL_KEY").or_else(|| non_empty_env("FAL_API_KEY"))
            }),
            http: HttpClient::new(),
        }
    }

    pub fn with_key_lookup(mut self, api_key: KeyLookup) -> Self {
        self.api_key = api_key;
        self
    }

    fn resolve_endpoint(&self, endpoint: &str) -> String {
        let raw = endpoint.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return raw.to_string();
        }
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            raw.trim_start_matches('/')
        )
    }
}

impl ImageBackend for FalBackend {
    fn name(&self) -> &str {
        "fal"
    }

    fn submit(&self, endpoint: &str, payload: &Value) -> Result<Value> {
        let Some(api_key) = (self.api_key)() else {
            return Err(StyleError::Config(
                "FAL_KEY (or FAL_API_KEY) not configured".to_string(),
            ));
        };
        let url = self.resolve_endpoint(endpoint);
        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, format!("Key {api_key}"))
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.request_timeout)
            .json(payload)
            .send()
            .map_err(|err| StyleError::transport(IMAGE_SERVICE, err))?;
        response_json_or_error(IMAGE_SERVICE, response)
    }

    fn fetch_inline(&self, url: &str) -> Result<InlineImage> {
        let response = self
            .http
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .map_err(|err| StyleError::transport(DOWNLOAD_SERVICE, err))?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().unwrap_or_default();
            return Err(status_error(DOWNLOAD_SERVICE, status, &body));
        }
        let declared = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        encode_stream(response, declared.as_deref(), ENCODE_CHUNK_BYTES).map_err(|err| {
            StyleError::Transport {
                service: DOWNLOAD_SERVICE.to_string(),
                message: format!("failed reading image bytes: {err}"),
                retryable: false,
            }
        })
    }
}

pub struct ImageSynthesizer {
    backend: Arc<dyn ImageBackend>,
    endpoints: SynthesisEndpoints,
    edit: EditParams,
    text_to_image: TextToImageParams,
    retry: RetryPolicy,
}

impl ImageSynthesizer {
    pub fn new(backend: Arc<dyn ImageBackend>, config: &EngineConfig) -> Self {
        Self {
            backend,
            endpoints: config.endpoints.clone(),
            edit: config.edit.clone(),
            text_to_image: config.text_to_image.clone(),
            retry: config.retry.clone(),
        }
    }

    pub fn plan(&self, request: &TryOnRequest) -> SynthesisPlan {
        let route = SynthesisRoute::select(
            request.person_image.is_some(),
            request.garment_image.is_some(),
        );
        let person = request.person_attrs.as_ref();
        let garment = request.garment_attrs.as_ref();
        let description = garment_description(&request.garment_text, garment);

        let (endpoint, payload) = match (route, &request.person_image, &request.garment_image) {
            (SynthesisRoute::GarmentTransfer, Some(person_image), Some(garment_image)) => (
                self.endpoints.garment_transfer.clone(),
                json!({
                    "human_image_url": person_image.as_str(),
                    "garment_image_url": garment_image.as_str(),
                    "description": description,
                }),
            ),
            (SynthesisRoute::ImageEdit, Some(person_image), _) => (
                self.endpoints.edit.clone(),
                json!({
                    "image_url": person_image.as_str(),
                    "prompt": edit_prompt(&description, person, garment),
                    "strength": self.edit.strength,
                    "num_inference_steps": self.edit.num_inference_steps,
                    "guidance_scale": self.edit.guidance_scale,
                    "image_size": self.edit.image_size,
                }),
            ),
            _ => (
                self.endpoints.text_to_image.clone(),
                json!({
                    "prompt": text_to_image_prompt(&description, person, garment),
                    "num_inference_steps": self.text_to_image.num_inference_steps,
                    "guidance_scale": self.text_to_image.guidance_scale,
                    "image_size": self.text_to_image.image_size,
                }),
            ),
        };
        SynthesisPlan {
            route,
            endpoint,
            payload,
        }
    }

    pub fn synthesize(&self, request: &TryOnRequest) -> Result<InlineImage> {
        let plan = self.plan(request);
        let started = Instant::now();
        debug!(
            route = plan.route.as_str(),
            endpoint = %plan.endpoint,
            backend = self.backend.name(),
            "submitting synthesis request"
        );
        let response = with_retries(IMAGE_SERVICE, &self.retry, |attempt| {
            debug!(route = plan.route.as_str(), attempt, "posting to image provider");
            self.backend.submit(&plan.endpoint, &plan.payload)
        })?;
        let url = extract_image_url(&response)?;
        let image = self.backend.fetch_inline(&url)?;
        info!(
            route = plan.route.as_str(),
            duration_ms = started.elapsed().as_millis() as u64,
            "try-on image generated"
        );
        Ok(image)
    }

    /// Service boundary: never fails, reports errors in the result.
    pub fn try_on(&self, request: &TryOnRequest) -> TryOnResult {
        match self.synthesize(request) {
            Ok(image) => TryOnResult::succeeded(image),
            Err(err) => {
                warn!(error = %err, error_kind = err.kind(), "try-on synthesis failed");
                TryOnResult::failed(err.to_string())
            }
        }
    }
}

/// Accepts either `{"image": {"url": ...}}` or `{"images": [{"url": ...}]}`.
pub fn extract_image_url(response: &Value) -> Result<String> {
    let single = response
        .get("image")
        .and_then(|image| image.get("url"))
        .and_then(Value::as_str);
    let first_of_many = || {
        response
            .get("images")
            .and_then(Value::as_array)
            .and_then(|images| images.first())
            .and_then(|image| image.get("url"))
            .and_then(Value::as_str)
    };
    single
        .or_else(first_of_many)
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            debug!(
                response = %truncate_text(&response.to_string(), ERROR_BODY_MAX_CHARS),
                "provider reply had no image url"
            );
            StyleError::MalformedResponse(NO_IMAGE_PRODUCED.to_string())
        })
}

fn known(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("unknown") {
        return None;
    }
    Some(value)
}

fn with_article(phrase: &str) -> String {
    let vowel = phrase
        .chars()
        .next()
        .map(|ch| matches!(ch.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u'))
        .unwrap_or(false);
    if vowel {
        format!("an {phrase}")
    } else {
        format!("a {phrase}")
    }
}

fn garment_description(text: &str, garment: Option<&GarmentAttributes>) -> String {
    if let Some(text) = known(text) {
        return text.to_string();
    }
    match garment {
        Some(garment) => garment.summary(),
        None => "the described outfit".to_string(),
    }
}

fn garment_details(garment: &GarmentAttributes) -> Vec<String> {
    let mut details = Vec::new();
    if let Some(color) = known(&garment.color) {
        details.push(format!("{color} color"));
    }
    if let Some(material) = known(&garment.material) {
        details.push(format!("made of {material}"));
    }
    if garment.pattern != Pattern::Solid {
        details.push(format!("with {} pattern", garment.pattern));
    }
    details.push(format!("{} fit", garment.fit));
    details.push(format!("{} style", garment.style));
    details
}

pub fn edit_prompt(
    description: &str,
    person: Option<&PersonAttributes>,
    garment: Option<&GarmentAttributes>,
) -> String {
    let mut prompt =
        String::from("An ultra-realistic photograph of the EXACT SAME person in the reference image. ");
    if let Some(person) = person {
        if let Some(skin) = known(&person.skin_tone) {
            prompt.push_str(&format!("The person has {skin} skin tone. "));
        }
        if let Some(ethnicity) = known(&person.ethnicity) {
            prompt.push_str(&format!("Their ethnicity appears to be {ethnicity}. "));
        }
    }
    prompt.push_str(&format!("They are now wearing: {description}. "));
    if let Some(garment) = garment {
        prompt.push_str(&format!(
            "The clothing is {}. ",
            garment_details(garment).join(", ")
        ));
    }
    prompt.push_str(
        "CRITICAL: Replace ONLY the clothing. The face must be IDENTICAL to the original: same facial features, expression, eyes, nose, mouth and skin texture. ",
    );
    prompt.push_str(
        "Keep the same hair, the same pose, the same body shape and proportions, and the same background. ",
    );
    prompt.push_str("Professional fashion photography, natural lighting, high resolution, photorealistic quality.");
    prompt
}

pub fn text_to_image_prompt(
    description: &str,
    person: Option<&PersonAttributes>,
    garment: Option<&GarmentAttributes>,
) -> String {
    let mut subject = Vec::new();
    if let Some(person) = person {
        if let Some(ethnicity) = known(&person.ethnicity) {
            subject.push(format!("{ethnicity} person"));
        }
        if let Some(skin) = known(&person.skin_tone) {
            subject.push(format!("with {skin} skin tone"));
        }
        if let Some(height) = person.height_cm {
            subject.push(format!("about {height} cm tall"));
        }
        if person.body_shape != BodyShape::Unknown {
            subject.push(format!(
                "with {} body shape",
                with_article(person.body_shape.as_str())
            ));
        }
        if person.size_estimate != SizeEstimate::Unknown {
            subject.push(format!("wearing size {}", person.size_estimate));
        }
    }
    let subject = if subject.is_empty() {
        "a person".to_string()
    } else if subject[0].ends_with("person") {
        with_article(&subject.join(", "))
    } else {
        format!("a person {}", subject.join(", "))
    };

    let mut prompt = format!("A full-body fashion photograph of {subject}, wearing {description}. ");
    if let Some(garment) = garment {
        if garment.category != Category::Unknown {
            prompt.push_str(&format!("The {} is ", garment.category));
        } else {
            prompt.push_str("The clothing is ");
        }
        prompt.push_str(&garment_details(garment).join(", "));
        prompt.push_str(". ");
        if let Some(occasion) = known(&garment.occasion) {
            prompt.push_str(&format!("Styled for {occasion}. "));
        }
    }
    prompt.push_str("Natural pose, clean studio background, professional fashion photography, natural lighting, high resolution, photorealistic quality.");
    prompt
}
