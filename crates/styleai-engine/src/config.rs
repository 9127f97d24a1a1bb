use std::env;
use std::time::Duration;

use styleai_contracts::models::{
    ModelSelector, GARMENT_ANALYSIS, GARMENT_TRANSFER, IMAGE_EDIT, PERSON_ANALYSIS, TEXT_TO_IMAGE,
};
use tracing::warn;

pub const DEFAULT_CHAT_API_BASE: &str = "https://ai.gateway.lovable.dev/v1";
pub const DEFAULT_FAL_API_BASE: &str = "https://fal.run";
pub const DEFAULT_PERSON_MODEL: &str = "google/gemini-2.5-flash";
pub const DEFAULT_GARMENT_MODEL: &str = "openai/gpt-5-mini";
pub const DEFAULT_GARMENT_TRANSFER_ENDPOINT: &str = "fal-ai/idm-vton";
pub const DEFAULT_EDIT_ENDPOINT: &str = "fal-ai/flux/dev/image-to-image";
pub const DEFAULT_TEXT_TO_IMAGE_ENDPOINT: &str = "fal-ai/flux/dev";

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Delay before the attempt following `failed_attempt` (1-based).
    pub fn delay_after(&self, failed_attempt: usize) -> Duration {
        self.backoff.mul_f64(failed_attempt as f64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Parameters for the image-conditioned edit model, biased toward
/// preserving the reference photo.
#[derive(Debug, Clone, PartialEq)]
pub struct EditParams {
    pub strength: f64,
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
    pub image_size: String,
}

impl Default for EditParams {
    fn default() -> Self {
        Self {
            strength: 0.55,
            num_inference_steps: 35,
            guidance_scale: 8.5,
            image_size: "landscape_4_3".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextToImageParams {
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
    pub image_size: String,
}

impl Default for TextToImageParams {
    fn default() -> Self {
        Self {
            num_inference_steps: 28,
            guidance_scale: 7.5,
            image_size: "portrait_4_3".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisEndpoints {
    pub garment_transfer: String,
    pub edit: String,
    pub text_to_image: String,
}

impl Default for SynthesisEndpoints {
    fn default() -> Self {
        Self {
            garment_transfer: DEFAULT_GARMENT_TRANSFER_ENDPOINT.to_string(),
            edit: DEFAULT_EDIT_ENDPOINT.to_string(),
            text_to_image: DEFAULT_TEXT_TO_IMAGE_ENDPOINT.to_string(),
        }
    }
}

/// Numeric settings are clamped into range rather than rejected. API keys
/// are not stored here; each service reads its own at call time.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub chat_api_base: String,
    pub person_model: String,
    pub person_temperature: Option<f64>,
    pub garment_model: String,
    pub fal_api_base: String,
    pub endpoints: SynthesisEndpoints,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub download_timeout: Duration,
    pub edit: EditParams,
    pub text_to_image: TextToImageParams,
    pub dryrun: bool,
    /// Model fallbacks applied while loading, surfaced to the caller.
    pub warnings: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chat_api_base: DEFAULT_CHAT_API_BASE.to_string(),
            person_model: DEFAULT_PERSON_MODEL.to_string(),
            person_temperature: Some(0.3),
            garment_model: DEFAULT_GARMENT_MODEL.to_string(),
            fal_api_base: DEFAULT_FAL_API_BASE.to_string(),
            endpoints: SynthesisEndpoints::default(),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(120),
            download_timeout: Duration::from_secs(60),
            edit: EditParams::default(),
            text_to_image: TextToImageParams::default(),
            dryrun: false,
            warnings: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(non_empty_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let selector = ModelSelector::new(None);
        let mut warnings = Vec::new();

        let mut pick = |key: &str, default: &str, capability: &str| -> String {
            let requested = lookup(key);
            match selector.select(requested.as_deref(), default, capability) {
                Ok(selection) => {
                    if let Some(reason) = selection.fallback_reason {
                        warn!(setting = key, %reason, "model override ignored");
                        warnings.push(reason);
                    }
                    selection.model.name
                }
                Err(reason) => {
                    warnings.push(reason);
                    default.to_string()
                }
            }
        };

        let person_model = pick("STYLEAI_PERSON_MODEL", DEFAULT_PERSON_MODEL, PERSON_ANALYSIS);
        let garment_model = pick(
            "STYLEAI_GARMENT_MODEL",
            DEFAULT_GARMENT_MODEL,
            GARMENT_ANALYSIS,
        );
        let endpoints = SynthesisEndpoints {
            garment_transfer: pick(
                "STYLEAI_GARMENT_TRANSFER_ENDPOINT",
                DEFAULT_GARMENT_TRANSFER_ENDPOINT,
                GARMENT_TRANSFER,
            ),
            edit: pick("STYLEAI_EDIT_ENDPOINT", DEFAULT_EDIT_ENDPOINT, IMAGE_EDIT),
            text_to_image: pick(
                "STYLEAI_TEXT_TO_IMAGE_ENDPOINT",
                DEFAULT_TEXT_TO_IMAGE_ENDPOINT,
                TEXT_TO_IMAGE,
            ),
        };

        let number = |key: &str, default: f64, min: f64, max: f64| -> f64 {
            clamp_number(lookup(key).as_deref(), default, min, max)
        };

        Self {
            chat_api_base: api_base(lookup("STYLEAI_CHAT_API_BASE"), &defaults.chat_api_base),
            person_model,
            person_temperature: defaults.person_temperature,
            garment_model,
            fal_api_base: api_base(
                lookup("STYLEAI_FAL_API_BASE").or_else(|| lookup("FAL_API_BASE")),
                &defaults.fal_api_base,
            ),
            endpoints,
            retry: RetryPolicy {
                max_attempts: number("STYLEAI_MAX_ATTEMPTS", 3.0, 1.0, 6.0).round() as usize,
                backoff: Duration::from_secs_f64(number("STYLEAI_RETRY_BACKOFF", 1.0, 0.0, 30.0)),
            },
            request_timeout: Duration::from_secs_f64(number(
                "STYLEAI_REQUEST_TIMEOUT",
                120.0,
                5.0,
                600.0,
            )),
            download_timeout: Duration::from_secs_f64(number(
                "STYLEAI_DOWNLOAD_TIMEOUT",
                60.0,
                5.0,
                600.0,
            )),
            edit: EditParams {
                strength: number("STYLEAI_EDIT_STRENGTH", defaults.edit.strength, 0.05, 1.0),
                num_inference_steps: number("STYLEAI_EDIT_STEPS", 35.0, 1.0, 100.0).round()
                    as u32,
                guidance_scale: number(
                    "STYLEAI_EDIT_GUIDANCE",
                    defaults.edit.guidance_scale,
                    0.0,
                    20.0,
                ),
                image_size: defaults.edit.image_size,
            },
            text_to_image: defaults.text_to_image,
            dryrun: lookup("STYLEAI_DRYRUN")
                .map(|value| is_truthy(&value))
                .unwrap_or(false),
            warnings,
        }
    }
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn api_base(raw: Option<String>, default: &str) -> String {
    raw.map(|value| value.trim().trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn clamp_number(raw: Option<&str>, default: f64, min: f64, max: f64) -> f64 {
    raw.and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(default)
        .clamp(min, max)
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
