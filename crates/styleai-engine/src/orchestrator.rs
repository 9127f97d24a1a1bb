use std::thread::{self, ScopedJoinHandle};
use std::time::Instant;

use styleai_contracts::{
    GarmentAttributes, GenerateInput, GenerationOutcome, InlineImage, PersonAttributes,
    TryOnRequest,
};
use tracing::{info, info_span, warn, Span};
use uuid::Uuid;

use crate::error::{Result, StyleError};
use crate::extractor::AttributeExtractor;
use crate::synthesizer::ImageSynthesizer;

pub const NOT_READY_MESSAGE: &str =
    "Please provide both your photo/description and clothing details";
const SYNTHESIS_FAILED: &str = "Generation failed, but your profiles were analyzed";
const GARMENT_DEGRADED: &str = "Garment analysis failed, using your description as-is";

pub struct Orchestrator {
    extractor: AttributeExtractor,
    synthesizer: ImageSynthesizer,
    warnings: Vec<String>,
}

impl Orchestrator {
    pub fn new(extractor: AttributeExtractor, synthesizer: ImageSynthesizer) -> Self {
        Self {
            extractor,
            synthesizer,
            warnings: Vec::new(),
        }
    }

    /// Warnings attached to every outcome, e.g. ignored model overrides.
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn extractor(&self) -> &AttributeExtractor {
        &self.extractor
    }

    pub fn generate(&self, input: &GenerateInput) -> GenerationOutcome {
        let request_id = Uuid::new_v4();
        let span = info_span!("generate", %request_id);
        let _entered = span.enter();

        if !input.is_ready() {
            warn!(
                has_person = input.has_person_input(),
                has_garment = input.has_garment_input(),
                "generate rejected, inputs incomplete"
            );
            return self.blocked(NOT_READY_MESSAGE);
        }

        let started = Instant::now();
        let mut warnings = self.warnings.clone();
        let (person, garment) = self.analyze(input, &span);

        let person = match person {
            Ok(person) => person,
            Err(err) => {
                warn!(error = %err, error_kind = err.kind(), "person analysis failed");
                return self.blocked(err.user_message());
            }
        };
        let garment = match garment {
            Some(Ok(garment)) => Some(garment),
            Some(Err(err)) => {
                warn!(error = %err, error_kind = err.kind(), "garment analysis failed, continuing");
                warnings.push(format!("{GARMENT_DEGRADED}: {}", err.user_message()));
                None
            }
            None => None,
        };

        let request = TryOnRequest {
            person_image: input.person_image.clone(),
            person_text: input.person_text.trim().to_string(),
            garment_image: input.garment_image.clone(),
            garment_text: enhanced_description(garment.as_ref(), &input.garment_text),
            person_attrs: Some(person.clone()),
            garment_attrs: garment.clone(),
        };
        let result = self.synthesizer.try_on(&request);

        let mut outcome = GenerationOutcome {
            success: result.success,
            person_attrs: Some(person),
            garment_attrs: garment,
            generated_image: None,
            error: None,
            warnings: Vec::new(),
        };
        match (result.image, result.error) {
            (Some(image), _) if result.success => outcome.generated_image = Some(image),
            (_, error) => {
                let reason = error.unwrap_or_else(|| "no image returned".to_string());
                warnings.push(format!("{SYNTHESIS_FAILED}: {reason}"));
                outcome.success = false;
            }
        }
        outcome.warnings = warnings;

        info!(
            success = outcome.success,
            warnings = outcome.warnings.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "generation finished"
        );
        outcome
    }

    fn blocked(&self, error: impl Into<String>) -> GenerationOutcome {
        GenerationOutcome {
            warnings: self.warnings.clone(),
            ..GenerationOutcome::blocked(error)
        }
    }

    /// Runs both extractions on scoped threads and waits for both to settle.
    fn analyze(
        &self,
        input: &GenerateInput,
        span: &Span,
    ) -> (
        Result<PersonAttributes>,
        Option<Result<GarmentAttributes>>,
    ) {
        let hints = input.person_hints();
        let person_text = non_blank(&input.person_text);
        let garment_text = non_blank(&input.garment_text);
        let extractor = &self.extractor;

        thread::scope(|scope| {
            let person_span = span.clone();
            let person = scope.spawn(move || {
                let _entered = person_span.enter();
                extractor.extract_person(input.person_image.as_ref(), person_text, &hints)
            });
            let garment = input.has_garment_input().then(|| {
                let garment_span = span.clone();
                scope.spawn(move || {
                    let _entered = garment_span.enter();
                    extractor.extract_garment(input.garment_image.as_ref(), garment_text)
                })
            });
            (settle(person), garment.map(settle))
        })
    }
}

fn settle<T>(handle: ScopedJoinHandle<'_, Result<T>>) -> Result<T> {
    handle
        .join()
        .unwrap_or_else(|_| Err(StyleError::Internal("attribute extraction panicked".to_string())))
}

fn non_blank(text: &str) -> Option<&str> {
    Some(text.trim()).filter(|value| !value.is_empty())
}

/// Garment text handed to the synthesizer. Falls back to the raw text when
/// no attributes are available.
pub fn enhanced_description(garment: Option<&GarmentAttributes>, text: &str) -> String {
    let text = text.trim();
    match garment {
        Some(garment) if text.is_empty() => garment.summary(),
        Some(garment) => format!("{}. Additional details: {text}", garment.summary()),
        None => text.to_string(),
    }
}

/// Caller-owned view of the last Generate action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudioState {
    pub person_attrs: Option<PersonAttributes>,
    pub garment_attrs: Option<GarmentAttributes>,
    pub generated_image: Option<InlineImage>,
    pub error: Option<String>,
    pub warnings: Vec<String>,
}

impl StudioState {
    /// Folds an outcome into the state. A blocking failure only surfaces
    /// its error; everything else from the previous state is kept.
    pub fn apply(mut self, outcome: &GenerationOutcome) -> Self {
        if outcome.is_blocked() {
            self.error = outcome.error.clone();
            return self;
        }
        self.person_attrs = outcome.person_attrs.clone();
        self.garment_attrs = outcome.garment_attrs.clone();
        if let Some(image) = &outcome.generated_image {
            self.generated_image = Some(image.clone());
        }
        self.error = None;
        self.warnings = outcome.warnings.clone();
        self
    }
}
