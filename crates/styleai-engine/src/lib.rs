pub mod config;
pub mod dryrun;
pub mod error;
pub mod extractor;
pub mod gateway;
pub mod http;
pub mod inline;
pub mod orchestrator;
pub mod synthesizer;

use std::sync::Arc;

use tracing::info;

pub use config::EngineConfig;
pub use error::{Result, StyleError};
pub use extractor::{AttributeExtractor, Attributes};
pub use gateway::{ChatGateway, GatewayReply, HttpChatGateway};
pub use orchestrator::{enhanced_description, Orchestrator, StudioState, NOT_READY_MESSAGE};
pub use synthesizer::{FalBackend, ImageBackend, ImageSynthesizer, SynthesisRoute};

pub fn chat_gateway(config: &EngineConfig) -> Arc<dyn ChatGateway> {
    if config.dryrun {
        return Arc::new(dryrun::DryrunChatGateway);
    }
    Arc::new(HttpChatGateway::new(
        config.chat_api_base.clone(),
        config.request_timeout,
    ))
}

pub fn image_backend(config: &EngineConfig) -> Arc<dyn ImageBackend> {
    if config.dryrun {
        return Arc::new(dryrun::DryrunImageBackend);
    }
    Arc::new(FalBackend::new(
        config.fal_api_base.clone(),
        config.request_timeout,
        config.download_timeout,
    ))
}

/// Wires the extractor and synthesizer to live or dryrun services,
/// depending on `config.dryrun`.
pub fn build_orchestrator(config: &EngineConfig) -> Orchestrator {
    let gateway = chat_gateway(config);
    let backend = image_backend(config);
    info!(
        gateway = gateway.name(),
        backend = backend.name(),
        person_model = %config.person_model,
        garment_model = %config.garment_model,
        "engine ready"
    );
    Orchestrator::new(
        AttributeExtractor::new(gateway, config),
        ImageSynthesizer::new(backend, config),
    )
    .with_warnings(config.warnings.clone())
}

#[cfg(test)]
mod tests {
    use styleai_contracts::GenerateInput;

    use super::*;

    #[test]
    fn dryrun_pipeline_produces_a_png() -> anyhow::Result<()> {
        let config = EngineConfig {
            dryrun: true,
            ..EngineConfig::default()
        };
        let outcome = build_orchestrator(&config).generate(&GenerateInput {
            person_text: "average height, athletic".to_string(),
            garment_text: "a plain tee".to_string(),
            ..GenerateInput::default()
        });
        assert!(outcome.success, "outcome: {outcome:?}");
        assert!(outcome.warnings.is_empty());

        let image = outcome
            .generated_image
            .ok_or_else(|| anyhow::anyhow!("no image"))?;
        let bytes = inline::decode(&image)?;
        let decoded = image::load_from_memory(&bytes)?;
        assert_eq!((decoded.width(), decoded.height()), (480, 640));
        Ok(())
    }

    #[test]
    fn dryrun_selects_offline_services() {
        let config = EngineConfig {
            dryrun: true,
            ..EngineConfig::default()
        };
        assert_eq!(chat_gateway(&config).name(), "dryrun");
        assert_eq!(image_backend(&config).name(), "dryrun");
        assert_eq!(image_backend(&EngineConfig::default()).name(), "fal");
    }
}
