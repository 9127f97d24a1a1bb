mod registry;
mod selectors;

pub use registry::{
    ModelRegistry, ModelSpec, GARMENT_ANALYSIS, GARMENT_TRANSFER, IMAGE_EDIT, PERSON_ANALYSIS,
    TEXT_TO_IMAGE,
};
pub use selectors::{ModelSelection, ModelSelector};

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::{ModelRegistry, ModelSelector, ModelSpec, GARMENT_ANALYSIS, IMAGE_EDIT};

    fn chat_model(name: &str) -> ModelSpec {
        ModelSpec {
            name: name.to_string(),
            provider: "gateway".to_string(),
            capabilities: vec![GARMENT_ANALYSIS.to_string()],
        }
    }

    #[test]
    fn model_selector_falls_back_when_requested_model_unavailable() {
        let mut models = IndexMap::new();
        models.insert("chat-default".to_string(), chat_model("chat-default"));
        let selection = ModelSelector::new(Some(ModelRegistry::new(Some(models))))
            .select(Some("missing"), "chat-default", GARMENT_ANALYSIS)
            .unwrap();
        assert_eq!(selection.model.name, "chat-default");
        assert_eq!(selection.requested.as_deref(), Some("missing"));
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("Requested model 'missing' unavailable for capability 'garment-analysis'.")
        );
    }

    #[test]
    fn model_selector_no_request_uses_default_silently() {
        let selection = ModelSelector::new(None)
            .select(None, "openai/gpt-5-mini", GARMENT_ANALYSIS)
            .unwrap();
        assert_eq!(selection.model.name, "openai/gpt-5-mini");
        assert_eq!(selection.fallback_reason, None);
    }

    #[test]
    fn model_selector_rejects_model_without_capability() {
        let selection = ModelSelector::new(None)
            .select(Some("fal-ai/flux/dev"), "fal-ai/flux/dev/image-to-image", IMAGE_EDIT)
            .unwrap();
        assert_eq!(selection.model.name, "fal-ai/flux/dev/image-to-image");
        assert!(selection.fallback_reason.is_some());
    }

    #[test]
    fn model_selector_uses_first_registered_when_default_missing() {
        let mut models = IndexMap::new();
        models.insert("first".to_string(), chat_model("first"));
        models.insert("second".to_string(), chat_model("second"));
        let selection = ModelSelector::new(Some(ModelRegistry::new(Some(models))))
            .select(None, "gone", GARMENT_ANALYSIS)
            .unwrap();
        assert_eq!(selection.model.name, "first");
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("Default model 'gone' unavailable; using first registered model.")
        );
    }

    #[test]
    fn model_selector_raises_when_no_models_for_capability() {
        let mut models = IndexMap::new();
        models.insert("chat-only".to_string(), chat_model("chat-only"));
        let err = ModelSelector::new(Some(ModelRegistry::new(Some(models))))
            .select(Some("fal-ai/flux/dev"), "fal-ai/flux/dev", IMAGE_EDIT)
            .err()
            .unwrap_or_default();
        assert_eq!(err, "No models available for capability 'image-edit'.");
    }

    #[test]
    fn default_registry_lists_in_insertion_order() {
        let registry = ModelRegistry::new(None);
        let first = registry.list().next().map(|model| model.name.clone());
        assert_eq!(first.as_deref(), Some("google/gemini-2.5-flash"));
        assert_eq!(registry.by_capability(IMAGE_EDIT).len(), 1);
    }
}
