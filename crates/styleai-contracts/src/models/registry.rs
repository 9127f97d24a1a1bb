use indexmap::IndexMap;

pub const PERSON_ANALYSIS: &str = "person-analysis";
pub const GARMENT_ANALYSIS: &str = "garment-analysis";
pub const GARMENT_TRANSFER: &str = "garment-transfer";
pub const IMAGE_EDIT: &str = "image-edit";
pub const TEXT_TO_IMAGE: &str = "text-to-image";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<String>,
}

impl ModelSpec {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn by_capability(&self, capability: &str) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(capability))
            .cloned()
            .collect()
    }

    pub fn ensure(&self, name: &str, capability: &str) -> Option<ModelSpec> {
        let model = self.get(name)?;
        if model.supports(capability) {
            return Some(model.clone());
        }
        None
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, provider: &str, capabilities: &[&str]| {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                provider: provider.to_string(),
                capabilities: capabilities
                    .iter()
                    .map(|item| (*item).to_string())
                    .collect(),
            },
        );
    };

    insert(
        "google/gemini-2.5-flash",
        "gateway",
        &[PERSON_ANALYSIS, GARMENT_ANALYSIS],
    );
    insert(
        "openai/gpt-5-mini",
        "gateway",
        &[GARMENT_ANALYSIS, PERSON_ANALYSIS],
    );
    insert(
        "google/gemini-2.5-pro",
        "gateway",
        &[PERSON_ANALYSIS, GARMENT_ANALYSIS],
    );
    insert("openai/gpt-5", "gateway", &[PERSON_ANALYSIS, GARMENT_ANALYSIS]);
    insert("fal-ai/idm-vton", "fal", &[GARMENT_TRANSFER]);
    insert("fal-ai/flux/dev/image-to-image", "fal", &[IMAGE_EDIT]);
    insert("fal-ai/flux/dev", "fal", &[TEXT_TO_IMAGE]);
    insert("fal-ai/flux/schnell", "fal", &[TEXT_TO_IMAGE]);

    map
}
