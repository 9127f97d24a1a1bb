pub mod attributes;
pub mod models;
pub mod tryon;
pub mod vocabulary;

pub use attributes::{AttributeKind, GarmentAttributes, PersonAttributes, PersonHints};
pub use tryon::{GenerateInput, GenerationOutcome, InlineImage, TryOnRequest, TryOnResult};
pub use vocabulary::{BodyShape, Category, Fit, Pattern, SizeEstimate, Style, Vocabulary};
