pub mod generation;
pub mod pdf_extract;
pub mod pdf_render;
pub mod prompts;
pub mod strategy;

pub use generation::{GeminiClient, StudyGenerator};
pub use pdf_extract::{LopdfExtractor, PdfParser, TextExtractor};
pub use pdf_render::PdfRenderer;
pub use prompts::{Attachment, GenerationRequest};
pub use strategy::ContentStrategy;
