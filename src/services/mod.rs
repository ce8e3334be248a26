//! Services layer - pipeline logic
//!
//! This module contains the pipeline stages between a Markdown article
//! document and a live platform article:
//! - rendering Markdown to inline-styled HTML
//! - replacing fenced code blocks with rendered images
//! - generating content and alt-text captions through an LLM backend
//! - computing composite-cover crop regions
//! - orchestrating the publish flow end to end

pub mod code_image;
pub mod cover;
pub mod generator;
pub mod markdown;
pub mod materialize;
pub mod publisher;

pub use code_image::{preview_html, wrap_code, CodeImageError, CodeImageRenderer, DEFAULT_WRAP_WIDTH};
pub use cover::{cover_crop_fractions, CropRegion, COMPOSITE_HEIGHT, COMPOSITE_WIDTH};
pub use generator::{AltTextGenerator, ChatCompletionClient, ContentGenerator, GenerationError};
pub use markdown::StyleRenderer;
pub use materialize::CodeBlockMaterializer;
pub use publisher::{PublishError, PublishOutcome, Publisher};
