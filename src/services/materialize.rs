//! Code-block materialization
//!
//! Replaces fenced code blocks in an article body with rendered image
//! references: the code is rendered to a PNG (headless-browser capability)
//! and the fence becomes `![alt](code_images/<timestamp>_<lang>.png)`.
//!
//! Image generation is an enhancement, not a requirement, so everything
//! degrades gracefully:
//! - if rendering fails, the fence stays byte-identical and the generated
//!   alt text is appended as a `<!-- alt: ... -->` comment so a retry can
//!   reuse it without calling the generator again
//! - if alt-text generation fails, the fence stays untouched entirely
//!
//! The article remains valid and publishable whatever happens here.

use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::code_image::CodeImageRenderer;
use super::generator::AltTextGenerator;

/// Subdirectory (under the article directory) that code images land in.
const IMAGE_SUBDIR: &str = "code_images";

/// A fenced code block, optionally followed by an alt-text comment.
static FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```(?P<lang>\w+)?\n(?P<code>[\s\S]+?)\n```(?:[ \t]*\n?<!-- alt: (?P<alt>.*?) -->)?")
        .expect("fence regex is valid")
});

/// Rewrites fenced code blocks into image references.
pub struct CodeBlockMaterializer {
    article_dir: PathBuf,
}

impl CodeBlockMaterializer {
    /// Creates a materializer writing images below `article_dir`.
    pub fn new(article_dir: impl Into<PathBuf>) -> Self {
        Self {
            article_dir: article_dir.into(),
        }
    }

    /// Processes every fenced code block in `markdown`.
    ///
    /// An explicit `<!-- alt: ... -->` comment right after a fence wins
    /// over the generator. The returned text is always a valid article
    /// body; failures only mean some fences stay as fences.
    pub async fn materialize(
        &self,
        markdown: &str,
        alt_text: &dyn AltTextGenerator,
        images: &dyn CodeImageRenderer,
    ) -> String {
        let mut output = String::with_capacity(markdown.len());
        let mut last_end = 0;

        for caps in FENCE_RE.captures_iter(markdown) {
            let whole = caps.get(0).expect("capture 0 always present");
            output.push_str(&markdown[last_end..whole.start()]);
            last_end = whole.end();

            let language = caps
                .name("lang")
                .map(|m| m.as_str())
                .unwrap_or("text");
            let code = caps.name("code").map(|m| m.as_str()).unwrap_or("");
            let explicit_alt = caps.name("alt").map(|m| m.as_str().to_string());

            let replacement = self
                .process_block(whole.as_str(), code, language, explicit_alt, alt_text, images)
                .await;
            output.push_str(&replacement);
        }

        output.push_str(&markdown[last_end..]);
        output
    }

    async fn process_block(
        &self,
        matched: &str,
        code: &str,
        language: &str,
        explicit_alt: Option<String>,
        alt_text: &dyn AltTextGenerator,
        images: &dyn CodeImageRenderer,
    ) -> String {
        let alt = match explicit_alt {
            Some(alt) => alt,
            None => match alt_text.generate_alt_text(code, language).await {
                Ok(alt) => alt,
                Err(e) => {
                    warn!(language, error = %e, "alt text generation failed, keeping code block");
                    return matched.to_string();
                }
            },
        };

        match images.render(code, language).await {
            Ok(bytes) => match self.write_image(&bytes, language).await {
                Ok(relative_path) => {
                    debug!(language, path = %relative_path, "code block rendered to image");
                    format!("\n![{alt}]({relative_path})\n")
                }
                Err(e) => {
                    warn!(language, error = %e, "writing code image failed, keeping code block");
                    self.fence_with_alt(code, language, &alt)
                }
            },
            Err(e) => {
                warn!(language, error = %e, "code image rendering failed, keeping code block");
                self.fence_with_alt(code, language, &alt)
            }
        }
    }

    /// The degraded form: the original fence plus the caption comment, so a
    /// later retry skips alt-text generation.
    fn fence_with_alt(&self, code: &str, language: &str, alt: &str) -> String {
        format!("\n```{language}\n{code}\n```\n<!-- alt: {alt} -->\n")
    }

    async fn write_image(&self, bytes: &[u8], language: &str) -> std::io::Result<String> {
        let image_dir = self.article_dir.join(IMAGE_SUBDIR);
        tokio::fs::create_dir_all(&image_dir).await?;

        let filename = format!("{}_{}.png", Local::now().format("%Y%m%d%H%M%S"), language);
        tokio::fs::write(image_dir.join(&filename), bytes).await?;

        Ok(format!("{IMAGE_SUBDIR}/{filename}"))
    }

    /// The directory images are written below.
    pub fn article_dir(&self) -> &Path {
        &self.article_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::code_image::CodeImageError;
    use crate::services::generator::GenerationError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedAltText {
        calls: AtomicU32,
    }

    impl FixedAltText {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl AltTextGenerator for FixedAltText {
        async fn generate_alt_text(
            &self,
            _code: &str,
            language: &str,
        ) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("Generated caption for {language} code"))
        }
    }

    struct FailingAltText;

    #[async_trait]
    impl AltTextGenerator for FailingAltText {
        async fn generate_alt_text(
            &self,
            _code: &str,
            _language: &str,
        ) -> Result<String, GenerationError> {
            Err(GenerationError::EmptyResponse)
        }
    }

    struct PngRenderer;

    #[async_trait]
    impl CodeImageRenderer for PngRenderer {
        async fn render(&self, _code: &str, _language: &str) -> Result<Vec<u8>, CodeImageError> {
            Ok(b"\x89PNG\r\n\x1a\nfake".to_vec())
        }
    }

    struct BrokenRenderer;

    #[async_trait]
    impl CodeImageRenderer for BrokenRenderer {
        async fn render(&self, _code: &str, _language: &str) -> Result<Vec<u8>, CodeImageError> {
            Err(CodeImageError::Render("browser exploded".to_string()))
        }
    }

    const DOC: &str = "intro text\n\n```rust\nfn main() {}\n```\n\nclosing text\n";

    #[tokio::test]
    async fn test_successful_render_replaces_fence_with_image() {
        let dir = tempfile::tempdir().unwrap();
        let materializer = CodeBlockMaterializer::new(dir.path());

        let result = materializer
            .materialize(DOC, &FixedAltText::new(), &PngRenderer)
            .await;

        assert!(!result.contains("```rust"));
        assert!(result.contains("![Generated caption for rust code](code_images/"));
        assert!(result.contains("_rust.png)"));
        assert!(result.starts_with("intro text\n"));
        assert!(result.ends_with("closing text\n"));

        // the image actually landed on disk
        let entries: Vec<_> = std::fs::read_dir(dir.path().join("code_images"))
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_render_failure_keeps_fence_and_appends_alt() {
        let dir = tempfile::tempdir().unwrap();
        let materializer = CodeBlockMaterializer::new(dir.path());

        let result = materializer
            .materialize(DOC, &FixedAltText::new(), &BrokenRenderer)
            .await;

        // fence text survives byte-identical
        assert!(result.contains("```rust\nfn main() {}\n```"));
        assert!(result.contains("<!-- alt: Generated caption for rust code -->"));
    }

    #[tokio::test]
    async fn test_explicit_alt_comment_suppresses_generator() {
        let doc = "```go\nfunc main() {}\n```\n<!-- alt: Hand-written caption -->\n\nrest\n";
        let dir = tempfile::tempdir().unwrap();
        let materializer = CodeBlockMaterializer::new(dir.path());
        let alt_text = FixedAltText::new();

        let result = materializer.materialize(doc, &alt_text, &PngRenderer).await;

        assert_eq!(alt_text.calls.load(Ordering::SeqCst), 0);
        assert!(result.contains("![Hand-written caption](code_images/"));
        assert!(result.contains("_go.png)"));
    }

    #[tokio::test]
    async fn test_alt_failure_leaves_fence_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let materializer = CodeBlockMaterializer::new(dir.path());

        let result = materializer
            .materialize(DOC, &FailingAltText, &PngRenderer)
            .await;

        assert_eq!(result, DOC);
    }

    #[tokio::test]
    async fn test_fence_without_language_defaults_to_text() {
        let doc = "```\nsome output\n```\n";
        let dir = tempfile::tempdir().unwrap();
        let materializer = CodeBlockMaterializer::new(dir.path());

        let result = materializer
            .materialize(doc, &FixedAltText::new(), &PngRenderer)
            .await;

        assert!(result.contains("_text.png)"));
        assert!(result.contains("![Generated caption for text code]"));
    }

    #[tokio::test]
    async fn test_multiple_fences_processed_independently() {
        let doc = "```rust\nfn a() {}\n```\n\nmiddle\n\n```python\nprint(1)\n```\n";
        let dir = tempfile::tempdir().unwrap();
        let materializer = CodeBlockMaterializer::new(dir.path());

        let result = materializer
            .materialize(doc, &FixedAltText::new(), &PngRenderer)
            .await;

        assert!(result.contains("_rust.png)"));
        assert!(result.contains("_python.png)"));
        assert!(result.contains("middle"));
        assert!(!result.contains("```"));
    }

    #[tokio::test]
    async fn test_document_without_fences_unchanged() {
        let doc = "just prose, no code at all\n";
        let dir = tempfile::tempdir().unwrap();
        let materializer = CodeBlockMaterializer::new(dir.path());

        let result = materializer
            .materialize(doc, &FixedAltText::new(), &PngRenderer)
            .await;
        assert_eq!(result, doc);
    }
}
