//! Publish orchestration
//!
//! Drives one article document through the whole pipeline:
//!
//! 1. load the document and check it has a cover image
//! 2. optionally rewrite fenced code blocks into rendered images
//! 3. upload local images referenced by the body and rewrite the references
//! 4. render the body to styled HTML
//! 5. upload the cover as permanent material and compute its crop regions
//! 6. create the draft, submit it for publication, poll the publish status
//! 7. on success, write the publish URL back into the document metadata
//!
//! Ordering matters: the token refresh precedes every authenticated call,
//! the cover upload precedes draft assembly (the payload embeds the media
//! id) and the draft submission precedes the first status poll.
//!
//! Nothing here retries uploads or draft calls - a retried submission
//! could create a duplicate draft. Only the status poll loop retries, and
//! only while the platform reports the task as still publishing.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{ArticleDocument, DocumentError};
use crate::services::code_image::CodeImageRenderer;
use crate::services::cover::cover_crop_fractions;
use crate::services::generator::AltTextGenerator;
use crate::services::markdown::StyleRenderer;
use crate::services::materialize::CodeBlockMaterializer;
use crate::wechat::{ApiError, DraftArticle, MediaKind, PollOutcome, StatusPoller, WeChatClient};

/// Characters of body text used for the digest when metadata has none.
const DIGEST_LEN: usize = 120;

/// Publish pipeline errors
#[derive(Debug, Error)]
pub enum PublishError {
    /// Reading or writing the article document failed
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// A platform call failed
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The document cannot be published as-is
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Everything a caller needs to know about one publish attempt.
///
/// `poll` distinguishes success, terminal failure and "status unknown,
/// check manually" - callers must not collapse those into two cases.
#[derive(Debug)]
pub struct PublishOutcome {
    pub draft_media_id: String,
    pub publish_id: u64,
    pub poll: PollOutcome,
}

/// Publishes article documents to the platform.
pub struct Publisher {
    client: WeChatClient,
    renderer: StyleRenderer,
    poller: StatusPoller,
    alt_text: Option<Arc<dyn AltTextGenerator>>,
    code_images: Option<Arc<dyn CodeImageRenderer>>,
}

impl Publisher {
    pub fn new(client: WeChatClient, renderer: StyleRenderer, poller: StatusPoller) -> Self {
        Self {
            client,
            renderer,
            poller,
            alt_text: None,
            code_images: None,
        }
    }

    /// Enables the code-block-to-image pass. Both capabilities are needed:
    /// captions for the images, and something to render them.
    pub fn with_code_materialization(
        mut self,
        alt_text: Arc<dyn AltTextGenerator>,
        code_images: Arc<dyn CodeImageRenderer>,
    ) -> Self {
        self.alt_text = Some(alt_text);
        self.code_images = Some(code_images);
        self
    }

    /// Publishes the article document at `path` and writes the publish URL
    /// back into its metadata on success.
    pub async fn publish_file(&self, path: &Path) -> Result<PublishOutcome, PublishError> {
        let mut doc = ArticleDocument::load(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        let outcome = self.publish_document(&mut doc, base_dir).await?;

        if matches!(outcome.poll, PollOutcome::Published { .. }) {
            doc.save(path)?;
        }
        Ok(outcome)
    }

    /// Publishes an already-loaded document. On success the document's
    /// metadata is updated in place; persisting it is the caller's job.
    pub async fn publish_document(
        &self,
        doc: &mut ArticleDocument,
        base_dir: &Path,
    ) -> Result<PublishOutcome, PublishError> {
        let cover = doc.meta.cover_image.clone().ok_or_else(|| {
            PublishError::Validation(
                "Article has no cover_image; a cover is required to publish".to_string(),
            )
        })?;

        let title = doc.title();
        info!(title = %title, "publishing article");

        // optional enhancement pass; never blocks publication
        let mut body = doc.body.clone();
        if let (Some(alt_text), Some(code_images)) = (&self.alt_text, &self.code_images) {
            let materializer = CodeBlockMaterializer::new(base_dir);
            body = materializer
                .materialize(&body, alt_text.as_ref(), code_images.as_ref())
                .await;
        }

        let body = self.upload_local_images(&body, base_dir).await?;
        let html = self.renderer.render(&body);

        info!(cover = %cover.url, "uploading cover image");
        let cover_path = resolve_path(base_dir, &cover.url);
        let material = self
            .client
            .media()
            .upload_permanent(MediaKind::Image, &cover_path, None)
            .await?;

        let (pic_crop_235_1, pic_crop_1_1) = cover_crop_fractions();
        let article = DraftArticle::new(title, &doc.meta.author, html)
            .with_digest(doc.digest(DIGEST_LEN))
            .with_cover(material.media_id)
            .with_source_url(doc.meta.publish_url.clone().unwrap_or_default())
            .with_crops(pic_crop_235_1, pic_crop_1_1);

        let draft_media_id = self.client.drafts().add_draft(&[article]).await?;
        let submitted = self.client.drafts().publish_draft(&draft_media_id).await?;

        let poll = self
            .poller
            .poll(self.client.drafts(), submitted.publish_id)
            .await?;

        match &poll {
            PollOutcome::Published { article_urls, .. } => {
                if let Some(url) = article_urls.first() {
                    doc.mark_published(url);
                }
            }
            PollOutcome::Failed {
                description,
                fail_indexes,
                ..
            } => {
                warn!(status = %description, fail_indexes = ?fail_indexes, "publish failed");
            }
            PollOutcome::Unknown { attempts } => {
                warn!(
                    attempts,
                    publish_id = submitted.publish_id,
                    "publish status unknown after polling; check the task manually"
                );
            }
        }

        Ok(PublishOutcome {
            draft_media_id,
            publish_id: submitted.publish_id,
            poll,
        })
    }

    /// Uploads every local image the body references and rewrites the
    /// references to the returned platform URLs. References that do not
    /// resolve to an existing local file are left as they are.
    async fn upload_local_images(
        &self,
        body: &str,
        base_dir: &Path,
    ) -> Result<String, ApiError> {
        static IMAGE_RE: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"!\[(?P<alt>[^\]]*)\]\((?P<path>[^)]+)\)").expect("image regex is valid")
        });

        let mut output = String::with_capacity(body.len());
        let mut last_end = 0;

        for caps in IMAGE_RE.captures_iter(body) {
            let whole = caps.get(0).expect("capture 0 always present");
            output.push_str(&body[last_end..whole.start()]);
            last_end = whole.end();

            let alt = caps.name("alt").map(|m| m.as_str()).unwrap_or("");
            let target = caps.name("path").map(|m| m.as_str()).unwrap_or("");

            let local_path = resolve_path(base_dir, target);
            if is_remote(target) || !local_path.is_file() {
                output.push_str(whole.as_str());
                continue;
            }

            info!(path = %local_path.display(), "uploading inline image");
            let url = self.client.media().upload_inline_image(&local_path).await?;
            output.push_str(&format!("![{alt}]({url})"));
        }

        output.push_str(&body[last_end..]);
        Ok(output)
    }
}

fn is_remote(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://")
}

fn resolve_path(base_dir: &Path, target: &str) -> PathBuf {
    let path = Path::new(target);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
