//! Media asset uploads
//!
//! Three upload paths, all multipart and all authenticated:
//!
//! - temporary material (`media/upload`), expires platform-side after a few
//!   days
//! - permanent material (`material/add_material`), used for cover images;
//!   video uploads additionally require a JSON description part
//! - inline article images (`media/uploadimg`), returning a URL usable
//!   directly in an `<img src>` inside article HTML
//!
//! Results are never cached locally; a repeated call re-uploads.

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::auth::TokenManager;
use super::{api_url, ApiError, ErrorEnvelope};

/// Media kinds accepted by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Voice,
    Video,
    Thumb,
}

impl MediaKind {
    /// Wire name used in the `type` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Voice => "voice",
            MediaKind::Video => "video",
            MediaKind::Thumb => "thumb",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Title and introduction required for permanent video material.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VideoDescription {
    pub title: String,
    pub introduction: String,
}

/// Result of a permanent material upload. `url` is populated for images.
#[derive(Debug, Clone)]
pub struct UploadedMaterial {
    pub media_id: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(flatten)]
    err: ErrorEnvelope,
    media_id: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InlineImageResponse {
    #[serde(flatten)]
    err: ErrorEnvelope,
    url: Option<String>,
}

/// Uploads binary assets to the platform.
#[derive(Debug)]
pub struct MediaUploader {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenManager>,
}

impl MediaUploader {
    pub fn new(http: reqwest::Client, base_url: String, tokens: Arc<TokenManager>) -> Self {
        Self {
            http,
            base_url,
            tokens,
        }
    }

    /// Uploads a temporary asset and returns its media id.
    pub async fn upload_temporary(&self, kind: MediaKind, path: &Path) -> Result<String, ApiError> {
        let part = self.file_part(path).await?;
        let token = self.tokens.get_token(false).await?;
        debug!(kind = %kind, path = %path.display(), "uploading temporary media");

        let response: UploadResponse = self
            .http
            .post(api_url(&self.base_url, "media/upload"))
            .query(&[("access_token", token.as_str()), ("type", kind.as_str())])
            .multipart(Form::new().part("media", part))
            .send()
            .await?
            .json()
            .await?;

        response.err.check()?;
        response.media_id.ok_or(ApiError::MissingField("media_id"))
    }

    /// Uploads a permanent asset. Video uploads require a description;
    /// image uploads also return a URL.
    pub async fn upload_permanent(
        &self,
        kind: MediaKind,
        path: &Path,
        description: Option<VideoDescription>,
    ) -> Result<UploadedMaterial, ApiError> {
        if kind == MediaKind::Video && description.is_none() {
            return Err(ApiError::Validation(
                "Title and introduction are required for video materials".to_string(),
            ));
        }

        let part = self.file_part(path).await?;
        let token = self.tokens.get_token(false).await?;
        debug!(kind = %kind, path = %path.display(), "uploading permanent material");

        let mut form = Form::new().part("media", part);
        if let (MediaKind::Video, Some(description)) = (kind, &description) {
            let json = serde_json::to_string(description)
                .map_err(|e| ApiError::Validation(format!("Invalid video description: {e}")))?;
            form = form.part("description", Part::text(json).mime_str("application/json")?);
        }

        let response: UploadResponse = self
            .http
            .post(api_url(&self.base_url, "material/add_material"))
            .query(&[("access_token", token.as_str()), ("type", kind.as_str())])
            .multipart(form)
            .send()
            .await?
            .json()
            .await?;

        response.err.check()?;
        let media_id = response.media_id.ok_or(ApiError::MissingField("media_id"))?;
        Ok(UploadedMaterial {
            media_id,
            url: response.url,
        })
    }

    /// Uploads an image embedded in an article body and returns the URL to
    /// reference it by. Not for cover images.
    pub async fn upload_inline_image(&self, path: &Path) -> Result<String, ApiError> {
        let part = self.file_part(path).await?;
        let token = self.tokens.get_token(false).await?;
        debug!(path = %path.display(), "uploading inline article image");

        let response: InlineImageResponse = self
            .http
            .post(api_url(&self.base_url, "media/uploadimg"))
            .query(&[("access_token", token.as_str())])
            .multipart(Form::new().part("media", part))
            .send()
            .await?
            .json()
            .await?;

        response.err.check()?;
        response.url.ok_or(ApiError::MissingField("url"))
    }

    /// Reads a local file into a multipart part, failing with a validation
    /// error when the file is missing.
    async fn file_part(&self, path: &Path) -> Result<Part, ApiError> {
        let bytes = tokio::fs::read(path).await.map_err(|_| {
            ApiError::Validation(format!("File not found: {}", path.display()))
        })?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "media".to_string());

        Ok(Part::bytes(bytes).file_name(filename))
    }
}
