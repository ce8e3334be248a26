//! Draft assembly, submission and publish-status reads
//!
//! A draft is a platform-side staged bundle of one or more articles,
//! identified by a media id. Publishing a draft starts an asynchronous
//! task identified by a publish id; [`DraftPublisher::get_publish_status`]
//! reads that task's state without mutating it.
//!
//! None of these calls retry. A retried draft submission could create a
//! duplicate draft, and duplicate avoidance takes priority over resilience.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::auth::TokenManager;
use super::{api_url, ApiError, ErrorEnvelope};

/// One article record inside a draft payload.
///
/// Field names match the platform wire format; the struct is serialized
/// directly into the `draft/add` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftArticle {
    pub title: String,
    pub author: String,
    pub digest: String,
    pub content: String,
    pub show_cover_pic: u8,
    pub content_source_url: String,
    pub thumb_media_id: String,
    pub need_open_comment: u8,
    pub only_fans_can_comment: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pic_crop_235_1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pic_crop_1_1: Option<String>,
}

impl DraftArticle {
    /// Creates an article with the required fields and platform defaults.
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        html_content: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            digest: String::new(),
            content: html_content.into(),
            show_cover_pic: 1,
            content_source_url: String::new(),
            thumb_media_id: String::new(),
            need_open_comment: 1,
            only_fans_can_comment: 0,
            pic_crop_235_1: None,
            pic_crop_1_1: None,
        }
    }

    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = digest.into();
        self
    }

    pub fn with_cover(mut self, thumb_media_id: impl Into<String>) -> Self {
        self.thumb_media_id = thumb_media_id.into();
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.content_source_url = url.into();
        self
    }

    pub fn with_comments(mut self, open: bool, fans_only: bool) -> Self {
        self.need_open_comment = open as u8;
        self.only_fans_can_comment = fans_only as u8;
        self
    }

    /// Sets the normalized cover crop regions (`x1_y1_x2_y2` fractions).
    pub fn with_crops(
        mut self,
        pic_crop_235_1: impl Into<String>,
        pic_crop_1_1: impl Into<String>,
    ) -> Self {
        self.pic_crop_235_1 = Some(pic_crop_235_1.into());
        self.pic_crop_1_1 = Some(pic_crop_1_1.into());
        self
    }
}

/// Publish task states, as reported by `freepublish/get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStatus {
    Success,
    Publishing,
    OriginalFail,
    NormalFail,
    PlatformAuditFail,
    UserDeleteAll,
    SystemBanAll,
}

impl PublishStatus {
    /// Decodes the platform's integer status code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(PublishStatus::Success),
            1 => Some(PublishStatus::Publishing),
            2 => Some(PublishStatus::OriginalFail),
            3 => Some(PublishStatus::NormalFail),
            4 => Some(PublishStatus::PlatformAuditFail),
            5 => Some(PublishStatus::UserDeleteAll),
            6 => Some(PublishStatus::SystemBanAll),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            PublishStatus::Success => 0,
            PublishStatus::Publishing => 1,
            PublishStatus::OriginalFail => 2,
            PublishStatus::NormalFail => 3,
            PublishStatus::PlatformAuditFail => 4,
            PublishStatus::UserDeleteAll => 5,
            PublishStatus::SystemBanAll => 6,
        }
    }

    /// Canonical name, used as the status description.
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStatus::Success => "SUCCESS",
            PublishStatus::Publishing => "PUBLISHING",
            PublishStatus::OriginalFail => "ORIGINAL_FAIL",
            PublishStatus::NormalFail => "NORMAL_FAIL",
            PublishStatus::PlatformAuditFail => "PLATFORM_AUDIT_FAIL",
            PublishStatus::UserDeleteAll => "USER_DELETE_ALL",
            PublishStatus::SystemBanAll => "SYSTEM_BAN_ALL",
        }
    }

    /// Whether the task has reached a final state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PublishStatus::Publishing)
    }

    /// Whether the task ended without a live article.
    pub fn is_failure(&self) -> bool {
        self.is_terminal() && !matches!(self, PublishStatus::Success)
    }
}

impl std::fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of submitting a draft for publication.
#[derive(Debug, Clone)]
pub struct SubmittedPublish {
    pub publish_id: u64,
    pub msg_data_id: Option<u64>,
}

/// Decoded publish task state.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishStatusInfo {
    pub publish_id: u64,
    pub status: PublishStatus,
    /// Status name, e.g. `ORIGINAL_FAIL`
    pub status_description: String,
    /// Live article id, set on success
    pub article_id: Option<String>,
    /// Public URLs of the published articles, set on success
    pub article_urls: Vec<String>,
    /// Indexes of articles that failed, surfaced verbatim when present
    pub fail_indexes: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct AddDraftResponse {
    #[serde(flatten)]
    err: ErrorEnvelope,
    media_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(flatten)]
    err: ErrorEnvelope,
    publish_id: Option<u64>,
    msg_data_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(flatten)]
    err: ErrorEnvelope,
    publish_id: Option<u64>,
    publish_status: Option<u8>,
    article_id: Option<String>,
    article_detail: Option<ArticleDetail>,
    #[serde(default)]
    fail_idx: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct ArticleDetail {
    #[serde(default)]
    item: Vec<ArticleDetailItem>,
}

#[derive(Debug, Deserialize)]
struct ArticleDetailItem {
    article_url: Option<String>,
}

/// Creates drafts and drives them through publication.
#[derive(Debug)]
pub struct DraftPublisher {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenManager>,
}

impl DraftPublisher {
    pub fn new(http: reqwest::Client, base_url: String, tokens: Arc<TokenManager>) -> Self {
        Self {
            http,
            base_url,
            tokens,
        }
    }

    /// Submits an article bundle as a new draft and returns its media id.
    pub async fn add_draft(&self, articles: &[DraftArticle]) -> Result<String, ApiError> {
        if articles.is_empty() {
            return Err(ApiError::Validation(
                "A draft needs at least one article".to_string(),
            ));
        }

        let token = self.tokens.get_token(false).await?;
        debug!(count = articles.len(), "creating draft");

        let response: AddDraftResponse = self
            .http
            .post(api_url(&self.base_url, "draft/add"))
            .query(&[("access_token", token.as_str())])
            .json(&serde_json::json!({ "articles": articles }))
            .send()
            .await?
            .json()
            .await?;

        response.err.check()?;
        let media_id = response.media_id.ok_or(ApiError::MissingField("media_id"))?;
        info!(media_id = %media_id, "draft created");
        Ok(media_id)
    }

    /// Submits a draft for publication and returns the publish task id.
    pub async fn publish_draft(&self, media_id: &str) -> Result<SubmittedPublish, ApiError> {
        let token = self.tokens.get_token(false).await?;
        debug!(media_id = %media_id, "submitting draft for publication");

        let response: SubmitResponse = self
            .http
            .post(api_url(&self.base_url, "freepublish/submit"))
            .query(&[("access_token", token.as_str())])
            .json(&serde_json::json!({ "media_id": media_id }))
            .send()
            .await?
            .json()
            .await?;

        response.err.check()?;
        let publish_id = response
            .publish_id
            .ok_or(ApiError::MissingField("publish_id"))?;
        info!(publish_id, "draft submitted for publication");

        Ok(SubmittedPublish {
            publish_id,
            msg_data_id: response.msg_data_id,
        })
    }

    /// Reads the state of a publish task. Pure read; never mutates remote
    /// state.
    pub async fn get_publish_status(&self, publish_id: u64) -> Result<PublishStatusInfo, ApiError> {
        let token = self.tokens.get_token(false).await?;

        let response: StatusResponse = self
            .http
            .post(api_url(&self.base_url, "freepublish/get"))
            .query(&[("access_token", token.as_str())])
            .json(&serde_json::json!({ "publish_id": publish_id }))
            .send()
            .await?
            .json()
            .await?;

        response.err.check()?;

        let code = response
            .publish_status
            .ok_or(ApiError::MissingField("publish_status"))?;
        let status = PublishStatus::from_code(code).ok_or(ApiError::UnknownStatusCode(code))?;

        let article_urls = match (status, &response.article_detail) {
            (PublishStatus::Success, Some(detail)) => detail
                .item
                .iter()
                .filter_map(|item| item.article_url.clone())
                .collect(),
            _ => Vec::new(),
        };

        Ok(PublishStatusInfo {
            publish_id: response.publish_id.unwrap_or(publish_id),
            status,
            status_description: status.as_str().to_string(),
            article_id: response.article_id,
            article_urls,
            fail_indexes: response.fail_idx,
        })
    }
}
