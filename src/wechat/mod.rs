//! Official Account platform client
//!
//! Client for the stateful publishing API: credential refresh, media
//! uploads, draft creation and asynchronous publish-status polling. Each
//! concern lives in its own submodule behind [`WeChatClient`]:
//!
//! - [`auth::TokenManager`] - bearer credential with expiry
//! - [`media::MediaUploader`] - temporary/permanent/inline asset uploads
//! - [`draft::DraftPublisher`] - draft assembly, submission and status reads
//! - [`poller::StatusPoller`] - bounded-retry publish-status loop
//!
//! Components raise typed [`ApiError`]s and never retry on their own.

pub mod auth;
pub mod draft;
mod error;
pub mod media;
pub mod poller;

pub use auth::{TokenInfo, TokenManager};
pub use draft::{DraftArticle, DraftPublisher, PublishStatus, PublishStatusInfo, SubmittedPublish};
pub use error::ApiError;
pub use media::{MediaKind, MediaUploader, UploadedMaterial, VideoDescription};
pub use poller::{PollOutcome, Sleeper, StatusPoller, StatusSource, TokioSleeper};

use crate::config::{PublishConfig, WeChatConfig};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Error envelope embedded in platform response bodies.
///
/// Success bodies usually omit `errcode` entirely; `freepublish/submit`
/// includes it with value 0. Either way, only a present non-zero code is
/// an error.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub errcode: Option<i64>,
    pub errmsg: Option<String>,
}

impl ErrorEnvelope {
    /// Returns the embedded platform error, if the body carries one.
    pub(crate) fn platform_error(&self) -> Option<(i64, String)> {
        match self.errcode {
            Some(code) if code != 0 => Some((
                code,
                self.errmsg
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            )),
            _ => None,
        }
    }

    /// Maps an embedded error to [`ApiError::Remote`].
    pub(crate) fn check(&self) -> Result<(), ApiError> {
        match self.platform_error() {
            Some((code, message)) => Err(ApiError::Remote { code, message }),
            None => Ok(()),
        }
    }
}

/// Joins the API base URL with an endpoint path.
pub(crate) fn api_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

/// Top-level platform client owning the HTTP connection pool and the
/// shared credential.
#[derive(Debug)]
pub struct WeChatClient {
    token_manager: Arc<TokenManager>,
    media: MediaUploader,
    drafts: DraftPublisher,
}

impl WeChatClient {
    /// Creates a client from configuration.
    pub fn new(config: &WeChatConfig, publish: &PublishConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(publish.http_timeout_secs))
            .build()?;

        let token_manager = Arc::new(TokenManager::new(
            http.clone(),
            config.base_url.clone(),
            config.app_id.clone(),
            config.app_secret.clone(),
        ));

        let media = MediaUploader::new(
            http.clone(),
            config.base_url.clone(),
            Arc::clone(&token_manager),
        );
        let drafts = DraftPublisher::new(http, config.base_url.clone(), Arc::clone(&token_manager));

        Ok(Self {
            token_manager,
            media,
            drafts,
        })
    }

    /// The media upload component.
    pub fn media(&self) -> &MediaUploader {
        &self.media
    }

    /// The draft/publish component.
    pub fn drafts(&self) -> &DraftPublisher {
        &self.drafts
    }

    /// The shared credential manager.
    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.token_manager
    }

    /// Forces a credential refresh.
    pub async fn refresh_token(&self) -> Result<String, ApiError> {
        self.token_manager.get_token(true).await
    }
}
