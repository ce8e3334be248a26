//! Access token management
//!
//! The platform issues short-lived bearer tokens. [`TokenManager`] owns the
//! single cached credential; every authenticated call goes through
//! [`TokenManager::get_token`] so expiry is always checked before use. The
//! stored expiry is pulled forward by a safety margin to stay clear of the
//! platform's own clock.
//!
//! Two tasks racing into a refresh is tolerated: the last writer wins and
//! both tokens stay valid until their own expiry.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use super::{api_url, ApiError, ErrorEnvelope};

/// Refresh this many seconds before the platform-reported expiry.
const EXPIRY_SAFETY_MARGIN_SECS: i64 = 300;

/// A cached credential.
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenInfo {
    /// Whether the credential is still usable at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(flatten)]
    err: ErrorEnvelope,
    access_token: Option<String>,
    expires_in: Option<i64>,
}

/// Owns the bearer credential and refreshes it on demand.
#[derive(Debug)]
pub struct TokenManager {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
    app_secret: String,
    cached: RwLock<Option<TokenInfo>>,
}

impl TokenManager {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        app_id: String,
        app_secret: String,
    ) -> Self {
        Self {
            http,
            base_url,
            app_id,
            app_secret,
            cached: RwLock::new(None),
        }
    }

    /// Returns a usable access token, refreshing if `force` is set or the
    /// cached credential has reached its expiry.
    ///
    /// A rejected refresh is an [`ApiError::Auth`] and is not retried here;
    /// the caller decides whether to retry once with `force`.
    pub async fn get_token(&self, force: bool) -> Result<String, ApiError> {
        if !force {
            let cached = self.cached.read().await;
            if let Some(info) = cached.as_ref() {
                if info.is_valid_at(Utc::now()) {
                    return Ok(info.token.clone());
                }
            }
        }
        self.refresh().await
    }

    /// Current cached credential, for diagnostics.
    pub async fn token_info(&self) -> Option<TokenInfo> {
        self.cached.read().await.clone()
    }

    async fn refresh(&self) -> Result<String, ApiError> {
        debug!("refreshing access token");

        let response: TokenResponse = self
            .http
            .get(api_url(&self.base_url, "token"))
            .query(&[
                ("grant_type", "client_credential"),
                ("appid", self.app_id.as_str()),
                ("secret", self.app_secret.as_str()),
            ])
            .send()
            .await?
            .json()
            .await?;

        if let Some((code, message)) = response.err.platform_error() {
            return Err(ApiError::Auth { code, message });
        }

        let token = response
            .access_token
            .ok_or(ApiError::MissingField("access_token"))?;
        let expires_in = response
            .expires_in
            .ok_or(ApiError::MissingField("expires_in"))?;

        let info = TokenInfo {
            token: token.clone(),
            expires_at: Utc::now()
                + ChronoDuration::seconds(expires_in - EXPIRY_SAFETY_MARGIN_SECS),
        };
        debug!(expires_at = %info.expires_at, "access token refreshed");

        *self.cached.write().await = Some(info);
        Ok(token)
    }

    /// Replaces the cached credential directly. Test-only seam for expiry
    /// boundary checks.
    #[cfg(test)]
    pub(crate) async fn set_cached(&self, info: TokenInfo) {
        *self.cached.write().await = Some(info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn manager_for(server: &MockServer) -> TokenManager {
        TokenManager::new(
            reqwest::Client::new(),
            server.uri(),
            "wx_test_app".to_string(),
            "test_secret".to_string(),
        )
    }

    #[tokio::test]
    async fn test_fetches_token_on_first_use() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .and(query_param("grant_type", "client_credential"))
            .and(query_param("appid", "wx_test_app"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "TOKEN_A",
                "expires_in": 7200
            })))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager_for(&server);
        let token = manager.get_token(false).await.unwrap();
        assert_eq!(token, "TOKEN_A");

        let info = manager.token_info().await.unwrap();
        // expiry carries the 300s safety margin
        let lifetime = info.expires_at - Utc::now();
        assert!(lifetime <= ChronoDuration::seconds(7200 - 300));
        assert!(lifetime > ChronoDuration::seconds(7200 - 300 - 60));
    }

    #[tokio::test]
    async fn test_cached_token_skips_network_before_expiry() {
        let server = MockServer::start().await;
        // zero expected calls: a valid cached credential must not refresh
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "TOKEN_B",
                "expires_in": 7200
            })))
            .expect(0)
            .mount(&server)
            .await;

        let manager = manager_for(&server);
        manager
            .set_cached(TokenInfo {
                token: "CACHED".to_string(),
                expires_at: Utc::now() + ChronoDuration::seconds(1),
            })
            .await;

        let token = manager.get_token(false).await.unwrap();
        assert_eq!(token, "CACHED");
    }

    #[tokio::test]
    async fn test_expired_token_triggers_exactly_one_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "TOKEN_C",
                "expires_in": 7200
            })))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager_for(&server);
        manager
            .set_cached(TokenInfo {
                token: "STALE".to_string(),
                expires_at: Utc::now(),
            })
            .await;

        let token = manager.get_token(false).await.unwrap();
        assert_eq!(token, "TOKEN_C");
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_fresh_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "TOKEN_D",
                "expires_in": 7200
            })))
            .expect(1)
            .mount(&server)
            .await;

        let manager = manager_for(&server);
        manager
            .set_cached(TokenInfo {
                token: "FRESH".to_string(),
                expires_at: Utc::now() + ChronoDuration::hours(1),
            })
            .await;

        let token = manager.get_token(true).await.unwrap();
        assert_eq!(token, "TOKEN_D");
    }

    #[tokio::test]
    async fn test_rejected_refresh_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "errcode": 40125,
                "errmsg": "invalid appsecret"
            })))
            .mount(&server)
            .await;

        let manager = manager_for(&server);
        match manager.get_token(false).await {
            Err(ApiError::Auth { code, message }) => {
                assert_eq!(code, 40125);
                assert_eq!(message, "invalid appsecret");
            }
            other => panic!("expected Auth error, got {other:?}"),
        }
    }
}
