use super::endpoints::{GoogleOauthEndpoints, OauthClientConfig};
use crate::config::{Config, GOOGLE_AUTH_URL, GOOGLE_SCOPES, GOOGLE_TOKEN_URI, GOOGLE_USERINFO_URI};
use crate::db::Credential;
use crate::error::CalpushError;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, TimeDelta, Utc};
use oauth2::{AuthorizationCode, CsrfToken, TokenResponse, basic::BasicTokenResponse};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// Tokens this close to expiry are refreshed before use.
const EXPIRY_DELTA_SECS: i64 = 10;

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(3))
        .with_max_times(3)
        .with_jitter()
}

/// Access token to use for the current unit of work, plus whatever the token
/// endpoint returned alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshedToken {
    pub access_token: String,
    /// `None` when the provider did not rotate the refresh token.
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl RefreshedToken {
    fn from_response(resp: &BasicTokenResponse) -> Self {
        let lifetime = resp
            .expires_in()
            .and_then(|d| TimeDelta::from_std(d).ok())
            .unwrap_or_else(|| TimeDelta::seconds(DEFAULT_TOKEN_LIFETIME_SECS));
        Self {
            access_token: resp.access_token().secret().to_string(),
            refresh_token: resp
                .refresh_token()
                .map(|t| t.secret().to_string())
                .filter(|t| !t.is_empty()),
            expires_at: Utc::now() + lifetime,
        }
    }

    /// The stored token, unchanged.
    pub fn unchanged(cred: &Credential) -> Self {
        Self {
            access_token: cred.access_token.clone(),
            refresh_token: None,
            expires_at: cred.expires_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct UserInfo {
    pub id: String,
    #[serde(default)]
    pub given_name: Option<String>,
}

/// Source of a usable access token for a stored credential.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self, credential: &Credential) -> Result<RefreshedToken, CalpushError>;
}

/// True while the stored access token can still be presented as-is.
pub fn is_fresh(credential: &Credential, now: DateTime<Utc>) -> bool {
    !credential.access_token.is_empty()
        && credential.expires_at - TimeDelta::seconds(EXPIRY_DELTA_SECS) > now
}

/// Service layer to compose Google OAuth operations.
#[derive(Clone)]
pub struct GoogleOauthService {
    oauth: OauthClientConfig,
    userinfo_url: String,
    http: reqwest::Client,
}

impl GoogleOauthService {
    pub fn new(cfg: &Config, http: reqwest::Client) -> Self {
        Self {
            oauth: OauthClientConfig {
                client_id: cfg.auth_client_id.clone(),
                client_secret: cfg.auth_client_secret.clone(),
                auth_url: GOOGLE_AUTH_URL.to_string(),
                token_url: GOOGLE_TOKEN_URI.to_string(),
                scopes: GOOGLE_SCOPES.iter().map(|s| s.to_string()).collect(),
            },
            userinfo_url: GOOGLE_USERINFO_URI.to_string(),
            http,
        }
    }

    /// Point the token and userinfo calls somewhere other than Google.
    pub fn with_endpoints(
        mut self,
        token_url: impl Into<String>,
        userinfo_url: impl Into<String>,
    ) -> Self {
        self.oauth.token_url = token_url.into();
        self.userinfo_url = userinfo_url.into();
        self
    }

    pub fn authorize_url(&self, redirect: &Url) -> Result<(Url, CsrfToken), CalpushError> {
        GoogleOauthEndpoints::build_authorize_url(&self.oauth, redirect)
    }

    pub async fn exchange_code(
        &self,
        code: String,
        redirect: &Url,
    ) -> Result<RefreshedToken, CalpushError> {
        let resp = GoogleOauthEndpoints::exchange_authorization_code(
            &self.oauth,
            redirect,
            AuthorizationCode::new(code),
            &self.http,
        )
        .await?;
        Ok(RefreshedToken::from_response(&resp))
    }

    pub async fn fetch_userinfo(&self, access_token: &str) -> Result<UserInfo, CalpushError> {
        let resp =
            GoogleOauthEndpoints::fetch_userinfo(&self.userinfo_url, access_token, &self.http)
                .await?;
        Ok(resp.json().await?)
    }

    async fn refresh(&self, credential: &Credential) -> Result<RefreshedToken, CalpushError> {
        if credential.refresh_token.is_empty() {
            return Err(CalpushError::Oauth2Token(format!(
                "no refresh token stored for principal {}",
                credential.principal_id
            )));
        }
        let oauth = &self.oauth;
        let http = &self.http;
        let refresh_token = credential.refresh_token.as_str();

        let resp = (move || GoogleOauthEndpoints::refresh_access_token(oauth, refresh_token, http))
            .retry(default_retry_policy())
            .when(|e: &CalpushError| e.is_retryable())
            .notify(|err: &CalpushError, dur: Duration| {
                warn!(
                    principal_id = %credential.principal_id,
                    "token refresh retrying after error {}, sleeping {:?}",
                    err,
                    dur
                );
            })
            .await?;
        info!(principal_id = %credential.principal_id, "access token refreshed");
        Ok(RefreshedToken::from_response(&resp))
    }
}

#[async_trait]
impl TokenSource for GoogleOauthService {
    async fn token(&self, credential: &Credential) -> Result<RefreshedToken, CalpushError> {
        if is_fresh(credential, Utc::now()) {
            return Ok(RefreshedToken::unchanged(credential));
        }
        self.refresh(credential).await
    }
}
