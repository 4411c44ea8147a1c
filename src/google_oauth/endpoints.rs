use crate::error::CalpushError;

use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, RefreshToken,
    Scope, TokenUrl,
    basic::{BasicClient, BasicTokenResponse},
};
use oauth2::{EndpointNotSet, EndpointSet};
use url::Url;

pub(super) type GoogleOauth2Client =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Static parameters of the OAuth client registration.
#[derive(Debug, Clone)]
pub(super) struct OauthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
}

/// Stateless Google OAuth Endpoints.
pub(super) struct GoogleOauthEndpoints;

impl GoogleOauthEndpoints {
    /// Consent-page URL asking for offline access so a refresh token is issued.
    pub(super) fn build_authorize_url(
        cfg: &OauthClientConfig,
        redirect: &Url,
    ) -> Result<(Url, CsrfToken), CalpushError> {
        let client =
            build_oauth2_client(cfg)?.set_redirect_uri(RedirectUrl::from_url(redirect.clone()));
        let (url, csrf) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(cfg.scopes.iter().cloned().map(Scope::new))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();
        Ok((url, csrf))
    }

    pub(super) async fn exchange_authorization_code(
        cfg: &OauthClientConfig,
        redirect: &Url,
        code: AuthorizationCode,
        http_client: &reqwest::Client,
    ) -> Result<BasicTokenResponse, CalpushError> {
        let client =
            build_oauth2_client(cfg)?.set_redirect_uri(RedirectUrl::from_url(redirect.clone()));
        let token = client.exchange_code(code).request_async(http_client).await?;
        Ok(token)
    }

    /// Refresh the access token using the stored refresh token.
    pub(super) async fn refresh_access_token(
        cfg: &OauthClientConfig,
        refresh_token: &str,
        http_client: &reqwest::Client,
    ) -> Result<BasicTokenResponse, CalpushError> {
        let client = build_oauth2_client(cfg)?;
        let token = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(http_client)
            .await?;
        Ok(token)
    }

    pub(super) async fn fetch_userinfo(
        userinfo_url: &str,
        access_token: &str,
        http_client: &reqwest::Client,
    ) -> Result<reqwest::Response, CalpushError> {
        let resp = http_client
            .get(userinfo_url)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?;
        Ok(resp)
    }
}

/// Build the Google OAuth2 client from the registration parameters.
fn build_oauth2_client(cfg: &OauthClientConfig) -> Result<GoogleOauth2Client, CalpushError> {
    let client = BasicClient::new(ClientId::new(cfg.client_id.clone()))
        .set_client_secret(ClientSecret::new(cfg.client_secret.clone()))
        .set_auth_uri(AuthUrl::new(cfg.auth_url.clone())?)
        .set_token_uri(TokenUrl::new(cfg.token_url.clone())?);
    Ok(client)
}
