use axum::{
    Router,
    extract::FromRef,
    http::HeaderMap,
    routing::{get, post},
};
use axum_extra::extract::cookie::Key;
use headers::{HeaderMapExt, Host};
use std::sync::Arc;
use url::Url;

use crate::calendar::CalendarProvider;
use crate::config::Config;
use crate::db::Storage;
use crate::error::CalpushError;
use crate::google_oauth::{GoogleOauthService, TokenSource};
use crate::handlers::{google_oauth, webhook};
use crate::service::{ChannelLocks, ChannelRegistrar, SyncEngine};

pub const WEBHOOK_PATH: &str = "webhook";
pub const AUTH_CALLBACK_PATH: &str = "auth/callback";

/// Shared, read-only handles for every request.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub oauth: Arc<GoogleOauthService>,
    pub calendar: Arc<dyn CalendarProvider>,
    pub registrar: Arc<ChannelRegistrar>,
    pub sync: Arc<SyncEngine>,
    public_base_url: Option<Url>,
    cookie_key: Key,
}

impl AppState {
    pub fn new(
        cfg: &Config,
        storage: Storage,
        oauth: Arc<GoogleOauthService>,
        tokens: Arc<dyn TokenSource>,
        calendar: Arc<dyn CalendarProvider>,
    ) -> Self {
        let locks = ChannelLocks::new();
        let registrar = ChannelRegistrar::new(
            calendar.clone(),
            storage.clone(),
            locks.clone(),
            cfg.max_collision_retries,
        );
        let sync = SyncEngine::new(storage.clone(), tokens, calendar.clone(), locks);
        let cookie_key = cfg
            .cookie_secret
            .as_deref()
            .and_then(|secret| Key::try_from(secret.as_bytes()).ok())
            .unwrap_or_else(Key::generate);
        Self {
            storage,
            oauth,
            calendar,
            registrar: Arc::new(registrar),
            sync: Arc::new(sync),
            public_base_url: cfg.public_base_url.clone().map(as_directory),
            cookie_key,
        }
    }

    /// Absolute URL of one of this service's endpoints, from the configured
    /// public base or else `https://{Host}`.
    pub fn public_url(&self, headers: &HeaderMap, path: &str) -> Result<Url, CalpushError> {
        let base = match &self.public_base_url {
            Some(base) => base.clone(),
            None => {
                let host = headers
                    .typed_get::<Host>()
                    .ok_or_else(|| CalpushError::OauthFlow("missing Host header".to_string()))?;
                let authority = match host.port() {
                    Some(port) => format!("{}:{}", host.hostname(), port),
                    None => host.hostname().to_string(),
                };
                Url::parse(&format!("https://{authority}/"))?
            }
        };
        Ok(base.join(path)?)
    }
}

/// `Url::join` replaces the last segment of a base without a trailing slash.
fn as_directory(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

pub fn calpush_router(state: AppState) -> Router {
    Router::new()
        .route("/auth", get(google_oauth::google_oauth_entry))
        .route(
            "/auth/callback",
            get(google_oauth::google_oauth_callback).post(google_oauth::register_channel),
        )
        .route("/webhook", post(webhook::webhook_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::GoogleCalendarClient;
    use axum::http::{HeaderValue, header};
    use sqlx::sqlite::SqlitePoolOptions;

    fn state(public_base_url: Option<&str>) -> AppState {
        let cfg = Config {
            auth_client_id: "client".into(),
            auth_client_secret: "secret".into(),
            public_base_url: public_base_url.map(|u| Url::parse(u).expect("valid url")),
            ..Config::default()
        };
        let pool = SqlitePoolOptions::new()
            .connect_lazy("sqlite::memory:")
            .expect("lazy pool");
        let http = reqwest::Client::new();
        let oauth = Arc::new(GoogleOauthService::new(&cfg, http.clone()));
        let tokens: Arc<dyn TokenSource> = oauth.clone();
        let calendar: Arc<dyn CalendarProvider> = Arc::new(GoogleCalendarClient::new(
            http,
            cfg.calendar_api_base.clone(),
        ));
        AppState::new(&cfg, Storage::new(pool), oauth, tokens, calendar)
    }

    #[tokio::test]
    async fn public_base_path_prefix_is_kept() {
        for base in ["https://example.com/calpush", "https://example.com/calpush/"] {
            let url = state(Some(base))
                .public_url(&HeaderMap::new(), WEBHOOK_PATH)
                .expect("public url");
            assert_eq!(url.as_str(), "https://example.com/calpush/webhook");
        }
        let url = state(Some("https://example.com"))
            .public_url(&HeaderMap::new(), AUTH_CALLBACK_PATH)
            .expect("public url");
        assert_eq!(url.as_str(), "https://example.com/auth/callback");
    }

    #[tokio::test]
    async fn host_header_is_used_without_public_base() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("hooks.example.com:8443"));
        let url = state(None)
            .public_url(&headers, WEBHOOK_PATH)
            .expect("public url");
        assert_eq!(url.as_str(), "https://hooks.example.com:8443/webhook");

        assert!(state(None).public_url(&HeaderMap::new(), WEBHOOK_PATH).is_err());
    }
}
