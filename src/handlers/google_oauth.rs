use crate::db::Credential;
use crate::error::CalpushError;
use crate::pages;
use crate::router::{AUTH_CALLBACK_PATH, AppState, WEBHOOK_PATH};
use axum::{
    Form,
    extract::{Query, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use oauth2::CsrfToken;
use serde::Deserialize;
use subtle::ConstantTimeEq;
use time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Deserialize)]
pub struct AuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub access_token: String,
    pub calendar_id: String,
}

const CSRF_COOKIE: &str = "calpush_oauth_state";

/// GET /auth -> redirects to Google's consent page.
pub async fn google_oauth_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: PrivateCookieJar,
) -> Result<impl IntoResponse, CalpushError> {
    let redirect = state.public_url(&headers, AUTH_CALLBACK_PATH)?;
    let (auth_url, csrf_token) = state.oauth.authorize_url(&redirect)?;
    let jar = store_oauth_state(jar, &csrf_token);

    info!("Dispatching OAuth redirect");
    Ok((jar, Redirect::temporary(auth_url.as_str())))
}

/// GET /auth/callback -> exchanges the code, stores the credential and lists
/// the user's calendars to pick from.
pub async fn google_oauth_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AuthCallbackQuery>,
    jar: PrivateCookieJar,
) -> Response {
    let (expected_state, jar) = match load_oauth_state(jar) {
        Ok(data) => data,
        Err((jar, err)) => return respond_with_error(jar, err),
    };

    if let Some(err) = query.error.as_deref() {
        return respond_with_error(
            jar,
            CalpushError::OauthFlow(format!("authorization denied: {err}")),
        );
    }

    let Some(state_param) = query.state.as_deref() else {
        return respond_with_error(
            jar,
            CalpushError::OauthFlow("missing `state` in callback".to_string()),
        );
    };
    if !bool::from(state_param.as_bytes().ct_eq(expected_state.as_bytes())) {
        return respond_with_error(
            jar,
            CalpushError::OauthFlow("CSRF token mismatch".to_string()),
        );
    }

    let Some(code) = query.code else {
        return respond_with_error(
            jar,
            CalpushError::OauthFlow("missing `code` in callback".to_string()),
        );
    };

    match complete_authorization(&state, &headers, code).await {
        Ok(page) => (jar, Html(page)).into_response(),
        Err(err) => respond_with_error(jar, err),
    }
}

async fn complete_authorization(
    state: &AppState,
    headers: &HeaderMap,
    code: String,
) -> Result<String, CalpushError> {
    let redirect = state.public_url(headers, AUTH_CALLBACK_PATH)?;
    let token = state
        .oauth
        .exchange_code(code, &redirect)
        .await
        .map_err(|e| CalpushError::OauthFlow(format!("failed to exchange code: {e}")))?;

    let user = state.oauth.fetch_userinfo(&token.access_token).await?;

    state
        .storage
        .upsert_credential(&Credential {
            principal_id: user.id.clone(),
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone().unwrap_or_default(),
            expires_at: token.expires_at,
        })
        .await?;
    if token.refresh_token.is_none() {
        warn!(
            principal_id = %user.id,
            "OAuth response carried no refresh_token; keeping any stored one"
        );
    }

    let calendars = state.calendar.list_calendars(&token.access_token).await?;
    info!(
        principal_id = %user.id,
        calendars = calendars.len(),
        "OAuth callback stored credential"
    );

    Ok(pages::calendar_picker(
        user.given_name.as_deref().unwrap_or(""),
        &token.access_token,
        &calendars,
    ))
}

/// POST /auth/callback -> registers a watch channel on the chosen calendar.
pub async fn register_channel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<RegisterForm>,
) -> Result<Html<String>, CalpushError> {
    let user = state
        .oauth
        .fetch_userinfo(&form.access_token)
        .await
        .inspect_err(|e| error!(error = %e, "failed to get user info"))?;
    let callback_url = state.public_url(&headers, WEBHOOK_PATH)?;

    let channel = state
        .registrar
        .register(&user.id, &form.calendar_id, &form.access_token, &callback_url)
        .await?;

    Ok(Html(pages::watch_confirmation(&channel.channel_id)))
}

fn store_oauth_state(jar: PrivateCookieJar, csrf: &CsrfToken) -> PrivateCookieJar {
    jar.add(build_cookie(CSRF_COOKIE, csrf.secret().to_string()))
}

fn load_oauth_state(
    jar: PrivateCookieJar,
) -> Result<(String, PrivateCookieJar), (PrivateCookieJar, CalpushError)> {
    let csrf = jar.get(CSRF_COOKIE).map(|c| c.value().to_owned());
    let jar = jar.remove(clear_cookie(CSRF_COOKIE));
    match csrf {
        Some(csrf) => Ok((csrf, jar)),
        None => Err((
            jar,
            CalpushError::OauthFlow("Missing OAuth state in cookie".to_string()),
        )),
    }
}

fn build_cookie(name: &str, value: String) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), value))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::minutes(15))
        .build()
}

fn clear_cookie(name: &str) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), ""))
        .path("/")
        .build()
}

fn respond_with_error(jar: PrivateCookieJar, err: CalpushError) -> Response {
    warn!(error = %err, "OAuth callback failed");
    (jar, err.into_response()).into_response()
}
