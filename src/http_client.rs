use crate::config::Config;
use crate::error::CalpushError;
use std::time::Duration;

/// Process-wide outbound HTTP client shared by the OAuth and calendar calls.
///
/// Only connection setup is bounded here; request lifetimes follow the
/// inbound request that triggered them.
pub fn build_http_client(cfg: &Config) -> Result<reqwest::Client, CalpushError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(concat!("calpush/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(5))
        // OAuth token endpoints must not be followed through redirects.
        .redirect(reqwest::redirect::Policy::none());
    if let Some(proxy_url) = cfg.proxy.as_ref() {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
    }
    Ok(builder.build()?)
}
