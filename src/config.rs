use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error as ThisError;
use url::Url;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URI: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
pub const GOOGLE_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

pub const GOOGLE_SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/userinfo.profile",
    "https://www.googleapis.com/auth/calendar.readonly",
    "https://www.googleapis.com/auth/calendar.events",
];

const ENV_PREFIX: &str = "CALPUSH_";

/// Private cookie keys need 64 bytes of key material.
const MIN_COOKIE_SECRET_LEN: usize = 64;

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("cookie_secret must be at least 64 bytes")]
    CookieSecretTooShort,

    #[error("invalid listen address: {0}")]
    ListenAddr(#[from] std::net::AddrParseError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub loglevel: String,
    pub log_environment: String,
    pub auth_client_id: String,
    pub auth_client_secret: String,
    pub cookie_secret: Option<String>,
    pub public_base_url: Option<Url>,
    pub proxy: Option<Url>,
    pub calendar_api_base: Url,
    pub max_collision_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: "sqlite://calpush.db".to_string(),
            loglevel: "info".to_string(),
            log_environment: "production".to_string(),
            auth_client_id: String::new(),
            auth_client_secret: String::new(),
            cookie_secret: None,
            public_base_url: None,
            proxy: None,
            calendar_api_base: Url::parse(GOOGLE_CALENDAR_API_BASE)
                .expect("calendar API base URL constant is valid"),
            max_collision_retries: 5,
        }
    }
}

impl Config {
    /// Defaults overlaid with `CALPUSH_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let cfg: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(Box::new)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth_client_id.trim().is_empty() {
            return Err(ConfigError::Missing("auth_client_id"));
        }
        if self.auth_client_secret.trim().is_empty() {
            return Err(ConfigError::Missing("auth_client_secret"));
        }
        if let Some(secret) = self.cookie_secret.as_deref()
            && secret.len() < MIN_COOKIE_SECRET_LEN
        {
            return Err(ConfigError::CookieSecretTooShort);
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    pub fn is_development(&self) -> bool {
        self.log_environment.eq_ignore_ascii_case("development")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            auth_client_id: "client".into(),
            auth_client_secret: "secret".into(),
            ..Config::default()
        }
    }

    #[test]
    fn requires_oauth_client() {
        assert!(matches!(
            Config::default().validate(),
            Err(ConfigError::Missing("auth_client_id"))
        ));
        let cfg = Config {
            auth_client_id: "client".into(),
            ..Config::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Missing("auth_client_secret"))
        ));
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn rejects_short_cookie_secret() {
        let cfg = Config {
            cookie_secret: Some("short".into()),
            ..valid()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::CookieSecretTooShort)
        ));
    }

    #[test]
    fn listen_addr_combines_host_and_port() {
        let addr = valid().listen_addr().expect("valid address");
        assert_eq!(addr.port(), 3000);
    }
}
