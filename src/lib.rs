pub mod calendar;
pub mod config;
pub mod db;
pub mod error;
pub mod google_oauth;
pub mod handlers;
pub mod http_client;
pub mod middleware;
pub mod pages;
pub mod router;
pub mod service;

pub use error::CalpushError;
pub use google_oauth::service::GoogleOauthService;
pub use service::{ChannelRegistrar, CredentialRotator, SyncEngine};
