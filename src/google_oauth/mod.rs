//! OAuth collaborator: authorization-code flow, token refresh and userinfo.

mod endpoints;
pub mod service;

pub use service::{GoogleOauthService, RefreshedToken, TokenSource, UserInfo};
