pub mod google_oauth;
pub mod webhook;
