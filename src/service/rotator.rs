use crate::db::{Credential, Storage};
use crate::error::CalpushError;
use crate::google_oauth::RefreshedToken;
use tracing::info;

/// Persists a refreshed token only when it actually rotated.
#[derive(Clone)]
pub struct CredentialRotator {
    storage: Storage,
}

/// Access token differs, or a non-empty refresh token differs from the stored one.
pub fn has_rotated(stored: &Credential, refreshed: &RefreshedToken) -> bool {
    stored.access_token != refreshed.access_token
        || refreshed
            .refresh_token
            .as_deref()
            .is_some_and(|rt| !rt.is_empty() && rt != stored.refresh_token)
}

impl CredentialRotator {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Returns whether anything was written.
    pub async fn reconcile(
        &self,
        stored: &Credential,
        refreshed: &RefreshedToken,
    ) -> Result<bool, CalpushError> {
        if !has_rotated(stored, refreshed) {
            return Ok(false);
        }
        let refresh_token = refreshed
            .refresh_token
            .as_deref()
            .filter(|rt| !rt.is_empty())
            .unwrap_or(&stored.refresh_token)
            .to_string();
        let updated = Credential {
            principal_id: stored.principal_id.clone(),
            access_token: refreshed.access_token.clone(),
            refresh_token,
            expires_at: refreshed.expires_at,
        };
        self.storage.update_credential(&updated).await?;
        info!(principal_id = %stored.principal_id, "rotated credential stored");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn stored() -> Credential {
        Credential {
            principal_id: "u1".into(),
            access_token: "a1".into(),
            refresh_token: "r1".into(),
            expires_at: Utc::now(),
        }
    }

    fn refreshed(access: &str, refresh: Option<&str>) -> RefreshedToken {
        RefreshedToken {
            access_token: access.into(),
            refresh_token: refresh.map(str::to_string),
            expires_at: Utc::now(),
        }
    }

    #[test]
    fn unchanged_token_is_not_a_rotation() {
        assert!(!has_rotated(&stored(), &refreshed("a1", None)));
        assert!(!has_rotated(&stored(), &refreshed("a1", Some("r1"))));
        assert!(!has_rotated(&stored(), &refreshed("a1", Some(""))));
    }

    #[test]
    fn new_access_or_refresh_token_is_a_rotation() {
        assert!(has_rotated(&stored(), &refreshed("a2", None)));
        assert!(has_rotated(&stored(), &refreshed("a1", Some("r2"))));
    }
}
