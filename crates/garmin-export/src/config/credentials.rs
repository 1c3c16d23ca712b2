use crate::client::{OAuth1Token, OAuth2Token};
use crate::error::{GarminError, Result};
use std::fs;
use std::path::{Path, PathBuf};

const OAUTH1_FILENAME: &str = "oauth1_token.json";
const OAUTH2_FILENAME: &str = "oauth2_token.json";

/// Per-profile token files shared with the `garmin auth login` tool.
pub struct CredentialStore {
    profile: String,
    base_dir: PathBuf,
}

impl CredentialStore {
    /// Open the credential store for the given profile
    pub fn new(profile: Option<String>) -> Result<Self> {
        let profile = profile.unwrap_or_else(|| "default".to_string());
        let base_dir = super::data_dir()?.join(&profile);
        Ok(Self { profile, base_dir })
    }

    /// Credential store rooted at a custom directory (for testing)
    pub fn with_dir(profile: impl Into<String>, base_dir: &Path) -> Self {
        let profile = profile.into();
        let base_dir = base_dir.join(&profile);
        Self { profile, base_dir }
    }

    /// Get the profile name
    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Check if credentials exist
    pub fn has_credentials(&self) -> bool {
        self.base_dir.join(OAUTH1_FILENAME).exists() && self.base_dir.join(OAUTH2_FILENAME).exists()
    }

    /// Load both tokens, returns None if either is missing
    pub fn load_tokens(&self) -> Result<Option<(OAuth1Token, OAuth2Token)>> {
        let oauth1 = read_json::<OAuth1Token>(&self.base_dir.join(OAUTH1_FILENAME))?;
        let oauth2 = read_json::<OAuth2Token>(&self.base_dir.join(OAUTH2_FILENAME))?;

        match (oauth1, oauth2) {
            (Some(o1), Some(o2)) => Ok(Some((o1, o2))),
            _ => Ok(None),
        }
    }

    /// Tokens usable for this run.
    ///
    /// Missing, unreadable or expired credentials are all authentication
    /// failures: the exporter never refreshes tokens itself.
    pub fn session(&self) -> Result<(OAuth1Token, OAuth2Token)> {
        let (oauth1, oauth2) = self
            .load_tokens()
            .map_err(|e| GarminError::auth(format!("Stored credentials are unreadable: {}", e)))?
            .ok_or(GarminError::NotAuthenticated)?;

        if oauth2.is_expired() {
            return Err(GarminError::NotAuthenticated);
        }

        Ok((oauth1, oauth2))
    }

    /// Save both tokens
    pub fn save_tokens(&self, oauth1: &OAuth1Token, oauth2: &OAuth2Token) -> Result<()> {
        super::ensure_dir(&self.base_dir)?;
        write_private(&self.base_dir.join(OAUTH1_FILENAME), &serde_json::to_string_pretty(oauth1)?)?;
        write_private(&self.base_dir.join(OAUTH2_FILENAME), &serde_json::to_string_pretty(oauth2)?)?;
        Ok(())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&json)?))
}

fn write_private(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn oauth1() -> OAuth1Token {
        OAuth1Token {
            oauth_token: "test_token".to_string(),
            oauth_token_secret: "test_secret".to_string(),
            domain: "garmin.com".to_string(),
        }
    }

    fn oauth2(expires_at: i64) -> OAuth2Token {
        OAuth2Token {
            scope: "test_scope".to_string(),
            jti: "test_jti".to_string(),
            token_type: "Bearer".to_string(),
            access_token: "test_access".to_string(),
            refresh_token: "test_refresh".to_string(),
            expires_in: 3600,
            expires_at,
            refresh_token_expires_in: 86400,
            refresh_token_expires_at: Utc::now().timestamp() + 86400,
        }
    }

    #[test]
    fn test_session_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = CredentialStore::with_dir("test_profile", temp_dir.path());
        assert!(!store.has_credentials());

        store
            .save_tokens(&oauth1(), &oauth2(Utc::now().timestamp() + 3600))
            .unwrap();

        assert!(store.has_credentials());
        let (o1, o2) = store.session().unwrap();
        assert_eq!(o1, oauth1());
        assert_eq!(o2.access_token, "test_access");
    }

    #[test]
    fn test_missing_credentials_are_not_authenticated() {
        let temp_dir = TempDir::new().unwrap();
        let store = CredentialStore::with_dir("nobody", temp_dir.path());
        assert!(matches!(store.session(), Err(GarminError::NotAuthenticated)));
    }

    #[test]
    fn test_expired_access_token_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let store = CredentialStore::with_dir("stale", temp_dir.path());
        store.save_tokens(&oauth1(), &oauth2(0)).unwrap();

        let err = store.session().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_corrupt_token_file_is_authentication_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = CredentialStore::with_dir("broken", temp_dir.path());
        store
            .save_tokens(&oauth1(), &oauth2(Utc::now().timestamp() + 3600))
            .unwrap();
        fs::write(temp_dir.path().join("broken").join(OAUTH2_FILENAME), "{not json").unwrap();

        assert!(matches!(store.session(), Err(GarminError::Authentication(_))));
    }
}
