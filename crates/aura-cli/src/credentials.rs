//! Login credential storage
//!
//! Stores the bearer token in ~/.config/auramind/credentials.json with
//! restricted permissions (0o600)

use aura_chat::AuthProvider;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Token issued by the login endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Account the token was issued for
    pub email: String,
    pub access_token: String,
    /// When the token was obtained, in milliseconds
    pub obtained_at: i64,
}

impl Credentials {
    pub fn new(email: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            access_token: access_token.into(),
            obtained_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// File-backed credential store
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Store at the default location
    pub fn default_path() -> PathBuf {
        crate::config::Config::config_dir().join("credentials.json")
    }

    pub fn open() -> Self {
        Self::at(Self::default_path())
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load stored credentials, if any
    pub fn load(&self) -> Option<Credentials> {
        let content = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                tracing::warn!("Ignoring unreadable credentials file: {}", e);
                None
            }
        }
    }

    /// Save credentials, replacing any previous login
    pub fn save(&self, credentials: &Credentials) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
                #[cfg(unix)]
                fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
            }
        }

        let content = serde_json::to_string_pretty(credentials)?;
        fs::write(&self.path, content)?;

        // Owner read/write only
        #[cfg(unix)]
        fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }

    /// Remove stored credentials; returns whether there were any
    pub fn remove(&self) -> io::Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl AuthProvider for CredentialStore {
    fn bearer_token(&self) -> Option<String> {
        self.load().map(|credentials| credentials.access_token)
    }

    fn on_auth_expired(&self) {
        if let Err(e) = self.remove() {
            tracing::warn!("Failed to remove expired credentials: {}", e);
        }
        eprintln!("\nSession expired. Log in again with: aura --login <email>");
    }
}

/// Token from config or env, falling back to the credential store
pub struct ConfiguredAuth {
    token: parking_lot::Mutex<Option<String>>,
    store: CredentialStore,
}

impl ConfiguredAuth {
    pub fn new(token: Option<String>, store: CredentialStore) -> Self {
        Self {
            token: parking_lot::Mutex::new(token),
            store,
        }
    }
}

impl AuthProvider for ConfiguredAuth {
    fn bearer_token(&self) -> Option<String> {
        self.token
            .lock()
            .clone()
            .or_else(|| self.store.bearer_token())
    }

    fn on_auth_expired(&self) {
        self.token.lock().take();
        self.store.on_auth_expired();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::at(dir.path().join("auramind").join("credentials.json"));
        assert!(store.load().is_none());
        assert!(store.bearer_token().is_none());

        store.save(&Credentials::new("ada@example.com", "jwt-1")).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.email, "ada@example.com");
        assert_eq!(store.bearer_token().as_deref(), Some("jwt-1"));

        assert!(store.remove().unwrap());
        assert!(!store.remove().unwrap());
        assert!(store.load().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_credentials_file_is_private() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::at(dir.path().join("credentials.json"));
        store.save(&Credentials::new("ada@example.com", "jwt")).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_auth_expiry_clears_stored_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::at(dir.path().join("credentials.json"));
        store.save(&Credentials::new("ada@example.com", "jwt")).unwrap();

        store.on_auth_expired();
        assert!(store.bearer_token().is_none());
    }

    #[test]
    fn test_configured_token_wins_until_expired() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::at(dir.path().join("credentials.json"));
        store.save(&Credentials::new("ada@example.com", "stored")).unwrap();

        let auth = ConfiguredAuth::new(Some("from-env".into()), store.clone());
        assert_eq!(auth.bearer_token().as_deref(), Some("from-env"));

        auth.on_auth_expired();
        assert!(auth.bearer_token().is_none());
        assert!(store.load().is_none());
    }

    #[test]
    fn test_corrupt_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, "{not json").unwrap();
        assert!(CredentialStore::at(path).load().is_none());
    }
}
