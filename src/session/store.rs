use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::api::User;
use crate::session::error::SessionError;

const AUTH_KEY: &str = "auth";

/// What gets written under the `auth` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAuth {
    #[serde(default)]
    pub jwt: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub is_authenticated: bool,
}

/// A JSON object on disk, string keys to arbitrary values.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>, SessionError> {
        Ok(self.read().await?.remove(key))
    }

    pub async fn set(&self, key: &str, value: Value) -> Result<(), SessionError> {
        let mut entries = self.read_or_reset().await?;
        entries.insert(key.to_string(), value);
        self.write(&entries).await
    }

    pub async fn remove(&self, key: &str) -> Result<(), SessionError> {
        let (mut entries, reset) = match self.read().await {
            Ok(entries) => (entries, false),
            Err(SessionError::Encode(e)) => {
                warn!("resetting unreadable session file {}: {}", self.path.display(), e);
                (BTreeMap::new(), true)
            }
            Err(e) => return Err(e),
        };
        if entries.remove(key).is_some() || reset {
            self.write(&entries).await
        } else {
            Ok(())
        }
    }

    /// The stored login, if a usable one exists. A record that can't be
    /// read back (or lacks the token or user) is removed.
    pub async fn load_auth(&self) -> Result<Option<(String, User)>, SessionError> {
        let value = match self.get(AUTH_KEY).await {
            Ok(Some(value)) => value,
            Ok(None) => return Ok(None),
            Err(SessionError::Encode(_)) => {
                self.remove(AUTH_KEY).await?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        match serde_json::from_value::<StoredAuth>(value) {
            Ok(StoredAuth {
                jwt: Some(jwt),
                user: Some(user),
                ..
            }) if !jwt.is_empty() => Ok(Some((jwt, user))),
            Ok(_) => Ok(None),
            Err(e) => {
                warn!("discarding unreadable stored login: {}", e);
                self.remove(AUTH_KEY).await?;
                Ok(None)
            }
        }
    }

    pub async fn save_auth(&self, jwt: &str, user: &User) -> Result<(), SessionError> {
        let record = StoredAuth {
            jwt: Some(jwt.to_string()),
            user: Some(user.clone()),
            is_authenticated: true,
        };
        self.set(AUTH_KEY, serde_json::to_value(record)?).await
    }

    pub async fn clear_auth(&self) -> Result<(), SessionError> {
        self.remove(AUTH_KEY).await
    }

    async fn read(&self) -> Result<BTreeMap<String, Value>, SessionError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Like `read`, but an unparseable file counts as empty so the next
    /// write replaces it.
    async fn read_or_reset(&self) -> Result<BTreeMap<String, Value>, SessionError> {
        match self.read().await {
            Err(SessionError::Encode(e)) => {
                warn!("resetting unreadable session file {}: {}", self.path.display(), e);
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    async fn write(&self, entries: &BTreeMap<String, Value>) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(entries)?;

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        // The file holds a bearer token.
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&self.path).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .await?;
        }
        file.write_all(&body).await?;
        file.flush().await?;
        debug!("wrote session file {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn user() -> User {
        User {
            id: 3,
            username: "rani".into(),
            email: "rani@example.com".into(),
            blocked: false,
        }
    }

    fn store_in(dir: &TempDir) -> SessionStore {
        SessionStore::new(dir.path().join("nested").join("session.json"))
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_session_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        tokio::fs::create_dir_all(store.path().parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(store.path(), b"{}").await.unwrap();
        tokio::fs::set_permissions(store.path(), std::fs::Permissions::from_mode(0o644))
            .await
            .unwrap();

        store.save_auth("jwt-123", &user()).await.unwrap();

        let mode = tokio::fs::metadata(store.path()).await.unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_save_and_load_auth() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert_eq!(store.load_auth().await.unwrap(), None);

        store.save_auth("jwt-123", &user()).await.unwrap();
        assert_eq!(
            store.load_auth().await.unwrap(),
            Some(("jwt-123".to_string(), user()))
        );

        let raw = store.get("auth").await.unwrap().unwrap();
        assert_eq!(raw["isAuthenticated"], json!(true));

        store.clear_auth().await.unwrap();
        assert_eq!(store.load_auth().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_other_keys_survive() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.set("theme", json!("dark")).await.unwrap();
        store.save_auth("jwt", &user()).await.unwrap();
        store.clear_auth().await.unwrap();

        assert_eq!(store.get("theme").await.unwrap(), Some(json!("dark")));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_discarded() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        tokio::fs::create_dir_all(store.path().parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(store.path(), b"{not json").await.unwrap();

        assert_eq!(store.load_auth().await.unwrap(), None);
        assert_eq!(store.get("auth").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_incomplete_record_is_ignored() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.set("auth", json!({"jwt": "abc"})).await.unwrap();
        assert_eq!(store.load_auth().await.unwrap(), None);

        store.set("auth", json!({"jwt": 42})).await.unwrap();
        assert_eq!(store.load_auth().await.unwrap(), None);
        assert_eq!(store.get("auth").await.unwrap(), None);
    }
}
