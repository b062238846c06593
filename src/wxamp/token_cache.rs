//! Local file cache for the mini-program access token.
//!
//! One flat JSON file per app id, no schema versioning and no locking
//! (single-writer assumption). A missing or corrupt file reads as an empty
//! cache; the bounded TTL limits the damage of any stale read.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Cache file contents: `{access_token, expires_in, expires_time}`.
/// `expires_time` is absolute epoch seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub expires_time: i64,
}

pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(dir: impl AsRef<Path>, app_id: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("token.{app_id}")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached entry; missing or unparseable files are an empty cache.
    pub fn read(&self) -> Option<CachedToken> {
        let bytes = std::fs::read(&self.path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "token cache unreadable, treating as empty");
                None
            }
        }
    }

    /// The cached token, if its stored expiry is still in the future.
    pub fn read_valid(&self, now: i64) -> Option<String> {
        self.read()
            .filter(|t| t.expires_time > now)
            .map(|t| t.access_token)
    }

    /// Overwrite the cache file with a fresh entry.
    pub fn write(&self, token: &CachedToken) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec(token)?)?;
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path(), "wx123");
        assert!(cache.read().is_none());
        assert!(cache.read_valid(0).is_none());
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path(), "wx123");
        std::fs::write(cache.path(), b"{not json").unwrap();
        assert!(cache.read().is_none());
    }

    #[test]
    fn roundtrip_and_ttl_check() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path(), "wx123");
        cache
            .write(&CachedToken {
                access_token: "tok".into(),
                expires_in: 7200,
                expires_time: 1_000,
            })
            .unwrap();

        assert_eq!(cache.read().unwrap().access_token, "tok");
        assert_eq!(cache.read_valid(999), Some("tok".to_string()));
        assert!(cache.read_valid(1_000).is_none());
        assert!(cache.read_valid(2_000).is_none());
    }

    #[test]
    fn write_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path().join("nested"), "wx123");
        cache
            .write(&CachedToken {
                access_token: "tok".into(),
                expires_in: 0,
                expires_time: 0,
            })
            .unwrap();
        assert!(cache.path().exists());
    }

    #[test]
    fn file_name_is_per_app_id() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path(), "wxabc");
        assert!(cache.path().ends_with("token.wxabc"));
    }
}
