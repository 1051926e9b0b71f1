//! Content-addressed image blob store.
//!
//! Blobs live under a local media directory and are keyed by the SHA-256 of
//! the original filename with the original extension preserved, so a
//! re-upload of the same filename lands on the same key. The annotated
//! version of an image overwrites the original in place under that key.
//! Stored blobs are served over `/media/<key>` and fetched back over HTTP
//! at report-render time.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Blob I/O failed for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },
}

/// Derive the storage key for an uploaded file: SHA-256 of the original
/// filename (hex), extension preserved.
pub fn storage_key(original_filename: &str) -> String {
    let digest = Sha256::digest(original_filename.as_bytes());
    let extension: String = original_filename
        .rsplit('.')
        .next()
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if extension.is_empty() {
        format!("{digest:x}")
    } else {
        format!("{digest:x}.{extension}")
    }
}

/// Filesystem-backed blob store rooted at the configured media directory.
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, std::io::Error> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write (or overwrite in place) the blob under `key`.
    pub fn store(&self, key: &str, bytes: &[u8]) -> Result<(), MediaError> {
        std::fs::write(self.path_for(key), bytes).map_err(|source| MediaError::Io {
            key: key.to_string(),
            source,
        })
    }

    pub fn read(&self, key: &str) -> Result<Vec<u8>, MediaError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Err(MediaError::NotFound(key.to_string()));
        }
        std::fs::read(path).map_err(|source| MediaError::Io {
            key: key.to_string(),
            source,
        })
    }

    /// Remove the blob under `key`. A blob that is already gone is not an
    /// error; any other filesystem failure propagates.
    pub fn delete(&self, key: &str) -> Result<(), MediaError> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(key, "Blob already absent on delete");
                Ok(())
            }
            Err(source) => Err(MediaError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}

/// Fetch image bytes from a stored URL. Used by the upload pipeline and by
/// report embedding; the client carries the fixed request timeout. An empty
/// body counts as a failed fetch.
pub async fn fetch_image_bytes(
    client: &reqwest::Client,
    url: &str,
) -> Result<Vec<u8>, MediaError> {
    let response = client.get(url).send().await.map_err(|e| MediaError::Fetch {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if !response.status().is_success() {
        return Err(MediaError::Fetch {
            url: url.to_string(),
            reason: format!("status {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(|e| MediaError::Fetch {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if bytes.is_empty() {
        return Err(MediaError::Fetch {
            url: url.to_string(),
            reason: "empty response body".into(),
        });
    }

    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_key_is_deterministic() {
        assert_eq!(storage_key("xray.jpg"), storage_key("xray.jpg"));
    }

    #[test]
    fn storage_key_preserves_extension() {
        assert!(storage_key("xray.jpg").ends_with(".jpg"));
        assert!(storage_key("torax.PNG").ends_with(".PNG"));
    }

    #[test]
    fn different_filenames_yield_different_keys() {
        // Even a change of extension alone re-keys the blob.
        assert_ne!(storage_key("xray.jpg"), storage_key("xray.png"));
        assert_ne!(storage_key("a.jpg"), storage_key("b.jpg"));
    }

    #[test]
    fn storage_key_hash_is_hex_sha256() {
        let key = storage_key("xray.jpg");
        let (hash, ext) = key.split_once('.').unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(ext, "jpg");
    }

    #[test]
    fn store_read_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path()).unwrap();
        let key = storage_key("xray.jpg");

        store.store(&key, b"original").unwrap();
        assert_eq!(store.read(&key).unwrap(), b"original");

        // Overwrite in place, same key.
        store.store(&key, b"annotated").unwrap();
        assert_eq!(store.read(&key).unwrap(), b"annotated");

        store.delete(&key).unwrap();
        assert!(matches!(store.read(&key), Err(MediaError::NotFound(_))));
    }

    #[test]
    fn delete_of_missing_blob_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path()).unwrap();
        assert!(store.delete("nonexistent.jpg").is_ok());
    }

    #[tokio::test]
    async fn fetch_reports_transport_failure() {
        let client = reqwest::Client::new();
        // Nothing listens on this port.
        let result = fetch_image_bytes(&client, "http://127.0.0.1:1/x.jpg").await;
        assert!(matches!(result, Err(MediaError::Fetch { .. })));
    }
}
