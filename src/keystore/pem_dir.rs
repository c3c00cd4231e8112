//! PEM-directory key store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{CertificateChainPem, KeyStore, PrivateKeyPem};
use crate::Result;

const KEY_EXTENSION: &str = "key";
const CHAIN_EXTENSION: &str = "crt";

/// Key store backed by a directory of PEM files.
///
/// An alias `work` resolves to `<dir>/work.key` and `<dir>/work.crt`. A
/// missing file is a lookup miss, not an error; any other I/O failure is
/// surfaced as [`crate::Error::Io`].
pub struct PemDirStore {
    dir: PathBuf,
}

impl PemDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn entry_path(&self, alias: &str, extension: &str) -> Option<PathBuf> {
        // Aliases are opaque labels; anything that would traverse the
        // directory tree is treated as a miss.
        if alias.contains(['/', '\\']) || alias.contains("..") {
            tracing::debug!(alias, "rejecting alias with path components");
            return None;
        }
        // `Path::with_extension` would clobber dots inside the alias itself.
        Some(self.dir.join(format!("{alias}.{extension}")))
    }

    async fn read_entry(&self, alias: &str, extension: &str) -> Result<Option<Vec<u8>>> {
        let Some(path) = self.entry_path(alias, extension) else {
            return Ok(None);
        };

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(alias, path = %path.display(), "no key store entry");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl KeyStore for PemDirStore {
    fn name(&self) -> &str {
        "pem-dir"
    }

    async fn private_key(&self, alias: &str) -> Result<Option<PrivateKeyPem>> {
        Ok(self
            .read_entry(alias, KEY_EXTENSION)
            .await?
            .map(PrivateKeyPem::new))
    }

    async fn certificate_chain(&self, alias: &str) -> Result<Option<CertificateChainPem>> {
        Ok(self
            .read_entry(alias, CHAIN_EXTENSION)
            .await?
            .map(CertificateChainPem::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolves_alias_to_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("work.key"), b"key pem").unwrap();
        std::fs::write(dir.path().join("work.crt"), b"chain pem").unwrap();

        let store = PemDirStore::new(dir.path());
        let key = store.private_key("work").await.unwrap().unwrap();
        let chain = store.certificate_chain("work").await.unwrap().unwrap();
        assert_eq!(key.as_bytes(), b"key pem");
        assert_eq!(chain.as_bytes(), b"chain pem");
    }

    #[tokio::test]
    async fn test_missing_file_is_a_miss_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("work.key"), b"key pem").unwrap();

        let store = PemDirStore::new(dir.path());
        assert!(store.private_key("work").await.unwrap().is_some());
        assert!(store.certificate_chain("work").await.unwrap().is_none());
        assert!(store.private_key("absent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_alias_with_path_components_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = PemDirStore::new(dir.path());

        assert!(store.private_key("../etc/passwd").await.unwrap().is_none());
        assert!(store.private_key("a/b").await.unwrap().is_none());
    }
}
