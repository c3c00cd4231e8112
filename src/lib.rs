//! # webdav-session
//!
//! Session and credential management for WebDAV accounts.
//!
//! This crate turns a persisted [`Account`] record into an authenticated,
//! protocol-negotiated HTTP client, selecting among zero, one, or two
//! credential mechanisms (HTTP basic authentication and mutual-TLS client
//! certificates), and caches at most one live client per account until it is
//! explicitly invalidated.
//!
//! Transport concerns (WebDAV verbs, XML parsing, byte caching) are out of
//! scope; the constructed [`WebDavClient`] is an opaque, shareable handle the
//! file-system adapter dispatches requests through.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use webdav_session::{Account, MemoryKeyStore, SessionCache};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), webdav_session::Error> {
//!     let account = Account::new(1, "https://dav.example.com/remote.php/dav")
//!         .with_basic_auth("alice", "hunter2");
//!
//!     let cache = SessionCache::new(Arc::new(MemoryKeyStore::new()));
//!     let client = cache.get_client(&account).await?;
//!     println!("base url: {}", client.base_url());
//!
//!     // After the persistence layer edits any auth-relevant field:
//!     cache.invalidate(account.id);
//!     Ok(())
//! }
//! ```

#![deny(rustdoc::broken_intra_doc_links)]

pub mod account;
pub mod client;
pub mod keystore;
pub mod resolver;
pub mod session;

pub use account::{Account, Protocol};
pub use client::{ClientConfig, ClientFactory, HttpClientFactory, WebDavClient};
pub use keystore::{CertificateChainPem, KeyStore, MemoryKeyStore, PemDirStore, PrivateKeyPem};
pub use resolver::{ClientIdentity, CredentialResolver, PasswordCredentials, ResolvedCredentials};
pub use session::SessionCache;

/// Error type for webdav-session operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The account's base address is missing or unparseable after
    /// normalization. Fatal to the current call, never cached.
    #[error("configuration error: {0}")]
    Config(String),

    /// Building the underlying HTTP client failed.
    #[error("network setup failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Client-certificate material could not be assembled into a TLS
    /// identity.
    #[error("TLS identity error: {0}")]
    Tls(String),

    /// Key store I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
