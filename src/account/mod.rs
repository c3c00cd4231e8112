//! Persisted WebDAV account records.
//!
//! An [`Account`] describes one remote endpoint plus its authentication
//! configuration. The record itself is owned and mutated by the external
//! persistence layer; this crate only reads it. Credential material is never
//! stored here: the record carries at most a username/password pair and an
//! *alias* into a system key store (see [`crate::keystore`]).

use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use url::Url;

use crate::{Error, Result};

/// Protocol preference for the underlying transport.
///
/// Anything other than [`Protocol::Auto`] disables HTTP/2 negotiation and
/// pins the client to HTTP/1.1. Some WebDAV servers misbehave behind HTTP/2
/// proxies, so the preference is persisted per account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    /// Let the transport negotiate (HTTP/2 where available).
    #[default]
    #[serde(rename = "AUTO")]
    Auto,
    /// Force HTTP/1.1.
    #[serde(rename = "HTTP1")]
    Http1,
}

/// A persisted account: endpoint descriptor plus authentication
/// configuration.
///
/// Password authentication is configured iff both `username` and `password`
/// are set; mutual-TLS authentication is configured iff `client_certificate`
/// holds a non-blank alias. Neither, either, or both may be configured.
///
/// Every mutation of an authentication-relevant field (username, password,
/// certificate alias, verify-certs flag, protocol, url) must be followed by
/// [`crate::SessionCache::invalidate`] before the edit flow returns, so a
/// stale authenticated client is never handed out.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    /// Stable identifier, assigned at creation and immutable afterwards.
    pub id: i64,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Remote base address. Stored as entered by the user; validated only
    /// when a client is constructed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Transport protocol preference.
    #[serde(default)]
    pub protocol: Protocol,

    /// Whether to verify the server certificate chain.
    #[serde(default = "default_verify_certs")]
    pub verify_certs: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_opt_secret"
    )]
    pub password: Option<SecretString>,

    /// Alias of a client certificate in the system key store. The account
    /// stores only the alias, never key material.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_certificate: Option<String>,

    /// Upper bound for locally cached file bytes, in MiB. Consumed by the
    /// file-system adapter, not by this crate.
    #[serde(default = "default_max_cache_file_size")]
    pub max_cache_file_size: u64,
}

fn default_verify_certs() -> bool {
    true
}

fn default_max_cache_file_size() -> u64 {
    20
}

fn serialize_opt_secret<S: Serializer>(
    value: &Option<SecretString>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(secret) => serializer.serialize_some(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}

impl Account {
    /// Create an account for the given endpoint with default settings and no
    /// credentials.
    pub fn new(id: i64, url: impl Into<String>) -> Self {
        Self {
            id,
            name: None,
            url: Some(url.into()),
            protocol: Protocol::Auto,
            verify_certs: true,
            username: None,
            password: None,
            client_certificate: None,
            max_cache_file_size: default_max_cache_file_size(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(SecretString::from(password.into()));
        self
    }

    pub fn with_client_certificate(mut self, alias: impl Into<String>) -> Self {
        self.client_certificate = Some(alias.into());
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_verify_certs(mut self, verify: bool) -> Self {
        self.verify_certs = verify;
        self
    }

    /// Whether password authentication is configured. No validation is
    /// applied to the stored strings; empty values still count as configured.
    pub fn has_password_auth(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// The configured certificate alias, if present and non-blank.
    pub fn client_certificate_alias(&self) -> Option<&str> {
        self.client_certificate
            .as_deref()
            .filter(|alias| !alias.trim().is_empty())
    }

    /// Whether mutual-TLS authentication is configured, i.e. the certificate
    /// alias is present and non-blank.
    pub fn has_client_certificate(&self) -> bool {
        self.client_certificate_alias().is_some()
    }

    /// The normalized base address: the stored url with a trailing slash
    /// appended if absent, parsed as an absolute URL.
    ///
    /// The trailing slash makes relative-path resolution against the root
    /// unambiguous (`Url::join` drops the last segment otherwise).
    pub fn base_url(&self) -> Result<Url> {
        let raw = self
            .url
            .as_deref()
            .ok_or_else(|| Error::config("account url is not set"))?;
        let normalized = ensure_trailing_slash(raw);
        Url::parse(&normalized)
            .map_err(|e| Error::config(format!("invalid base url {normalized:?}: {e}")))
    }

    /// The path component of the normalized base address, used by the
    /// document-provider layer to map remote paths onto local ones.
    pub fn root_path(&self) -> Result<PathBuf> {
        Ok(PathBuf::from(self.base_url()?.path()))
    }

    /// Stable string id for the provider root backed by this account.
    pub fn root_id(&self) -> String {
        self.id.to_string()
    }
}

/// Append a trailing path separator if the string lacks one.
pub(crate) fn ensure_trailing_slash(s: &str) -> String {
    if s.ends_with('/') {
        s.to_string()
    } else {
        format!("{s}/")
    }
}
