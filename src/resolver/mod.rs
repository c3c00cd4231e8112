//! Credential resolution.
//!
//! Turns the raw fields of an [`Account`] into the concrete credential sets
//! a client is constructed with. Resolution is a single synchronous attempt
//! per call: no retries, no side effects beyond reading the key store.

use std::sync::Arc;

use secrecy::SecretString;

use crate::account::Account;
use crate::keystore::{CertificateChainPem, KeyStore, PrivateKeyPem};

/// Username/password pair, passed through from the account verbatim.
#[derive(Clone, Debug)]
pub struct PasswordCredentials {
    pub username: String,
    pub password: SecretString,
}

/// Mutual-TLS identity borrowed from the key store: the account's alias plus
/// the key and chain it resolved to. Never persisted, never written back.
#[derive(Clone, Debug)]
pub struct ClientIdentity {
    pub alias: String,
    pub private_key: PrivateKeyPem,
    pub certificate_chain: CertificateChainPem,
}

/// The zero, one, or two credential sets applicable to an account.
///
/// Both sets are carried independently; a dual-credential configuration
/// forwards both to client construction. An empty result is a valid,
/// deliberate configuration for endpoints requiring no authentication.
#[derive(Clone, Default)]
pub struct ResolvedCredentials {
    pub password: Option<PasswordCredentials>,
    pub identity: Option<ClientIdentity>,
}

impl ResolvedCredentials {
    pub fn is_anonymous(&self) -> bool {
        self.password.is_none() && self.identity.is_none()
    }
}

/// Resolves account fields against an injected [`KeyStore`].
#[derive(Clone)]
pub struct CredentialResolver {
    store: Arc<dyn KeyStore>,
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self { store }
    }

    /// Resolve the credential sets configured on `account`.
    ///
    /// Password credentials are present iff both username and password are
    /// set; the strings are not normalized or validated. Mutual-TLS
    /// credentials are looked up iff a non-blank certificate alias is set;
    /// a stale alias (either lookup empty) degrades to "no mutual-TLS
    /// credentials" rather than failing the call.
    pub async fn resolve(&self, account: &Account) -> ResolvedCredentials {
        let password = match (&account.username, &account.password) {
            (Some(username), Some(password)) => Some(PasswordCredentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };

        let identity = match account.client_certificate_alias() {
            Some(alias) => self.lookup_identity(alias).await,
            None => None,
        };

        ResolvedCredentials { password, identity }
    }

    async fn lookup_identity(&self, alias: &str) -> Option<ClientIdentity> {
        let key = self.store.private_key(alias).await;
        let chain = self.store.certificate_chain(alias).await;

        match (key, chain) {
            (Ok(Some(private_key)), Ok(Some(certificate_chain))) => Some(ClientIdentity {
                alias: alias.to_string(),
                private_key,
                certificate_chain,
            }),
            (Ok(key), Ok(chain)) => {
                // The alias was valid when the account was saved but no
                // longer resolves fully; the client is built without a TLS
                // identity and the consuming layer decides what to surface.
                tracing::warn!(
                    alias,
                    store = self.store.name(),
                    key_found = key.is_some(),
                    chain_found = chain.is_some(),
                    "client certificate alias no longer resolves, continuing without mutual TLS"
                );
                None
            }
            (key, chain) => {
                let error = key.err().or(chain.err());
                tracing::warn!(
                    alias,
                    store = self.store.name(),
                    error = %error.as_ref().map(ToString::to_string).unwrap_or_default(),
                    "key store lookup failed, continuing without mutual TLS"
                );
                None
            }
        }
    }
}
