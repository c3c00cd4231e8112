//! WebDAV client handles and their construction.
//!
//! A [`WebDavClient`] is an opaque, thread-safe session handle bound to one
//! account's resolved identity and normalized endpoint. Construction wires
//! credentials and transport flags into a `reqwest::Client`; no network I/O
//! happens until the first request is dispatched.

use async_trait::async_trait;
use reqwest::Method;
use secrecy::ExposeSecret;
use url::Url;

use crate::account::Account;
use crate::resolver::{ClientIdentity, PasswordCredentials, ResolvedCredentials};
use crate::{Error, Result};

/// Everything a factory needs to build a client for one account.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Normalized base address (always ends in `/`).
    pub base_url: Url,
    pub password: Option<PasswordCredentials>,
    pub identity: Option<ClientIdentity>,
    /// Verify the server certificate chain.
    pub verify_certs: bool,
    /// Pin the transport to HTTP/1.1 instead of negotiating.
    pub force_http1: bool,
}

impl ClientConfig {
    /// Combine an account's endpoint settings with its resolved credentials.
    ///
    /// Fails with [`Error::Config`] iff the base address cannot be parsed
    /// after trailing-slash normalization.
    pub fn for_account(account: &Account, credentials: ResolvedCredentials) -> Result<Self> {
        Ok(Self {
            base_url: account.base_url()?,
            password: credentials.password,
            identity: credentials.identity,
            verify_certs: account.verify_certs,
            force_http1: account.protocol != crate::account::Protocol::Auto,
        })
    }
}

/// A reusable authenticated session handle for one account.
///
/// Cheap to clone; the cache hands out `Arc<WebDavClient>` and callers must
/// not hold it past a single operation, so invalidation takes effect on
/// their next fetch.
#[derive(Clone, Debug)]
pub struct WebDavClient {
    http: reqwest::Client,
    base_url: Url,
    auth: Option<BasicAuth>,
}

#[derive(Clone)]
struct BasicAuth {
    username: String,
    password: secrecy::SecretString,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl WebDavClient {
    pub fn new(http: reqwest::Client, base_url: Url, password: Option<PasswordCredentials>) -> Self {
        Self {
            http,
            base_url,
            auth: password.map(|creds| BasicAuth {
                username: creds.username,
                password: creds.password,
            }),
        }
    }

    /// The normalized base address this handle is bound to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The underlying HTTP client, for callers that build requests directly.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Start a request for a path relative to the account root, with basic
    /// auth pre-applied when the account has password credentials.
    pub fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder> {
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::config(format!("invalid request path {path:?}: {e}")))?;

        let mut builder = self.http.request(method, url);
        if let Some(auth) = &self.auth {
            builder = builder.basic_auth(&auth.username, Some(auth.password.expose_secret()));
        }
        Ok(builder)
    }
}

/// Construction seam between the session cache and the transport.
///
/// The cache only ever builds clients through this trait, so tests can count
/// constructions or substitute a stub transport.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn build(&self, config: ClientConfig) -> Result<WebDavClient>;
}

/// The real factory: assembles a `reqwest::Client` from the config.
#[derive(Default)]
pub struct HttpClientFactory;

#[async_trait]
impl ClientFactory for HttpClientFactory {
    async fn build(&self, config: ClientConfig) -> Result<WebDavClient> {
        let mut builder = reqwest::Client::builder();

        if !config.verify_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if config.force_http1 {
            builder = builder.http1_only();
        }

        if let Some(identity) = &config.identity {
            // reqwest wants chain and key in a single PEM bundle.
            let mut pem = identity.certificate_chain.as_bytes().to_vec();
            pem.push(b'\n');
            pem.extend_from_slice(identity.private_key.as_bytes());

            let tls_identity = reqwest::Identity::from_pem(&pem)
                .map_err(|e| Error::Tls(format!("alias {:?}: {e}", identity.alias)))?;
            builder = builder.identity(tls_identity);
        }

        let http = builder.build().map_err(Error::Network)?;

        tracing::debug!(
            base_url = %config.base_url,
            basic_auth = config.password.is_some(),
            mutual_tls = config.identity.is_some(),
            verify_certs = config.verify_certs,
            force_http1 = config.force_http1,
            "constructed webdav client"
        );

        Ok(WebDavClient::new(http, config.base_url, config.password))
    }
}
