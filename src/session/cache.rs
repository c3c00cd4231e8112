//! Session cache: one lazily-constructed client per account.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::account::Account;
use crate::client::{ClientConfig, ClientFactory, HttpClientFactory, WebDavClient};
use crate::keystore::KeyStore;
use crate::resolver::CredentialResolver;
use crate::Result;

/// A cache slot for one account. The async mutex serializes construction so
/// concurrent `get_client` calls for the same account perform at most one
/// build; `None` inside the guard means nothing is cached.
type Entry = Mutex<Option<Arc<WebDavClient>>>;

/// Owns at most one live [`WebDavClient`] per account.
///
/// `get_client` returns the cached handle or resolves credentials,
/// normalizes the base address, and constructs a new client through the
/// injected [`ClientFactory`]. `invalidate` discards the cached handle; the
/// persistence layer must call it on every authentication-relevant edit and
/// on account deletion, before returning control to the edit flow.
///
/// Handles already returned to callers are unaffected by invalidation; they
/// stay usable until the caller fetches again. A failed construction caches
/// nothing, and each subsequent caller retries fresh.
pub struct SessionCache {
    resolver: CredentialResolver,
    factory: Arc<dyn ClientFactory>,
    entries: DashMap<i64, Arc<Entry>>,
}

impl SessionCache {
    /// Cache building real HTTP clients, resolving certificates from
    /// `store`.
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self::with_factory(store, Arc::new(HttpClientFactory))
    }

    /// Cache with a custom client factory (stub transports, tests).
    pub fn with_factory(store: Arc<dyn KeyStore>, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            resolver: CredentialResolver::new(store),
            factory,
            entries: DashMap::new(),
        }
    }

    /// Get the client for `account`, constructing and caching it on first
    /// use.
    ///
    /// Repeated calls without an intervening [`invalidate`](Self::invalidate)
    /// return the identical handle. Fails with [`crate::Error::Config`] iff
    /// the account's base address is unparseable after normalization; absent
    /// credentials are not an error.
    pub async fn get_client(&self, account: &Account) -> Result<Arc<WebDavClient>> {
        let entry = self
            .entries
            .entry(account.id)
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();

        let mut slot = entry.lock().await;
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        match self.build_client(account).await {
            Ok(client) => {
                *slot = Some(client.clone());
                tracing::debug!(account_id = account.id, "cached new session client");
                Ok(client)
            }
            Err(e) => {
                // Nothing was cached; drop the placeholder slot too, so a
                // misconfigured account id probed repeatedly does not
                // accumulate empty entries.
                self.entries
                    .remove_if(&account.id, |_, current| Arc::ptr_eq(current, &entry));
                Err(e)
            }
        }
    }

    async fn build_client(&self, account: &Account) -> Result<Arc<WebDavClient>> {
        let credentials = self.resolver.resolve(account).await;
        let config = ClientConfig::for_account(account, credentials)?;
        Ok(Arc::new(self.factory.build(config).await?))
    }

    /// Discard the cached client for this account, if any.
    ///
    /// No disconnect handshake is performed; the handle is simply dropped
    /// once the last caller releases it. Any `get_client` call beginning
    /// after this returns triggers fresh resolution, even if an older
    /// construction is still in flight.
    pub fn invalidate(&self, account_id: i64) {
        if self.entries.remove(&account_id).is_some() {
            tracing::debug!(account_id, "invalidated session client");
        }
    }

    /// Whether a constructed client is currently cached for this account.
    pub fn is_cached(&self, account_id: i64) -> bool {
        match self.entries.get(&account_id) {
            Some(entry) => entry
                .try_lock()
                .map(|slot| slot.is_some())
                .unwrap_or(false),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::account::Protocol;
    use crate::keystore::MemoryKeyStore;

    /// Counts constructions; builds plain unauthenticated handles.
    struct CountingFactory {
        builds: AtomicUsize,
    }

    impl CountingFactory {
        fn new() -> Self {
            Self {
                builds: AtomicUsize::new(0),
            }
        }

        fn build_count(&self) -> usize {
            self.builds.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ClientFactory for CountingFactory {
        async fn build(&self, config: ClientConfig) -> Result<WebDavClient> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            Ok(WebDavClient::new(
                reqwest::Client::new(),
                config.base_url,
                config.password,
            ))
        }
    }

    fn cache_with_counting() -> (SessionCache, Arc<CountingFactory>) {
        let factory = Arc::new(CountingFactory::new());
        let cache = SessionCache::with_factory(Arc::new(MemoryKeyStore::new()), factory.clone());
        (cache, factory)
    }

    #[tokio::test]
    async fn test_repeated_get_returns_identical_handle() {
        let (cache, factory) = cache_with_counting();
        let account = Account::new(1, "https://example.com/dav");

        let first = cache.get_client(&account).await.unwrap();
        let second = cache.get_client(&account).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.build_count(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_fresh_construction() {
        let (cache, factory) = cache_with_counting();
        let account = Account::new(1, "https://example.com/dav");

        let first = cache.get_client(&account).await.unwrap();
        cache.invalidate(account.id);
        let second = cache.get_client(&account).await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(factory.build_count(), 2);
    }

    #[tokio::test]
    async fn test_accounts_are_cached_independently() {
        let (cache, factory) = cache_with_counting();
        let a = Account::new(1, "https://a.example.com/");
        let b = Account::new(2, "https://b.example.com/");

        let client_a = cache.get_client(&a).await.unwrap();
        let client_b = cache.get_client(&b).await.unwrap();
        assert!(!Arc::ptr_eq(&client_a, &client_b));

        cache.invalidate(a.id);
        assert!(!cache.is_cached(a.id));
        assert!(cache.is_cached(b.id));
        assert_eq!(factory.build_count(), 2);
    }

    #[tokio::test]
    async fn test_malformed_url_fails_and_caches_nothing() {
        let (cache, factory) = cache_with_counting();
        let account = Account::new(1, "");

        let err = cache.get_client(&account).await.unwrap_err();
        assert!(err.is_configuration_error());
        assert!(!cache.is_cached(account.id));
        assert_eq!(factory.build_count(), 0);

        // A later call with a fixed record succeeds.
        let fixed = Account::new(1, "https://example.com/dav");
        cache.get_client(&fixed).await.unwrap();
        assert!(cache.is_cached(fixed.id));
    }

    #[tokio::test]
    async fn test_failed_construction_leaves_no_placeholder_slot() {
        let (cache, factory) = cache_with_counting();
        let account = Account::new(1, "");

        for _ in 0..3 {
            assert!(cache.get_client(&account).await.is_err());
        }

        assert!(cache.entries.is_empty());
        assert_eq!(factory.build_count(), 0);
    }

    #[tokio::test]
    async fn test_invalidating_unknown_account_is_a_no_op() {
        let (cache, _factory) = cache_with_counting();
        cache.invalidate(42);
        assert!(!cache.is_cached(42));
    }

    #[tokio::test]
    async fn test_http1_preference_reaches_the_factory() {
        struct FlagCapture {
            force_http1: AtomicUsize,
        }

        #[async_trait]
        impl ClientFactory for FlagCapture {
            async fn build(&self, config: ClientConfig) -> Result<WebDavClient> {
                if config.force_http1 {
                    self.force_http1.fetch_add(1, Ordering::SeqCst);
                }
                Ok(WebDavClient::new(
                    reqwest::Client::new(),
                    config.base_url,
                    config.password,
                ))
            }
        }

        let factory = Arc::new(FlagCapture {
            force_http1: AtomicUsize::new(0),
        });
        let cache = SessionCache::with_factory(Arc::new(MemoryKeyStore::new()), factory.clone());

        let auto = Account::new(1, "https://example.com/");
        cache.get_client(&auto).await.unwrap();
        assert_eq!(factory.force_http1.load(Ordering::SeqCst), 0);

        let legacy = Account::new(2, "https://example.com/").with_protocol(Protocol::Http1);
        cache.get_client(&legacy).await.unwrap();
        assert_eq!(factory.force_http1.load(Ordering::SeqCst), 1);
    }
}
