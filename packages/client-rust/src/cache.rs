//! Per-service client cache.
//!
//! Holds one client handle per service name. Handles for services without
//! authentication are created once and reused. Services that require
//! authentication get a new client on every call, since the digest header
//! embeds a nonce and a `Created` timestamp that must match the send time.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use wsproxy_core::{CredentialHeaderBuilder, Credentials, PasswordMode, ServiceDescriptor};

use crate::transport::{TransportFactory, TransportFault};

/// Lazily populated map of service name to client handle.
pub struct ConnectionCache<F: TransportFactory> {
    factory: F,
    headers: CredentialHeaderBuilder,
    password_mode: PasswordMode,
    entries: HashMap<String, Arc<F::Client>>,
}

impl<F: TransportFactory> ConnectionCache<F> {
    /// Creates an empty cache using digest headers.
    #[must_use]
    pub fn new(factory: F, headers: CredentialHeaderBuilder) -> Self {
        Self {
            factory,
            headers,
            password_mode: PasswordMode::Digest,
            entries: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_password_mode(mut self, mode: PasswordMode) -> Self {
        self.password_mode = mode;
        self
    }

    #[must_use]
    pub fn password_mode(&self) -> PasswordMode {
        self.password_mode
    }

    /// Returns a client for `descriptor`.
    ///
    /// Non-authenticated services reuse the cached handle. Otherwise a new
    /// client is built (with a fresh header when `requires_auth`) and replaces
    /// the entry.
    ///
    /// # Errors
    ///
    /// Propagates the factory's `TransportFault` when construction fails; the
    /// existing entry is left untouched in that case.
    pub fn get_client(
        &mut self,
        descriptor: &ServiceDescriptor,
        credentials: &Credentials,
    ) -> Result<Arc<F::Client>, TransportFault> {
        if !descriptor.requires_auth {
            if let Some(client) = self.entries.get(&descriptor.name) {
                return Ok(Arc::clone(client));
            }
        }

        let header = descriptor
            .requires_auth
            .then(|| self.headers.build(credentials, self.password_mode));
        debug!(
            service = %descriptor.name,
            authenticated = header.is_some(),
            "building transport client"
        );
        let client = Arc::new(self.factory.connect(descriptor, header)?);
        self.entries
            .insert(descriptor.name.clone(), Arc::clone(&client));
        Ok(client)
    }

    /// The cached handle for `name`, if any.
    #[must_use]
    pub fn cached(&self, name: &str) -> Option<&Arc<F::Client>> {
        self.entries.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Drops the handle for `name`; the next call rebuilds it.
    pub fn evict(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::StubFactory;

    fn cache(factory: &StubFactory) -> ConnectionCache<StubFactory> {
        ConnectionCache::new(factory.clone(), CredentialHeaderBuilder::new())
    }

    fn plain() -> ServiceDescriptor {
        ServiceDescriptor::new("Plain", "http://p?wsdl", "http://p", false)
    }

    fn secured() -> ServiceDescriptor {
        ServiceDescriptor::new("Secured", "http://s?wsdl", "http://s", true)
    }

    #[test]
    fn unauthenticated_client_reused() {
        let factory = StubFactory::default();
        let mut cache = cache(&factory);
        let creds = Credentials::new("u", "p", 0);

        let a = cache.get_client(&plain(), &creds).unwrap();
        let b = cache.get_client(&plain(), &creds).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.connect_count(), 1);
        assert!(a.header.is_none());
    }

    #[test]
    fn authenticated_client_rebuilt_every_call() {
        let factory = StubFactory::default();
        let mut cache = cache(&factory);
        let creds = Credentials::new("u", "p", 0);

        let a = cache.get_client(&secured(), &creds).unwrap();
        let b = cache.get_client(&secured(), &creds).unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(factory.connect_count(), 2);
        let (ha, hb) = (a.header.as_ref().unwrap(), b.header.as_ref().unwrap());
        assert_eq!(ha.mode, PasswordMode::Digest);
        assert_ne!(ha.nonce, hb.nonce);
        assert!(Arc::ptr_eq(cache.cached("Secured").unwrap(), &b));
    }

    #[test]
    fn text_mode_header() {
        let factory = StubFactory::default();
        let mut cache = cache(&factory).with_password_mode(PasswordMode::Text);
        let creds = Credentials::new("u", "plain-pass", 0);

        let client = cache.get_client(&secured(), &creds).unwrap();
        let header = client.header.as_ref().unwrap();
        assert_eq!(header.mode, PasswordMode::Text);
        assert_eq!(header.password, "plain-pass");
    }

    #[test]
    fn failed_connect_leaves_cache_untouched() {
        let factory = StubFactory::default();
        let mut cache = cache(&factory);
        factory.refuse_connections("WSDL unreachable");

        let err = cache
            .get_client(&plain(), &Credentials::default())
            .unwrap_err();
        assert_eq!(err.message, "WSDL unreachable");
        assert!(cache.is_empty());
    }

    #[test]
    fn evict_forces_rebuild() {
        let factory = StubFactory::default();
        let mut cache = cache(&factory);
        let creds = Credentials::default();

        let a = cache.get_client(&plain(), &creds).unwrap();
        assert!(cache.evict("Plain"));
        assert!(!cache.evict("Plain"));
        let b = cache.get_client(&plain(), &creds).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(factory.connect_count(), 2);
    }

    #[test]
    fn clear_and_len() {
        let factory = StubFactory::default();
        let mut cache = cache(&factory);
        let creds = Credentials::default();
        cache.get_client(&plain(), &creds).unwrap();
        cache.get_client(&secured(), &creds).unwrap();
        assert_eq!(cache.len(), 2);
        assert!(cache.contains("Plain"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
