//! Service dispatcher: `select(service)` then `invoke(operation, payload)`.
//!
//! [`ServiceProxy`] resolves a service name against the [`ServiceRegistry`],
//! keeps the selection pending until an operation is invoked, obtains a client
//! from the [`ConnectionCache`] and performs the call. Failures never escape
//! `invoke`: they become a `None` result plus a sticky message readable through
//! [`ServiceProxy::last_error_message`].
//!
//! ```text
//! Idle --select(found)--> Selected --invoke--> Idle (stack empty)
//!   |                        |  ^
//!   |                        +--+ select(found) pushes again
//!   +--select(missing)--> Idle + error set (next invoke short-circuits)
//! ```
//!
//! A failed select or a faulted invoke leaves the error set; every later
//! `invoke` returns `None` without touching the network until a successful
//! `select` clears it.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error, info_span, warn};
use wsproxy_core::{CredentialHeaderBuilder, Credentials, PasswordMode, ServiceRegistry};

use crate::cache::ConnectionCache;
use crate::transport::{Transport, TransportFactory, TransportFault};

// ---------------------------------------------------------------------------
// DispatchError
// ---------------------------------------------------------------------------

/// Why a dispatch produced no result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("Service '{name}' not found!")]
    ServiceNotFound { name: String },
    #[error("no service selected before invoking '{operation}'")]
    NoSelection { operation: String },
    #[error(transparent)]
    RemoteFault(#[from] TransportFault),
}

// ---------------------------------------------------------------------------
// ServiceProxy
// ---------------------------------------------------------------------------

/// Two-step dispatcher over a registry of SOAP services.
///
/// Not thread-safe by construction: every state change takes `&mut self`.
/// Wrap in [`SharedProxy`] to share one instance between threads.
pub struct ServiceProxy<F: TransportFactory> {
    registry: ServiceRegistry,
    credentials: Credentials,
    cache: ConnectionCache<F>,
    selection: Vec<String>,
    last_error: Option<String>,
    last_service: Option<Arc<F::Client>>,
}

impl<F: TransportFactory> ServiceProxy<F> {
    /// Creates a dispatcher that signs authenticated calls with digest headers.
    pub fn new(credentials: Credentials, registry: ServiceRegistry, factory: F) -> Self {
        Self::with_cache(
            credentials,
            registry,
            ConnectionCache::new(factory, CredentialHeaderBuilder::new()),
        )
    }

    /// Creates a dispatcher around a preconfigured cache (custom clock, nonce
    /// encoding or password mode).
    pub fn with_cache(
        credentials: Credentials,
        registry: ServiceRegistry,
        cache: ConnectionCache<F>,
    ) -> Self {
        Self {
            registry,
            credentials,
            cache,
            selection: Vec::new(),
            last_error: None,
            last_service: None,
        }
    }

    /// Selects `service` for the next [`invoke`](Self::invoke).
    ///
    /// A known service is pushed onto the selection stack and clears any
    /// pending error. An unknown one sets `"Service '<name>' not found!"` and
    /// pushes nothing.
    pub fn select(&mut self, service: &str) -> &mut Self {
        if self.registry.lookup(service).is_some() {
            debug!(service, depth = self.selection.len() + 1, "service selected");
            self.selection.push(service.to_string());
            self.last_error = None;
        } else {
            let err = DispatchError::ServiceNotFound {
                name: service.to_string(),
            };
            warn!(service, "{err}");
            self.last_error = Some(err.to_string());
        }
        self
    }

    /// Invokes `operation` on the most recently selected service.
    ///
    /// Returns `None` when a non-empty error is pending (nothing is popped or
    /// sent), when no service is selected, or when the call faults; the reason
    /// is then available from [`last_error_message`](Self::last_error_message).
    /// A fault with an empty message does not block later invocations.
    pub fn invoke(&mut self, operation: &str, payload: Value) -> Option<Value> {
        if let Some(pending) = self.last_error.as_deref().filter(|m| !m.is_empty()) {
            debug!(operation, error = %pending, "invoke short-circuited by pending error");
            return None;
        }
        match self.dispatch(operation, &payload) {
            Ok(result) => Some(result),
            Err(err) => {
                self.last_error = Some(err.to_string());
                None
            }
        }
    }

    /// Positional form of [`invoke`](Self::invoke): only the first argument is
    /// forwarded; with no arguments the payload is `null`.
    pub fn invoke_positional(
        &mut self,
        operation: &str,
        args: impl IntoIterator<Item = Value>,
    ) -> Option<Value> {
        let payload = args.into_iter().next().unwrap_or(Value::Null);
        self.invoke(operation, payload)
    }

    /// Selects `service` and invokes `operation` in one step, returning the
    /// typed error. Error and diagnostics state are updated as with
    /// `select` + `invoke`.
    ///
    /// # Errors
    ///
    /// `ServiceNotFound` for an unknown service, `RemoteFault` when the
    /// transport fails.
    pub fn call(
        &mut self,
        service: &str,
        operation: &str,
        payload: &Value,
    ) -> Result<Value, DispatchError> {
        self.select(service);
        if self.last_error.is_some() {
            return Err(DispatchError::ServiceNotFound {
                name: service.to_string(),
            });
        }
        self.dispatch(operation, payload).inspect_err(|err| {
            self.last_error = Some(err.to_string());
        })
    }

    fn dispatch(&mut self, operation: &str, payload: &Value) -> Result<Value, DispatchError> {
        let Some(service) = self.selection.pop() else {
            let err = DispatchError::NoSelection {
                operation: operation.to_string(),
            };
            error!(operation, "{err}");
            return Err(err);
        };

        let span = info_span!("invoke", service = %service, operation);
        let _guard = span.enter();

        let descriptor = self
            .registry
            .lookup(&service)
            .ok_or_else(|| DispatchError::ServiceNotFound {
                name: service.clone(),
            })?;
        let client = self
            .cache
            .get_client(descriptor, &self.credentials)
            .inspect_err(|fault| warn!(error = %fault, "client construction failed"))?;
        self.last_service = Some(Arc::clone(&client));

        match client.invoke(operation, payload) {
            Ok(result) => {
                debug!("invoke succeeded");
                Ok(result)
            }
            Err(fault) => {
                warn!(error = %fault, code = ?fault.code, "remote fault");
                Err(fault.into())
            }
        }
    }

    /// The pending error, if any. Cleared by the next successful `select`.
    #[must_use]
    pub fn last_error_message(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The client used by the most recent dispatch, for diagnostics.
    #[must_use]
    pub fn last_service(&self) -> Option<&Arc<F::Client>> {
        self.last_service.as_ref()
    }

    /// Number of selections not yet consumed by an `invoke`.
    #[must_use]
    pub fn pending_selections(&self) -> usize {
        self.selection.len()
    }

    #[must_use]
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    #[must_use]
    pub fn password_mode(&self) -> PasswordMode {
        self.cache.password_mode()
    }

    #[must_use]
    pub fn cache(&self) -> &ConnectionCache<F> {
        &self.cache
    }
}

// ---------------------------------------------------------------------------
// SharedProxy
// ---------------------------------------------------------------------------

/// Outcome of one [`SharedProxy::call`] cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    pub result: Option<Value>,
    pub error: Option<String>,
}

/// A [`ServiceProxy`] behind a mutex; select and invoke run as one critical
/// section so concurrent callers never interleave selections.
pub struct SharedProxy<F: TransportFactory> {
    inner: Mutex<ServiceProxy<F>>,
}

impl<F: TransportFactory> SharedProxy<F> {
    pub fn new(proxy: ServiceProxy<F>) -> Self {
        Self {
            inner: Mutex::new(proxy),
        }
    }

    /// Runs `select(service).invoke(operation, payload)` under the lock and
    /// returns the result together with the error message read in the same
    /// critical section.
    pub fn call(&self, service: &str, operation: &str, payload: Value) -> CallOutcome {
        let mut proxy = self.inner.lock();
        let result = proxy.select(service).invoke(operation, payload);
        CallOutcome {
            result,
            error: proxy.last_error_message().map(str::to_string),
        }
    }

    /// Runs `f` with exclusive access to the wrapped proxy.
    pub fn with<R>(&self, f: impl FnOnce(&mut ServiceProxy<F>) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn into_inner(self) -> ServiceProxy<F> {
        self.inner.into_inner()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
