//! Transport port: the opaque capability that performs a remote call.
//!
//! The dispatcher never talks to the network itself. It asks a
//! [`TransportFactory`] for a client bound to one service, optionally with an
//! [`AuthHeader`] attached, and then calls [`Transport::invoke`]. The HTTP
//! implementation lives in [`crate::http`].

use serde_json::Value;
use wsproxy_core::{AuthHeader, ServiceDescriptor};

/// A failure reported by the transport: network error, remote fault, or
/// unusable response. The message is surfaced to callers verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportFault {
    pub message: String,
    /// Remote fault code (e.g. `soap:Server`), when the service supplied one.
    pub code: Option<String>,
}

impl TransportFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// A client bound to one service endpoint.
pub trait Transport: Send + Sync {
    /// Calls `operation` with a single payload and returns the remote result.
    ///
    /// # Errors
    ///
    /// Returns a `TransportFault` for any transport-level or remote failure.
    fn invoke(&self, operation: &str, payload: &Value) -> Result<Value, TransportFault>;
}

/// Builds [`Transport`] clients for services.
pub trait TransportFactory {
    type Client: Transport;

    /// Creates a client for `descriptor`, carrying `header` on every request.
    ///
    /// # Errors
    ///
    /// Returns a `TransportFault` if the client cannot be constructed.
    fn connect(
        &self,
        descriptor: &ServiceDescriptor,
        header: Option<AuthHeader>,
    ) -> Result<Self::Client, TransportFault>;
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    /// What a stub client does when invoked.
    #[derive(Debug, Clone)]
    pub(crate) enum Reply {
        /// Echo `{"service", "operation", "payload"}` back.
        Echo,
        Fault(String),
    }

    /// Client that records its construction parameters and scripted replies.
    #[derive(Debug)]
    pub(crate) struct StubClient {
        pub(crate) service: String,
        pub(crate) header: Option<AuthHeader>,
        reply: Reply,
        pub(crate) calls: Mutex<Vec<(String, Value)>>,
    }

    impl Transport for StubClient {
        fn invoke(&self, operation: &str, payload: &Value) -> Result<Value, TransportFault> {
            self.calls.lock().push((operation.to_string(), payload.clone()));
            match &self.reply {
                Reply::Echo => Ok(serde_json::json!({
                    "service": self.service,
                    "operation": operation,
                    "payload": payload,
                })),
                Reply::Fault(message) => Err(TransportFault::new(message.clone())),
            }
        }
    }

    /// Factory handing out [`StubClient`]s; counts connects and invocations.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct StubFactory {
        pub(crate) connects: Arc<AtomicUsize>,
        replies: Arc<Mutex<HashMap<String, Reply>>>,
        refuse: Arc<Mutex<Option<String>>>,
    }

    impl StubFactory {
        pub(crate) fn reply(&self, service: &str, reply: Reply) {
            self.replies.lock().insert(service.to_string(), reply);
        }

        /// Makes every subsequent `connect` fail with `message`.
        pub(crate) fn refuse_connections(&self, message: &str) {
            *self.refuse.lock() = Some(message.to_string());
        }

        pub(crate) fn connect_count(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }
    }

    impl TransportFactory for StubFactory {
        type Client = StubClient;

        fn connect(
            &self,
            descriptor: &ServiceDescriptor,
            header: Option<AuthHeader>,
        ) -> Result<StubClient, TransportFault> {
            if let Some(message) = self.refuse.lock().clone() {
                return Err(TransportFault::new(message));
            }
            self.connects.fetch_add(1, Ordering::SeqCst);
            let reply = self
                .replies
                .lock()
                .get(&descriptor.name)
                .cloned()
                .unwrap_or(Reply::Echo);
            Ok(StubClient {
                service: descriptor.name.clone(),
                header,
                reply,
                calls: Mutex::new(Vec::new()),
            })
        }
    }
}
