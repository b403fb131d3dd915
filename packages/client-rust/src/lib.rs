//! `wsproxy` Client: `select(service).invoke(operation, payload)` dispatch over SOAP.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`transport`] | `Transport` / `TransportFactory` port and `TransportFault` |
//! | [`cache`] | Per-service client cache |
//! | [`proxy`] | `ServiceProxy` dispatcher and mutex-guarded `SharedProxy` |
//! | [`http`] | SOAP 1.1 over HTTP transport |
//! | [`config`] | `ProxyConfig` and HTTP wiring |

pub mod cache;
pub mod config;
pub mod http;
pub mod proxy;
pub mod transport;

pub use cache::ConnectionCache;
pub use config::{ConfigError, ProxyConfig};
pub use http::{Exchange, HttpSoapClient, HttpTransportFactory};
pub use proxy::{CallOutcome, DispatchError, ServiceProxy, SharedProxy};
pub use transport::{Transport, TransportFactory, TransportFault};
