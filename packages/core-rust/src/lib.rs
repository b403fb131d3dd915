//! `wsproxy` Core: service registry, credentials, and WS-Security `UsernameToken` headers.
//!
//! Pure logic only: nothing in this crate performs I/O. The dispatcher, the
//! connection cache and the HTTP transport live in `wsproxy-client`.

pub mod clock;
pub mod credentials;
pub mod registry;
pub mod wsse;
pub mod xml;

pub use clock::{ClockSource, FixedClock, SystemClock};
pub use credentials::Credentials;
pub use registry::{RegistryError, ServiceDescriptor, ServiceRegistry};
pub use wsse::{AuthHeader, CredentialHeaderBuilder, NonceEncoding, PasswordMode};
