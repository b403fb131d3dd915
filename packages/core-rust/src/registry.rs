//! Service registry: the static table of known SOAP services.
//!
//! Maps a service name to its [`ServiceDescriptor`]. The registry is built once
//! (compiled-in via [`ServiceRegistry::builtin`] or loaded from JSON) and is
//! read-only afterwards; there is no runtime registration.
//!
//! # JSON format
//!
//! ```json
//! {
//!   "KiasSVC": {
//!     "metadata_location": "https://host/KiasSVC.asmx?WSDL",
//!     "endpoint": "https://host/KiasSVC.asmx",
//!     "requires_auth": false
//!   }
//! }
//! ```
//!
//! `wsdl`, `location` and `need_auth` are accepted as aliases. A missing
//! `endpoint` is derived from the metadata location by dropping its query string.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use tracing::debug;

/// Namespace used for the operation element when a descriptor names none.
pub const DEFAULT_NAMESPACE: &str = "http://tempuri.org/";

// ---------------------------------------------------------------------------
// ServiceDescriptor
// ---------------------------------------------------------------------------

/// Endpoint description for one remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Unique registry key (e.g. `"KiasSVC"`).
    pub name: String,
    /// Where the service metadata (WSDL) lives.
    pub metadata_location: String,
    /// URL that operations are POSTed to.
    pub execution_endpoint: String,
    /// Whether every call must carry a WS-Security `UsernameToken`.
    pub requires_auth: bool,
    /// Target namespace of the service's operations.
    pub namespace: String,
}

impl ServiceDescriptor {
    /// Creates a descriptor using [`DEFAULT_NAMESPACE`].
    pub fn new(
        name: impl Into<String>,
        metadata_location: impl Into<String>,
        execution_endpoint: impl Into<String>,
        requires_auth: bool,
    ) -> Self {
        Self {
            name: name.into(),
            metadata_location: metadata_location.into(),
            execution_endpoint: execution_endpoint.into(),
            requires_auth,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }

    /// Replaces the target namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}

/// Strips the query string (`?WSDL`) from a metadata location.
#[must_use]
pub fn endpoint_from_metadata(metadata_location: &str) -> &str {
    metadata_location
        .split_once('?')
        .map_or(metadata_location, |(base, _)| base)
}

// ---------------------------------------------------------------------------
// RegistryError
// ---------------------------------------------------------------------------

/// Errors raised while building a [`ServiceRegistry`].
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate service name: {name}")]
    DuplicateService { name: String },
    #[error("invalid descriptor for '{name}': {reason}")]
    InvalidDescriptor { name: String, reason: &'static str },
    #[error("malformed registry: {0}")]
    Parse(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// ServiceRegistry
// ---------------------------------------------------------------------------

/// Read-only table of service descriptors keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, ServiceDescriptor>,
}

impl ServiceRegistry {
    /// The compiled-in service table.
    #[must_use]
    pub fn builtin() -> Self {
        let kias = ServiceDescriptor::new(
            "KiasSVC",
            "https://kiassvctest.nasko.ru/kiassvctest/KiasSVC.asmx?WSDL",
            "https://kiassvctest.nasko.ru/kiassvctest/KiasSVC.asmx",
            false,
        );
        let mut services = HashMap::new();
        services.insert(kias.name.clone(), kias);
        Self { services }
    }

    /// Builds a registry from descriptors.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateService` if two descriptors share a name, or
    /// `InvalidDescriptor` if a name or location is empty.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = ServiceDescriptor>,
    ) -> Result<Self, RegistryError> {
        let mut services = HashMap::new();
        for descriptor in descriptors {
            validate(&descriptor)?;
            if services.contains_key(&descriptor.name) {
                return Err(RegistryError::DuplicateService {
                    name: descriptor.name,
                });
            }
            services.insert(descriptor.name.clone(), descriptor);
        }
        Ok(Self { services })
    }

    /// Parses the JSON table described in the module docs.
    ///
    /// # Errors
    ///
    /// Returns `Parse` for malformed JSON and the `from_descriptors` errors
    /// for semantically invalid entries.
    pub fn from_json_str(text: &str) -> Result<Self, RegistryError> {
        let entries: BTreeMap<String, RegistryEntry> = serde_json::from_str(text)?;
        debug!(entries = entries.len(), "parsed registry table");
        Self::from_descriptors(entries.into_iter().map(|(name, entry)| entry.into_descriptor(name)))
    }

    /// Looks up a service by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.get(name)
    }

    /// Registered service names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

fn validate(descriptor: &ServiceDescriptor) -> Result<(), RegistryError> {
    let reason = if descriptor.name.is_empty() {
        "empty service name"
    } else if descriptor.metadata_location.is_empty() {
        "empty metadata location"
    } else if descriptor.execution_endpoint.is_empty() {
        "empty execution endpoint"
    } else {
        return Ok(());
    };
    Err(RegistryError::InvalidDescriptor {
        name: descriptor.name.clone(),
        reason,
    })
}

/// On-disk shape of one registry entry.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryEntry {
    #[serde(alias = "wsdl")]
    metadata_location: String,
    #[serde(default, alias = "location")]
    endpoint: Option<String>,
    #[serde(default, alias = "need_auth")]
    requires_auth: bool,
    #[serde(default)]
    namespace: Option<String>,
}

impl RegistryEntry {
    fn into_descriptor(self, name: String) -> ServiceDescriptor {
        let endpoint = self
            .endpoint
            .unwrap_or_else(|| endpoint_from_metadata(&self.metadata_location).to_string());
        let descriptor =
            ServiceDescriptor::new(name, self.metadata_location, endpoint, self.requires_auth);
        match self.namespace {
            Some(ns) => descriptor.with_namespace(ns),
            None => descriptor,
        }
    }
}
