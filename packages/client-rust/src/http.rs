//! SOAP 1.1 over HTTP transport.
//!
//! Implements [`TransportFactory`] with a blocking `reqwest` client. Each
//! [`HttpSoapClient`] is bound to one service endpoint and, for authenticated
//! services, carries the `wsse:Security` header computed when it was built.
//!
//! Responses are not unmarshalled: a 2xx reply yields the raw envelope as a
//! JSON string, whatever elements it contains. Non-2xx replies carrying a fault
//! are reduced to their `faultstring` (SOAP 1.1) or `Reason/Text` (SOAP 1.2) so
//! the dispatcher can surface the message verbatim.

use std::fmt::Write as _;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use serde_json::Value;
use tracing::debug;
use wsproxy_core::xml::{
    element_inner, element_text, escape, is_valid_name, render_payload, InvalidName,
};
use wsproxy_core::{AuthHeader, ServiceDescriptor};

use crate::transport::{Transport, TransportFactory, TransportFault};

pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

const SOAP_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Builds the request envelope for `operation` in `namespace`.
///
/// # Errors
///
/// Returns [`InvalidName`] if `operation` or any payload key is not a plain
/// XML element name.
pub fn build_envelope(
    namespace: &str,
    operation: &str,
    payload: &Value,
    header: Option<&AuthHeader>,
) -> Result<String, InvalidName> {
    if !is_valid_name(operation) {
        return Err(InvalidName {
            name: operation.to_string(),
        });
    }
    let body = render_payload(payload)?;
    let mut envelope = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><SOAP-ENV:Envelope xmlns:SOAP-ENV="{SOAP_ENV_NS}">"#
    );
    if let Some(header) = header {
        envelope.push_str("<SOAP-ENV:Header>");
        envelope.push_str(&header.to_xml());
        envelope.push_str("</SOAP-ENV:Header>");
    }
    envelope.push_str("<SOAP-ENV:Body>");
    let _ = write!(
        envelope,
        r#"<{operation} xmlns="{}">{body}</{operation}>"#,
        escape(namespace)
    );
    envelope.push_str("</SOAP-ENV:Body></SOAP-ENV:Envelope>");
    Ok(envelope)
}

/// `SOAPAction` value: the namespace joined to the operation name.
#[must_use]
pub fn soap_action(namespace: &str, operation: &str) -> String {
    if namespace.ends_with('/') {
        format!("{namespace}{operation}")
    } else {
        format!("{namespace}/{operation}")
    }
}

/// Extracts a fault from a response body, if it carries one.
#[must_use]
pub fn parse_fault(body: &str) -> Option<TransportFault> {
    let fault = element_inner(body, "Fault")?;
    let message = element_text(fault, "faultstring")
        .or_else(|| element_inner(fault, "Reason").and_then(|r| element_text(r, "Text")))
        .unwrap_or_else(|| "SOAP fault".to_string());
    let code = element_text(fault, "faultcode")
        .or_else(|| element_inner(fault, "Code").and_then(|c| element_text(c, "Value")));
    let fault = TransportFault::new(message.trim());
    Some(match code {
        Some(code) => fault.with_code(code.trim()),
        None => fault,
    })
}

// ---------------------------------------------------------------------------
// HttpTransportFactory
// ---------------------------------------------------------------------------

/// Creates [`HttpSoapClient`]s sharing one connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransportFactory {
    http: Client,
}

impl HttpTransportFactory {
    /// # Errors
    ///
    /// Returns the `reqwest` error if the TLS backend cannot be initialised.
    pub fn new(request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { http })
    }
}

impl TransportFactory for HttpTransportFactory {
    type Client = HttpSoapClient;

    fn connect(
        &self,
        descriptor: &ServiceDescriptor,
        header: Option<AuthHeader>,
    ) -> Result<HttpSoapClient, TransportFault> {
        let endpoint = Url::parse(&descriptor.execution_endpoint).map_err(|e| {
            TransportFault::new(format!(
                "invalid endpoint '{}': {e}",
                descriptor.execution_endpoint
            ))
        })?;
        Ok(HttpSoapClient {
            http: self.http.clone(),
            endpoint,
            namespace: descriptor.namespace.clone(),
            header,
            last_exchange: Mutex::new(None),
        })
    }
}

// ---------------------------------------------------------------------------
// HttpSoapClient
// ---------------------------------------------------------------------------

/// Raw request/response of the most recent call, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub request: String,
    /// `None` when no response arrived.
    pub status: Option<u16>,
    pub response: Option<String>,
}

/// A client bound to one service endpoint.
#[derive(Debug)]
pub struct HttpSoapClient {
    http: Client,
    endpoint: Url,
    namespace: String,
    header: Option<AuthHeader>,
    last_exchange: Mutex<Option<Exchange>>,
}

impl HttpSoapClient {
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    #[must_use]
    pub fn header(&self) -> Option<&AuthHeader> {
        self.header.as_ref()
    }

    /// The last request sent and the response received, if any.
    #[must_use]
    pub fn last_exchange(&self) -> Option<Exchange> {
        self.last_exchange.lock().clone()
    }

    fn record(&self, request: String, status: Option<u16>, response: Option<String>) {
        *self.last_exchange.lock() = Some(Exchange {
            request,
            status,
            response,
        });
    }
}

impl Transport for HttpSoapClient {
    fn invoke(&self, operation: &str, payload: &Value) -> Result<Value, TransportFault> {
        if !is_valid_name(operation) {
            return Err(TransportFault::new(format!(
                "invalid operation name '{operation}'"
            )));
        }
        let envelope = build_envelope(&self.namespace, operation, payload, self.header.as_ref())
            .map_err(|e| TransportFault::new(e.to_string()))?;
        let action = soap_action(&self.namespace, operation);
        debug!(endpoint = %self.endpoint, action = %action, "sending SOAP request");

        let sent = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .header("SOAPAction", format!("\"{action}\""))
            .body(envelope.clone())
            .send();
        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                self.record(envelope, None, None);
                return Err(TransportFault::new(e.to_string()));
            }
        };

        let status = response.status();
        let body = match response.text() {
            Ok(body) => body,
            Err(e) => {
                self.record(envelope, Some(status.as_u16()), None);
                return Err(TransportFault::new(e.to_string()));
            }
        };
        debug!(status = status.as_u16(), bytes = body.len(), "SOAP response received");
        self.record(envelope, Some(status.as_u16()), Some(body.clone()));

        if status.is_success() {
            return Ok(Value::String(body));
        }
        Err(parse_fault(&body).unwrap_or_else(|| TransportFault::new(format!("HTTP {status}"))))
    }
}
