//! WS-Security `UsernameToken` header construction.
//!
//! Builds the transient [`AuthHeader`] attached to every call on a service
//! that requires authentication, in either the `PasswordText` or the
//! `PasswordDigest` profile.
//!
//! # Digest layout
//!
//! ```text
//! created = UTC(now + clock_offset) as YYYY-MM-DDTHH:MM:SSZ
//! nonce   = random integer in 0..=2^31-1
//! bytes   = hex_pack(decimal(nonce))          (NonceEncoding::LegacyDecimalHex)
//! digest  = base64(sha1(bytes ++ created ++ password))
//! Nonce   = base64(bytes)
//! ```
//!
//! The legacy layout reads the decimal digits of the nonce as hex nibbles. The
//! servers this client talks to expect exactly those bytes, so it stays the
//! default. [`NonceEncoding::RandomBytes`] produces the textbook 16-byte nonce.

use std::fmt::Write as _;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::Rng;
use sha1::{Digest, Sha1};

use crate::clock::{adjusted_secs, format_created, ClockSource, SystemClock};
use crate::credentials::Credentials;
use crate::xml::escape;

pub const WSSE_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
pub const WSU_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
pub const PASSWORD_DIGEST_TYPE: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordDigest";
pub const PASSWORD_TEXT_TYPE: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordText";
pub const BASE64_ENCODING_TYPE: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";

/// Largest nonce drawn in legacy mode (`2^31 - 1`).
const LEGACY_NONCE_MAX: u32 = 0x7fff_ffff;

/// Length of a nonce in [`NonceEncoding::RandomBytes`] mode.
const RANDOM_NONCE_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Modes
// ---------------------------------------------------------------------------

/// Which `UsernameToken` password profile to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PasswordMode {
    #[default]
    Digest,
    Text,
}

impl PasswordMode {
    /// The `Type` attribute URI for `wsse:Password`.
    #[must_use]
    pub fn type_uri(self) -> &'static str {
        match self {
            Self::Digest => PASSWORD_DIGEST_TYPE,
            Self::Text => PASSWORD_TEXT_TYPE,
        }
    }
}

/// How the digest nonce bytes are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NonceEncoding {
    /// Decimal digits of a 31-bit integer packed as hex nibbles.
    #[default]
    LegacyDecimalHex,
    /// 16 uniformly random bytes.
    RandomBytes,
}

// ---------------------------------------------------------------------------
// AuthHeader
// ---------------------------------------------------------------------------

/// A computed `wsse:Security` header. Recomputed for every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeader {
    pub username: String,
    /// Plain password in text mode, base64 SHA-1 digest in digest mode.
    pub password: String,
    pub mode: PasswordMode,
    /// Base64 nonce; digest mode only.
    pub nonce: Option<String>,
    /// `YYYY-MM-DDTHH:MM:SSZ`; digest mode only.
    pub created: Option<String>,
}

impl AuthHeader {
    /// Renders the header as a `wsse:Security` element.
    ///
    /// The element carries `SOAP-ENV:mustUnderstand="1"`, so it must be placed
    /// inside an envelope that binds the `SOAP-ENV` prefix.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut xml = String::new();
        let _ = write!(
            xml,
            r#"<wsse:Security xmlns:wsse="{WSSE_NS}" SOAP-ENV:mustUnderstand="1"><wsse:UsernameToken>"#
        );
        let _ = write!(
            xml,
            "<wsse:Username>{}</wsse:Username>",
            escape(&self.username)
        );
        let _ = write!(
            xml,
            r#"<wsse:Password Type="{}">{}</wsse:Password>"#,
            self.mode.type_uri(),
            escape(&self.password)
        );
        if let Some(nonce) = &self.nonce {
            let _ = write!(
                xml,
                r#"<wsse:Nonce EncodingType="{BASE64_ENCODING_TYPE}">{nonce}</wsse:Nonce>"#
            );
        }
        if let Some(created) = &self.created {
            let _ = write!(
                xml,
                r#"<wsu:Created xmlns:wsu="{WSU_NS}">{created}</wsu:Created>"#
            );
        }
        xml.push_str("</wsse:UsernameToken></wsse:Security>");
        xml
    }
}

// ---------------------------------------------------------------------------
// Digest primitives
// ---------------------------------------------------------------------------

/// Packs a string of hex digits into bytes, high nibble first.
///
/// An odd-length input gets a trailing `0` nibble; non-hex characters count
/// as zero.
#[must_use]
pub fn hex_pack(digits: &str) -> Vec<u8> {
    let nibble = |b: u8| char::from(b).to_digit(16).map_or(0, |d| d as u8);
    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let high = nibble(pair[0]) << 4;
            let low = pair.get(1).map_or(0, |&b| nibble(b));
            high | low
        })
        .collect()
}

/// Nonce bytes for the legacy layout: the decimal form of `nonce`, hex-packed.
#[must_use]
pub fn legacy_nonce_bytes(nonce: u32) -> Vec<u8> {
    hex_pack(&nonce.to_string())
}

/// `base64(sha1(nonce ++ created ++ password))`.
#[must_use]
pub fn password_digest(nonce: &[u8], created: &str, password: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(nonce);
    hasher.update(created.as_bytes());
    hasher.update(password.as_bytes());
    STANDARD.encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// CredentialHeaderBuilder
// ---------------------------------------------------------------------------

/// Computes [`AuthHeader`]s. Holds no per-call state.
#[derive(Clone)]
pub struct CredentialHeaderBuilder {
    clock: Arc<dyn ClockSource>,
    nonce_encoding: NonceEncoding,
}

impl std::fmt::Debug for CredentialHeaderBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialHeaderBuilder")
            .field("nonce_encoding", &self.nonce_encoding)
            .finish_non_exhaustive()
    }
}

impl Default for CredentialHeaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialHeaderBuilder {
    /// Builder reading the system clock, legacy nonce layout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn ClockSource>) -> Self {
        Self {
            clock,
            nonce_encoding: NonceEncoding::default(),
        }
    }

    #[must_use]
    pub fn nonce_encoding(mut self, encoding: NonceEncoding) -> Self {
        self.nonce_encoding = encoding;
        self
    }

    /// Builds a header for `credentials` in the requested mode.
    #[must_use]
    pub fn build(&self, credentials: &Credentials, mode: PasswordMode) -> AuthHeader {
        match mode {
            PasswordMode::Digest => self.build_digest(
                &credentials.username,
                &credentials.password,
                credentials.clock_offset_seconds,
            ),
            PasswordMode::Text => self.build_text(&credentials.username, &credentials.password),
        }
    }

    /// `PasswordDigest` header with a fresh nonce and `Created` stamp.
    #[must_use]
    pub fn build_digest(
        &self,
        username: &str,
        password: &str,
        clock_offset_seconds: i64,
    ) -> AuthHeader {
        let created = format_created(adjusted_secs(self.clock.as_ref(), clock_offset_seconds));
        let nonce_bytes = self.fresh_nonce();
        AuthHeader {
            username: username.to_string(),
            password: password_digest(&nonce_bytes, &created, password),
            mode: PasswordMode::Digest,
            nonce: Some(STANDARD.encode(&nonce_bytes)),
            created: Some(created),
        }
    }

    /// `PasswordText` header: the password travels verbatim.
    #[must_use]
    pub fn build_text(&self, username: &str, password: &str) -> AuthHeader {
        AuthHeader {
            username: username.to_string(),
            password: password.to_string(),
            mode: PasswordMode::Text,
            nonce: None,
            created: None,
        }
    }

    fn fresh_nonce(&self) -> Vec<u8> {
        let mut rng = rand::rng();
        match self.nonce_encoding {
            NonceEncoding::LegacyDecimalHex => {
                legacy_nonce_bytes(rng.random_range(0..=LEGACY_NONCE_MAX))
            }
            NonceEncoding::RandomBytes => {
                let mut bytes = vec![0u8; RANDOM_NONCE_LEN];
                rng.fill(bytes.as_mut_slice());
                bytes
            }
        }
    }
}
