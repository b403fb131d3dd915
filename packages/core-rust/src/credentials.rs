//! Caller credentials supplied once at dispatcher construction.

use std::fmt;

/// Username, password and clock skew used for every authenticated call.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Seconds added to the local clock when stamping `Created`.
    pub clock_offset_seconds: i64,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        clock_offset_seconds: i64,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            clock_offset_seconds,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("clock_offset_seconds", &self.clock_offset_seconds)
            .finish()
    }
}
