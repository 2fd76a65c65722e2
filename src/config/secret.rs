use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Placeholder printed wherever a secret value would otherwise appear.
pub const REDACTED: &str = "(sensitive)";

/// A configuration value that must never be printed, logged or persisted.
///
/// The backing buffer is wiped on drop. `Debug` and `Display` both render
/// the redaction placeholder; the plaintext is only reachable through
/// [`SecretString::expose`].
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the plaintext. Callers must not log or persist the result.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString({})", REDACTED)
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}
