use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// Marker every transit ciphertext starts with (`vault:v<version>:...`).
pub const CIPHERTEXT_PREFIX: &str = "vault:v";

/// Whether a stored value is transit ciphertext rather than legacy plaintext.
pub fn is_ciphertext(value: &str) -> bool {
    value.starts_with(CIPHERTEXT_PREFIX)
}

/// Database username/password pair issued by the gateway.
pub struct DatabaseCredential {
    pub username: String,
    password: SecretString,
}

impl DatabaseCredential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl Clone for DatabaseCredential {
    fn clone(&self) -> Self {
        Self::new(self.username.clone(), self.password())
    }
}

impl fmt::Debug for DatabaseCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseCredential")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
