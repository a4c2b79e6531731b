//! In-process gateway for tests
//!
//! Encryption is reversible base64 behind the `vault:v1:` marker, tokenization
//! rotates ASCII digits so tokens keep the input's shape. Neither is secure.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::{GatewayError, Result};
use crate::traits::SecretsGateway;
use crate::types::{DatabaseCredential, is_ciphertext};

const MEMORY_PREFIX: &str = "vault:v1:";

pub struct MemoryGateway {
    available: AtomicBool,
    calls: AtomicUsize,
    credential: DatabaseCredential,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
            credential: DatabaseCredential::new("custvault", "memory-password"),
        }
    }

    pub fn with_credential(mut self, credential: DatabaseCredential) -> Self {
        self.credential = credential;
        self
    }

    /// Simulate an outage: every remote call fails with `Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of calls that would have reached the network.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn remote(&self, operation: &'static str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(GatewayError::unavailable(operation, "request timed out"))
        }
    }

    fn check_role(operation: &'static str, role: &str) -> Result<()> {
        if role.is_empty() {
            return Err(GatewayError::Rejected {
                operation,
                status: 400,
                message: "missing role".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn rotate_digits(value: &str, by: u32) -> String {
    value
        .chars()
        .map(|c| match c.to_digit(10) {
            Some(d) => char::from_digit((d + by) % 10, 10).unwrap_or(c),
            None => c,
        })
        .collect()
}

#[async_trait]
impl SecretsGateway for MemoryGateway {
    async fn encrypt(&self, plaintext: &str) -> Result<String> {
        self.remote("encrypt")?;
        Ok(format!("{}{}", MEMORY_PREFIX, BASE64.encode(plaintext.as_bytes())))
    }

    async fn decrypt(&self, value: &str) -> Result<String> {
        if !is_ciphertext(value) {
            return Ok(value.to_string());
        }
        self.remote("decrypt")?;
        let encoded = value
            .strip_prefix(MEMORY_PREFIX)
            .ok_or_else(|| GatewayError::malformed("decrypt", "unknown key version"))?;
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| GatewayError::malformed("decrypt", e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| GatewayError::malformed("decrypt", e.to_string()))
    }

    async fn tokenize(&self, plaintext: &str, role: &str) -> Result<String> {
        self.remote("tokenize")?;
        Self::check_role("tokenize", role)?;
        Ok(rotate_digits(plaintext, 7))
    }

    async fn detokenize(&self, token: &str, role: &str) -> Result<String> {
        self.remote("detokenize")?;
        Self::check_role("detokenize", role)?;
        Ok(rotate_digits(token, 3))
    }

    async fn read_database_credential(&self, _path: &str) -> Result<DatabaseCredential> {
        self.remote("read_database_credential")?;
        Ok(self.credential.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tokens_keep_shape() {
        let gateway = MemoryGateway::new();
        let token = gateway.tokenize("360-56-6750", "ssn").await.unwrap();
        assert_eq!(token.len(), "360-56-6750".len());
        assert_ne!(token, "360-56-6750");
        assert_eq!(gateway.detokenize(&token, "ssn").await.unwrap(), "360-56-6750");
    }

    #[tokio::test]
    async fn test_outage() {
        let gateway = MemoryGateway::new();
        gateway.set_available(false);
        let err = gateway.encrypt("x").await.unwrap_err();
        assert!(err.is_unavailable());
        // legacy plaintext never reaches the network
        assert_eq!(gateway.decrypt("plain").await.unwrap(), "plain");
        assert_eq!(gateway.call_count(), 1);
    }
}
