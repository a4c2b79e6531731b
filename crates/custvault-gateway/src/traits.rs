//! Gateway trait

use async_trait::async_trait;

use crate::error::Result;
use crate::types::DatabaseCredential;

/// Remote protection capability offered by the secrets service.
///
/// Every method is a network round trip in the HTTP implementation. None of
/// them retry; callers decide what a failure means for their operation.
#[async_trait]
pub trait SecretsGateway: Send + Sync {
    /// Encrypt with the configured transit key. The result carries the
    /// `vault:v` marker.
    async fn encrypt(&self, plaintext: &str) -> Result<String>;

    /// Decrypt transit ciphertext. Values without the ciphertext marker are
    /// legacy plaintext and come back unchanged, without a remote call.
    async fn decrypt(&self, value: &str) -> Result<String>;

    /// Format-preserving encode through the transform role.
    async fn tokenize(&self, plaintext: &str, role: &str) -> Result<String>;

    /// Inverse of [`SecretsGateway::tokenize`].
    async fn detokenize(&self, token: &str, role: &str) -> Result<String>;

    /// Read a dynamic database credential from a secrets path.
    async fn read_database_credential(&self, path: &str) -> Result<DatabaseCredential>;
}
