//! Secrets gateway client for custvault
//!
//! This crate provides:
//! - The `SecretsGateway` trait (encrypt, decrypt, tokenize, detokenize)
//! - A Vault-compatible HTTP implementation (transit + transform engines)
//! - Authentication strategies (static token, federated identity)
//! - An in-memory gateway for tests (`memory` feature)

pub mod auth;
pub mod error;
pub mod traits;
pub mod types;
pub mod vault;

#[cfg(feature = "memory")]
pub mod memory;

pub use auth::{AuthMethod, FederatedIdentity};
pub use error::{GatewayError, Result};
pub use traits::SecretsGateway;
pub use types::{CIPHERTEXT_PREFIX, DatabaseCredential, is_ciphertext};
pub use vault::{GatewaySession, VaultGateway, VaultSettings};

#[cfg(feature = "memory")]
pub use memory::MemoryGateway;
