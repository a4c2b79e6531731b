//! Field codec: the single crossing point between plaintext customer fields
//! and their stored form.

use custvault_gateway::SecretsGateway;
use std::sync::Arc;
use tracing::debug;

use crate::customer::{CustomerFields, StoredFields};
use crate::error::Result;
use crate::policy::{ProtectionMode, ProtectionPolicy};

pub struct FieldCodec {
    gateway: Option<Arc<dyn SecretsGateway>>,
    policy: ProtectionPolicy,
}

impl FieldCodec {
    pub fn new(gateway: Arc<dyn SecretsGateway>, policy: ProtectionPolicy) -> Self {
        Self {
            gateway: Some(gateway),
            policy,
        }
    }

    /// No gateway configured: both directions are the identity.
    pub fn unprotected() -> Self {
        Self {
            gateway: None,
            policy: ProtectionPolicy::default(),
        }
    }

    pub fn is_protected(&self) -> bool {
        self.gateway.is_some()
    }

    pub fn policy(&self) -> &ProtectionPolicy {
        &self.policy
    }

    /// Protect every configured field. Any gateway failure fails the whole
    /// record; nothing partially protected is returned.
    pub async fn protect(&self, mut fields: CustomerFields) -> Result<StoredFields> {
        let Some(gateway) = &self.gateway else {
            return Ok(StoredFields::new(fields));
        };

        for (field, mode) in self.policy.protected_fields() {
            let value = fields.get_mut(field);
            *value = match mode {
                ProtectionMode::Encrypted => gateway.encrypt(value).await?,
                ProtectionMode::Tokenized => {
                    gateway
                        .tokenize(value, self.policy.tokenization_role())
                        .await?
                }
                ProtectionMode::Plain => continue,
            };
            debug!(field = field.column(), ?mode, "Protected field");
        }

        Ok(StoredFields::new(fields))
    }

    /// Reverse [`FieldCodec::protect`]. Encrypted columns holding legacy
    /// plaintext come back unchanged.
    pub async fn unprotect(&self, stored: StoredFields) -> Result<CustomerFields> {
        let mut fields = stored.into_raw();
        let Some(gateway) = &self.gateway else {
            return Ok(fields);
        };

        for (field, mode) in self.policy.protected_fields() {
            let value = fields.get_mut(field);
            *value = match mode {
                ProtectionMode::Encrypted => gateway.decrypt(value).await?,
                ProtectionMode::Tokenized => {
                    gateway
                        .detokenize(value, self.policy.tokenization_role())
                        .await?
                }
                ProtectionMode::Plain => continue,
            };
        }

        Ok(fields)
    }
}
