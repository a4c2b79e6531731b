//! Field protection policy

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::customer::Field;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionMode {
    /// Stored as given
    Plain,
    /// Transit encryption, stored as `vault:v<n>:...`
    Encrypted,
    /// Format-preserving transform through the tokenization role
    Tokenized,
}

/// Which protection applies to each field. Fixed at startup, the same for
/// every record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionPolicy {
    modes: BTreeMap<Field, ProtectionMode>,
    tokenization_role: String,
}

impl Default for ProtectionPolicy {
    fn default() -> Self {
        let modes = BTreeMap::from([
            (Field::BirthDate, ProtectionMode::Encrypted),
            (Field::FirstName, ProtectionMode::Plain),
            (Field::LastName, ProtectionMode::Plain),
            (Field::SocialSecurityNumber, ProtectionMode::Tokenized),
            (Field::Address, ProtectionMode::Encrypted),
            (Field::Salary, ProtectionMode::Encrypted),
        ]);
        Self {
            modes,
            tokenization_role: "ssn".to_string(),
        }
    }
}

impl ProtectionPolicy {
    pub fn mode(&self, field: Field) -> ProtectionMode {
        self.modes
            .get(&field)
            .copied()
            .unwrap_or(ProtectionMode::Plain)
    }

    pub fn with_mode(mut self, field: Field, mode: ProtectionMode) -> Self {
        self.modes.insert(field, mode);
        self
    }

    pub fn with_tokenization_role(mut self, role: impl Into<String>) -> Self {
        self.tokenization_role = role.into();
        self
    }

    pub fn tokenization_role(&self) -> &str {
        &self.tokenization_role
    }

    /// Fields that need the gateway, in column order.
    pub fn protected_fields(&self) -> impl Iterator<Item = (Field, ProtectionMode)> + '_ {
        Field::ALL
            .into_iter()
            .map(|f| (f, self.mode(f)))
            .filter(|(_, mode)| *mode != ProtectionMode::Plain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = ProtectionPolicy::default();
        assert_eq!(policy.mode(Field::FirstName), ProtectionMode::Plain);
        assert_eq!(policy.mode(Field::LastName), ProtectionMode::Plain);
        assert_eq!(
            policy.mode(Field::SocialSecurityNumber),
            ProtectionMode::Tokenized
        );
        assert_eq!(policy.mode(Field::Address), ProtectionMode::Encrypted);
        assert_eq!(policy.mode(Field::Salary), ProtectionMode::Encrypted);
        assert_eq!(policy.tokenization_role(), "ssn");
    }

    #[test]
    fn test_protected_fields() {
        let policy = ProtectionPolicy::default().with_mode(Field::BirthDate, ProtectionMode::Plain);
        let fields: Vec<Field> = policy.protected_fields().map(|(f, _)| f).collect();
        assert_eq!(
            fields,
            vec![Field::SocialSecurityNumber, Field::Address, Field::Salary]
        );
    }

    #[test]
    fn test_mode_deserialization() {
        let mode: ProtectionMode = serde_json::from_str("\"tokenized\"").unwrap();
        assert_eq!(mode, ProtectionMode::Tokenized);
    }
}
