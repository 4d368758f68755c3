use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque secret key material for a ledger account
///
/// Never printed: `Debug` is redacted so records can be logged safely.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyMaterial(String);

impl KeyMaterial {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial(<redacted>)")
    }
}

/// One pool entry
///
/// `public_id` and `display_name` may be missing in persisted data and are
/// filled in by `PoolManager::load_or_generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    #[serde(default)]
    pub public_id: String,
    pub key_material: KeyMaterial,
    #[serde(default)]
    pub display_name: String,
}

impl AccountRecord {
    pub fn new(public_id: impl Into<String>, key_material: KeyMaterial, display_name: impl Into<String>) -> Self {
        Self {
            public_id: public_id.into(),
            key_material,
            display_name: display_name.into(),
        }
    }
}

/// Account used to top up pool accounts
#[derive(Debug, Clone, PartialEq)]
pub struct TreasurySource {
    pub public_id: String,
    pub key_material: KeyMaterial,
}

/// Reference account whose balance decline triggers the emergency stop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkAccount {
    pub public_id: String,
}

/// Network acknowledgement of a confirmed transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub signature: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_material_is_redacted() {
        let record = AccountRecord::new("abc", KeyMaterial::new("super-secret"), "wallet-0");
        let debug = format!("{:?}", record);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_record_deserializes_without_optional_fields() {
        let json = r#"{"keyMaterial":"k1"}"#;
        let record: AccountRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.public_id, "");
        assert_eq!(record.display_name, "");
        assert_eq!(record.key_material.expose(), "k1");
    }
}
