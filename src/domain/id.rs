//! Domain ID Types with NewType Pattern
//!
//! Type-safe wrappers for entity identifiers so a secret id can never be passed
//! where a tenant id is expected. Each ID type implements Display, FromStr,
//! Debug, Serialize, Deserialize and the SQLx traits for SQLite columns.

use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::{Decode, Encode, Sqlite, Type};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Macro to generate NewType ID wrappers with all required traits
macro_rules! domain_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from a UUID
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Create an ID from an existing string (for database retrieval)
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Get the inner string value
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Convert to inner string value
            pub fn into_string(self) -> String {
                self.0
            }

            /// Parse and validate a UUID string
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s)?;
                Ok(Self(s.to_string()))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        // SQLx trait implementations for database compatibility
        impl Type<Sqlite> for $name {
            fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
                <String as Type<Sqlite>>::type_info()
            }

            fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
                <String as Type<Sqlite>>::compatible(ty)
            }
        }

        impl<'q> Encode<'q, Sqlite> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
            ) -> Result<IsNull, BoxDynError> {
                <String as Encode<'q, Sqlite>>::encode_by_ref(&self.0, buf)
            }
        }

        impl<'r> Decode<'r, Sqlite> for $name {
            fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
                let s = <String as Decode<'r, Sqlite>>::decode(value)?;
                Ok(Self(s))
            }
        }
    };
}

domain_id!(
    /// Unique identifier for a tenant
    TenantId
);

domain_id!(
    /// Unique identifier for a secret
    SecretId
);

domain_id!(
    /// Unique identifier for the encrypted payload of a secret
    EncryptedDatumId
);

domain_id!(
    /// Unique identifier for a tenant/secret association
    TenantSecretId
);

domain_id!(
    /// Unique identifier for a secret order
    OrderId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_id_creation() {
        let id = SecretId::new();
        assert!(!id.as_str().is_empty());
        assert!(Uuid::parse_str(id.as_str()).is_ok());
    }

    #[test]
    fn tenant_id_from_str() {
        let uuid_str = Uuid::new_v4().to_string();
        let id: TenantId = uuid_str.parse().expect("Failed to parse UUID");
        assert_eq!(id.as_str(), uuid_str);
        assert_eq!(id.to_string(), uuid_str);
    }

    #[test]
    fn order_id_invalid_uuid_fails() {
        assert!(OrderId::parse("not-a-uuid").is_err());
        // Unchecked conversion keeps caller-supplied ids verbatim
        assert_eq!(OrderId::from("not-a-uuid").as_str(), "not-a-uuid");
    }

    #[test]
    fn encrypted_datum_id_serializes_transparently() {
        let id = EncryptedDatumId::from_string("abc".to_string());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
        let back: EncryptedDatumId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(back, id);
    }
}
