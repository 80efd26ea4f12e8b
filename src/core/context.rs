//! Mutable per-session context carried by every machine instance.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role of an authenticated account.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Gamer,
    Seller,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gamer => "gamer",
            Self::Seller => "seller",
        }
    }

    /// Parse the wire form (`"gamer"` / `"seller"`).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "gamer" => Some(Self::Gamer),
            "seller" => Some(Self::Seller),
            _ => None,
        }
    }
}

/// Seller details attached to a seller account.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerProfile {
    pub company_name: String,
    pub contact_phone: String,
    pub address: String,
    #[serde(default)]
    pub games_listed: u32,
}

/// Identity established by the auth service and stored in the context.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller_profile: Option<SellerProfile>,
}

impl UserIdentity {
    pub fn is_seller(&self) -> bool {
        self.role == Role::Seller
    }
}

/// Context blob of a machine instance.
///
/// `user` and `error_message` are the well-known fields; anything else a
/// handler wants to remember lives in `data`.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub user: Option<UserIdentity>,
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// Store an arbitrary field, returning the previous value.
    pub fn set(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.data.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.data.remove(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity(role: Role) -> UserIdentity {
        UserIdentity {
            id: 7,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            role,
            seller_profile: None,
        }
    }

    #[test]
    fn new_context_is_anonymous() {
        let ctx = SessionContext::new();
        assert!(!ctx.is_signed_in());
        assert!(ctx.error_message.is_none());
    }

    #[test]
    fn context_serializes_with_null_user() {
        let json = serde_json::to_value(SessionContext::new()).unwrap();
        assert_eq!(json, json!({ "user": null, "errorMessage": null }));
    }

    #[test]
    fn arbitrary_fields_round_trip() {
        let mut ctx = SessionContext::new();
        assert!(ctx.set("promo", json!("SPRING")).is_none());
        assert_eq!(ctx.get("promo"), Some(&json!("SPRING")));
        assert_eq!(ctx.remove("promo"), Some(json!("SPRING")));
        assert!(ctx.get("promo").is_none());
    }

    #[test]
    fn role_wire_names() {
        assert_eq!(Role::parse("seller"), Some(Role::Seller));
        assert_eq!(Role::parse("admin"), None);
        assert_eq!(Role::Gamer.as_str(), "gamer");
        assert!(identity(Role::Seller).is_seller());
        assert!(!identity(Role::Gamer).is_seller());
    }
}
