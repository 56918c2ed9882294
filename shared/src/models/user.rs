//! Vendor / User Model

use serde::{Deserialize, Serialize};

/// Account type stored in `users.user_type_id`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Vendor,
    Customer,
    Rider,
    Admin,
    #[serde(other)]
    Unknown,
}

/// Identity record from the `users` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VendorUser {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "user_type_id")]
    pub user_type: UserType,
}

impl VendorUser {
    /// Whether this account may use the storefront
    pub fn is_vendor(&self) -> bool {
        self.user_type == UserType::Vendor
    }
}

/// Minimal contact fields embedded into orders (customer and rider)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSummary {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_type_column_name() {
        let user: VendorUser = serde_json::from_value(serde_json::json!({
            "id": "u1",
            "name": "Ana",
            "email": "ana@test.com",
            "user_type_id": "vendor"
        }))
        .unwrap();
        assert!(user.is_vendor());
        assert_eq!(user.phone, None);
    }

    #[test]
    fn test_unknown_user_type_is_not_vendor() {
        let user: VendorUser = serde_json::from_value(serde_json::json!({
            "id": "u2",
            "user_type_id": "restaurant_staff"
        }))
        .unwrap();
        assert_eq!(user.user_type, UserType::Unknown);
        assert!(!user.is_vendor());
    }
}
