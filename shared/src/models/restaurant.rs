//! Restaurant Model

use serde::{Deserialize, Serialize};

use super::VendorUser;

/// Restaurant owned by a vendor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    /// Owning vendor (`users.id`)
    pub vendor_id: String,
}

/// Vendor identity plus the restaurants it owns
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VendorProfile {
    pub user: VendorUser,
    pub restaurants: Vec<Restaurant>,
}

impl VendorProfile {
    /// The restaurant the storefront operates on (the first one returned)
    pub fn primary_restaurant(&self) -> Option<&Restaurant> {
        self.restaurants.first()
    }
}
