//! # Domain Types
//!
//! Value types that make up a cart, plus the remote read models the engine
//! relays without interpreting.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    CartItem     │   │     AddOn       │   │   ItemPatch     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │◄──│  id             │   │  price?         │       │
//! │  │  item_type      │   │  price          │   │  attributes     │       │
//! │  │  price          │   └─────────────────┘   └─────────────────┘       │
//! │  │  attributes     │                                                    │
//! │  │  add_ons[]      │   Remote read models (never derived locally):      │
//! │  └─────────────────┘   CartSummary, CartValidation, AvailableAddOn      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! All types serialize with camelCase field names, matching the backend's
//! JSON payloads (`itemType`, `addOns`, `totalAmount`, `itemCount`).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::money::Money;

/// Updatable attributes of an item (quantity, travel date, class, ...).
pub type Attributes = BTreeMap<String, Value>;

// =============================================================================
// Add-On
// =============================================================================

/// An extra attached to a cart item (seat selection, insurance, breakfast).
///
/// Immutable once attached; identity is `id` within its item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AddOn {
    pub id: String,
    pub price: Money,
}

impl AddOn {
    pub fn new(id: impl Into<String>, price: Money) -> Self {
        AddOn {
            id: id.into(),
            price,
        }
    }
}

// =============================================================================
// Cart Item
// =============================================================================

/// A line item in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Unique within a cart.
    pub id: String,

    /// Catalogue kind ("flight", "hotel", ...). Used to look up add-ons.
    #[serde(default)]
    pub item_type: String,

    /// Base price, excluding add-ons.
    pub price: Money,

    /// Attributes that may be patched in place without changing `id`.
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub attributes: Attributes,

    /// Attached add-ons, in insertion order.
    #[serde(default)]
    pub add_ons: Vec<AddOn>,
}

impl CartItem {
    /// Creates an item with no attributes and no add-ons.
    pub fn new(id: impl Into<String>, item_type: impl Into<String>, price: Money) -> Self {
        CartItem {
            id: id.into(),
            item_type: item_type.into(),
            price,
            attributes: Attributes::new(),
            add_ons: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Builder-style add-on attachment (no duplicate check, see validation).
    pub fn with_add_on(mut self, add_on: AddOn) -> Self {
        self.add_ons.push(add_on);
        self
    }

    /// Sum of the add-on prices, `None` if it overflows.
    pub fn add_ons_total(&self) -> Option<Money> {
        Money::checked_sum(self.add_ons.iter().map(|a| a.price))
    }

    /// Everything this item contributes to the cart total:
    /// base price plus all of its add-ons. `None` if it overflows.
    pub fn contribution(&self) -> Option<Money> {
        self.add_ons_total()?.checked_add(self.price)
    }

    pub fn add_on(&self, add_on_id: &str) -> Option<&AddOn> {
        self.add_ons.iter().find(|a| a.id == add_on_id)
    }

    pub fn has_add_on(&self, add_on_id: &str) -> bool {
        self.add_on(add_on_id).is_some()
    }
}

// =============================================================================
// Item Patch
// =============================================================================

/// Partial update for a cart item.
///
/// ## Semantics
/// - `price: Some(p)` replaces the base price (the cart total moves by the delta)
/// - each attribute key overwrites; a JSON `null` removes the key
/// - an empty patch changes nothing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub price: Option<Money>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    #[ts(type = "Record<string, unknown>")]
    pub attributes: Attributes,
}

impl ItemPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn price(mut self, price: Money) -> Self {
        self.price = Some(price);
        self
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn unset(mut self, key: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), Value::Null);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.price.is_none() && self.attributes.is_empty()
    }

    /// Applies the patch to an item in place.
    pub(crate) fn apply_to(&self, item: &mut CartItem) {
        if let Some(price) = self.price {
            item.price = price;
        }
        for (key, value) in &self.attributes {
            if value.is_null() {
                item.attributes.remove(key);
            } else {
                item.attributes.insert(key.clone(), value.clone());
            }
        }
    }
}

// =============================================================================
// Remote Read Models
// =============================================================================

/// An add-on the backend offers for a given item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AvailableAddOn {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Money,
}

impl AvailableAddOn {
    /// The attachable form of this offer.
    pub fn into_add_on(self) -> AddOn {
        AddOn::new(self.id, self.price)
    }
}

/// Server-computed cart summary.
///
/// ## Not the same as `Cart::total()`
/// `total` here includes taxes and fees; the local aggregate's total does not.
/// The two are never reconciled against each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub item_count: u32,
    pub subtotal: Money,
    pub taxes: Money,
    pub fees: Money,
    pub total: Money,
    pub currency: String,
}

/// Result of the backend's cart validation. Relayed as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartValidation {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_contribution_includes_add_ons() {
        let item = CartItem::new("flight-1", "flight", Money::from_cents(10_000))
            .with_add_on(AddOn::new("seat", Money::from_cents(2_000)))
            .with_add_on(AddOn::new("bag", Money::from_cents(3_500)));

        assert_eq!(item.add_ons_total(), Some(Money::from_cents(5_500)));
        assert_eq!(item.contribution(), Some(Money::from_cents(15_500)));
        assert!(item.has_add_on("bag"));
        assert!(!item.has_add_on("meal"));
    }

    #[test]
    fn test_item_contribution_out_of_range() {
        let item = CartItem::new("a", "flight", Money::from_cents(i64::MAX))
            .with_add_on(AddOn::new("x", Money::from_cents(1)));
        assert_eq!(item.add_ons_total(), Some(Money::from_cents(1)));
        assert_eq!(item.contribution(), None);
    }

    #[test]
    fn test_patch_sets_and_removes_attributes() {
        let mut item = CartItem::new("hotel-1", "hotel", Money::from_cents(8_000))
            .with_attribute("nights", 2)
            .with_attribute("breakfast", true);

        let patch = ItemPatch::new()
            .set("nights", 3)
            .unset("breakfast")
            .price(Money::from_cents(12_000));
        patch.apply_to(&mut item);

        assert_eq!(item.attributes.get("nights"), Some(&json!(3)));
        assert!(!item.attributes.contains_key("breakfast"));
        assert_eq!(item.price.cents(), 12_000);
    }

    #[test]
    fn test_cart_item_wire_format() {
        let item = CartItem::new("a", "flight", Money::from_cents(100))
            .with_attribute("class", "economy")
            .with_add_on(AddOn::new("x", Money::from_cents(20)));

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "a",
                "itemType": "flight",
                "price": 100,
                "attributes": { "class": "economy" },
                "addOns": [{ "id": "x", "price": 20 }]
            })
        );
    }

    #[test]
    fn test_cart_item_tolerates_missing_optional_fields() {
        let item: CartItem = serde_json::from_value(json!({ "id": "a", "price": 100 })).unwrap();
        assert!(item.item_type.is_empty());
        assert!(item.add_ons.is_empty());
        assert!(item.attributes.is_empty());
    }

    #[test]
    fn test_empty_patch_serializes_to_empty_object() {
        let patch = ItemPatch::new();
        assert!(patch.is_empty());
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({}));
    }

    #[test]
    fn test_summary_wire_format() {
        let summary: CartSummary = serde_json::from_value(json!({
            "itemCount": 2,
            "subtotal": 12000,
            "taxes": 960,
            "fees": 300,
            "total": 13260,
            "currency": "USD"
        }))
        .unwrap();
        assert_eq!(summary.item_count, 2);
        assert_eq!(summary.total.cents(), 13_260);
    }

    #[test]
    fn test_available_add_on_into_add_on() {
        let offer = AvailableAddOn {
            id: "lounge".into(),
            name: "Lounge access".into(),
            description: None,
            price: Money::from_cents(4_500),
        };
        assert_eq!(
            offer.into_add_on(),
            AddOn::new("lounge", Money::from_cents(4_500))
        );
    }
}
