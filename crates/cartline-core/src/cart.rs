//! # Cart Aggregate
//!
//! The local replica of the server-owned cart, and the only place its
//! invariants are enforced.
//!
//! ## Invariants
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Total:  total_amount == Σ item.price + Σ item.add_ons[*].price         │
//! │      Kept incrementally (± delta per edit); recomputed_total() is the   │
//! │      full recompute used to heal after reconciliation.                  │
//! │                                                                         │
//! │  Nesting: every add-on lives inside exactly one item. Removing an item  │
//! │      removes its add-ons with it; there is no orphan add-on list.       │
//! │                                                                         │
//! │  Item ids are unique within a cart; add-on ids within an item.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Pure Transformations
//! Every `with_*` method borrows the cart and returns a new one. Nothing is
//! mutated in place, so the engine can keep the previous cart as a rollback
//! snapshot for free and no caller ever observes a half-applied edit.
//!
//! ```rust
//! use cartline_core::{AddOn, Cart, CartItem, Money};
//!
//! let cart = Cart::empty()
//!     .with_item_added(CartItem::new("a", "flight", Money::from_cents(100)))
//!     .unwrap()
//!     .with_add_on_added("a", AddOn::new("x", Money::from_cents(20)))
//!     .unwrap();
//!
//! assert_eq!(cart.total().cents(), 120);
//! assert_eq!(cart.item_count(), 1);
//! assert!(cart.is_consistent());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{AddOn, CartItem, ItemPatch};
use crate::validation::{validate_add_on, validate_item, validate_price};

// =============================================================================
// Cart
// =============================================================================

/// The cart aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(default)]
    items: Vec<CartItem>,
    #[serde(default)]
    total_amount: Money,
}

impl Cart {
    /// An empty cart with a zero total.
    pub fn empty() -> Self {
        Cart::default()
    }

    /// Builds a cart from items, deriving the total.
    ///
    /// Items are validated and must have unique ids.
    pub fn from_items(items: impl IntoIterator<Item = CartItem>) -> CoreResult<Self> {
        items
            .into_iter()
            .try_fold(Cart::empty(), |cart, item| cart.with_item_added(item))
    }

    // =========================================================================
    // Read Accessors
    // =========================================================================

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn item(&self, item_id: &str) -> Option<&CartItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.item(item_id).is_some()
    }

    /// Number of line items (add-ons are not counted).
    #[inline]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// The cached total. Excludes taxes and fees.
    #[inline]
    pub fn total(&self) -> Money {
        self.total_amount
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The total as derived from scratch, without touching the cache.
    /// `None` if the items sum beyond the range of `Money`.
    pub fn derived_total(&self) -> Option<Money> {
        self.items.iter().try_fold(Money::zero(), |total, item| {
            total.checked_add(item.contribution()?)
        })
    }

    /// True when the cached total matches the items.
    pub fn is_consistent(&self) -> bool {
        self.derived_total() == Some(self.total_amount)
    }

    // =========================================================================
    // Item Transformations
    // =========================================================================

    /// Appends an item and raises the total by its full contribution.
    ///
    /// ## Errors
    /// - `DuplicateItem` if an item with the same id is present
    /// - `Validation` if the item (or one of its add-ons) is malformed
    /// - `TotalOverflow` if the new total would not fit
    pub fn with_item_added(&self, item: CartItem) -> CoreResult<Cart> {
        validate_item(&item)?;
        if self.contains(&item.id) {
            return Err(CoreError::DuplicateItem(item.id));
        }
        let total_amount = item
            .contribution()
            .and_then(|c| self.total_amount.checked_add(c))
            .ok_or(CoreError::TotalOverflow)?;

        let mut next = self.clone();
        next.total_amount = total_amount;
        next.items.push(item);
        Ok(next)
    }

    /// Removes an item together with its add-ons.
    ///
    /// Removing an absent id returns an identical cart: removal is idempotent.
    pub fn with_item_removed(&self, item_id: &str) -> Cart {
        let Some(pos) = self.position(item_id) else {
            return self.clone();
        };

        let mut next = self.clone();
        let removed = next.items.remove(pos);
        next.total_amount = self.reduced_total(&next, removed.contribution());
        next
    }

    /// Applies a partial patch to an item. The total only moves when the
    /// patch carries a new price.
    pub fn with_item_updated(&self, item_id: &str, patch: &ItemPatch) -> CoreResult<Cart> {
        if let Some(price) = patch.price {
            validate_price("item price", price)?;
        }
        let pos = self
            .position(item_id)
            .ok_or_else(|| CoreError::ItemNotFound(item_id.to_string()))?;

        let mut next = self.clone();
        let item = &mut next.items[pos];
        let old_price = item.price;
        patch.apply_to(item);
        let new_price = item.price;
        if new_price != old_price {
            next.total_amount = self
                .total_amount
                .checked_sub(old_price)
                .and_then(|t| t.checked_add(new_price))
                .ok_or(CoreError::TotalOverflow)?;
        }
        Ok(next)
    }

    // =========================================================================
    // Add-On Transformations
    // =========================================================================

    /// Attaches an add-on to an item, raising the total by its price.
    ///
    /// ## Errors
    /// - `ItemNotFound` if the item is absent
    /// - `DuplicateAddOn` if the item already carries an add-on with this id
    /// - `TotalOverflow` if the new total would not fit
    pub fn with_add_on_added(&self, item_id: &str, add_on: AddOn) -> CoreResult<Cart> {
        validate_add_on(&add_on)?;
        let pos = self
            .position(item_id)
            .ok_or_else(|| CoreError::ItemNotFound(item_id.to_string()))?;
        if self.items[pos].has_add_on(&add_on.id) {
            return Err(CoreError::DuplicateAddOn {
                item_id: item_id.to_string(),
                add_on_id: add_on.id,
            });
        }

        let total_amount = self
            .total_amount
            .checked_add(add_on.price)
            .ok_or(CoreError::TotalOverflow)?;

        let mut next = self.clone();
        next.total_amount = total_amount;
        next.items[pos].add_ons.push(add_on);
        Ok(next)
    }

    /// Detaches an add-on. A missing item or add-on leaves the cart as is.
    pub fn with_add_on_removed(&self, item_id: &str, add_on_id: &str) -> Cart {
        let Some(pos) = self.position(item_id) else {
            return self.clone();
        };
        let Some(add_on_pos) = self.items[pos].add_ons.iter().position(|a| a.id == add_on_id)
        else {
            return self.clone();
        };

        let mut next = self.clone();
        let removed = next.items[pos].add_ons.remove(add_on_pos);
        next.total_amount = self.reduced_total(&next, Some(removed.price));
        next
    }

    // =========================================================================
    // Whole-Cart Transformations
    // =========================================================================

    /// Same items, total recomputed from scratch.
    ///
    /// Fails with `TotalOverflow` when the items cannot be totalled, which
    /// only happens to carts deserialized with out-of-range prices.
    pub fn recomputed_total(&self) -> CoreResult<Cart> {
        let total_amount = self.derived_total().ok_or(CoreError::TotalOverflow)?;
        Ok(Cart {
            items: self.items.clone(),
            total_amount,
        })
    }

    /// An empty cart.
    pub fn cleared(&self) -> Cart {
        Cart::empty()
    }

    /// Total of `next` after taking `removed` out of this cart.
    ///
    /// Subtraction cannot fail on a consistent cart; a deserialized cart with
    /// an out-of-range total falls back to recomputing, then to leaving the
    /// total alone.
    fn reduced_total(&self, next: &Cart, removed: Option<Money>) -> Money {
        removed
            .and_then(|amount| self.total_amount.checked_sub(amount))
            .or_else(|| next.derived_total())
            .unwrap_or(self.total_amount)
    }

    fn position(&self, item_id: &str) -> Option<usize> {
        self.items.iter().position(|i| i.id == item_id)
    }
}

// =============================================================================
// Cart Operations
// =============================================================================

/// Kind of operation, for logs and observer snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    AddItem,
    UpdateItem,
    RemoveItem,
    AddAddOn,
    RemoveAddOn,
    Clear,
    /// Replace the local cart with the server's (session start / refresh).
    Hydrate,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OpKind::AddItem => "add_item",
            OpKind::UpdateItem => "update_item",
            OpKind::RemoveItem => "remove_item",
            OpKind::AddAddOn => "add_add_on",
            OpKind::RemoveAddOn => "remove_add_on",
            OpKind::Clear => "clear",
            OpKind::Hydrate => "hydrate",
        };
        f.write_str(name)
    }
}

/// A cart mutation as data.
///
/// The engine applies it once optimistically and may re-apply it on a new
/// base cart while it is still pending.
#[derive(Debug, Clone, PartialEq)]
pub enum CartOp {
    AddItem(CartItem),
    UpdateItem { item_id: String, patch: ItemPatch },
    RemoveItem { item_id: String },
    AddAddOn { item_id: String, add_on: AddOn },
    RemoveAddOn { item_id: String, add_on_id: String },
    Clear,
}

impl CartOp {
    pub fn kind(&self) -> OpKind {
        match self {
            CartOp::AddItem(_) => OpKind::AddItem,
            CartOp::UpdateItem { .. } => OpKind::UpdateItem,
            CartOp::RemoveItem { .. } => OpKind::RemoveItem,
            CartOp::AddAddOn { .. } => OpKind::AddAddOn,
            CartOp::RemoveAddOn { .. } => OpKind::RemoveAddOn,
            CartOp::Clear => OpKind::Clear,
        }
    }

    /// The item this operation targets, if any.
    pub fn item_id(&self) -> Option<&str> {
        match self {
            CartOp::AddItem(item) => Some(&item.id),
            CartOp::UpdateItem { item_id, .. }
            | CartOp::RemoveItem { item_id }
            | CartOp::AddAddOn { item_id, .. }
            | CartOp::RemoveAddOn { item_id, .. } => Some(item_id),
            CartOp::Clear => None,
        }
    }

    /// Applies the operation to `cart`, returning the resulting cart.
    pub fn apply(&self, cart: &Cart) -> CoreResult<Cart> {
        match self {
            CartOp::AddItem(item) => cart.with_item_added(item.clone()),
            CartOp::UpdateItem { item_id, patch } => cart.with_item_updated(item_id, patch),
            CartOp::RemoveItem { item_id } => Ok(cart.with_item_removed(item_id)),
            CartOp::AddAddOn { item_id, add_on } => cart.with_add_on_added(item_id, add_on.clone()),
            CartOp::RemoveAddOn { item_id, add_on_id } => {
                Ok(cart.with_add_on_removed(item_id, add_on_id))
            }
            CartOp::Clear => Ok(cart.cleared()),
        }
    }

    /// True for removals whose target is not in `cart`.
    pub fn is_noop_on(&self, cart: &Cart) -> bool {
        match self {
            CartOp::RemoveItem { item_id } => !cart.contains(item_id),
            CartOp::RemoveAddOn { item_id, add_on_id } => !cart
                .item(item_id)
                .is_some_and(|item| item.has_add_on(add_on_id)),
            _ => false,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
