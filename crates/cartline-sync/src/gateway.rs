//! # Cart Gateway
//!
//! The seam between the engine and the backend that owns the cart.
//!
//! ```text
//! ┌──────────────┐   add_item(item)      ┌──────────────────────┐
//! │  CartEngine  │ ────────────────────► │  dyn CartGateway     │
//! │  (worker)    │ ◄──────────────────── │  HttpCartGateway     │
//! └──────────────┘   Ok(Cart) / Err(..)  │  (or a test double)  │
//!                                        └──────────────────────┘
//! ```
//!
//! Every mutating call answers with the server's full cart, which the engine
//! treats as the new confirmed state. The engine calls the gateway from one
//! task, one request at a time.

use async_trait::async_trait;

use cartline_core::{AddOn, AvailableAddOn, Cart, CartItem, CartSummary, CartValidation, ItemPatch};

use crate::error::SyncResult;

// =============================================================================
// Gateway Trait
// =============================================================================

/// Remote cart operations.
#[async_trait]
pub trait CartGateway: Send + Sync {
    /// Fetches the server's current cart.
    async fn get_cart(&self) -> SyncResult<Cart>;

    async fn add_item(&self, item: CartItem) -> SyncResult<Cart>;

    async fn update_item(&self, item_id: &str, patch: &ItemPatch) -> SyncResult<Cart>;

    async fn remove_item(&self, item_id: &str) -> SyncResult<Cart>;

    async fn add_add_on(&self, item_id: &str, add_on: &AddOn) -> SyncResult<Cart>;

    async fn remove_add_on(&self, item_id: &str, add_on_id: &str) -> SyncResult<Cart>;

    /// Empties the server's cart. The backend answers without a body.
    async fn clear_cart(&self) -> SyncResult<()>;

    /// Asks the backend whether the cart can proceed to checkout.
    async fn validate_cart(&self) -> SyncResult<CartValidation>;

    /// Totals including taxes and fees, as priced by the backend.
    async fn get_cart_summary(&self) -> SyncResult<CartSummary>;

    /// Add-ons the backend offers for an item.
    async fn get_available_add_ons(
        &self,
        item_type: &str,
        item_id: &str,
    ) -> SyncResult<Vec<AvailableAddOn>>;
}
