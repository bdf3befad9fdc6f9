//! # cartline-core: Pure Cart Logic for Cartline
//!
//! This crate is the **heart** of Cartline. It holds the cart aggregate and
//! its invariants as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cartline Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    UI observers                                 │   │
//! │  │    read snapshots ──► invoke add_item / remove_item / ...       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                cartline-sync (CartEngine)                       │   │
//! │  │    optimistic apply ──► FIFO dispatch ──► reconcile / rollback  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ cartline-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   money   │  │   types   │  │   cart    │  │ validation│  │   │
//! │  │   │   Money   │  │ CartItem  │  │   Cart    │  │   rules   │  │   │
//! │  │   │           │  │  AddOn    │  │  CartOp   │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • NO ASYNC • PURE FUNCTIONS               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`types`] - Items, add-ons, patches and remote read models
//! - [`cart`] - The cart aggregate and `CartOp`
//! - [`validation`] - Input rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use cartline_core::{AddOn, Cart, CartItem, Money};
//!
//! let cart = Cart::empty()
//!     .with_item_added(CartItem::new("a", "flight", Money::from_cents(100)))
//!     .unwrap();
//! let cart = cart
//!     .with_add_on_added("a", AddOn::new("x", Money::from_cents(20)))
//!     .unwrap();
//! assert_eq!(cart.total().cents(), 120);
//!
//! // Removing twice is the same as removing once.
//! let once = cart.with_item_removed("a");
//! assert_eq!(once.with_item_removed("a"), once);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartOp, OpKind};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum length of an item or add-on id.
///
/// Ids end up in URL path segments on the way to the backend.
pub const MAX_ID_LENGTH: usize = 128;

/// Largest price accepted for an item or add-on, in cents ($100 billion).
///
/// Keeps every realistic cart total far from the `i64` range.
pub const MAX_PRICE_CENTS: i64 = 10_000_000_000_000;
