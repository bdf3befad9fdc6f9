//! # Error Types
//!
//! Domain-specific error types for cartline-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  cartline-core errors (this file)                                      │
//! │  ├── CoreError        - Aggregate contract violations                  │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  cartline-sync errors (separate crate)                                 │
//! │  └── SyncError        - Gateway failures + wrapped CoreError           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError → UI observer           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Local errors are never retried
//! A `CoreError` means the caller asked for something the cart cannot do
//! (duplicate id, unknown item, malformed input). It is raised before any
//! optimistic state is shown and before any network call is made.

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Cart aggregate errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// An item with this id is already in the cart.
    #[error("Item already in cart: {0}")]
    DuplicateItem(String),

    /// No item with this id is in the cart.
    ///
    /// ## When This Occurs
    /// - Updating an item that was removed by an earlier edit
    /// - Attaching an add-on to an item that is not in the cart
    #[error("Item not found in cart: {0}")]
    ItemNotFound(String),

    /// The add-on is already attached to this item.
    #[error("Add-on {add_on_id} already attached to item {item_id}")]
    DuplicateAddOn { item_id: String, add_on_id: String },

    /// The cart total would not fit in a `Money`.
    #[error("Cart total out of range")]
    TotalOverflow,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Checked before an item or add-on enters the cart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Monetary value below zero.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Monetary value above the accepted maximum.
    #[error("{field} must be at most {max}")]
    TooLarge { field: String, max: Money },

    /// Duplicate value inside one payload (e.g., two add-ons with one id).
    #[error("{field} '{value}' appears more than once")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::DuplicateAddOn {
            item_id: "flight-1".to_string(),
            add_on_id: "seat-12A".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Add-on seat-12A already attached to item flight-1"
        );
        assert_eq!(
            CoreError::ItemNotFound("hotel-9".into()).to_string(),
            "Item not found in cart: hotel-9"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "item id".to_string(),
        };
        assert_eq!(err.to_string(), "item id is required");

        let err = ValidationError::MustNotBeNegative {
            field: "price".to_string(),
        };
        assert_eq!(err.to_string(), "price must not be negative");

        let err = ValidationError::TooLarge {
            field: "price".to_string(),
            max: Money::from_cents(100_000),
        };
        assert_eq!(err.to_string(), "price must be at most $1000.00");

        assert_eq!(CoreError::TotalOverflow.to_string(), "Cart total out of range");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "item id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
