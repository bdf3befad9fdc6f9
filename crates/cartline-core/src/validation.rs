//! # Validation Module
//!
//! Input rules checked before an item or add-on enters the cart.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: UI observer                                                   │
//! │  └── Immediate feedback on obviously bad input                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Cart aggregate (THIS MODULE)                                  │
//! │  ├── ids present and bounded                                            │
//! │  ├── prices non-negative and bounded                                    │
//! │  └── add-on ids unique within an item                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Backend (validate_cart, pricing rules)                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use cartline_core::validation::{validate_id, validate_price};
//! use cartline_core::Money;
//!
//! validate_id("item id", "flight-1").unwrap();
//! validate_price("price", Money::from_cents(0)).unwrap();
//! assert!(validate_price("price", Money::from_cents(-1)).is_err());
//! ```

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{AddOn, CartItem};
use crate::{MAX_ID_LENGTH, MAX_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates an identifier.
///
/// ## Rules
/// - Must not be empty or whitespace only
/// - At most `MAX_ID_LENGTH` characters
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if id.chars().count() > MAX_ID_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_ID_LENGTH,
        });
    }

    Ok(())
}

/// Validates a price. Zero is allowed (complimentary add-ons).
///
/// ## Rules
/// - Not negative
/// - At most `MAX_PRICE_CENTS`
pub fn validate_price(field: &str, price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    if price.cents() > MAX_PRICE_CENTS {
        return Err(ValidationError::TooLarge {
            field: field.to_string(),
            max: Money::from_cents(MAX_PRICE_CENTS),
        });
    }

    Ok(())
}

/// Validates an add-on before it is attached.
pub fn validate_add_on(add_on: &AddOn) -> ValidationResult<()> {
    validate_id("add-on id", &add_on.id)?;
    validate_price("add-on price", add_on.price)
}

/// Validates an item, including any add-ons it arrives with.
///
/// ```rust
/// use cartline_core::validation::validate_item;
/// use cartline_core::{AddOn, CartItem, Money};
///
/// let item = CartItem::new("a", "flight", Money::from_cents(100))
///     .with_add_on(AddOn::new("x", Money::from_cents(20)))
///     .with_add_on(AddOn::new("x", Money::from_cents(20)));
/// assert!(validate_item(&item).is_err());
/// ```
pub fn validate_item(item: &CartItem) -> ValidationResult<()> {
    validate_id("item id", &item.id)?;
    validate_price("item price", item.price)?;

    let mut seen = HashSet::with_capacity(item.add_ons.len());
    for add_on in &item.add_ons {
        validate_add_on(add_on)?;
        if !seen.insert(add_on.id.as_str()) {
            return Err(ValidationError::Duplicate {
                field: "add-on id".to_string(),
                value: add_on.id.clone(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
