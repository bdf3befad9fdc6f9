//! # Money Module
//!
//! Provides the `Money` type used for every price and total in the cart.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  INCREMENTAL TOTALS MUST NOT DRIFT                                      │
//! │                                                                         │
//! │  The cart keeps totalAmount up to date by adding and subtracting        │
//! │  deltas on every edit. With floats:                                     │
//! │    0.1 + 0.2 - 0.2 = 0.10000000000000003  ❌                            │
//! │                                                                         │
//! │  With integer cents:                                                    │
//! │    10 + 20 - 20 = 10                      ✅                            │
//! │                                                                         │
//! │  So the incremental path and the full recompute always agree exactly.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use cartline_core::money::Money;
//!
//! let fare = Money::from_cents(12_500); // $125.00
//! let seat = Money::from_cents(1_999);  // $19.99
//!
//! let total = fare + seat;
//! assert_eq!(total.cents(), 14_499);
//! assert_eq!(total.to_string(), "$144.99");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: deltas subtracted from a total may be negative
/// - **Transparent on the wire**: serializes as a bare integer
///
/// ## Where Money is Used
/// ```text
/// AddOn.price ──┐
///               ├──► Cart.total_amount (kept incrementally)
/// CartItem.price┘
///
/// CartSummary.{subtotal, taxes, fees, total} (server-computed, read only)
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use cartline_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units (dollars and cents).
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -$5.50.
    ///
    /// Meant for literals. Overflows like integer arithmetic when `major`
    /// is beyond ±92 quadrillion; use [`Money::checked_from_major_minor`]
    /// for untrusted input.
    ///
    /// ```rust
    /// use cartline_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
    /// assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Like [`Money::from_major_minor`], returning `None` if the amount does
    /// not fit in cents.
    ///
    /// ```rust
    /// use cartline_core::money::Money;
    ///
    /// assert_eq!(Money::checked_from_major_minor(10, 99), Some(Money::from_cents(1099)));
    /// assert_eq!(Money::checked_from_major_minor(i64::MAX / 10, 0), None);
    /// ```
    #[inline]
    pub const fn checked_from_major_minor(major: i64, minor: i64) -> Option<Self> {
        let Some(scaled) = major.checked_mul(100) else {
            return None;
        };
        let cents = if major < 0 {
            scaled.checked_sub(minor)
        } else {
            scaled.checked_add(minor)
        };
        match cents {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (dollars) portion, truncated toward zero.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Zero money.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Adds two amounts, returning `None` on overflow.
    ///
    /// ```rust
    /// use cartline_core::money::Money;
    ///
    /// assert!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)).is_none());
    /// ```
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Subtracts `other`, returning `None` on overflow.
    #[inline]
    pub const fn checked_sub(&self, other: Money) -> Option<Money> {
        match self.0.checked_sub(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Sums amounts, returning `None` as soon as the running total overflows.
    ///
    /// The cart aggregate sums with this; the `Sum` impl overflows like
    /// plain integer addition.
    ///
    /// ```rust
    /// use cartline_core::money::Money;
    ///
    /// let prices = [Money::from_cents(100), Money::from_cents(20)];
    /// assert_eq!(Money::checked_sum(prices), Some(Money::from_cents(120)));
    /// assert_eq!(Money::checked_sum([Money::from_cents(i64::MAX), Money::from_cents(1)]), None);
    /// ```
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |total, amount| total.checked_add(amount))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-friendly dollar formatting. The UI owns localized display.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.major().abs(), self.minor_part())
    }
}

// Operators follow i64 overflow rules. Amounts that may come from outside
// go through the checked_* methods instead.

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
