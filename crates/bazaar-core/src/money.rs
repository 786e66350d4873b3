//! # Money Module
//!
//! Provides the `Money` type for handling rupee amounts safely.
//!
//! ## Why Integer Paise?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    1180 / 1.18 = 999.9999999999999  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Paise + Decimal Derivation                       │
//! │    Store:   118000 paise                                                │
//! │    Derive:  Decimal(1180.00) / Decimal(1.18) = 1000 (exact)             │
//! │    Round:   half away from zero, back to 100000 paise                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bazaar_core::money::Money;
//!
//! // Create from paise (preferred)
//! let price = Money::from_paise(109_900); // ₹1099.00
//!
//! // Arithmetic operations
//! let doubled = price * 2;
//! let total = price + Money::from_paise(15_000);
//! assert_eq!(doubled.paise(), 219_800);
//! assert_eq!(total.paise(), 124_900);
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// Represents a rupee amount in paise (1 rupee = 100 paise).
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative intermediate values (discount deltas)
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Serde**: serialized as a number of rupees with two decimals, which is
///   what the HTTP contract exposes (`{"finalPrice": 1180.0}`)
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.base_price ──► resolve_size_price ──► compute_breakdown        │
/// │                                                    │                    │
/// │                     OrderItem GST snapshot ◄───────┘                    │
/// │                                                                         │
/// │  Line totals ──► subtotal + GST + shipping ──► Order.grand_total        │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from paise (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use bazaar_core::money::Money;
    ///
    /// let price = Money::from_paise(1099); // Represents ₹10.99
    /// assert_eq!(price.paise(), 1099);
    /// ```
    #[inline]
    pub const fn from_paise(paise: i64) -> Self {
        Money(paise)
    }

    /// Creates a Money value from whole rupees.
    #[inline]
    pub const fn from_rupees(rupees: i64) -> Self {
        Money(rupees * 100)
    }

    /// Creates a Money value from a decimal rupee amount.
    ///
    /// The amount is rounded to 2 decimal places, half away from zero.
    /// Returns `None` when the value does not fit in an `i64` of paise.
    ///
    /// ## Example
    /// ```rust
    /// use bazaar_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// // 84.745 → 84.75 (half away from zero)
    /// let m = Money::from_decimal(Decimal::new(84_745, 3)).unwrap();
    /// assert_eq!(m.paise(), 8475);
    ///
    /// // -0.005 → -0.01
    /// let m = Money::from_decimal(Decimal::new(-5, 3)).unwrap();
    /// assert_eq!(m.paise(), -1);
    /// ```
    pub fn from_decimal(amount: Decimal) -> Option<Self> {
        round_currency(amount)
            .checked_mul(Decimal::from(100))?
            .trunc()
            .to_i64()
            .map(Money)
    }

    /// Returns the amount as an exact decimal number of rupees.
    #[inline]
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// Returns the value in paise (smallest currency unit).
    #[inline]
    pub const fn paise(&self) -> i64 {
        self.0
    }

    /// Returns the whole-rupee portion.
    #[inline]
    pub const fn rupees(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the paise portion (always 0-99).
    #[inline]
    pub const fn paise_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a line quantity.
    ///
    /// ## Example
    /// ```rust
    /// use bazaar_core::money::Money;
    ///
    /// let unit_price = Money::from_paise(29_900); // ₹299.00
    /// let line_total = unit_price.multiply_quantity(3);
    /// assert_eq!(line_total.paise(), 89_700);
    /// ```
    ///
    /// Saturates at the `i64` bounds; unit prices are capped well below
    /// the point where a full cart could reach them.
    #[inline]
    pub const fn multiply_quantity(&self, qty: u32) -> Self {
        Money(self.0.saturating_mul(qty as i64))
    }

    /// Sum that reports overflow instead of wrapping.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(paise) => Some(Money(paise)),
            None => None,
        }
    }

    /// Line amount that reports overflow instead of saturating.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: u32) -> Option<Self> {
        match self.0.checked_mul(qty as i64) {
            Some(paise) => Some(Money(paise)),
            None => None,
        }
    }
}

/// Rounds a rupee amount to 2 decimal places, half away from zero.
///
/// Every monetary figure leaving the price engine passes through here.
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows the amount with the rupee sign, e.g. `₹1180.00`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}₹{}.{:02}",
            sign,
            self.rupees().abs(),
            self.paise_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let rupees = self.to_decimal().to_f64().unwrap_or_default();
        serializer.serialize_f64(rupees)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = <Decimal as Deserialize>::deserialize(deserializer)?;
        Money::from_decimal(amount)
            .ok_or_else(|| serde::de::Error::custom("amount out of range"))
    }
}

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

/// Multiplication by integer (for quantity calculations).
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
