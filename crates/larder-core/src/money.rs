//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  The authority re-adds every bucket we send:                            │
//! │    taxblAmtA + ... + taxblAmtE  must equal  totTaxblAmt                 │
//! │                                                                         │
//! │  With floats:  1.60 + 0.48 = 2.0800000000000001  → rejected            │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    160 + 48 = 208 cents, always                                         │
//! │    Converted to a two-decimal number only when serialized to the wire  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use larder_core::money::Money;
//!
//! let price = Money::from_cents(500); // 5.00
//! let line = price.multiply_quantity(2);
//! assert_eq!(line.cents(), 1000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::tax::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// `Serialize` writes the raw cent count; wire payloads use [`decimal`]
/// instead, which writes a two-decimal number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use larder_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit should be negative:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
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

    /// Checks if the value is negative.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the value as a two-decimal number for the wire format.
    ///
    /// Only ever used at the serialization boundary.
    pub fn to_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Parses a wire amount back into cents, rounding to the nearest cent.
    ///
    /// Only ever used when replaying a stored payload.
    pub fn from_decimal(value: f64) -> Self {
        Money((value * 100.0).round() as i64)
    }

    /// Calculates tax at the given rate.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`, i.e. half-up rounding
    /// to the cent.
    ///
    /// ## Example
    /// ```rust
    /// use larder_core::money::Money;
    /// use larder_core::tax::TaxRate;
    ///
    /// let supply = Money::from_cents(1000);
    /// let tax = supply.calculate_tax(TaxRate::from_bps(1600));
    /// assert_eq!(tax.cents(), 160);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        // i128 so large invoices cannot overflow; half-cents round away
        // from zero on both sides
        let product = self.0 as i128 * rate.bps() as i128;
        let tax_cents = (product.abs() + 5000) / 10000 * product.signum();
        Money::from_cents(tax_cents as i64)
    }

    /// Multiplies money by an integer quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Multiplies money by a fractional quantity (0.5 kg, 1.25 l).
    ///
    /// Rounds half away from zero to the nearest cent.
    ///
    /// ## Example
    /// ```rust
    /// use larder_core::money::Money;
    ///
    /// let per_kg = Money::from_cents(250);
    /// assert_eq!(per_kg.multiply_fractional(1.5).cents(), 375);
    /// ```
    pub fn multiply_fractional(&self, qty: f64) -> Self {
        Money((self.0 as f64 * qty).round() as i64)
    }

    /// Splits this amount into `parts` shares that sum back exactly.
    ///
    /// The remainder cents go one each to the earliest shares.
    ///
    /// ## Example
    /// ```rust
    /// use larder_core::money::Money;
    ///
    /// let shares = Money::from_cents(1000).split_evenly(3);
    /// let cents: Vec<i64> = shares.iter().map(|m| m.cents()).collect();
    /// assert_eq!(cents, vec![334, 333, 333]);
    /// ```
    pub fn split_evenly(&self, parts: usize) -> Vec<Money> {
        if parts == 0 {
            return Vec::new();
        }

        let n = parts as i64;
        let base = self.0 / n;
        let remainder = self.0 % n;
        let step = remainder.signum();

        (0..n)
            .map(|i| {
                if i < remainder.abs() {
                    Money(base + step)
                } else {
                    Money(base)
                }
            })
            .collect()
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows the amount with two decimals and no currency symbol; the currency
/// code lives in the fiscal configuration.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
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

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Wire Serialization
// =============================================================================

/// Serde adapter writing `Money` as a two-decimal JSON number.
///
/// ```rust,ignore
/// #[serde(with = "crate::money::decimal")]
/// pub tot_amt: Money,
/// ```
pub mod decimal {
    use super::Money;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Money, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(value.to_decimal())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Money, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Ok(Money::from_decimal(value))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1508).to_string(), "15.08");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_tax_at_standard_rate() {
        // 10.00 at 16% = 1.60, 3.00 at 16% = 0.48
        let rate = TaxRate::from_bps(1600);
        assert_eq!(Money::from_cents(1000).calculate_tax(rate).cents(), 160);
        assert_eq!(Money::from_cents(300).calculate_tax(rate).cents(), 48);
    }

    #[test]
    fn test_tax_rounds_half_up() {
        // 10.00 at 8.25% = 0.825 → 0.83
        let tax = Money::from_cents(1000).calculate_tax(TaxRate::from_bps(825));
        assert_eq!(tax.cents(), 83);
    }

    #[test]
    fn test_tax_on_negative_amount_mirrors_positive() {
        let rate = TaxRate::from_bps(825);
        assert_eq!(Money::from_cents(-1000).calculate_tax(rate).cents(), -83);
        assert_eq!(Money::from_cents(-300).calculate_tax(TaxRate::from_bps(1600)).cents(), -48);
    }

    #[test]
    fn test_multiply_fractional() {
        assert_eq!(Money::from_cents(250).multiply_fractional(2.0).cents(), 500);
        assert_eq!(Money::from_cents(333).multiply_fractional(0.5).cents(), 167);
        assert_eq!(Money::from_cents(100).multiply_fractional(0.0).cents(), 0);
    }

    #[test]
    fn test_split_evenly_is_exact() {
        let shares = Money::from_cents(4000).split_evenly(4);
        assert!(shares.iter().all(|s| s.cents() == 1000));

        let shares = Money::from_cents(1001).split_evenly(4);
        assert_eq!(shares.iter().sum::<Money>().cents(), 1001);
        assert_eq!(shares[0].cents(), 251);
        assert_eq!(shares[3].cents(), 250);

        assert!(Money::from_cents(100).split_evenly(0).is_empty());
    }

    #[test]
    fn test_split_negative_amount() {
        let shares = Money::from_cents(-10).split_evenly(3);
        assert_eq!(shares.iter().sum::<Money>().cents(), -10);
    }

    #[test]
    fn test_decimal_wire_format() {
        #[derive(Serialize, Deserialize)]
        struct Line {
            #[serde(with = "decimal")]
            amount: Money,
        }

        let json = serde_json::to_string(&Line {
            amount: Money::from_cents(1508),
        })
        .unwrap();
        assert_eq!(json, r#"{"amount":15.08}"#);

        let back: Line = serde_json::from_str(r#"{"amount":2.08}"#).unwrap();
        assert_eq!(back.amount.cents(), 208);
    }

    #[test]
    fn test_sum() {
        let total: Money = [Money::from_cents(1), Money::from_cents(2)].iter().sum();
        assert_eq!(total.cents(), 3);
    }
}
