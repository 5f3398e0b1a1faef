//! # Tax Classes
//!
//! The authority sorts every taxable amount into one of five classes.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Tax Classes A-E                                   │
//! │                                                                         │
//! │   Code   Class          Rate                                            │
//! │   ────   ────────────   ──────────────────────────────                  │
//! │    A     Exempt         0%                                              │
//! │    B     Standard       default_rate_bps (16% unless configured)        │
//! │    C     Zero-rated     0%                                              │
//! │    D     Non-VAT        0%                                              │
//! │    E     Reduced        reduced_rate_bps (8% unless configured)         │
//! │                                                                         │
//! │   Line ──► TaxBuckets::add(class, taxable, tax)                         │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │          TaxBuckets::summarize(rates) ──► TaxSummary (wire fields)      │
//! │            taxblAmtA..E, taxRtA..E, taxAmtA..E,                         │
//! │            totTaxblAmt, totTaxAmt, totAmt                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A line with no explicit class lands in B.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::{self, Money};

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1600 bps = 16% (standard VAT)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (wire format and display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

/// Serde adapter writing a [`TaxRate`] as a percentage number (`16.0`).
pub mod percent {
    use super::TaxRate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &TaxRate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(value.percentage())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<TaxRate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pct = f64::deserialize(deserializer)?;
        Ok(TaxRate::from_bps((pct * 100.0).round() as u32))
    }
}

// =============================================================================
// Tax Type
// =============================================================================

/// The authority's tax class for an item or line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum TaxType {
    /// A: exempt.
    #[serde(rename = "A")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "A"))]
    Exempt,
    /// B: standard rate.
    #[default]
    #[serde(rename = "B")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "B"))]
    Standard,
    /// C: zero-rated.
    #[serde(rename = "C")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "C"))]
    ZeroRated,
    /// D: outside the VAT system.
    #[serde(rename = "D")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "D"))]
    NonVat,
    /// E: reduced rate.
    #[serde(rename = "E")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "E"))]
    Reduced,
}

impl TaxType {
    /// All classes in bucket order.
    pub const ALL: [TaxType; 5] = [
        TaxType::Exempt,
        TaxType::Standard,
        TaxType::ZeroRated,
        TaxType::NonVat,
        TaxType::Reduced,
    ];

    /// Single-letter authority code.
    pub const fn code(&self) -> &'static str {
        match self {
            TaxType::Exempt => "A",
            TaxType::Standard => "B",
            TaxType::ZeroRated => "C",
            TaxType::NonVat => "D",
            TaxType::Reduced => "E",
        }
    }

    /// Parses an authority code, case-insensitive.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "A" => Some(TaxType::Exempt),
            "B" => Some(TaxType::Standard),
            "C" => Some(TaxType::ZeroRated),
            "D" => Some(TaxType::NonVat),
            "E" => Some(TaxType::Reduced),
            _ => None,
        }
    }

    const fn index(&self) -> usize {
        match self {
            TaxType::Exempt => 0,
            TaxType::Standard => 1,
            TaxType::ZeroRated => 2,
            TaxType::NonVat => 3,
            TaxType::Reduced => 4,
        }
    }
}

impl fmt::Display for TaxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// =============================================================================
// Tax Rates
// =============================================================================

/// The configurable rates. Classes A, C and D are always 0%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRates {
    pub standard: TaxRate,
    pub reduced: TaxRate,
}

impl TaxRates {
    pub const fn new(standard: TaxRate, reduced: TaxRate) -> Self {
        TaxRates { standard, reduced }
    }

    /// Rate applied to the given class.
    pub const fn rate_for(&self, tax_type: TaxType) -> TaxRate {
        match tax_type {
            TaxType::Standard => self.standard,
            TaxType::Reduced => self.reduced,
            TaxType::Exempt | TaxType::ZeroRated | TaxType::NonVat => TaxRate::zero(),
        }
    }
}

impl Default for TaxRates {
    fn default() -> Self {
        TaxRates::new(TaxRate::from_bps(1600), TaxRate::from_bps(800))
    }
}

// =============================================================================
// Buckets
// =============================================================================

/// Running per-class totals while a transaction is being assembled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaxBuckets {
    taxable: [Money; 5],
    tax: [Money; 5],
}

impl TaxBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one line's taxable and tax amounts to its class.
    pub fn add(&mut self, tax_type: TaxType, taxable: Money, tax: Money) {
        let i = tax_type.index();
        self.taxable[i] += taxable;
        self.tax[i] += tax;
    }

    pub fn taxable(&self, tax_type: TaxType) -> Money {
        self.taxable[tax_type.index()]
    }

    pub fn tax(&self, tax_type: TaxType) -> Money {
        self.tax[tax_type.index()]
    }

    /// Freezes the buckets into the wire summary. Totals are always derived
    /// from the buckets, so a summary built here satisfies the totals rules.
    pub fn summarize(&self, rates: &TaxRates) -> TaxSummary {
        let tot_taxbl_amt: Money = self.taxable.iter().sum();
        let tot_tax_amt: Money = self.tax.iter().sum();

        TaxSummary {
            taxbl_amt_a: self.taxable[0],
            taxbl_amt_b: self.taxable[1],
            taxbl_amt_c: self.taxable[2],
            taxbl_amt_d: self.taxable[3],
            taxbl_amt_e: self.taxable[4],
            tax_rt_a: rates.rate_for(TaxType::Exempt),
            tax_rt_b: rates.rate_for(TaxType::Standard),
            tax_rt_c: rates.rate_for(TaxType::ZeroRated),
            tax_rt_d: rates.rate_for(TaxType::NonVat),
            tax_rt_e: rates.rate_for(TaxType::Reduced),
            tax_amt_a: self.tax[0],
            tax_amt_b: self.tax[1],
            tax_amt_c: self.tax[2],
            tax_amt_d: self.tax[3],
            tax_amt_e: self.tax[4],
            tot_taxbl_amt,
            tot_tax_amt,
            tot_amt: tot_taxbl_amt + tot_tax_amt,
        }
    }
}

// =============================================================================
// Wire Summary
// =============================================================================

/// The per-class and grand-total block shared by sale, purchase and stock
/// envelopes. Flattened into each payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxSummary {
    #[serde(with = "money::decimal")]
    pub taxbl_amt_a: Money,
    #[serde(with = "money::decimal")]
    pub taxbl_amt_b: Money,
    #[serde(with = "money::decimal")]
    pub taxbl_amt_c: Money,
    #[serde(with = "money::decimal")]
    pub taxbl_amt_d: Money,
    #[serde(with = "money::decimal")]
    pub taxbl_amt_e: Money,

    #[serde(with = "percent")]
    pub tax_rt_a: TaxRate,
    #[serde(with = "percent")]
    pub tax_rt_b: TaxRate,
    #[serde(with = "percent")]
    pub tax_rt_c: TaxRate,
    #[serde(with = "percent")]
    pub tax_rt_d: TaxRate,
    #[serde(with = "percent")]
    pub tax_rt_e: TaxRate,

    #[serde(with = "money::decimal")]
    pub tax_amt_a: Money,
    #[serde(with = "money::decimal")]
    pub tax_amt_b: Money,
    #[serde(with = "money::decimal")]
    pub tax_amt_c: Money,
    #[serde(with = "money::decimal")]
    pub tax_amt_d: Money,
    #[serde(with = "money::decimal")]
    pub tax_amt_e: Money,

    #[serde(with = "money::decimal")]
    pub tot_taxbl_amt: Money,
    #[serde(with = "money::decimal")]
    pub tot_tax_amt: Money,
    #[serde(with = "money::decimal")]
    pub tot_amt: Money,
}

impl TaxSummary {
    /// Taxable amounts in A-E order.
    pub fn taxable_by_class(&self) -> [Money; 5] {
        [
            self.taxbl_amt_a,
            self.taxbl_amt_b,
            self.taxbl_amt_c,
            self.taxbl_amt_d,
            self.taxbl_amt_e,
        ]
    }

    /// Tax amounts in A-E order.
    pub fn tax_by_class(&self) -> [Money; 5] {
        [
            self.tax_amt_a,
            self.tax_amt_b,
            self.tax_amt_c,
            self.tax_amt_d,
            self.tax_amt_e,
        ]
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
