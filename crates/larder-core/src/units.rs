//! # Unit Codes
//!
//! Maps the free-text units kept in the back office ("kg", "Litres", "pcs")
//! onto the authority's unit vocabulary.
//!
//! ```text
//!   "Kg" ─────┐
//!   "kilos" ──┼──► QuantityUnit::Kilogram ──► "KG"
//!   "KG" ─────┘
//!
//!   "handful" ───► QuantityUnit::Piece ─────► "U"   (unknown → piece)
//! ```
//!
//! Unknown units never fail: incomplete master data must not block
//! registration, so anything unrecognised maps to the generic piece code.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// Quantity Unit
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum QuantityUnit {
    #[serde(rename = "KG")]
    Kilogram,
    #[serde(rename = "GRM")]
    Gram,
    #[serde(rename = "L")]
    Litre,
    #[serde(rename = "ML")]
    Millilitre,
    #[default]
    #[serde(rename = "U")]
    Piece,
    #[serde(rename = "DZ")]
    Dozen,
    #[serde(rename = "PR")]
    Pair,
    #[serde(rename = "MTR")]
    Metre,
}

impl QuantityUnit {
    /// Authority quantity-unit code.
    pub const fn code(&self) -> &'static str {
        match self {
            QuantityUnit::Kilogram => "KG",
            QuantityUnit::Gram => "GRM",
            QuantityUnit::Litre => "L",
            QuantityUnit::Millilitre => "ML",
            QuantityUnit::Piece => "U",
            QuantityUnit::Dozen => "DZ",
            QuantityUnit::Pair => "PR",
            QuantityUnit::Metre => "MTR",
        }
    }

    /// Total mapping from a back-office unit string.
    ///
    /// Case-insensitive, ignores surrounding whitespace, accepts common
    /// spellings and plurals. Anything else is [`QuantityUnit::Piece`].
    ///
    /// ## Example
    /// ```rust
    /// use larder_core::units::QuantityUnit;
    ///
    /// assert_eq!(QuantityUnit::from_unit("Kg"), QuantityUnit::Kilogram);
    /// assert_eq!(QuantityUnit::from_unit("litres"), QuantityUnit::Litre);
    /// assert_eq!(QuantityUnit::from_unit("handful"), QuantityUnit::Piece);
    /// ```
    pub fn from_unit(unit: &str) -> Self {
        match unit.trim().to_ascii_lowercase().as_str() {
            "kg" | "kgs" | "kilo" | "kilos" | "kilogram" | "kilograms" => QuantityUnit::Kilogram,
            "g" | "gr" | "grm" | "gram" | "grams" | "gramme" | "grammes" => QuantityUnit::Gram,
            "l" | "lt" | "ltr" | "litre" | "litres" | "liter" | "liters" => QuantityUnit::Litre,
            "ml" | "millilitre" | "millilitres" | "milliliter" | "milliliters" => {
                QuantityUnit::Millilitre
            }
            "dz" | "doz" | "dozen" | "dozens" => QuantityUnit::Dozen,
            "pr" | "pair" | "pairs" => QuantityUnit::Pair,
            "m" | "mtr" | "metre" | "metres" | "meter" | "meters" => QuantityUnit::Metre,
            _ => QuantityUnit::Piece,
        }
    }
}

// =============================================================================
// Packaging Unit
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum PackagingUnit {
    /// Sold loose, no packaging.
    #[default]
    #[serde(rename = "NT")]
    Unpacked,
    #[serde(rename = "BG")]
    Bag,
    #[serde(rename = "BX")]
    Box,
    #[serde(rename = "BT")]
    Bottle,
    #[serde(rename = "CA")]
    Can,
    #[serde(rename = "CT")]
    Carton,
}

impl PackagingUnit {
    pub const fn code(&self) -> &'static str {
        match self {
            PackagingUnit::Unpacked => "NT",
            PackagingUnit::Bag => "BG",
            PackagingUnit::Box => "BX",
            PackagingUnit::Bottle => "BT",
            PackagingUnit::Can => "CA",
            PackagingUnit::Carton => "CT",
        }
    }

    /// Total mapping; `None` or unknown text means unpacked.
    pub fn from_packaging(packaging: Option<&str>) -> Self {
        let Some(packaging) = packaging else {
            return PackagingUnit::Unpacked;
        };

        match packaging.trim().to_ascii_lowercase().as_str() {
            "bg" | "bag" | "bags" | "sack" => PackagingUnit::Bag,
            "bx" | "box" | "boxes" => PackagingUnit::Box,
            "bt" | "bottle" | "bottles" => PackagingUnit::Bottle,
            "ca" | "can" | "cans" | "tin" | "tins" => PackagingUnit::Can,
            "ct" | "carton" | "cartons" | "crate" => PackagingUnit::Carton,
            _ => PackagingUnit::Unpacked,
        }
    }
}

// =============================================================================
// Item Type
// =============================================================================

/// Authority item type (`itemTyCd`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ItemType {
    /// Ingredients bought in.
    #[serde(rename = "1")]
    RawMaterial,
    /// Recipes sold to customers.
    #[serde(rename = "2")]
    FinishedProduct,
    #[serde(rename = "3")]
    Service,
}

impl ItemType {
    pub const fn code(&self) -> &'static str {
        match self {
            ItemType::RawMaterial => "1",
            ItemType::FinishedProduct => "2",
            ItemType::Service => "3",
        }
    }
}
