//! # Identifiers
//!
//! Item codes, invoice numbers, stock movement numbers and the authority's
//! timestamp formats.
//!
//! ## Item Code Layout
//! ```text
//!   K E 1 N T K G 4 5 6 7 8 9 0 A 3 F 9
//!   └─┬─┘ │ └┬┘ └┬┘ └─────┬─────┘ └──┬──┘
//!  country│  pkg  qty   7 digits    4 hex chars
//!         │  unit unit  from epoch  from a v4 UUID
//!     item type         millis      (uppercase)
//! ```
//!
//! Invoice numbers are derived from the order, never minted, so resending
//! the same order reuses the same number. Stock movement numbers have no
//! business key; they are epoch millis made strictly increasing within the
//! process.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::units::{ItemType, PackagingUnit, QuantityUnit};

/// `yyyyMMddHHmmss`, used for confirmation and lookup timestamps.
pub const DATETIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// `yyyyMMdd`, used for sale, purchase and occurrence dates.
pub const DATE_FORMAT: &str = "%Y%m%d";

pub fn format_datetime(at: DateTime<Utc>) -> String {
    at.format(DATETIME_FORMAT).to_string()
}

pub fn format_date(at: DateTime<Utc>) -> String {
    at.format(DATE_FORMAT).to_string()
}

// =============================================================================
// Item Codes
// =============================================================================

/// Builds an item code from its parts.
///
/// `epoch_millis` contributes its last seven digits; `random_hex` its
/// first four characters, uppercased.
pub fn compose_item_code(
    country_code: &str,
    item_type: ItemType,
    packaging: PackagingUnit,
    unit: QuantityUnit,
    epoch_millis: i64,
    random_hex: &str,
) -> String {
    let timestamp_suffix = epoch_millis.rem_euclid(10_000_000);
    let random_suffix: String = random_hex
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .take(4)
        .collect::<String>()
        .to_ascii_uppercase();

    format!(
        "{}{}{}{}{:07}{}",
        country_code.to_ascii_uppercase(),
        item_type.code(),
        packaging.code(),
        unit.code(),
        timestamp_suffix,
        random_suffix
    )
}

/// Generates a fresh item code for `now`.
///
/// ## Example
/// ```rust
/// use chrono::Utc;
/// use larder_core::codes::{generate_item_code, is_item_code};
/// use larder_core::units::{ItemType, PackagingUnit, QuantityUnit};
///
/// let code = generate_item_code(
///     "KE",
///     ItemType::RawMaterial,
///     PackagingUnit::Unpacked,
///     QuantityUnit::Kilogram,
///     Utc::now(),
/// );
/// assert!(code.starts_with("KE1NTKG"));
/// assert!(is_item_code(&code));
/// ```
pub fn generate_item_code(
    country_code: &str,
    item_type: ItemType,
    packaging: PackagingUnit,
    unit: QuantityUnit,
    now: DateTime<Utc>,
) -> String {
    let random = Uuid::new_v4().simple().to_string();
    compose_item_code(
        country_code,
        item_type,
        packaging,
        unit,
        now.timestamp_millis(),
        &random,
    )
}

/// Checks the generated layout: two-letter country, item type digit, a
/// known packaging code, a known unit code, seven digits, four uppercase
/// hex characters.
pub fn is_item_code(code: &str) -> bool {
    const PACKAGING: [&str; 6] = ["NT", "BG", "BX", "BT", "CA", "CT"];
    const UNITS: [&str; 8] = ["KG", "GRM", "L", "ML", "U", "DZ", "PR", "MTR"];

    if code.len() < 2 + 1 + 2 + 1 + 7 + 4 || !code.is_ascii() {
        return false;
    }

    let (country, rest) = code.split_at(2);
    if !country.chars().all(|c| c.is_ascii_uppercase()) {
        return false;
    }

    let (item_type, rest) = rest.split_at(1);
    if !matches!(item_type, "1" | "2" | "3") {
        return false;
    }

    let (packaging, rest) = rest.split_at(2);
    if !PACKAGING.contains(&packaging) {
        return false;
    }

    let (unit, tail) = rest.split_at(rest.len() - 11);
    if !UNITS.contains(&unit) {
        return false;
    }

    let (digits, hex) = tail.split_at(7);
    digits.chars().all(|c| c.is_ascii_digit())
        && hex
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
}

// =============================================================================
// Invoice Numbers
// =============================================================================

/// The issued invoice number when there is one, else the order id.
///
/// Deterministic: the same order always yields the same number.
pub fn derive_invoice_number(issued: Option<&str>, order_id: i64) -> String {
    match issued.map(str::trim) {
        Some(number) if !number.is_empty() => number.to_string(),
        _ => order_id.to_string(),
    }
}

// =============================================================================
// Movement Numbers
// =============================================================================

/// Stock movement numbers: epoch millis, bumped so that every call returns a
/// number strictly greater than the previous one.
#[derive(Debug, Default)]
pub struct MovementNumbers {
    last: AtomicU64,
}

impl MovementNumbers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        self.next_at(Utc::now())
    }

    pub fn next_at(&self, now: DateTime<Utc>) -> u64 {
        let millis = now.timestamp_millis().max(0) as u64;
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(millis.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        millis.max(previous + 1)
    }
}
