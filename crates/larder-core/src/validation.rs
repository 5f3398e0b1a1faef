//! # Validation Module
//!
//! Local checks run on every payload before it leaves the process.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Where Errors Are Caught                            │
//! │                                                                         │
//! │  Layer 1: Builders (builder.rs)                                         │
//! │  ├── Missing item codes on lines / components                           │
//! │  └── Totals derived from buckets, never typed in                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  ├── Required item fields                                               │
//! │  ├── Σ taxblAmt[A..E] = totTaxblAmt, Σ taxAmt[A..E] = totTaxAmt         │
//! │  ├── totAmt = totTaxblAmt + totTaxAmt                                   │
//! │  └── every line: totAmt = taxblAmt + taxAmt, lines sum to the totals    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Authority                                                     │
//! │  └── Business rules we cannot see (resultCd != "000")                   │
//! │                                                                         │
//! │  An arithmetic mismatch must never reach layer 3.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Replayed ledger payloads pass through here again, so a hand-edited
//! `items_data` cannot slip past.

use crate::error::ValidationError;
use crate::money::Money;
use crate::payload::{CompositionPayload, FiscalPayload, ItemPayload, TransactionLine};
use crate::tax::TaxSummary;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Field Validators
// =============================================================================

/// Fails when `value` is empty after trimming.
pub fn require(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a tax rate in basis points.
///
/// ## Rules
/// - Must be between 0 and 10000 (0% to 100%)
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

fn require_positive_quantity(field: &str, qty: f64) -> ValidationResult<()> {
    if !qty.is_finite() || qty <= 0.0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn require_non_negative(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

fn require_equal(field: &str, expected: Money, actual: Money) -> ValidationResult<()> {
    if expected != actual {
        return Err(ValidationError::TotalsMismatch {
            field: field.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

// =============================================================================
// Item Validators
// =============================================================================

/// Required fields of an item registration.
///
/// ## Example
/// ```rust,ignore
/// validate_item(&payload)?; // Err(Required { field: "itemClsCd" }) when blank
/// ```
pub fn validate_item(item: &ItemPayload) -> ValidationResult<()> {
    require("itemCd", &item.item_cd)?;
    require("itemClsCd", &item.item_cls_cd)?;
    require("itemNm", &item.item_nm)?;
    require("orgnNatCd", &item.orgn_nat_cd)?;
    require_non_negative("dftPrc", item.dft_prc)?;
    Ok(())
}

pub fn validate_composition(composition: &CompositionPayload) -> ValidationResult<()> {
    require("itemCd", &composition.item_cd)?;
    require("cpstItemCd", &composition.cpst_item_cd)?;
    require_positive_quantity("cpstQty", composition.cpst_qty)?;
    Ok(())
}

// =============================================================================
// Transaction Validators
// =============================================================================

/// Checks the totals rules of a sale, purchase or stock envelope.
///
/// ## Rules
/// - at least one line, each with an item code and a positive quantity
/// - no line with a negative taxable or tax amount
/// - each line: `totAmt = taxblAmt + taxAmt`
/// - `totTaxblAmt = Σ taxblAmt[A..E]`, `totTaxAmt = Σ taxAmt[A..E]`
/// - `totAmt = totTaxblAmt + totTaxAmt`
/// - Σ line taxable and tax amounts equal the totals
pub fn validate_transaction(
    totals: &TaxSummary,
    lines: &[TransactionLine],
) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "itemList".to_string(),
        });
    }

    for line in lines {
        require(&format!("itemList[{}].itemCd", line.item_seq), &line.item_cd)?;
        require_positive_quantity(&format!("itemList[{}].qty", line.item_seq), line.qty)?;
        require_non_negative(&format!("itemList[{}].taxblAmt", line.item_seq), line.taxbl_amt)?;
        require_non_negative(&format!("itemList[{}].taxAmt", line.item_seq), line.tax_amt)?;
        require_equal(
            &format!("itemList[{}].totAmt", line.item_seq),
            line.taxbl_amt + line.tax_amt,
            line.tot_amt,
        )?;
    }

    let bucket_taxable: Money = totals.taxable_by_class().iter().sum();
    let bucket_tax: Money = totals.tax_by_class().iter().sum();
    require_equal("totTaxblAmt", bucket_taxable, totals.tot_taxbl_amt)?;
    require_equal("totTaxAmt", bucket_tax, totals.tot_tax_amt)?;
    require_equal(
        "totAmt",
        totals.tot_taxbl_amt + totals.tot_tax_amt,
        totals.tot_amt,
    )?;

    let line_taxable: Money = lines.iter().map(|l| l.taxbl_amt).sum();
    let line_tax: Money = lines.iter().map(|l| l.tax_amt).sum();
    require_equal("Σ itemList.taxblAmt", totals.tot_taxbl_amt, line_taxable)?;
    require_equal("Σ itemList.taxAmt", totals.tot_tax_amt, line_tax)?;

    Ok(())
}

/// Runs the checks that apply to the payload's operation.
pub fn validate_payload(payload: &FiscalPayload) -> ValidationResult<()> {
    match payload {
        FiscalPayload::Item(item) => validate_item(item),
        FiscalPayload::Composition(composition) => validate_composition(composition),
        FiscalPayload::Sale(sale) => {
            require("invcNo", &sale.invc_no)?;
            validate_transaction(&sale.totals, &sale.item_list)
        }
        FiscalPayload::Purchase(purchase) => {
            require("invcNo", &purchase.invc_no)?;
            require("spplrNm", &purchase.spplr_nm)?;
            validate_transaction(&purchase.totals, &purchase.item_list)
        }
        FiscalPayload::Stock(stock) => validate_transaction(&stock.totals, &stock.item_list),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax::{TaxBuckets, TaxRates, TaxType};
    use crate::units::{PackagingUnit, QuantityUnit};
    use proptest::prelude::*;

    fn line(seq: u32, taxable: i64, tax: i64, tax_type: TaxType) -> TransactionLine {
        TransactionLine {
            item_seq: seq,
            item_cd: format!("KE1NTU000000{seq}ABCD"),
            item_cls_cd: "5020230100".to_string(),
            item_nm: format!("Item {seq}"),
            pkg_unit_cd: PackagingUnit::Unpacked,
            pkg: 1.0,
            qty_unit_cd: QuantityUnit::Piece,
            qty: 1.0,
            prc: Money::from_cents(taxable),
            sply_amt: Money::from_cents(taxable),
            dc_rt: 0.0,
            dc_amt: Money::zero(),
            tax_ty_cd: tax_type,
            taxbl_amt: Money::from_cents(taxable),
            tax_amt: Money::from_cents(tax),
            tot_amt: Money::from_cents(taxable + tax),
        }
    }

    fn summarize(lines: &[TransactionLine]) -> TaxSummary {
        let mut buckets = TaxBuckets::new();
        for l in lines {
            buckets.add(l.tax_ty_cd, l.taxbl_amt, l.tax_amt);
        }
        buckets.summarize(&TaxRates::default())
    }

    #[test]
    fn test_balanced_transaction_passes() {
        let lines = vec![
            line(1, 1000, 160, TaxType::Standard),
            line(2, 300, 48, TaxType::Standard),
        ];
        assert!(validate_transaction(&summarize(&lines), &lines).is_ok());
    }

    #[test]
    fn test_empty_transaction_fails() {
        let err = validate_transaction(&summarize(&[]), &[]).unwrap_err();
        assert!(matches!(err, ValidationError::Required { .. }));
    }

    #[test]
    fn test_tampered_grand_total_fails() {
        let lines = vec![line(1, 1000, 160, TaxType::Standard)];
        let mut totals = summarize(&lines);
        totals.tot_amt = Money::from_cents(1161);

        let err = validate_transaction(&totals, &lines).unwrap_err();
        match err {
            ValidationError::TotalsMismatch { field, .. } => assert_eq!(field, "totAmt"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_bucket_mismatch_fails() {
        let lines = vec![line(1, 1000, 160, TaxType::Standard)];
        let mut totals = summarize(&lines);
        totals.taxbl_amt_a = Money::from_cents(1);

        assert!(validate_transaction(&totals, &lines).is_err());
    }

    #[test]
    fn test_line_that_does_not_reconcile_fails() {
        let mut lines = vec![line(1, 1000, 160, TaxType::Standard)];
        let totals = summarize(&lines);
        lines[0].tot_amt = Money::from_cents(1000);

        let err = validate_transaction(&totals, &lines).unwrap_err();
        assert!(err.to_string().contains("itemList[1].totAmt"));
    }

    #[test]
    fn test_negative_line_amounts_fail() {
        // Over-discounted line: balanced, but taxable below zero.
        let lines = vec![
            line(1, 1000, 160, TaxType::Standard),
            line(2, -200, -32, TaxType::Standard),
        ];
        let err = validate_transaction(&summarize(&lines), &lines).unwrap_err();
        assert!(err.to_string().contains("itemList[2].taxblAmt"));

        let lines = vec![line(1, 1000, -1, TaxType::Standard)];
        let err = validate_transaction(&summarize(&lines), &lines).unwrap_err();
        assert!(err.to_string().contains("itemList[1].taxAmt"));
    }

    #[test]
    fn test_lines_must_carry_item_codes() {
        let mut lines = vec![line(1, 100, 16, TaxType::Standard)];
        lines[0].item_cd = String::new();
        let totals = summarize(&lines);

        assert!(matches!(
            validate_transaction(&totals, &lines),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_validate_tax_rate_bps() {
        assert!(validate_tax_rate_bps(0).is_ok());
        assert!(validate_tax_rate_bps(1600).is_ok());
        assert!(validate_tax_rate_bps(10001).is_err());
    }

    fn tax_type() -> impl Strategy<Value = TaxType> {
        prop::sample::select(TaxType::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_bucketed_totals_always_balance(
            specs in prop::collection::vec((0i64..1_000_000, 0u32..2500, tax_type()), 1..40)
        ) {
            let lines: Vec<TransactionLine> = specs
                .iter()
                .enumerate()
                .map(|(i, (taxable, bps, t))| {
                    let tax = Money::from_cents(*taxable)
                        .calculate_tax(crate::tax::TaxRate::from_bps(*bps));
                    line(i as u32 + 1, *taxable, tax.cents(), *t)
                })
                .collect();
            let totals = summarize(&lines);

            let bucket_sum: Money = totals.taxable_by_class().iter().sum();
            prop_assert_eq!(totals.tot_taxbl_amt, bucket_sum);
            prop_assert_eq!(totals.tot_amt, totals.tot_taxbl_amt + totals.tot_tax_amt);
            prop_assert!(validate_transaction(&totals, &lines).is_ok());
        }
    }
}
