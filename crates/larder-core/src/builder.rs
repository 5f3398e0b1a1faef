//! # Payload Builders
//!
//! Pure functions from business records to authority payloads. Every
//! builder takes the clock as an argument so the output is a function of
//! its inputs.
//!
//! ## Sale Arithmetic
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  per line                                                               │
//! │    splyAmt  = round(prc × qty)                                          │
//! │    taxblAmt = splyAmt - dcAmt                                           │
//! │    taxAmt   = taxblAmt × rate(taxTyCd)      (half-up to the cent)       │
//! │    totAmt   = taxblAmt + taxAmt                                         │
//! │                                                                         │
//! │  per class A-E                                                          │
//! │    taxblAmtX = Σ taxblAmt of lines in X,  taxAmtX likewise              │
//! │                                                                         │
//! │  2 × 5.00 + 1 × 3.00 at 16%  →  13.00 taxable, 2.08 tax, 15.08 total    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Purchases do not recompute tax: the supplier's invoice-level VAT is split
//! evenly across the lines (remainder cents to the earliest lines). This is
//! an approximation that misallocates tax when lines carry different rates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codes::{derive_invoice_number, format_date, format_datetime};
use crate::error::ValidationError;
use crate::money::Money;
use crate::payload::{
    CompositionPayload, ItemPayload, PurchasePayload, ReceiptBlock, SalePayload, StockPayload,
    StockReason, TransactionLine,
};
use crate::tax::{TaxBuckets, TaxRates, TaxType};
use crate::types::{
    Ingredient, MovementType, Recipe, RecipeComponent, SalesOrder, StockLine, SupplierOrder,
};
use crate::ledger::LedgerLink;
use crate::units::{ItemType, PackagingUnit, QuantityUnit};
use crate::validation::ValidationResult;

// =============================================================================
// Context
// =============================================================================

/// Who is registering. Stamped as registrar and modifier on every payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registrar {
    pub id: String,
    pub name: String,
}

/// Business identity printed on receipts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessProfile {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub receipt_top_message: String,
    pub receipt_bottom_message: String,
}

/// Everything the builders need from configuration.
#[derive(Debug, Clone)]
pub struct FiscalContext {
    pub country_code: String,
    pub default_item_class_code: String,
    pub rates: TaxRates,
    pub registrar: Registrar,
    pub business: BusinessProfile,
}

impl FiscalContext {
    fn class_code_or_default(&self, class_code: Option<&str>) -> String {
        match class_code.map(str::trim) {
            Some(code) if !code.is_empty() => code.to_string(),
            _ => self.default_item_class_code.clone(),
        }
    }
}

// =============================================================================
// Items
// =============================================================================

/// Item registration for an ingredient (raw material).
///
/// Tax class is the ingredient's when known, else standard. Class code is
/// the ingredient's when known, else the configured default. All five price
/// tiers carry the default price.
pub fn build_ingredient_item(
    ctx: &FiscalContext,
    ingredient: &Ingredient,
    price_override: Option<Money>,
    item_code: &str,
) -> ItemPayload {
    let price = price_override.unwrap_or_else(|| ingredient.default_price());

    item_payload(
        ctx,
        ItemFields {
            code: item_code,
            class_code: ctx.class_code_or_default(ingredient.item_class_code.as_deref()),
            item_type: ItemType::RawMaterial,
            name: &ingredient.name,
            packaging: ingredient.packaging_unit(),
            unit: ingredient.quantity_unit(),
            tax_type: ingredient.tax_type.unwrap_or_default(),
            price,
        },
    )
}

/// Item registration for a recipe (finished product, sold per piece).
pub fn build_recipe_item(ctx: &FiscalContext, recipe: &Recipe, item_code: &str) -> ItemPayload {
    item_payload(
        ctx,
        ItemFields {
            code: item_code,
            class_code: ctx.class_code_or_default(recipe.item_class_code.as_deref()),
            item_type: ItemType::FinishedProduct,
            name: &recipe.name,
            packaging: PackagingUnit::Unpacked,
            unit: QuantityUnit::Piece,
            tax_type: recipe.tax_type.unwrap_or_default(),
            price: recipe.price(),
        },
    )
}

struct ItemFields<'a> {
    code: &'a str,
    class_code: String,
    item_type: ItemType,
    name: &'a str,
    packaging: PackagingUnit,
    unit: QuantityUnit,
    tax_type: TaxType,
    price: Money,
}

fn item_payload(ctx: &FiscalContext, fields: ItemFields<'_>) -> ItemPayload {
    ItemPayload {
        item_cd: fields.code.to_string(),
        item_cls_cd: fields.class_code,
        item_ty_cd: fields.item_type,
        item_nm: fields.name.trim().to_string(),
        orgn_nat_cd: ctx.country_code.clone(),
        pkg_unit_cd: fields.packaging,
        qty_unit_cd: fields.unit,
        tax_ty_cd: fields.tax_type,
        dft_prc: fields.price,
        grp_prc_l1: fields.price,
        grp_prc_l2: fields.price,
        grp_prc_l3: fields.price,
        grp_prc_l4: fields.price,
        grp_prc_l5: fields.price,
        sfty_qty: 0.0,
        isrc_aplcb_yn: false,
        use_yn: true,
        regr_id: ctx.registrar.id.clone(),
        regr_nm: ctx.registrar.name.clone(),
        modr_id: ctx.registrar.id.clone(),
        modr_nm: ctx.registrar.name.clone(),
    }
}

/// Links one ingredient into a registered recipe.
///
/// The ingredient must already hold an item code.
pub fn build_composition(
    ctx: &FiscalContext,
    recipe_item_code: &str,
    component: &RecipeComponent,
) -> ValidationResult<CompositionPayload> {
    let component_code = component
        .item_code
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ValidationError::Required {
            field: format!("item code of ingredient '{}'", component.ingredient_name),
        })?;

    Ok(CompositionPayload {
        item_cd: recipe_item_code.to_string(),
        cpst_item_cd: component_code.to_string(),
        cpst_qty: component.quantity,
        regr_id: ctx.registrar.id.clone(),
        regr_nm: ctx.registrar.name.clone(),
    })
}

// =============================================================================
// Lines
// =============================================================================

/// What a line needs, independent of where it came from.
struct LineInput<'a> {
    name: &'a str,
    item_code: Option<&'a str>,
    item_class_code: Option<&'a str>,
    packaging: PackagingUnit,
    unit: QuantityUnit,
    quantity: f64,
    unit_price: Money,
    discount: Money,
    tax_type: TaxType,
}

fn require_item_code<'a>(name: &str, item_code: Option<&'a str>) -> ValidationResult<&'a str> {
    item_code
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ValidationError::Required {
            field: format!("item code of '{name}'"),
        })
}

/// Builds one line. `tax` of `None` means "compute from the class rate".
fn build_line(
    ctx: &FiscalContext,
    seq: u32,
    input: &LineInput<'_>,
    tax: Option<Money>,
) -> ValidationResult<TransactionLine> {
    let item_code = require_item_code(input.name, input.item_code)?;

    let supply = input.unit_price.multiply_fractional(input.quantity);
    if input.discount.is_negative() || input.discount > supply {
        return Err(ValidationError::OutOfRange {
            field: format!("itemList[{seq}].dcAmt"),
            min: 0,
            max: supply.cents(),
        });
    }
    let taxable = supply - input.discount;
    let tax = tax.unwrap_or_else(|| taxable.calculate_tax(ctx.rates.rate_for(input.tax_type)));

    let discount_rate = if supply.is_zero() {
        0.0
    } else {
        (input.discount.cents() as f64 * 10000.0 / supply.cents() as f64).round() / 100.0
    };

    Ok(TransactionLine {
        item_seq: seq,
        item_cd: item_code.to_string(),
        item_cls_cd: ctx.class_code_or_default(input.item_class_code),
        item_nm: input.name.to_string(),
        pkg_unit_cd: input.packaging,
        pkg: input.quantity,
        qty_unit_cd: input.unit,
        qty: input.quantity,
        prc: input.unit_price,
        sply_amt: supply,
        dc_rt: discount_rate,
        dc_amt: input.discount,
        tax_ty_cd: input.tax_type,
        taxbl_amt: taxable,
        tax_amt: tax,
        tot_amt: taxable + tax,
    })
}

fn bucket(lines: &[TransactionLine]) -> TaxBuckets {
    let mut buckets = TaxBuckets::new();
    for line in lines {
        buckets.add(line.tax_ty_cd, line.taxbl_amt, line.tax_amt);
    }
    buckets
}

// =============================================================================
// Sale
// =============================================================================

/// Sale envelope for a customer order.
///
/// Invoice number is the order's issued number, else its id.
pub fn build_sale(
    ctx: &FiscalContext,
    order: &SalesOrder,
    now: DateTime<Utc>,
) -> ValidationResult<SalePayload> {
    let lines = order
        .lines
        .iter()
        .enumerate()
        .map(|(i, l)| {
            let input = LineInput {
                name: &l.name,
                item_code: l.item_code.as_deref(),
                item_class_code: l.item_class_code.as_deref(),
                packaging: PackagingUnit::Unpacked,
                unit: QuantityUnit::from_unit(&l.unit),
                quantity: l.quantity,
                unit_price: Money::from_cents(l.unit_price_cents),
                discount: Money::from_cents(l.discount_cents),
                tax_type: l.tax_type.unwrap_or_default(),
            };
            build_line(ctx, i as u32 + 1, &input, None)
        })
        .collect::<ValidationResult<Vec<_>>>()?;

    let totals = bucket(&lines).summarize(&ctx.rates);
    let confirmed = format_datetime(now);

    Ok(SalePayload {
        invc_no: derive_invoice_number(order.invoice_number.as_deref(), order.id),
        org_invc_no: 0,
        cust_tin: order.customer_tin.clone(),
        cust_nm: order.customer_name.clone(),
        sales_ty_cd: "N".to_string(),
        rcpt_ty_cd: "S".to_string(),
        pmt_ty_cd: order.payment_type.clone(),
        sales_stts_cd: "02".to_string(),
        cfm_dt: confirmed.clone(),
        sales_dt: format_date(now),
        tot_item_cnt: lines.len() as u32,
        totals,
        receipt: ReceiptBlock {
            cust_tin: order.customer_tin.clone(),
            trde_nm: ctx.business.name.clone(),
            adrs: ctx.business.address.clone(),
            tel_no: ctx.business.phone.clone(),
            email: ctx.business.email.clone(),
            top_msg: ctx.business.receipt_top_message.clone(),
            btm_msg: ctx.business.receipt_bottom_message.clone(),
            prchr_acptc_yn: false,
            rcpt_pbct_dt: confirmed,
        },
        regr_id: ctx.registrar.id.clone(),
        regr_nm: ctx.registrar.name.clone(),
        modr_id: ctx.registrar.id.clone(),
        modr_nm: ctx.registrar.name.clone(),
        item_list: lines,
    })
}

// =============================================================================
// Purchase
// =============================================================================

/// Purchase envelope for a supplier order.
///
/// The invoice number is derived from the local order id; the supplier's
/// own number travels as `spplrInvcNo`.
pub fn build_purchase(
    ctx: &FiscalContext,
    order: &SupplierOrder,
    now: DateTime<Utc>,
) -> ValidationResult<PurchasePayload> {
    let shares = order.vat().split_evenly(order.lines.len());

    let lines = order
        .lines
        .iter()
        .zip(shares)
        .enumerate()
        .map(|(i, (l, vat_share))| {
            let input = LineInput {
                name: &l.name,
                item_code: l.item_code.as_deref(),
                item_class_code: l.item_class_code.as_deref(),
                packaging: PackagingUnit::Unpacked,
                unit: QuantityUnit::from_unit(&l.unit),
                quantity: l.quantity,
                unit_price: Money::from_cents(l.unit_cost_cents),
                discount: Money::zero(),
                tax_type: l.tax_type.unwrap_or_default(),
            };
            build_line(ctx, i as u32 + 1, &input, Some(vat_share))
        })
        .collect::<ValidationResult<Vec<_>>>()?;

    let totals = bucket(&lines).summarize(&ctx.rates);

    Ok(PurchasePayload {
        invc_no: derive_invoice_number(None, order.id),
        org_invc_no: 0,
        spplr_tin: order.supplier_tin.clone(),
        spplr_nm: order.supplier_name.clone(),
        spplr_invc_no: order.invoice_number.clone(),
        reg_ty_cd: "M".to_string(),
        pchs_ty_cd: "N".to_string(),
        rcpt_ty_cd: "P".to_string(),
        pmt_ty_cd: "01".to_string(),
        pchs_stts_cd: "02".to_string(),
        cfm_dt: format_datetime(now),
        pchs_dt: format_date(now),
        tot_item_cnt: lines.len() as u32,
        totals,
        regr_id: ctx.registrar.id.clone(),
        regr_nm: ctx.registrar.name.clone(),
        modr_id: ctx.registrar.id.clone(),
        modr_nm: ctx.registrar.name.clone(),
        item_list: lines,
    })
}

// =============================================================================
// Stock
// =============================================================================

impl StockReason {
    /// Reason code for a movement against the given record.
    pub fn for_movement(movement: MovementType, link: &LedgerLink) -> Self {
        match (movement, link) {
            (MovementType::In, LedgerLink::SupplierOrder(_)) => StockReason::Purchase,
            (MovementType::In, _) => StockReason::AdjustmentIn,
            (MovementType::Out, LedgerLink::SalesOrder(_)) => StockReason::Sale,
            (MovementType::Out, _) => StockReason::AdjustmentOut,
        }
    }
}

/// Stock in/out envelope. Line value is cost × quantity, taxed at the
/// line's class rate.
pub fn build_stock(
    ctx: &FiscalContext,
    lines: &[StockLine],
    reason: StockReason,
    movement_number: u64,
    now: DateTime<Utc>,
) -> ValidationResult<StockPayload> {
    let item_list = lines
        .iter()
        .enumerate()
        .map(|(i, l)| {
            let input = LineInput {
                name: &l.name,
                item_code: Some(l.item_code.as_str()),
                item_class_code: l.item_class_code.as_deref(),
                packaging: l.packaging,
                unit: l.unit,
                quantity: l.quantity,
                unit_price: l.unit_cost,
                discount: Money::zero(),
                tax_type: l.tax_type,
            };
            build_line(ctx, i as u32 + 1, &input, None)
        })
        .collect::<ValidationResult<Vec<_>>>()?;

    let totals = bucket(&item_list).summarize(&ctx.rates);

    Ok(StockPayload {
        sar_no: movement_number,
        org_sar_no: 0,
        reg_ty_cd: "M".to_string(),
        sar_ty_cd: reason,
        cust_tin: None,
        cust_nm: None,
        ocrn_dt: format_date(now),
        tot_item_cnt: item_list.len() as u32,
        totals,
        regr_id: ctx.registrar.id.clone(),
        regr_nm: ctx.registrar.name.clone(),
        modr_id: ctx.registrar.id.clone(),
        modr_nm: ctx.registrar.name.clone(),
        item_list,
    })
}

/// Stock lines issued by a completed sale, valued at the sale price.
pub fn stock_lines_for_sale(order: &SalesOrder) -> ValidationResult<Vec<StockLine>> {
    order
        .lines
        .iter()
        .map(|l| {
            Ok(StockLine {
                name: l.name.clone(),
                item_code: require_item_code(&l.name, l.item_code.as_deref())?.to_string(),
                item_class_code: l.item_class_code.clone(),
                unit: QuantityUnit::from_unit(&l.unit),
                packaging: PackagingUnit::Unpacked,
                quantity: l.quantity,
                unit_cost: Money::from_cents(l.unit_price_cents),
                tax_type: l.tax_type.unwrap_or_default(),
            })
        })
        .collect()
}

/// Stock lines received with a supplier order, valued at cost.
pub fn stock_lines_for_purchase(order: &SupplierOrder) -> ValidationResult<Vec<StockLine>> {
    order
        .lines
        .iter()
        .map(|l| {
            Ok(StockLine {
                name: l.name.clone(),
                item_code: require_item_code(&l.name, l.item_code.as_deref())?.to_string(),
                item_class_code: l.item_class_code.clone(),
                unit: QuantityUnit::from_unit(&l.unit),
                packaging: PackagingUnit::Unpacked,
                quantity: l.quantity,
                unit_cost: Money::from_cents(l.unit_cost_cents),
                tax_type: l.tax_type.unwrap_or_default(),
            })
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
