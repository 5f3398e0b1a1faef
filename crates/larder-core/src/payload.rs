//! # Authority Payloads
//!
//! Typed request bodies, one per operation. Field names follow the
//! authority's wire vocabulary (`itemCd`, `taxblAmtB`, ...) through serde
//! renames; Rust-side names stay snake_case.
//!
//! ## Payload Family
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  FiscalPayload  (tagged, stored in the ledger as items_data)            │
//! │  ├── Item(ItemPayload)                ──► SaveItem                      │
//! │  ├── Composition(CompositionPayload)  ──► SaveItemComposition           │
//! │  ├── Sale(SalePayload)                ──► SaveSale                      │
//! │  ├── Purchase(PurchasePayload)        ──► SavePurchase                  │
//! │  └── Stock(StockPayload)              ──► SaveStockIo                   │
//! │                                                                         │
//! │  Sale / Purchase / Stock share:                                         │
//! │    TransactionLine[]  (itemList)                                        │
//! │    TaxSummary         (flattened taxblAmtA..E, totAmt, ...)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only the inner payload goes on the wire ([`FiscalPayload::wire_body`]);
//! the tag exists so a ledger entry can be replayed without knowing in
//! advance what it holds.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreResult;
use crate::money::{self, Money};
use crate::tax::{TaxSummary, TaxType};
use crate::units::{ItemType, PackagingUnit, QuantityUnit};

// =============================================================================
// Operations
// =============================================================================

/// Every call the authority client can make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    SaveItem,
    SaveItemComposition,
    SaveSale,
    SavePurchase,
    SaveStockIo,
    SelectCodes,
    SelectItemClasses,
    SelectBranches,
}

impl Operation {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Operation::SaveItem => "save_item",
            Operation::SaveItemComposition => "save_item_composition",
            Operation::SaveSale => "save_sale",
            Operation::SavePurchase => "save_purchase",
            Operation::SaveStockIo => "save_stock_io",
            Operation::SelectCodes => "select_codes",
            Operation::SelectItemClasses => "select_item_classes",
            Operation::SelectBranches => "select_branches",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `"Y"` / `"N"` flags.
pub mod yn {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &bool, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(if *value { "Y" } else { "N" })
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        let flag = String::deserialize(deserializer)?;
        Ok(flag.eq_ignore_ascii_case("Y"))
    }
}

// =============================================================================
// Item Registration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPayload {
    pub item_cd: String,
    pub item_cls_cd: String,
    pub item_ty_cd: ItemType,
    pub item_nm: String,
    pub orgn_nat_cd: String,
    pub pkg_unit_cd: PackagingUnit,
    pub qty_unit_cd: QuantityUnit,
    pub tax_ty_cd: TaxType,
    #[serde(with = "money::decimal")]
    pub dft_prc: Money,
    #[serde(rename = "grpPrcL1", with = "money::decimal")]
    pub grp_prc_l1: Money,
    #[serde(rename = "grpPrcL2", with = "money::decimal")]
    pub grp_prc_l2: Money,
    #[serde(rename = "grpPrcL3", with = "money::decimal")]
    pub grp_prc_l3: Money,
    #[serde(rename = "grpPrcL4", with = "money::decimal")]
    pub grp_prc_l4: Money,
    #[serde(rename = "grpPrcL5", with = "money::decimal")]
    pub grp_prc_l5: Money,
    pub sfty_qty: f64,
    #[serde(with = "yn")]
    pub isrc_aplcb_yn: bool,
    #[serde(with = "yn")]
    pub use_yn: bool,
    pub regr_id: String,
    pub regr_nm: String,
    pub modr_id: String,
    pub modr_nm: String,
}

// =============================================================================
// Item Composition
// =============================================================================

/// One component of a finished product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionPayload {
    /// The finished product.
    pub item_cd: String,
    /// The component item.
    pub cpst_item_cd: String,
    pub cpst_qty: f64,
    pub regr_id: String,
    pub regr_nm: String,
}

// =============================================================================
// Transaction Lines
// =============================================================================

/// One entry of `itemList` in a sale, purchase or stock envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionLine {
    pub item_seq: u32,
    pub item_cd: String,
    pub item_cls_cd: String,
    pub item_nm: String,
    pub pkg_unit_cd: PackagingUnit,
    pub pkg: f64,
    pub qty_unit_cd: QuantityUnit,
    pub qty: f64,
    #[serde(with = "money::decimal")]
    pub prc: Money,
    #[serde(with = "money::decimal")]
    pub sply_amt: Money,
    pub dc_rt: f64,
    #[serde(with = "money::decimal")]
    pub dc_amt: Money,
    pub tax_ty_cd: TaxType,
    #[serde(with = "money::decimal")]
    pub taxbl_amt: Money,
    #[serde(with = "money::decimal")]
    pub tax_amt: Money,
    #[serde(with = "money::decimal")]
    pub tot_amt: Money,
}

// =============================================================================
// Sale
// =============================================================================

/// Denormalized print block carried on a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptBlock {
    pub cust_tin: Option<String>,
    pub trde_nm: String,
    pub adrs: String,
    pub tel_no: String,
    pub email: String,
    pub top_msg: String,
    pub btm_msg: String,
    #[serde(with = "yn")]
    pub prchr_acptc_yn: bool,
    pub rcpt_pbct_dt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalePayload {
    pub invc_no: String,
    pub org_invc_no: i64,
    pub cust_tin: Option<String>,
    pub cust_nm: Option<String>,
    pub sales_ty_cd: String,
    pub rcpt_ty_cd: String,
    pub pmt_ty_cd: String,
    pub sales_stts_cd: String,
    /// `yyyyMMddHHmmss`
    pub cfm_dt: String,
    /// `yyyyMMdd`
    pub sales_dt: String,
    pub tot_item_cnt: u32,
    #[serde(flatten)]
    pub totals: TaxSummary,
    pub receipt: ReceiptBlock,
    pub regr_id: String,
    pub regr_nm: String,
    pub modr_id: String,
    pub modr_nm: String,
    pub item_list: Vec<TransactionLine>,
}

// =============================================================================
// Purchase
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasePayload {
    pub invc_no: String,
    pub org_invc_no: i64,
    pub spplr_tin: Option<String>,
    pub spplr_nm: String,
    pub spplr_invc_no: Option<String>,
    pub reg_ty_cd: String,
    pub pchs_ty_cd: String,
    pub rcpt_ty_cd: String,
    pub pmt_ty_cd: String,
    pub pchs_stts_cd: String,
    pub cfm_dt: String,
    pub pchs_dt: String,
    pub tot_item_cnt: u32,
    #[serde(flatten)]
    pub totals: TaxSummary,
    pub regr_id: String,
    pub regr_nm: String,
    pub modr_id: String,
    pub modr_nm: String,
    pub item_list: Vec<TransactionLine>,
}

// =============================================================================
// Stock
// =============================================================================

/// Why stock moved (`sarTyCd`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockReason {
    /// Received against a purchase.
    #[serde(rename = "02")]
    Purchase,
    /// Manual increase.
    #[serde(rename = "06")]
    AdjustmentIn,
    /// Issued against a sale.
    #[serde(rename = "11")]
    Sale,
    /// Manual decrease (waste, spoilage, count correction).
    #[serde(rename = "16")]
    AdjustmentOut,
}

impl StockReason {
    pub const fn code(&self) -> &'static str {
        match self {
            StockReason::Purchase => "02",
            StockReason::AdjustmentIn => "06",
            StockReason::Sale => "11",
            StockReason::AdjustmentOut => "16",
        }
    }

    pub const fn is_inbound(&self) -> bool {
        matches!(self, StockReason::Purchase | StockReason::AdjustmentIn)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockPayload {
    pub sar_no: u64,
    pub org_sar_no: u64,
    pub reg_ty_cd: String,
    pub sar_ty_cd: StockReason,
    pub cust_tin: Option<String>,
    pub cust_nm: Option<String>,
    /// `yyyyMMdd`
    pub ocrn_dt: String,
    pub tot_item_cnt: u32,
    #[serde(flatten)]
    pub totals: TaxSummary,
    pub regr_id: String,
    pub regr_nm: String,
    pub modr_id: String,
    pub modr_nm: String,
    pub item_list: Vec<TransactionLine>,
}

// =============================================================================
// Lookups
// =============================================================================

/// Body of the code / classification / branch lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    /// Only changes after this instant are returned, `yyyyMMddHHmmss`.
    pub last_req_dt: String,
}

// =============================================================================
// Tagged Payload
// =============================================================================

/// Any ledgered request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "payload", rename_all = "snake_case")]
pub enum FiscalPayload {
    Item(ItemPayload),
    Composition(CompositionPayload),
    Sale(SalePayload),
    Purchase(PurchasePayload),
    Stock(StockPayload),
}

impl FiscalPayload {
    pub const fn operation(&self) -> Operation {
        match self {
            FiscalPayload::Item(_) => Operation::SaveItem,
            FiscalPayload::Composition(_) => Operation::SaveItemComposition,
            FiscalPayload::Sale(_) => Operation::SaveSale,
            FiscalPayload::Purchase(_) => Operation::SavePurchase,
            FiscalPayload::Stock(_) => Operation::SaveStockIo,
        }
    }

    /// Item code, invoice number or movement number.
    pub fn reference_no(&self) -> String {
        match self {
            FiscalPayload::Item(p) => p.item_cd.clone(),
            FiscalPayload::Composition(p) => format!("{}:{}", p.item_cd, p.cpst_item_cd),
            FiscalPayload::Sale(p) => p.invc_no.clone(),
            FiscalPayload::Purchase(p) => p.invc_no.clone(),
            FiscalPayload::Stock(p) => p.sar_no.to_string(),
        }
    }

    /// The untagged body sent to the authority.
    pub fn wire_body(&self) -> CoreResult<serde_json::Value> {
        let body = match self {
            FiscalPayload::Item(p) => serde_json::to_value(p)?,
            FiscalPayload::Composition(p) => serde_json::to_value(p)?,
            FiscalPayload::Sale(p) => serde_json::to_value(p)?,
            FiscalPayload::Purchase(p) => serde_json::to_value(p)?,
            FiscalPayload::Stock(p) => serde_json::to_value(p)?,
        };
        Ok(body)
    }

    /// Snapshot stored in the ledger.
    pub fn to_items_data(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Rebuilds a payload from a ledger snapshot.
    pub fn from_items_data(items_data: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(items_data)?)
    }
}
