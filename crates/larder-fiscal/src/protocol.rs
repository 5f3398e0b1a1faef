//! # Authority Protocol
//!
//! The envelope every authority reply comes in, and the headers every
//! request carries.
//!
//! ## Exchange
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  POST {base_url}/trnsSales/saveSales                                   │
//! │    Content-Type: application/json                                      │
//! │    tin:    P051234567X                                                 │
//! │    bhfId:  00                                                          │
//! │    cmcKey: ...                                                         │
//! │    { "invcNo": "42", "totAmt": 15.08, ... }                            │
//! │                                                                         │
//! │  200 OK                                                                │
//! │    { "resultCd": "000",                    ← success sentinel           │
//! │      "resultMsg": "It is succeeded",                                   │
//! │      "resultDt": "20261018101500",                                     │
//! │      "data": { "rcptNo": 17, "intrlData": "...", ... } }               │
//! │                                                                         │
//! │  Any other resultCd is a rejection, even on HTTP 200.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use larder_core::{AuthorityResult, FailureDetails, RESULT_CODE_SUCCESS};
use serde::{Deserialize, Serialize};

/// Taxpayer identification header.
pub const HEADER_TIN: &str = "tin";

/// Branch header.
pub const HEADER_BRANCH_ID: &str = "bhfId";

/// Communication key header.
pub const HEADER_CMC_KEY: &str = "cmcKey";

/// The authority's reply envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorityReply {
    pub result_cd: String,
    #[serde(default)]
    pub result_msg: String,
    #[serde(default)]
    pub result_dt: Option<String>,
    /// Operation-specific body: receipt signature, code lists, ...
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl AuthorityReply {
    #[inline]
    pub fn is_success(&self) -> bool {
        self.result_cd == RESULT_CODE_SUCCESS
    }

    /// What the ledger keeps of an accepted reply.
    pub fn to_result(&self) -> AuthorityResult {
        AuthorityResult {
            code: Some(self.result_cd.clone()),
            message: Some(self.result_msg.clone()),
            receipt: self.data.clone(),
        }
    }

    /// What the ledger keeps of a rejected reply.
    pub fn to_failure(&self) -> FailureDetails {
        FailureDetails {
            result_code: Some(self.result_cd.clone()),
            result_message: Some(self.result_msg.clone()),
            attempts: Some(1),
            http_status: None,
        }
    }
}
