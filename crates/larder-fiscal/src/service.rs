//! # Fiscal Service
//!
//! Turns back-office records into authority submissions and keeps the
//! ledger and the records' fiscal status in step with what happened.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Every ledgered operation                            │
//! │                                                                         │
//! │   record ──► build (core) ──► validate ──✗──► Err(Validation)          │
//! │                                   │           no ledger row, no send    │
//! │                                   ▼                                     │
//! │                      ledger.create  (pending)                           │
//! │                                   │                                     │
//! │                                   ▼                                     │
//! │                        client.send(operation, body)                     │
//! │                                   │                                     │
//! │            ┌──────────────────────┼──────────────────────┐              │
//! │            ▼                      ▼                      ▼              │
//! │        Accepted               Rejected           TransportFailed        │
//! │   ledger.advance(success)  ledger.fail(code)   ledger.fail(NETWORK)     │
//! │   write back to record     Err(Rejected)       Err(Network)             │
//! │                                                                         │
//! │  Follow-on steps (stock after a sale, compositions after a recipe)     │
//! │  never turn an accepted submission into an error: they come back as    │
//! │  `follow_up` and the record is marked `partial`.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Replay
//! `retry_entry` rebuilds the request from the entry's `items_data` alone,
//! so a retried sale carries the invoice number it was first sent with.

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use larder_core::builder::{
    build_composition, build_ingredient_item, build_purchase, build_recipe_item, build_sale,
    build_stock, stock_lines_for_purchase, stock_lines_for_sale,
};
use larder_core::codes::{format_datetime, generate_item_code, MovementNumbers};
use larder_core::payload::{LookupRequest, StockReason};
use larder_core::units::{ItemType, PackagingUnit, QuantityUnit};
use larder_core::validation::validate_payload;
use larder_core::{
    FiscalContext, FiscalPayload, FiscalStatus, Ingredient, LedgerKind, LedgerLink, LedgerStatus,
    Money, MovementType, NewLedgerEntry, Operation, Recipe, SalesOrder, StockLine, SupplierOrder,
    TaxType,
};
use larder_db::{Database, DbError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use ts_rs::TS;

use crate::config::FiscalConfig;
use crate::error::{FiscalError, FiscalResult};
use crate::transport::{FiscalClient, SendOutcome};

/// `lastReqDt` of a lookup that wants everything.
pub const FULL_LOOKUP_SINCE: &str = "20000101000000";

/// Failure message for entries found pending long after their request.
pub const ABANDONED_MESSAGE: &str = "abandoned in flight";

// =============================================================================
// Results
// =============================================================================

/// An accepted, ledgered submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub ledger_id: String,
    /// Item code, invoice number or movement number.
    pub reference_no: String,
    /// The authority's `data`: receipt signature, counters, ...
    pub receipt: Option<serde_json::Value>,
}

/// What the authority now knows an item as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItemRegistration {
    pub item_code: String,
    pub item_class_code: String,
    pub tax_type: TaxType,
    pub ledger_id: String,
}

/// Which follow-on step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpStep {
    Composition,
    StockIn,
    StockOut,
}

impl fmt::Display for FollowUpStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FollowUpStep::Composition => "composition",
            FollowUpStep::StockIn => "stock_in",
            FollowUpStep::StockOut => "stock_out",
        })
    }
}

/// A follow-on step that failed after the main submission was accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FollowUpFailure {
    pub step: FollowUpStep,
    pub message: String,
}

impl fmt::Display for FollowUpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.step, self.message)
    }
}

/// A sale or purchase together with its stock movement.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTransaction {
    pub submission: Submission,
    /// The stock movement, when it was accepted.
    pub stock: Option<Submission>,
    pub follow_up: Option<FollowUpFailure>,
}

impl CompletedTransaction {
    #[inline]
    pub fn is_degraded(&self) -> bool {
        self.follow_up.is_some()
    }
}

/// A recipe registered as a finished product, with its compositions.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeRegistration {
    pub registration: ItemRegistration,
    /// Compositions accepted.
    pub compositions: usize,
    pub follow_up: Option<FollowUpFailure>,
}

/// Result of a sync sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncReport {
    pub synced: usize,
    /// `(item name, error)` for every ingredient that did not register.
    pub errors: Vec<(String, String)>,
}

/// Result of a retry sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RetryReport {
    pub succeeded: usize,
    /// `(ledger id, error)` for every replay that failed again.
    pub failed: Vec<(String, String)>,
    /// Entries left alone because they reached the retry limit.
    pub skipped: usize,
}

// =============================================================================
// Service
// =============================================================================

/// Fiscal operations over the datastore and the authority client.
///
/// ## Usage
/// ```rust,ignore
/// let service = FiscalService::new(db, Arc::new(config))?;
/// let report = service.sync_all_items().await?;
/// info!(synced = report.synced, failed = report.errors.len(), "Sweep done");
/// ```
pub struct FiscalService {
    db: Database,
    client: FiscalClient,
    config: Arc<FiscalConfig>,
    ctx: FiscalContext,
    movements: MovementNumbers,
}

impl FiscalService {
    pub fn new(db: Database, config: Arc<FiscalConfig>) -> FiscalResult<Self> {
        let client = FiscalClient::new(config)?;
        Ok(Self::with_client(db, client))
    }

    /// Uses an already configured client (and its configuration).
    pub fn with_client(db: Database, client: FiscalClient) -> Self {
        let config = client.shared_config();
        let ctx = config.context();
        FiscalService {
            db,
            client,
            config,
            ctx,
            movements: MovementNumbers::new(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn client(&self) -> &FiscalClient {
        &self.client
    }

    pub fn config(&self) -> &FiscalConfig {
        &self.config
    }

    // =========================================================================
    // Items
    // =========================================================================

    /// Registers an ingredient as a raw material.
    ///
    /// Reuses the ingredient's item code when it has one. The ingredient
    /// row is not written; `sync_all_items` does that.
    #[instrument(skip(self, ingredient), fields(ingredient_id = ingredient.id))]
    pub async fn register_item(
        &self,
        ingredient: &Ingredient,
        price_override: Option<Money>,
    ) -> FiscalResult<ItemRegistration> {
        let item_code = existing_code(ingredient.item_code.as_deref()).unwrap_or_else(|| {
            generate_item_code(
                &self.ctx.country_code,
                ItemType::RawMaterial,
                ingredient.packaging_unit(),
                ingredient.quantity_unit(),
                Utc::now(),
            )
        });

        let payload = build_ingredient_item(&self.ctx, ingredient, price_override, &item_code);
        let registration = ItemRegistration {
            item_code: payload.item_cd.clone(),
            item_class_code: payload.item_cls_cd.clone(),
            tax_type: payload.tax_ty_cd,
            ledger_id: String::new(),
        };

        let submission = self
            .run(
                LedgerKind::ItemRegistration,
                LedgerLink::Ingredient(ingredient.id),
                FiscalPayload::Item(payload),
            )
            .await?;

        info!(item_code = %registration.item_code, name = %ingredient.name, "Ingredient registered");
        Ok(ItemRegistration {
            ledger_id: submission.ledger_id,
            ..registration
        })
    }

    /// Registers a recipe as a finished product, then links each of its
    /// ingredients with one composition call.
    ///
    /// A failed registration is an error. A failed composition is not: the
    /// recipe keeps its code, is marked `partial`, and the failure comes
    /// back in `follow_up`.
    #[instrument(skip(self, recipe), fields(recipe_id = recipe.id))]
    pub async fn register_recipe(&self, recipe: &Recipe) -> FiscalResult<RecipeRegistration> {
        let link = LedgerLink::Recipe(recipe.id);
        let item_code = existing_code(recipe.item_code.as_deref()).unwrap_or_else(|| {
            generate_item_code(
                &self.ctx.country_code,
                ItemType::FinishedProduct,
                PackagingUnit::Unpacked,
                QuantityUnit::Piece,
                Utc::now(),
            )
        });

        let payload = build_recipe_item(&self.ctx, recipe, &item_code);
        let (class_code, tax_type) = (payload.item_cls_cd.clone(), payload.tax_ty_cd);

        let submission = match self
            .run(LedgerKind::ItemRegistration, link, FiscalPayload::Item(payload))
            .await
        {
            Ok(submission) => submission,
            Err(e) => {
                self.note_failure(link, &e).await;
                return Err(e);
            }
        };

        self.db
            .recipes()
            .set_fiscal_codes(recipe.id, &item_code, &class_code, tax_type)
            .await?;

        let mut compositions = 0;
        let mut failures = Vec::new();
        for component in &recipe.components {
            let sent = match build_composition(&self.ctx, &item_code, component) {
                Ok(composition) => {
                    self.run(
                        LedgerKind::ItemComposition,
                        link,
                        FiscalPayload::Composition(composition),
                    )
                    .await
                }
                Err(e) => Err(FiscalError::from(e)),
            };

            match sent {
                Ok(_) => compositions += 1,
                Err(e) => {
                    warn!(ingredient = %component.ingredient_name, error = %e, "Composition failed");
                    failures.push(format!("{}: {e}", component.ingredient_name));
                }
            }
        }

        let follow_up = if failures.is_empty() {
            self.set_status(link, FiscalStatus::Submitted, None).await?;
            None
        } else {
            let failure = FollowUpFailure {
                step: FollowUpStep::Composition,
                message: failures.join("; "),
            };
            self.set_status(link, FiscalStatus::Partial, Some(&failure.to_string()))
                .await?;
            Some(failure)
        };

        info!(%item_code, compositions, degraded = follow_up.is_some(), "Recipe registered");
        Ok(RecipeRegistration {
            registration: ItemRegistration {
                item_code,
                item_class_code: class_code,
                tax_type,
                ledger_id: submission.ledger_id,
            },
            compositions,
            follow_up,
        })
    }

    /// Registers every ingredient without an item code.
    ///
    /// Runs up to `sync_concurrency` registrations at once; results are
    /// handled in ingredient order. Accepted codes are written back, failures
    /// are noted on the ingredient and collected. Never stops early.
    #[instrument(skip(self))]
    pub async fn sync_all_items(&self) -> FiscalResult<SyncReport> {
        let pending = self.db.ingredients().list_unregistered().await?;
        info!(count = pending.len(), "Syncing unregistered ingredients");

        let results: Vec<(Ingredient, FiscalResult<ItemRegistration>)> = stream::iter(pending)
            .map(|ingredient| async move {
                let result = self.register_item(&ingredient, None).await;
                (ingredient, result)
            })
            .buffered(self.config.authority.sync_concurrency)
            .collect()
            .await;

        let mut report = SyncReport::default();
        for (ingredient, result) in results {
            let written = match result {
                Ok(registration) => self
                    .db
                    .ingredients()
                    .set_fiscal_codes(
                        ingredient.id,
                        &registration.item_code,
                        &registration.item_class_code,
                        registration.tax_type,
                    )
                    .await
                    .map_err(FiscalError::from),
                Err(e) => Err(e),
            };

            match written {
                Ok(()) => report.synced += 1,
                Err(e) => {
                    self.note_failure(LedgerLink::Ingredient(ingredient.id), &e)
                        .await;
                    report.errors.push((ingredient.name, e.to_string()));
                }
            }
        }

        info!(
            synced = report.synced,
            failed = report.errors.len(),
            "Item sync finished"
        );
        Ok(report)
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Sends a customer order as a sale.
    ///
    /// The invoice number is the order's issued number, else its id, and is
    /// stored on the order once accepted.
    #[instrument(skip(self, order), fields(order_id = order.id))]
    pub async fn send_sale(&self, order: &SalesOrder) -> FiscalResult<Submission> {
        let link = LedgerLink::SalesOrder(order.id);
        let result: FiscalResult<Submission> = async {
            let payload = build_sale(&self.ctx, order, Utc::now())?;
            self.run(LedgerKind::Sale, link, FiscalPayload::Sale(payload))
                .await
        }
        .await;

        match result {
            Ok(submission) => {
                self.db
                    .sales_orders()
                    .set_invoice_number(order.id, &submission.reference_no)
                    .await?;
                self.set_status(link, FiscalStatus::Submitted, None).await?;
                Ok(submission)
            }
            Err(e) => {
                self.note_failure(link, &e).await;
                Err(e)
            }
        }
    }

    /// Sends a supplier order as a purchase. The invoice-level VAT is spread
    /// over the lines.
    #[instrument(skip(self, order), fields(order_id = order.id))]
    pub async fn send_purchase(&self, order: &SupplierOrder) -> FiscalResult<Submission> {
        let link = LedgerLink::SupplierOrder(order.id);
        let result: FiscalResult<Submission> = async {
            let payload = build_purchase(&self.ctx, order, Utc::now())?;
            self.run(LedgerKind::Purchase, link, FiscalPayload::Purchase(payload))
                .await
        }
        .await;

        match result {
            Ok(submission) => {
                self.set_status(link, FiscalStatus::Submitted, None).await?;
                Ok(submission)
            }
            Err(e) => {
                self.note_failure(link, &e).await;
                Err(e)
            }
        }
    }

    /// Reports goods moving in or out of stock against `link`.
    ///
    /// Each call takes a fresh movement number.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn send_stock_movement(
        &self,
        lines: &[StockLine],
        movement: MovementType,
        link: LedgerLink,
    ) -> FiscalResult<Submission> {
        let kind = match movement {
            MovementType::In => LedgerKind::StockIn,
            MovementType::Out => LedgerKind::StockOut,
        };
        let reason = StockReason::for_movement(movement, &link);
        let payload = build_stock(&self.ctx, lines, reason, self.movements.next(), Utc::now())?;

        self.run(kind, link, FiscalPayload::Stock(payload)).await
    }

    /// Sale followed by the matching stock-out.
    pub async fn complete_sale(&self, order: &SalesOrder) -> FiscalResult<CompletedTransaction> {
        let submission = self.send_sale(order).await?;

        let stock: FiscalResult<Submission> = async {
            let lines = stock_lines_for_sale(order)?;
            self.send_stock_movement(&lines, MovementType::Out, LedgerLink::SalesOrder(order.id))
                .await
        }
        .await;

        self.finish_transaction(
            LedgerLink::SalesOrder(order.id),
            FollowUpStep::StockOut,
            submission,
            stock,
        )
        .await
    }

    /// Purchase followed by the matching stock-in.
    pub async fn receive_purchase(
        &self,
        order: &SupplierOrder,
    ) -> FiscalResult<CompletedTransaction> {
        let submission = self.send_purchase(order).await?;

        let stock: FiscalResult<Submission> = async {
            let lines = stock_lines_for_purchase(order)?;
            self.send_stock_movement(
                &lines,
                MovementType::In,
                LedgerLink::SupplierOrder(order.id),
            )
            .await
        }
        .await;

        self.finish_transaction(
            LedgerLink::SupplierOrder(order.id),
            FollowUpStep::StockIn,
            submission,
            stock,
        )
        .await
    }

    async fn finish_transaction(
        &self,
        link: LedgerLink,
        step: FollowUpStep,
        submission: Submission,
        stock: FiscalResult<Submission>,
    ) -> FiscalResult<CompletedTransaction> {
        match stock {
            Ok(stock) => Ok(CompletedTransaction {
                submission,
                stock: Some(stock),
                follow_up: None,
            }),
            Err(e) => {
                let failure = FollowUpFailure {
                    step,
                    message: e.to_string(),
                };
                warn!(?link, %failure, "Transaction accepted, follow-up failed");
                self.set_status(link, FiscalStatus::Partial, Some(&failure.to_string()))
                    .await?;
                Ok(CompletedTransaction {
                    submission,
                    stock: None,
                    follow_up: Some(failure),
                })
            }
        }
    }

    // =========================================================================
    // Retry & Reconciliation
    // =========================================================================

    /// Replays one failed entry from its stored payload.
    ///
    /// On acceptance the record gets the same write-back the first attempt
    /// would have given it.
    #[instrument(skip(self))]
    pub async fn retry_entry(&self, ledger_id: &str) -> FiscalResult<Submission> {
        let ledger = self.db.ledger();
        let entry = ledger
            .get(ledger_id)
            .await?
            .ok_or_else(|| FiscalError::not_found("LedgerEntry", ledger_id))?;

        let payload = FiscalPayload::from_items_data(&entry.items_data)?;
        validate_payload(&payload)?;
        let body = payload.wire_body()?;

        // A crash between mark_retry and resubmit leaves the entry in retry.
        if entry.status != LedgerStatus::Retry {
            ledger.mark_retry(ledger_id).await?;
        }
        ledger.resubmit(ledger_id).await?;

        info!(
            ledger_id,
            kind = %entry.kind,
            reference_no = %entry.reference_no,
            retry_count = entry.retry_count + 1,
            "Replaying ledger entry"
        );

        let outcome = self.client.send(payload.operation(), &body).await;
        let submission = self
            .settle(ledger_id, entry.reference_no.clone(), outcome)
            .await?;

        if let Some(link) = entry.link() {
            self.write_back(entry.kind, link, &payload).await?;
        }

        Ok(submission)
    }

    /// Replays every failed entry (of `kind`, when given) that has been
    /// retried fewer than `max_retry_count` times. Oldest first.
    pub async fn retry_failed(
        &self,
        kind: Option<LedgerKind>,
        max_retry_count: i64,
    ) -> FiscalResult<RetryReport> {
        let entries = self.db.ledger().list_failed(kind).await?;
        let mut report = RetryReport::default();

        for entry in entries {
            if entry.retry_count >= max_retry_count {
                debug!(ledger_id = %entry.id, retry_count = entry.retry_count, "Retry limit reached");
                report.skipped += 1;
                continue;
            }

            match self.retry_entry(&entry.id).await {
                Ok(_) => report.succeeded += 1,
                Err(e) => report.failed.push((entry.id, e.to_string())),
            }
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed.len(),
            skipped = report.skipped,
            "Retry sweep finished"
        );
        Ok(report)
    }

    /// Fails entries left `pending` for longer than `max_age`, which makes
    /// them eligible for retry. Returns how many were failed.
    pub async fn reconcile_abandoned(&self, max_age: Duration) -> FiscalResult<usize> {
        let max_age = chrono::Duration::from_std(max_age)
            .map_err(|e| FiscalError::Internal(format!("max_age out of range: {e}")))?;
        let ledger = self.db.ledger();

        let mut failed = 0;
        for entry in ledger.list_stale_pending(Utc::now() - max_age).await? {
            match ledger.fail(&entry.id, ABANDONED_MESSAGE, None).await {
                Ok(()) => failed += 1,
                // Settled by its own request since the read.
                Err(DbError::InvalidTransition { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }

        if failed > 0 {
            warn!(count = failed, "Abandoned ledger entries failed");
        }
        Ok(failed)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Standard code lists changed since `since` (everything when `None`).
    pub async fn fetch_codes(&self, since: Option<DateTime<Utc>>) -> FiscalResult<serde_json::Value> {
        self.lookup(Operation::SelectCodes, since).await
    }

    pub async fn fetch_item_classes(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> FiscalResult<serde_json::Value> {
        self.lookup(Operation::SelectItemClasses, since).await
    }

    pub async fn fetch_branches(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> FiscalResult<serde_json::Value> {
        self.lookup(Operation::SelectBranches, since).await
    }

    /// Not ledgered.
    async fn lookup(
        &self,
        operation: Operation,
        since: Option<DateTime<Utc>>,
    ) -> FiscalResult<serde_json::Value> {
        let request = LookupRequest {
            last_req_dt: since
                .map(format_datetime)
                .unwrap_or_else(|| FULL_LOOKUP_SINCE.to_string()),
        };
        let body = serde_json::to_value(&request)?;

        let reply = self.client.send(operation, &body).await.into_result()?;
        Ok(reply.data.unwrap_or(serde_json::Value::Null))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// validate → ledger create → send → ledger advance/fail.
    async fn run(
        &self,
        kind: LedgerKind,
        link: LedgerLink,
        payload: FiscalPayload,
    ) -> FiscalResult<Submission> {
        validate_payload(&payload)?;

        let reference_no = payload.reference_no();
        let body = payload.wire_body()?;
        let ledger_id = self
            .db
            .ledger()
            .create(&NewLedgerEntry {
                kind,
                link,
                reference_no: reference_no.clone(),
                items_data: payload.to_items_data()?,
            })
            .await?;

        debug!(%ledger_id, %kind, %reference_no, "Ledger entry created");
        let outcome = self.client.send(payload.operation(), &body).await;
        self.settle(&ledger_id, reference_no, outcome).await
    }

    /// Records the outcome on the entry and turns it into a result.
    async fn settle(
        &self,
        ledger_id: &str,
        reference_no: String,
        outcome: SendOutcome,
    ) -> FiscalResult<Submission> {
        let details = outcome.failure_details();

        match outcome.into_result() {
            Ok(reply) => {
                self.db
                    .ledger()
                    .advance(ledger_id, LedgerStatus::Success, &reply.to_result())
                    .await?;
                Ok(Submission {
                    ledger_id: ledger_id.to_string(),
                    reference_no,
                    receipt: reply.data,
                })
            }
            Err(e) => {
                self.db
                    .ledger()
                    .fail(ledger_id, &e.to_string(), details.as_ref())
                    .await?;
                Err(e)
            }
        }
    }

    /// The record update that follows an accepted replay.
    async fn write_back(
        &self,
        kind: LedgerKind,
        link: LedgerLink,
        payload: &FiscalPayload,
    ) -> FiscalResult<()> {
        match (link, payload) {
            (LedgerLink::Ingredient(id), FiscalPayload::Item(item)) => {
                self.db
                    .ingredients()
                    .set_fiscal_codes(id, &item.item_cd, &item.item_cls_cd, item.tax_ty_cd)
                    .await?;
            }
            (LedgerLink::Recipe(id), FiscalPayload::Item(item)) => {
                self.db
                    .recipes()
                    .set_fiscal_codes(id, &item.item_cd, &item.item_cls_cd, item.tax_ty_cd)
                    .await?;
            }
            (LedgerLink::SalesOrder(id), FiscalPayload::Sale(sale)) => {
                self.db
                    .sales_orders()
                    .set_invoice_number(id, &sale.invc_no)
                    .await?;
                self.set_status(link, FiscalStatus::Submitted, None).await?;
            }
            (LedgerLink::SupplierOrder(_), FiscalPayload::Purchase(_)) => {
                self.set_status(link, FiscalStatus::Submitted, None).await?;
            }
            // A recipe is whole once every component has an accepted
            // composition, including components that never got as far as
            // the ledger.
            (LedgerLink::Recipe(id), FiscalPayload::Composition(composition)) => {
                if self.fully_composed(id, &composition.item_cd).await? {
                    self.set_status(link, FiscalStatus::Submitted, None).await?;
                }
            }
            // Stock follow-ons: the order is whole again once none are left
            // failing.
            (
                LedgerLink::SalesOrder(_) | LedgerLink::SupplierOrder(_),
                FiscalPayload::Stock(_),
            ) => {
                let outstanding = self
                    .db
                    .ledger()
                    .list_failed(Some(kind))
                    .await?
                    .iter()
                    .any(|e| e.link() == Some(link));
                if !outstanding {
                    self.set_status(link, FiscalStatus::Submitted, None).await?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Whether every component of the recipe has a `success` composition
    /// entry under `recipe_code`.
    async fn fully_composed(&self, recipe_id: i64, recipe_code: &str) -> FiscalResult<bool> {
        let recipe = self
            .db
            .recipes()
            .get_by_id(recipe_id)
            .await?
            .ok_or_else(|| FiscalError::not_found("Recipe", recipe_id))?;
        let ledger = self.db.ledger();

        for component in &recipe.components {
            let Some(code) = existing_code(component.item_code.as_deref()) else {
                return Ok(false);
            };
            let accepted = ledger
                .list_by_reference(&format!("{recipe_code}:{code}"))
                .await?
                .iter()
                .any(|e| e.kind == LedgerKind::ItemComposition && e.status == LedgerStatus::Success);
            if !accepted {
                debug!(recipe_id, component = %component.ingredient_name, "Composition outstanding");
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn set_status(
        &self,
        link: LedgerLink,
        status: FiscalStatus,
        note: Option<&str>,
    ) -> FiscalResult<()> {
        match link {
            LedgerLink::Ingredient(id) => {
                self.db.ingredients().set_fiscal_status(id, status, note).await?
            }
            LedgerLink::Recipe(id) => self.db.recipes().set_fiscal_status(id, status, note).await?,
            LedgerLink::SalesOrder(id) => {
                self.db.sales_orders().set_fiscal_status(id, status, note).await?
            }
            LedgerLink::SupplierOrder(id) => {
                self.db
                    .supplier_orders()
                    .set_fiscal_status(id, status, note)
                    .await?
            }
        }
        Ok(())
    }

    /// Marks the record failed with the error as its note. Best effort: the
    /// caller is already returning `error`.
    async fn note_failure(&self, link: LedgerLink, error: &FiscalError) {
        if let Err(e) = self
            .set_status(link, FiscalStatus::Failed, Some(&error.to_string()))
            .await
        {
            error!(?link, error = %e, "Could not record fiscal failure on record");
        }
    }
}

fn existing_code(code: Option<&str>) -> Option<String> {
    code.map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}
