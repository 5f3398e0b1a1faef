//! # Ledger Repository
//!
//! Durable record of every fiscal operation attempted.
//!
//! ## Transition Guard
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  advance(id, success, result)                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UPDATE fiscal_ledger SET status = 'success', ...                      │
//! │  WHERE id = ? AND status = 'pending'      ← success.predecessor()      │
//! │       │                                                                 │
//! │       ├── 1 row  → done                                                 │
//! │       └── 0 rows → get(id)                                              │
//! │                      ├── None     → NotFound                            │
//! │                      └── Some(e)  → InvalidTransition { e.status → to } │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The check and the write are one statement, so two writers racing on an
//! entry cannot both win.
//!
//! Rows are never deleted.

use chrono::{DateTime, Utc};
use larder_core::{
    AuthorityResult, FailureDetails, LedgerEntry, LedgerKind, LedgerStatistics, LedgerStatus,
    NewLedgerEntry,
};
use sqlx::sqlite::SqliteQueryResult;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

const SELECT_ENTRY: &str = r#"
    SELECT
        id, kind, ingredient_id, recipe_id, sales_order_id, supplier_order_id,
        reference_no, items_data, result_code, result_message, receipt_data,
        status, retry_count, last_retry_at, error_message, error_details,
        created_at, updated_at
    FROM fiscal_ledger
"#;

/// Repository for the fiscal transaction ledger.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Records an attempt before it is sent. Returns the new entry's id.
    ///
    /// ## Errors
    /// - `InvalidLink` when the kind cannot point at the linked record
    /// - `ForeignKeyViolation` when the linked record does not exist
    pub async fn create(&self, entry: &NewLedgerEntry) -> DbResult<String> {
        if !entry.kind.allows(&entry.link) {
            return Err(DbError::InvalidLink {
                kind: entry.kind,
                link: entry.link,
            });
        }

        let id = Uuid::new_v4().to_string();
        let (ingredient_id, recipe_id, sales_order_id, supplier_order_id) = entry.link.columns();

        sqlx::query(
            r#"
            INSERT INTO fiscal_ledger (
                id, kind, ingredient_id, recipe_id, sales_order_id, supplier_order_id,
                reference_no, items_data, status, retry_count, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10, ?10)
            "#,
        )
        .bind(&id)
        .bind(entry.kind)
        .bind(ingredient_id)
        .bind(recipe_id)
        .bind(sales_order_id)
        .bind(supplier_order_id)
        .bind(&entry.reference_no)
        .bind(&entry.items_data)
        .bind(LedgerStatus::Pending)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(
            ledger_id = %id,
            kind = %entry.kind,
            reference_no = %entry.reference_no,
            "Ledger entry created"
        );

        Ok(id)
    }

    /// Moves an entry to `status` and stores the authority's answer.
    ///
    /// Fields of `result` that are `None` leave the stored value alone.
    pub async fn advance(
        &self,
        id: &str,
        status: LedgerStatus,
        result: &AuthorityResult,
    ) -> DbResult<()> {
        let receipt_data = result
            .receipt
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let updated = sqlx::query(
            r#"
            UPDATE fiscal_ledger SET
                status = ?2,
                result_code = COALESCE(?3, result_code),
                result_message = COALESCE(?4, result_message),
                receipt_data = COALESCE(?5, receipt_data),
                updated_at = ?6
            WHERE id = ?1 AND status = ?7
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(&result.code)
        .bind(&result.message)
        .bind(receipt_data)
        .bind(Utc::now())
        .bind(status.predecessor())
        .execute(&self.pool)
        .await?;

        self.guard(updated, id, status).await?;
        debug!(ledger_id = %id, %status, result_code = ?result.code, "Ledger entry advanced");
        Ok(())
    }

    /// Marks a pending entry failed.
    ///
    /// An authority code and message in `details` are copied onto the
    /// entry; the whole of `details` is kept as JSON.
    pub async fn fail(
        &self,
        id: &str,
        message: &str,
        details: Option<&FailureDetails>,
    ) -> DbResult<()> {
        let error_details = details.map(serde_json::to_string).transpose()?;
        let result_code = details.and_then(|d| d.result_code.as_deref());
        let result_message = details.and_then(|d| d.result_message.as_deref());

        let updated = sqlx::query(
            r#"
            UPDATE fiscal_ledger SET
                status = ?2,
                error_message = ?3,
                error_details = ?4,
                result_code = COALESCE(?5, result_code),
                result_message = COALESCE(?6, result_message),
                updated_at = ?7
            WHERE id = ?1 AND status = ?8
            "#,
        )
        .bind(id)
        .bind(LedgerStatus::Failed)
        .bind(message)
        .bind(error_details)
        .bind(result_code)
        .bind(result_message)
        .bind(Utc::now())
        .bind(LedgerStatus::Failed.predecessor())
        .execute(&self.pool)
        .await?;

        self.guard(updated, id, LedgerStatus::Failed).await?;
        warn!(ledger_id = %id, result_code = ?result_code, error = %message, "Ledger entry failed");
        Ok(())
    }

    /// `failed → retry`. Counts the attempt.
    pub async fn mark_retry(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let updated = sqlx::query(
            r#"
            UPDATE fiscal_ledger SET
                status = ?2,
                retry_count = retry_count + 1,
                last_retry_at = ?3,
                updated_at = ?3
            WHERE id = ?1 AND status = ?4
            "#,
        )
        .bind(id)
        .bind(LedgerStatus::Retry)
        .bind(now)
        .bind(LedgerStatus::Retry.predecessor())
        .execute(&self.pool)
        .await?;

        self.guard(updated, id, LedgerStatus::Retry).await?;
        info!(ledger_id = %id, "Ledger entry marked for retry");
        Ok(())
    }

    /// `retry → pending`, just before the stored payload is sent again.
    pub async fn resubmit(&self, id: &str) -> DbResult<()> {
        let updated = sqlx::query(
            "UPDATE fiscal_ledger SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status = ?4",
        )
        .bind(id)
        .bind(LedgerStatus::Pending)
        .bind(Utc::now())
        .bind(LedgerStatus::Pending.predecessor())
        .execute(&self.pool)
        .await?;

        self.guard(updated, id, LedgerStatus::Pending).await
    }

    /// Explains a guarded update that touched nothing.
    async fn guard(&self, updated: SqliteQueryResult, id: &str, to: LedgerStatus) -> DbResult<()> {
        if updated.rows_affected() > 0 {
            return Ok(());
        }

        match self.get(id).await? {
            None => Err(DbError::not_found("LedgerEntry", id)),
            Some(entry) => Err(DbError::InvalidTransition {
                id: id.to_string(),
                from: entry.status,
                to,
            }),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get(&self, id: &str) -> DbResult<Option<LedgerEntry>> {
        let entry = sqlx::query_as::<_, LedgerEntry>(&format!("{SELECT_ENTRY} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(entry)
    }

    /// Failed entries, oldest first, optionally of one kind.
    pub async fn list_failed(&self, kind: Option<LedgerKind>) -> DbResult<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            "{SELECT_ENTRY} WHERE status = ?1 AND (?2 IS NULL OR kind = ?2) ORDER BY created_at"
        ))
        .bind(LedgerStatus::Failed)
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Pending entries created before `cutoff`. A live request never stays
    /// pending that long, so these were abandoned in flight.
    pub async fn list_stale_pending(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            "{SELECT_ENTRY} WHERE status = ?1 AND created_at < ?2 ORDER BY created_at"
        ))
        .bind(LedgerStatus::Pending)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Every entry for one reference number, oldest first.
    pub async fn list_by_reference(&self, reference_no: &str) -> DbResult<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            "{SELECT_ENTRY} WHERE reference_no = ?1 ORDER BY created_at"
        ))
        .bind(reference_no)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Counts by kind, status and result code.
    pub async fn statistics(&self) -> DbResult<LedgerStatistics> {
        let by_kind = self
            .grouped("SELECT kind, COUNT(*) FROM fiscal_ledger GROUP BY kind")
            .await?;
        let by_status = self
            .grouped("SELECT status, COUNT(*) FROM fiscal_ledger GROUP BY status")
            .await?;
        let by_result_code = self
            .grouped(
                "SELECT result_code, COUNT(*) FROM fiscal_ledger \
                 WHERE result_code IS NOT NULL GROUP BY result_code",
            )
            .await?;

        let total: i64 = by_status.values().sum();
        let success = by_status
            .get(LedgerStatus::Success.as_str())
            .copied()
            .unwrap_or(0);
        let success_rate = if total == 0 {
            0.0
        } else {
            success as f64 / total as f64
        };

        Ok(LedgerStatistics {
            total,
            by_kind,
            by_status,
            by_result_code,
            success_rate,
        })
    }

    async fn grouped(&self, sql: &str) -> DbResult<BTreeMap<String, i64>> {
        let rows = sqlx::query_as::<_, (String, i64)>(sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::ingredient::NewIngredient;
    use crate::{Database, DbConfig};
    use larder_core::LedgerLink;

    async fn setup() -> (Database, i64) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tomato = db
            .ingredients()
            .insert(&NewIngredient::new("Tomato", "kg", 250))
            .await
            .unwrap();
        (db, tomato.id)
    }

    fn registration(ingredient_id: i64) -> NewLedgerEntry {
        NewLedgerEntry {
            kind: LedgerKind::ItemRegistration,
            link: LedgerLink::Ingredient(ingredient_id),
            reference_no: "KE1NTKG0000001AAAA".to_string(),
            items_data: r#"{"operation":"item","payload":{}}"#.to_string(),
        }
    }

    fn rejected(code: &str) -> FailureDetails {
        FailureDetails {
            result_code: Some(code.to_string()),
            result_message: Some("Invalid item".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_starts_pending() {
        let (db, tomato) = setup().await;
        let ledger = db.ledger();

        let id = ledger.create(&registration(tomato)).await.unwrap();
        let entry = ledger.get(&id).await.unwrap().unwrap();

        assert_eq!(entry.status, LedgerStatus::Pending);
        assert_eq!(entry.kind, LedgerKind::ItemRegistration);
        assert_eq!(entry.link(), Some(LedgerLink::Ingredient(tomato)));
        assert_eq!(entry.retry_count, 0);
        assert!(entry.result_code.is_none());
        assert!(Uuid::parse_str(&entry.id).is_ok());
    }

    #[tokio::test]
    async fn test_create_rejects_link_not_allowed_for_kind() {
        let (db, tomato) = setup().await;
        let entry = NewLedgerEntry {
            kind: LedgerKind::Sale,
            ..registration(tomato)
        };

        let err = db.ledger().create(&entry).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidLink { .. }));
    }

    #[tokio::test]
    async fn test_advance_stores_receipt() {
        let (db, tomato) = setup().await;
        let ledger = db.ledger();
        let id = ledger.create(&registration(tomato)).await.unwrap();

        let result = AuthorityResult {
            code: Some("000".to_string()),
            message: Some("It is succeeded".to_string()),
            receipt: Some(serde_json::json!({ "rcptNo": 17 })),
        };
        ledger.advance(&id, LedgerStatus::Success, &result).await.unwrap();

        let entry = ledger.get(&id).await.unwrap().unwrap();
        assert_eq!(entry.status, LedgerStatus::Success);
        assert_eq!(entry.result_code.as_deref(), Some("000"));
        let receipt: serde_json::Value =
            serde_json::from_str(entry.receipt_data.as_deref().unwrap()).unwrap();
        assert_eq!(receipt["rcptNo"], 17);
    }

    #[tokio::test]
    async fn test_success_is_final() {
        let (db, tomato) = setup().await;
        let ledger = db.ledger();
        let id = ledger.create(&registration(tomato)).await.unwrap();
        ledger
            .advance(&id, LedgerStatus::Success, &AuthorityResult::default())
            .await
            .unwrap();

        let err = ledger.fail(&id, "late failure", None).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::InvalidTransition {
                from: LedgerStatus::Success,
                to: LedgerStatus::Failed,
                ..
            }
        ));

        let err = ledger.mark_retry(&id).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidTransition { .. }));

        let entry = ledger.get(&id).await.unwrap().unwrap();
        assert_eq!(entry.status, LedgerStatus::Success);
    }

    #[tokio::test]
    async fn test_pending_cannot_be_marked_for_retry() {
        let (db, tomato) = setup().await;
        let ledger = db.ledger();
        let id = ledger.create(&registration(tomato)).await.unwrap();

        let err = ledger.mark_retry(&id).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::InvalidTransition {
                from: LedgerStatus::Pending,
                to: LedgerStatus::Retry,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_full_retry_cycle() {
        let (db, tomato) = setup().await;
        let ledger = db.ledger();
        let id = ledger.create(&registration(tomato)).await.unwrap();

        ledger
            .fail(&id, "Invalid item", Some(&rejected("E11")))
            .await
            .unwrap();
        let entry = ledger.get(&id).await.unwrap().unwrap();
        assert_eq!(entry.status, LedgerStatus::Failed);
        assert_eq!(entry.result_code.as_deref(), Some("E11"));
        assert_eq!(entry.error_message.as_deref(), Some("Invalid item"));
        let details: FailureDetails =
            serde_json::from_str(entry.error_details.as_deref().unwrap()).unwrap();
        assert_eq!(details, rejected("E11"));

        ledger.mark_retry(&id).await.unwrap();
        ledger.resubmit(&id).await.unwrap();
        ledger
            .advance(
                &id,
                LedgerStatus::Success,
                &AuthorityResult {
                    code: Some("000".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let entry = ledger.get(&id).await.unwrap().unwrap();
        assert_eq!(entry.status, LedgerStatus::Success);
        assert_eq!(entry.retry_count, 1);
        assert!(entry.last_retry_at.is_some());
        assert_eq!(entry.result_code.as_deref(), Some("000"));
    }

    #[tokio::test]
    async fn test_unknown_entry() {
        let (db, _) = setup().await;
        let err = db.ledger().mark_retry("no-such-id").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_failed_by_kind() {
        let (db, tomato) = setup().await;
        let ledger = db.ledger();

        let a = ledger.create(&registration(tomato)).await.unwrap();
        let b = ledger
            .create(&NewLedgerEntry {
                kind: LedgerKind::StockIn,
                ..registration(tomato)
            })
            .await
            .unwrap();
        ledger.fail(&a, "timeout", None).await.unwrap();
        ledger.fail(&b, "timeout", None).await.unwrap();

        assert_eq!(ledger.list_failed(None).await.unwrap().len(), 2);
        let stock = ledger.list_failed(Some(LedgerKind::StockIn)).await.unwrap();
        assert_eq!(stock.len(), 1);
        assert_eq!(stock[0].id, b);
    }

    #[tokio::test]
    async fn test_list_stale_pending() {
        let (db, tomato) = setup().await;
        let ledger = db.ledger();
        let id = ledger.create(&registration(tomato)).await.unwrap();

        let past = Utc::now() - chrono::Duration::hours(1);
        assert!(ledger.list_stale_pending(past).await.unwrap().is_empty());

        let future = Utc::now() + chrono::Duration::seconds(5);
        let stale = ledger.list_stale_pending(future).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, id);
    }

    #[tokio::test]
    async fn test_statistics() {
        let (db, tomato) = setup().await;
        let ledger = db.ledger();

        let empty = ledger.statistics().await.unwrap();
        assert_eq!(empty.total, 0);
        assert_eq!(empty.success_rate, 0.0);

        for _ in 0..3 {
            let id = ledger.create(&registration(tomato)).await.unwrap();
            ledger
                .advance(
                    &id,
                    LedgerStatus::Success,
                    &AuthorityResult {
                        code: Some("000".to_string()),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
        let failed = ledger.create(&registration(tomato)).await.unwrap();
        ledger.fail(&failed, "rejected", Some(&rejected("E11"))).await.unwrap();

        let stats = ledger.statistics().await.unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_kind["item_registration"], 4);
        assert_eq!(stats.by_status["success"], 3);
        assert_eq!(stats.by_status["failed"], 1);
        assert_eq!(stats.by_result_code["000"], 3);
        assert_eq!(stats.by_result_code["E11"], 1);
        assert!((stats.success_rate - 0.75).abs() < f64::EPSILON);
    }
}
