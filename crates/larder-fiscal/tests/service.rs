//! FiscalService end to end: in-memory SQLite, mock authority over HTTP.

mod common;

use axum::http::StatusCode;
use common::{http_error, ok, reject, service_for, MockAuthority};
use larder_core::builder::build_ingredient_item;
use larder_core::{
    FiscalPayload, FiscalStatus, Ingredient, LedgerKind, LedgerLink, LedgerStatus, Money,
    MovementType, NewLedgerEntry, TaxType,
};
use larder_db::{NewIngredient, NewRecipe, NewSalesOrder, NewSalesOrderLine, NewSupplierOrder, NewSupplierOrderLine};
use larder_fiscal::{FiscalError, FiscalService, FollowUpStep, OperationReport, OutcomeKind};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SALE_PATH: &str = "/trnsSales/saveSales";
const ITEM_PATH: &str = "/items/saveItems";
const STOCK_PATH: &str = "/stock/saveStockItems";
const COMPOSITION_PATH: &str = "/items/saveItemComposition";

async fn add_ingredient(service: &FiscalService, name: &str, unit: &str, cost_cents: i64) -> Ingredient {
    service
        .database()
        .ingredients()
        .insert(&NewIngredient::new(name, unit, cost_cents))
        .await
        .unwrap()
}

/// An ingredient that already holds an item code.
async fn add_registered(
    service: &FiscalService,
    name: &str,
    unit: &str,
    cost_cents: i64,
    item_code: &str,
) -> Ingredient {
    let ingredient = add_ingredient(service, name, unit, cost_cents).await;
    let repo = service.database().ingredients();
    repo.set_fiscal_codes(ingredient.id, item_code, "5020230100", TaxType::Standard)
        .await
        .unwrap();
    repo.get_by_id(ingredient.id).await.unwrap().unwrap()
}

fn amount(body: &serde_json::Value, field: &str) -> f64 {
    body[field].as_f64().unwrap_or_else(|| panic!("{field} missing"))
}

// =============================================================================
// Items
// =============================================================================

#[tokio::test]
async fn test_register_tomato_as_raw_material() {
    let authority = MockAuthority::accepting().await;
    let service = service_for(&authority).await;
    let tomato = add_ingredient(&service, "Tomato", "kg", 250).await;

    let registration = service.register_item(&tomato, None).await.unwrap();

    assert!(registration.item_code.starts_with("KE1NTKG"));
    assert_eq!(registration.item_class_code, "5020230100");
    assert_eq!(registration.tax_type, TaxType::Standard);

    let sent = &authority.requests_to(ITEM_PATH)[0].body;
    assert_eq!(sent["itemCd"], registration.item_code.as_str());
    assert_eq!(sent["itemTyCd"], "1");
    assert_eq!(sent["qtyUnitCd"], "KG");
    assert_eq!(sent["taxTyCd"], "B");
    assert_eq!(sent["orgnNatCd"], "KE");
    assert_eq!(amount(sent, "dftPrc"), 2.5);
    assert_eq!(amount(sent, "grpPrcL5"), 2.5);

    let entry = service
        .database()
        .ledger()
        .get(&registration.ledger_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.kind, LedgerKind::ItemRegistration);
    assert_eq!(entry.status, LedgerStatus::Success);
    assert_eq!(entry.reference_no, registration.item_code);

    // register_item leaves the ingredient row to the caller.
    let stored = service.database().ingredients().get_by_id(tomato.id).await.unwrap().unwrap();
    assert!(stored.item_code.is_none());
}

#[tokio::test]
async fn test_unknown_unit_registers_as_piece_and_price_override_wins() {
    let authority = MockAuthority::accepting().await;
    let service = service_for(&authority).await;
    let sack = add_ingredient(&service, "Maize flour", "sack", 9000).await;

    let registration = service
        .register_item(&sack, Some(Money::from_cents(9900)))
        .await
        .unwrap();

    assert!(registration.item_code.starts_with("KE1NTU"));
    let sent = &authority.requests_to(ITEM_PATH)[0].body;
    assert_eq!(sent["qtyUnitCd"], "U");
    assert_eq!(amount(sent, "dftPrc"), 99.0);
}

#[tokio::test]
async fn test_existing_item_code_is_reused() {
    let authority = MockAuthority::accepting().await;
    let service = service_for(&authority).await;
    let onion = add_registered(&service, "Onion", "kg", 120, "KE1NTKG0000001ABCD").await;

    let registration = service.register_item(&onion, None).await.unwrap();

    assert_eq!(registration.item_code, "KE1NTKG0000001ABCD");
}

#[tokio::test]
async fn test_sync_collects_failures_and_keeps_going() {
    let authority = MockAuthority::start(|_, body| match body["itemNm"].as_str() {
        Some("Salt") | Some("Ghee") => reject("901", "Invalid item class"),
        _ => ok(json!({})),
    })
    .await;
    let service = service_for(&authority).await;
    for name in ["Tomato", "Salt", "Onion", "Ghee", "Rice"] {
        add_ingredient(&service, name, "kg", 100).await;
    }

    let report = service.sync_all_items().await.unwrap();

    assert_eq!(report.synced, 3);
    let failed: Vec<&str> = report.errors.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(failed, vec!["Salt", "Ghee"]);
    assert!(report.errors[0].1.contains("Invalid item class"));

    let remaining = service.database().ingredients().list_unregistered().await.unwrap();
    assert_eq!(remaining.len(), 2);
    assert!(remaining
        .iter()
        .all(|i| i.fiscal_status == FiscalStatus::Failed && i.fiscal_note.is_some()));

    let stats = service.database().ledger().statistics().await.unwrap();
    assert_eq!(stats.total, 5);
    assert_eq!(stats.by_status.get("failed"), Some(&2));
    assert_eq!(stats.by_result_code.get("901"), Some(&2));
}

#[tokio::test]
async fn test_recipe_with_unregistered_component_is_partial() {
    let authority = MockAuthority::accepting().await;
    let service = service_for(&authority).await;
    let beef = add_registered(&service, "Beef", "kg", 800, "KE1NTKG0000002BEEF").await;
    let chilli = add_ingredient(&service, "Chilli", "kg", 300).await;

    let recipes = service.database().recipes();
    let stew = recipes.insert(&NewRecipe::new("Beef stew", 650)).await.unwrap();
    recipes.add_component(stew.id, beef.id, 0.25).await.unwrap();
    recipes.add_component(stew.id, chilli.id, 0.01).await.unwrap();
    let stew = recipes.get_by_id(stew.id).await.unwrap().unwrap();

    let done = service.register_recipe(&stew).await.unwrap();

    assert!(done.registration.item_code.starts_with("KE2NTU"));
    assert_eq!(done.compositions, 1);
    let follow_up = done.follow_up.as_ref().unwrap();
    assert_eq!(follow_up.step, FollowUpStep::Composition);
    assert!(follow_up.message.contains("Chilli"));
    assert_eq!(OperationReport::from(&done).outcome, OutcomeKind::Degraded);

    let stored = recipes.get_by_id(stew.id).await.unwrap().unwrap();
    assert_eq!(stored.item_code.as_deref(), Some(done.registration.item_code.as_str()));
    assert_eq!(stored.fiscal_status, FiscalStatus::Partial);

    let compositions = authority.requests_to("/items/saveItemComposition");
    assert_eq!(compositions.len(), 1);
    assert_eq!(compositions[0].body["cpstItemCd"], "KE1NTKG0000002BEEF");
    assert_eq!(compositions[0].body["cpstQty"], 0.25);
}

#[tokio::test]
async fn test_recipe_stays_partial_while_a_component_was_never_composed() {
    let compositions_online = Arc::new(AtomicBool::new(false));
    let flag = compositions_online.clone();
    let authority = MockAuthority::start(move |path, _| {
        if path == COMPOSITION_PATH && !flag.load(Ordering::SeqCst) {
            reject("999", "Composition service down")
        } else {
            ok(json!({}))
        }
    })
    .await;
    let service = service_for(&authority).await;
    let beef = add_registered(&service, "Beef", "kg", 800, "KE1NTKG0000002BEEF").await;
    let chilli = add_ingredient(&service, "Chilli", "kg", 300).await;

    let recipes = service.database().recipes();
    let stew = recipes.insert(&NewRecipe::new("Beef stew", 650)).await.unwrap();
    recipes.add_component(stew.id, beef.id, 0.25).await.unwrap();
    recipes.add_component(stew.id, chilli.id, 0.01).await.unwrap();
    let stew = recipes.get_by_id(stew.id).await.unwrap().unwrap();

    let done = service.register_recipe(&stew).await.unwrap();
    assert_eq!(done.compositions, 0);

    // Beef's composition goes through on replay; Chilli never had one.
    compositions_online.store(true, Ordering::SeqCst);
    let retried = service
        .retry_failed(Some(LedgerKind::ItemComposition), 3)
        .await
        .unwrap();
    assert_eq!(retried.succeeded, 1);

    let stored = recipes.get_by_id(stew.id).await.unwrap().unwrap();
    assert_eq!(stored.fiscal_status, FiscalStatus::Partial);
    let sent = authority.requests_to(COMPOSITION_PATH);
    assert!(sent.iter().all(|r| r.body["cpstItemCd"] == "KE1NTKG0000002BEEF"));

    // Once Chilli has a code and its composition is accepted, the recipe is whole.
    service.sync_all_items().await.unwrap();
    let stew = recipes.get_by_id(stew.id).await.unwrap().unwrap();
    let again = service.register_recipe(&stew).await.unwrap();
    assert!(again.follow_up.is_none());
    assert_eq!(again.registration.item_code, done.registration.item_code);

    let stored = recipes.get_by_id(stew.id).await.unwrap().unwrap();
    assert_eq!(stored.fiscal_status, FiscalStatus::Submitted);
}

// =============================================================================
// Transactions
// =============================================================================

#[tokio::test]
async fn test_sale_totals_and_receipt() {
    let authority = MockAuthority::start(|_, _| ok(json!({ "rcptNo": 17, "intrlData": "SIG" }))).await;
    let service = service_for(&authority).await;
    let tomato = add_registered(&service, "Tomato", "kg", 250, "KE1NTKG0000001TOMA").await;

    let recipes = service.database().recipes();
    let chapati = recipes.insert(&NewRecipe::new("Chapati", 500)).await.unwrap();
    recipes
        .set_fiscal_codes(chapati.id, "KE2NTU0000003CAFE", "5020230100", TaxType::Standard)
        .await
        .unwrap();

    let orders = service.database().sales_orders();
    let order = orders
        .insert(&NewSalesOrder::cash(vec![
            NewSalesOrderLine::recipe(chapati.id, "Chapati", 2.0, 500),
            NewSalesOrderLine::ingredient(tomato.id, "Tomato", "kg", 1.2, 250),
        ]))
        .await
        .unwrap();

    let submission = service.send_sale(&order).await.unwrap();

    assert_eq!(submission.reference_no, order.id.to_string());
    assert_eq!(submission.receipt.as_ref().unwrap()["intrlData"], "SIG");

    let body = &authority.requests_to(SALE_PATH)[0].body;
    assert_eq!(body["invcNo"], order.id.to_string());
    assert_eq!(amount(body, "totTaxblAmt"), 13.0);
    assert_eq!(amount(body, "totTaxAmt"), 2.08);
    assert_eq!(amount(body, "totAmt"), 15.08);
    assert_eq!(amount(body, "taxblAmtB"), 13.0);
    assert_eq!(amount(body, "taxRtB"), 16.0);
    assert_eq!(body["totItemCnt"], 2);
    assert_eq!(body["itemList"][1]["qtyUnitCd"], "KG");
    assert_eq!(body["receipt"]["trdeNm"], "Mama's Kitchen");
    assert_eq!(body["receipt"]["topMsg"], "Karibu");

    let stored = orders.get_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(stored.invoice_number.as_deref(), Some(order.id.to_string().as_str()));
    assert_eq!(stored.fiscal_status, FiscalStatus::Submitted);
}

#[tokio::test]
async fn test_invalid_sale_never_reaches_the_authority() {
    let authority = MockAuthority::accepting().await;
    let service = service_for(&authority).await;
    let garlic = add_ingredient(&service, "Garlic", "kg", 400).await;

    let order = service
        .database()
        .sales_orders()
        .insert(&NewSalesOrder::cash(vec![NewSalesOrderLine::ingredient(
            garlic.id, "Garlic", "kg", 1.0, 400,
        )]))
        .await
        .unwrap();

    let err = service.send_sale(&order).await.unwrap_err();

    assert!(matches!(err, FiscalError::Validation(_)));
    assert_eq!(OperationReport::from(&err).outcome, OutcomeKind::Invalid);
    assert!(authority.requests().is_empty());
    assert_eq!(service.database().ledger().statistics().await.unwrap().total, 0);
}

#[tokio::test]
async fn test_rejected_sale_is_ledgered_with_authority_code() {
    let authority = MockAuthority::start(|_, _| reject("910", "Request parameter error")).await;
    let service = service_for(&authority).await;
    let tomato = add_registered(&service, "Tomato", "kg", 250, "KE1NTKG0000001TOMA").await;

    let orders = service.database().sales_orders();
    let order = orders
        .insert(&NewSalesOrder::cash(vec![NewSalesOrderLine::ingredient(
            tomato.id, "Tomato", "kg", 1.0, 250,
        )]))
        .await
        .unwrap();

    let err = service.send_sale(&order).await.unwrap_err();

    assert!(matches!(err, FiscalError::Rejected { ref code, .. } if code == "910"));
    assert_eq!(authority.requests().len(), 1);

    let failed = service.database().ledger().list_failed(Some(LedgerKind::Sale)).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].result_code.as_deref(), Some("910"));
    assert_eq!(failed[0].result_message.as_deref(), Some("Request parameter error"));

    let stored = orders.get_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(stored.fiscal_status, FiscalStatus::Failed);
}

#[tokio::test]
async fn test_replayed_sale_reuses_stored_payload() {
    let online = Arc::new(AtomicBool::new(false));
    let flag = online.clone();
    let authority = MockAuthority::start(move |_, _| {
        if flag.load(Ordering::SeqCst) {
            ok(json!({ "rcptNo": 5 }))
        } else {
            http_error(StatusCode::SERVICE_UNAVAILABLE)
        }
    })
    .await;
    let service = service_for(&authority).await;
    let tomato = add_registered(&service, "Tomato", "kg", 250, "KE1NTKG0000001TOMA").await;

    let orders = service.database().sales_orders();
    let order = orders
        .insert(&NewSalesOrder::cash(vec![NewSalesOrderLine::ingredient(
            tomato.id, "Tomato", "kg", 2.0, 250,
        )]))
        .await
        .unwrap();

    let err = service.send_sale(&order).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(authority.requests_to(SALE_PATH).len(), 3);

    let ledger = service.database().ledger();
    let entry = ledger.list_failed(Some(LedgerKind::Sale)).await.unwrap().remove(0);
    assert_eq!(entry.result_code.as_deref(), Some("NETWORK_ERROR"));

    online.store(true, Ordering::SeqCst);
    let submission = service.retry_entry(&entry.id).await.unwrap();
    assert_eq!(submission.ledger_id, entry.id);

    let sales = authority.requests_to(SALE_PATH);
    assert_eq!(sales.len(), 4);
    assert_eq!(sales[3].body, sales[0].body);
    assert_eq!(sales[3].body["invcNo"], order.id.to_string());

    let entry = ledger.get(&entry.id).await.unwrap().unwrap();
    assert_eq!(entry.status, LedgerStatus::Success);
    assert_eq!(entry.retry_count, 1);
    assert!(entry.last_retry_at.is_some());

    let stored = orders.get_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(stored.fiscal_status, FiscalStatus::Submitted);
    assert_eq!(stored.invoice_number.as_deref(), Some(order.id.to_string().as_str()));

    // Success is final.
    let err = service.retry_entry(&entry.id).await.unwrap_err();
    assert!(matches!(err, FiscalError::Database(_)));
}

#[tokio::test]
async fn test_purchase_spreads_invoice_vat() {
    let authority = MockAuthority::accepting().await;
    let service = service_for(&authority).await;
    let flour = add_registered(&service, "Flour", "kg", 150, "KE1NTKG0000004F10A").await;
    let oil = add_registered(&service, "Oil", "l", 300, "KE1NTL0000005D11B").await;
    let sugar = add_registered(&service, "Sugar", "kg", 200, "KE1NTKG0000006C00D").await;

    let order = service
        .database()
        .supplier_orders()
        .insert(&NewSupplierOrder {
            supplier_name: "Wholesale Ltd".to_string(),
            supplier_tin: Some("P000111222Z".to_string()),
            invoice_number: Some("INV-7781".to_string()),
            vat_cents: 40,
            lines: vec![
                NewSupplierOrderLine::new(flour.id, 10.0, 150),
                NewSupplierOrderLine::new(oil.id, 2.0, 300),
                NewSupplierOrderLine::new(sugar.id, 5.0, 200),
            ],
        })
        .await
        .unwrap();

    service.send_purchase(&order).await.unwrap();

    let body = &authority.requests_to("/trnsPurchase/savePurchases")[0].body;
    assert_eq!(body["invcNo"], order.id.to_string());
    assert_eq!(body["spplrInvcNo"], "INV-7781");
    let line_tax: Vec<f64> = body["itemList"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["taxAmt"].as_f64().unwrap())
        .collect();
    assert_eq!(line_tax, vec![0.14, 0.13, 0.13]);
    assert_eq!(amount(body, "totTaxAmt"), 0.4);
    assert_eq!(amount(body, "totTaxblAmt"), 31.0);
}

#[tokio::test]
async fn test_stock_failure_after_sale_is_degraded_until_retried() {
    let stock_online = Arc::new(AtomicBool::new(false));
    let flag = stock_online.clone();
    let authority = MockAuthority::start(move |path, _| {
        if path == STOCK_PATH && !flag.load(Ordering::SeqCst) {
            reject("999", "Stock service down")
        } else {
            ok(json!({}))
        }
    })
    .await;
    let service = service_for(&authority).await;
    let tomato = add_registered(&service, "Tomato", "kg", 250, "KE1NTKG0000001TOMA").await;

    let orders = service.database().sales_orders();
    let order = orders
        .insert(&NewSalesOrder::cash(vec![NewSalesOrderLine::ingredient(
            tomato.id, "Tomato", "kg", 3.0, 250,
        )]))
        .await
        .unwrap();

    let done = service.complete_sale(&order).await.unwrap();

    assert!(done.is_degraded());
    assert!(done.stock.is_none());
    assert_eq!(done.follow_up.as_ref().unwrap().step, FollowUpStep::StockOut);
    let report = OperationReport::from(&done);
    assert_eq!(report.outcome, OutcomeKind::Degraded);
    assert_eq!(report.ledger_id.as_deref(), Some(done.submission.ledger_id.as_str()));

    let stored = orders.get_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(stored.fiscal_status, FiscalStatus::Partial);
    assert!(stored.fiscal_note.unwrap().starts_with("stock_out failed"));

    let stock = authority.requests_to(STOCK_PATH);
    assert_eq!(stock[0].body["sarTyCd"], "11");

    stock_online.store(true, Ordering::SeqCst);
    let retried = service.retry_failed(Some(LedgerKind::StockOut), 3).await.unwrap();
    assert_eq!(retried.succeeded, 1);

    let stored = orders.get_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(stored.fiscal_status, FiscalStatus::Submitted);
}

#[tokio::test]
async fn test_stock_movements_get_distinct_numbers() {
    let authority = MockAuthority::accepting().await;
    let service = service_for(&authority).await;
    let rice = add_registered(&service, "Rice", "kg", 180, "KE1NTKG0000007AAAA").await;

    let lines = vec![larder_core::StockLine {
        name: rice.name.clone(),
        item_code: rice.item_code.clone().unwrap(),
        item_class_code: None,
        unit: rice.quantity_unit(),
        packaging: rice.packaging_unit(),
        quantity: 4.0,
        unit_cost: rice.cost(),
        tax_type: TaxType::Standard,
    }];

    let first = service
        .send_stock_movement(&lines, MovementType::In, LedgerLink::Ingredient(rice.id))
        .await
        .unwrap();
    let second = service
        .send_stock_movement(&lines, MovementType::Out, LedgerLink::Ingredient(rice.id))
        .await
        .unwrap();

    let first_no: u64 = first.reference_no.parse().unwrap();
    let second_no: u64 = second.reference_no.parse().unwrap();
    assert!(second_no > first_no);

    let stock = authority.requests_to(STOCK_PATH);
    assert_eq!(stock[0].body["sarTyCd"], "06");
    assert_eq!(stock[1].body["sarTyCd"], "16");
    assert_eq!(amount(&stock[0].body, "totTaxblAmt"), 7.2);
}

// =============================================================================
// Reconciliation & Lookups
// =============================================================================

#[tokio::test]
async fn test_abandoned_entry_is_failed_then_replayed() {
    let authority = MockAuthority::accepting().await;
    let service = service_for(&authority).await;
    let salt = add_ingredient(&service, "Salt", "kg", 60).await;

    // A request that never came back: the entry stays pending.
    let payload = FiscalPayload::Item(build_ingredient_item(
        &service.config().context(),
        &salt,
        None,
        "KE1NTKG0000008BEEF",
    ));
    let ledger = service.database().ledger();
    let id = ledger
        .create(&NewLedgerEntry {
            kind: LedgerKind::ItemRegistration,
            link: LedgerLink::Ingredient(salt.id),
            reference_no: payload.reference_no(),
            items_data: payload.to_items_data().unwrap(),
        })
        .await
        .unwrap();

    assert_eq!(service.reconcile_abandoned(Duration::from_secs(3600)).await.unwrap(), 0);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(service.reconcile_abandoned(Duration::from_millis(1)).await.unwrap(), 1);

    let entry = ledger.get(&id).await.unwrap().unwrap();
    assert_eq!(entry.status, LedgerStatus::Failed);
    assert_eq!(entry.error_message.as_deref(), Some("abandoned in flight"));

    // Retry limit 0 leaves it alone.
    let skipped = service.retry_failed(None, 0).await.unwrap();
    assert_eq!(skipped.skipped, 1);
    assert!(authority.requests().is_empty());

    let retried = service.retry_failed(None, 3).await.unwrap();
    assert_eq!(retried.succeeded, 1);
    assert!(retried.failed.is_empty());

    let stored = service.database().ingredients().get_by_id(salt.id).await.unwrap().unwrap();
    assert_eq!(stored.item_code.as_deref(), Some("KE1NTKG0000008BEEF"));
    assert_eq!(stored.fiscal_status, FiscalStatus::Submitted);
}

#[tokio::test]
async fn test_lookups_are_not_ledgered() {
    let authority = MockAuthority::start(|path, _| match path {
        "/code/selectCodes" => ok(json!({ "clsList": [{ "cdCls": "04" }] })),
        _ => reject("001", "There is no search result"),
    })
    .await;
    let service = service_for(&authority).await;

    let codes = service.fetch_codes(None).await.unwrap();
    assert_eq!(codes["clsList"][0]["cdCls"], "04");
    assert_eq!(authority.requests()[0].body, json!({ "lastReqDt": "20000101000000" }));

    let err = service.fetch_branches(None).await.unwrap_err();
    assert!(matches!(err, FiscalError::Rejected { ref code, .. } if code == "001"));

    assert_eq!(service.database().ledger().statistics().await.unwrap().total, 0);
}
