//! Integration tests for the ledger mutation engine.
//!
//! Each test runs against an isolated in-memory SQLite database with the
//! full migration set applied.

use bahi_db::{Database, DbConfig, DbError};

use bahi_core::{
    CoreError, Party, PartyRole, PaymentMethod, Product, SyncStatus, Transaction,
    TransactionDetail, TransactionType, Warehouse,
};

const BIZ: &str = "BIZ1";

async fn setup() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

/// Seeds a vendor, customer, payment method, warehouse and one product.
/// Returns (vendor_slug, customer_slug, method_slug, warehouse_slug,
/// product_slug).
async fn seed(db: &Database) -> (String, String, String, String, String) {
    let vendor = Party::new(BIZ, "Karachi Wholesalers", PartyRole::Vendor);
    let customer = Party::new(BIZ, "Ali Traders", PartyRole::Customer);
    let method = PaymentMethod::new(BIZ, "Cash Drawer");
    let warehouse = Warehouse::new(BIZ, "Main Store");
    let product = Product::new(BIZ, "Flour 1kg");

    db.parties().insert(&vendor).await.unwrap();
    db.parties().insert(&customer).await.unwrap();
    db.payment_methods().insert(&method).await.unwrap();
    db.warehouses().insert(&warehouse).await.unwrap();
    db.products().insert(&product).await.unwrap();

    (
        vendor.slug,
        customer.slug,
        method.slug,
        warehouse.slug,
        product.slug,
    )
}

fn purchase(
    vendor: &str,
    method: &str,
    warehouse: &str,
    product: &str,
    qty: f64,
    price: f64,
) -> Transaction {
    let mut tx = Transaction::new(BIZ, TransactionType::Purchase);
    tx.party_slug = Some(vendor.to_string());
    tx.to_payment_method_slug = Some(method.to_string());
    tx.warehouse_slug = Some(warehouse.to_string());
    tx.total_paid = qty * price;
    tx.details
        .push(TransactionDetail::new(BIZ, &tx.slug, product, qty, price));
    tx
}

fn sale(
    customer: &str,
    method: &str,
    warehouse: &str,
    product: &str,
    qty: f64,
    price: f64,
    paid: f64,
) -> Transaction {
    let mut tx = Transaction::new(BIZ, TransactionType::Sale);
    tx.party_slug = Some(customer.to_string());
    tx.to_payment_method_slug = Some(method.to_string());
    tx.warehouse_slug = Some(warehouse.to_string());
    tx.total_paid = paid;
    tx.details
        .push(TransactionDetail::new(BIZ, &tx.slug, product, qty, price));
    tx
}

async fn stock_of(db: &Database, product: &str, warehouse: &str) -> f64 {
    db.products()
        .get_stock(product, warehouse)
        .await
        .unwrap()
        .map(|s| s.current_quantity)
        .unwrap_or(0.0)
}

async fn balance_of(db: &Database, party: &str) -> f64 {
    db.parties().get_by_slug(party).await.unwrap().unwrap().balance
}

async fn amount_of(db: &Database, method: &str) -> f64 {
    db.payment_methods()
        .get_by_slug(method)
        .await
        .unwrap()
        .unwrap()
        .amount
}

async fn avg_price_of(db: &Database, product: &str) -> f64 {
    db.products()
        .get_by_slug(product)
        .await
        .unwrap()
        .unwrap()
        .avg_purchase_price
}

// =============================================================================
// Commit
// =============================================================================

#[tokio::test]
async fn partially_paid_sale_splits_credit_and_cash() {
    let db = setup().await;
    let (vendor, customer, method, warehouse, product) = seed(&db).await;

    // Stock up first: 10 units at 20.
    db.ledger()
        .commit(purchase(&vendor, &method, &warehouse, &product, 10.0, 20.0))
        .await
        .unwrap();
    let cash_after_purchase = amount_of(&db, &method).await;

    // Sell 5 at 20 (grand total 100), customer pays 60.
    let tx = sale(&customer, &method, &warehouse, &product, 5.0, 20.0, 60.0);
    let committed = db.ledger().commit(tx).await.unwrap();

    assert_eq!(committed.grand_total, 100.0);
    assert_eq!(balance_of(&db, &customer).await, -40.0);
    assert_eq!(amount_of(&db, &method).await, cash_after_purchase + 60.0);
    assert_eq!(stock_of(&db, &product, &warehouse).await, 5.0);
}

#[tokio::test]
async fn purchase_moves_cash_out_and_credit_to_vendor() {
    let db = setup().await;
    let (vendor, _, method, warehouse, product) = seed(&db).await;

    let mut tx = purchase(&vendor, &method, &warehouse, &product, 10.0, 20.0);
    tx.total_paid = 50.0; // grand total 200, 150 owed

    db.ledger().commit(tx).await.unwrap();

    assert_eq!(balance_of(&db, &vendor).await, 150.0);
    assert_eq!(amount_of(&db, &method).await, -50.0);
    assert_eq!(stock_of(&db, &product, &warehouse).await, 10.0);
}

#[tokio::test]
async fn commit_marks_touched_rows_dirty() {
    let db = setup().await;
    let (vendor, _, method, warehouse, product) = seed(&db).await;

    // Pretend a sync cycle already acknowledged the seed rows.
    let mut synced_vendor = db.parties().get_by_slug(&vendor).await.unwrap().unwrap();
    synced_vendor.sync_status = SyncStatus::Synced;
    db.parties().upsert_remote(&synced_vendor).await.unwrap();

    db.ledger()
        .commit(purchase(&vendor, &method, &warehouse, &product, 5.0, 20.0))
        .await
        .unwrap();

    let vendor_row = db.parties().get_by_slug(&vendor).await.unwrap().unwrap();
    assert_eq!(vendor_row.sync_status, SyncStatus::Dirty);
}

#[tokio::test]
async fn unknown_party_aborts_the_whole_commit() {
    let db = setup().await;
    let (_, _, method, warehouse, product) = seed(&db).await;

    // Fully on credit, so the vendor balance must move and the missing
    // party row surfaces as an error.
    let mut tx = purchase("NOPE", &method, &warehouse, &product, 5.0, 20.0);
    tx.total_paid = 0.0;
    let err = db.ledger().commit(tx).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound { .. }));

    // Nothing was written: no stock, no cash movement, no header.
    assert_eq!(stock_of(&db, &product, &warehouse).await, 0.0);
    assert_eq!(amount_of(&db, &method).await, 0.0);
}

// =============================================================================
// Stock Validation
// =============================================================================

#[tokio::test]
async fn oversell_is_rejected_with_shortfall() {
    let db = setup().await;
    let (vendor, customer, method, warehouse, product) = seed(&db).await;

    db.ledger()
        .commit(purchase(&vendor, &method, &warehouse, &product, 10.0, 20.0))
        .await
        .unwrap();
    let cash_before = amount_of(&db, &method).await;

    // Selling 11 against 10 on hand fails with exact numbers.
    let err = db
        .ledger()
        .commit(sale(&customer, &method, &warehouse, &product, 11.0, 20.0, 0.0))
        .await
        .unwrap_err();
    match err {
        DbError::Core(CoreError::InsufficientStock {
            available,
            required,
            shortfall,
            ..
        }) => {
            assert_eq!(available, 10.0);
            assert_eq!(required, 11.0);
            assert_eq!(shortfall, 1.0);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    // The rejected commit changed nothing.
    assert_eq!(stock_of(&db, &product, &warehouse).await, 10.0);
    assert_eq!(balance_of(&db, &customer).await, 0.0);
    assert_eq!(amount_of(&db, &method).await, cash_before);

    // Selling 9 passes.
    db.ledger()
        .commit(sale(&customer, &method, &warehouse, &product, 9.0, 20.0, 0.0))
        .await
        .unwrap();
    assert_eq!(stock_of(&db, &product, &warehouse).await, 1.0);
}

#[tokio::test]
async fn service_products_sell_without_stock() {
    let db = setup().await;
    let (_, customer, method, warehouse, _) = seed(&db).await;

    let mut service = Product::new(BIZ, "Delivery Charge");
    service.is_service = true;
    db.products().insert(&service).await.unwrap();

    db.ledger()
        .commit(sale(&customer, &method, &warehouse, &service.slug, 3.0, 50.0, 150.0))
        .await
        .unwrap();

    assert_eq!(stock_of(&db, &service.slug, &warehouse).await, 0.0);
    assert_eq!(amount_of(&db, &method).await, 150.0);
}

// =============================================================================
// Average Purchase Price
// =============================================================================

#[tokio::test]
async fn purchases_blend_into_weighted_average() {
    let db = setup().await;
    let (vendor, _, method, warehouse, product) = seed(&db).await;

    db.ledger()
        .commit(purchase(&vendor, &method, &warehouse, &product, 5.0, 20.0))
        .await
        .unwrap();
    assert_eq!(avg_price_of(&db, &product).await, 20.0);
    assert_eq!(stock_of(&db, &product, &warehouse).await, 5.0);

    db.ledger()
        .commit(purchase(&vendor, &method, &warehouse, &product, 5.0, 30.0))
        .await
        .unwrap();
    assert_eq!(avg_price_of(&db, &product).await, 25.0);
    assert_eq!(stock_of(&db, &product, &warehouse).await, 10.0);
}

#[tokio::test]
async fn vendor_return_restores_prior_average() {
    let db = setup().await;
    let (vendor, _, method, warehouse, product) = seed(&db).await;

    db.ledger()
        .commit(purchase(&vendor, &method, &warehouse, &product, 5.0, 20.0))
        .await
        .unwrap();
    db.ledger()
        .commit(purchase(&vendor, &method, &warehouse, &product, 5.0, 30.0))
        .await
        .unwrap();

    // Return the second batch: average falls back to 20.
    let mut ret = Transaction::new(BIZ, TransactionType::VendorReturn);
    ret.party_slug = Some(vendor.clone());
    ret.to_payment_method_slug = Some(method.clone());
    ret.warehouse_slug = Some(warehouse.clone());
    ret.total_paid = 150.0;
    ret.details
        .push(TransactionDetail::new(BIZ, &ret.slug, &product, 5.0, 30.0));
    db.ledger().commit(ret).await.unwrap();

    assert_eq!(avg_price_of(&db, &product).await, 20.0);
    assert_eq!(stock_of(&db, &product, &warehouse).await, 5.0);
}

// =============================================================================
// Update
// =============================================================================

#[tokio::test]
async fn update_applies_only_the_net_change() {
    let db = setup().await;
    let (vendor, customer, method, warehouse, product) = seed(&db).await;

    db.ledger()
        .commit(purchase(&vendor, &method, &warehouse, &product, 10.0, 20.0))
        .await
        .unwrap();
    let cash_before_sale = amount_of(&db, &method).await;

    let committed = db
        .ledger()
        .commit(sale(&customer, &method, &warehouse, &product, 5.0, 20.0, 60.0))
        .await
        .unwrap();

    // Edit: quantity 5 → 3, payment 60 → 40.
    let mut edited = committed.clone();
    edited.details[0].quantity = 3.0;
    edited.total_paid = 40.0;
    let edited = db.ledger().update(edited).await.unwrap();

    assert_eq!(edited.grand_total, 60.0);
    assert_eq!(stock_of(&db, &product, &warehouse).await, 7.0);
    assert_eq!(balance_of(&db, &customer).await, -20.0);
    assert_eq!(amount_of(&db, &method).await, cash_before_sale + 40.0);

    // Details were replaced wholesale: exactly one row, the new one.
    let stored = db
        .transactions()
        .get_by_slug(&edited.slug)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.details.len(), 1);
    assert_eq!(stored.details[0].quantity, 3.0);
}

#[tokio::test]
async fn identical_update_needs_no_stock_headroom() {
    let db = setup().await;
    let (vendor, customer, method, warehouse, product) = seed(&db).await;

    db.ledger()
        .commit(purchase(&vendor, &method, &warehouse, &product, 5.0, 20.0))
        .await
        .unwrap();
    let committed = db
        .ledger()
        .commit(sale(&customer, &method, &warehouse, &product, 5.0, 20.0, 100.0))
        .await
        .unwrap();
    assert_eq!(stock_of(&db, &product, &warehouse).await, 0.0);

    // Nothing on the shelf, but re-saving the same quantities is a no-op
    // net change and must pass.
    db.ledger().update(committed.clone()).await.unwrap();
    assert_eq!(stock_of(&db, &product, &warehouse).await, 0.0);
}

#[tokio::test]
async fn update_of_missing_transaction_fails() {
    let db = setup().await;
    let (_, customer, method, warehouse, product) = seed(&db).await;

    let tx = sale(&customer, &method, &warehouse, &product, 1.0, 20.0, 20.0);
    let err = db.ledger().update(tx).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound { .. }));
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
async fn delete_reverses_everything_and_leaves_a_tombstone() {
    let db = setup().await;
    let (vendor, customer, method, warehouse, product) = seed(&db).await;

    db.ledger()
        .commit(purchase(&vendor, &method, &warehouse, &product, 10.0, 20.0))
        .await
        .unwrap();
    let cash_before = amount_of(&db, &method).await;

    let committed = db
        .ledger()
        .commit(sale(&customer, &method, &warehouse, &product, 5.0, 20.0, 60.0))
        .await
        .unwrap();
    db.ledger().delete(&committed.slug).await.unwrap();

    // Balances and stock are exactly as before the sale.
    assert_eq!(balance_of(&db, &customer).await, 0.0);
    assert_eq!(amount_of(&db, &method).await, cash_before);
    assert_eq!(stock_of(&db, &product, &warehouse).await, 10.0);

    // The row is gone and a dirty tombstone points at it.
    assert!(db
        .transactions()
        .get_by_slug(&committed.slug)
        .await
        .unwrap()
        .is_none());
    let tombstones = db.tombstones().list_dirty(BIZ).await.unwrap();
    assert!(tombstones.iter().any(|t| t.record_slug == committed.slug));
}

#[tokio::test]
async fn deleting_a_purchase_needs_its_stock_back() {
    let db = setup().await;
    let (vendor, customer, method, warehouse, product) = seed(&db).await;

    let bought = db
        .ledger()
        .commit(purchase(&vendor, &method, &warehouse, &product, 10.0, 20.0))
        .await
        .unwrap();
    db.ledger()
        .commit(sale(&customer, &method, &warehouse, &product, 8.0, 25.0, 200.0))
        .await
        .unwrap();

    // Only 2 left; un-buying 10 would go negative.
    let err = db.ledger().delete(&bought.slug).await.unwrap_err();
    assert!(matches!(
        err,
        DbError::Core(CoreError::InsufficientStock { .. })
    ));
    assert_eq!(stock_of(&db, &product, &warehouse).await, 2.0);
}

// =============================================================================
// Composite / Manufacture
// =============================================================================

#[tokio::test]
async fn manufacture_consumes_ingredients_and_produces_recipe() {
    let db = setup().await;
    let (vendor, _, method, warehouse, flour) = seed(&db).await;

    let mut bread = Product::new(BIZ, "Bread Loaf");
    bread.is_recipe = true;
    db.products().insert(&bread).await.unwrap();

    // 10kg flour at 20 on hand.
    db.ledger()
        .commit(purchase(&vendor, &method, &warehouse, &flour, 10.0, 20.0))
        .await
        .unwrap();

    // 4kg flour makes 8 loaves: unit cost 80 / 8 = 10.
    let parent = db
        .ledger()
        .commit_manufacture(
            BIZ,
            &warehouse,
            &bread.slug,
            8.0,
            &[(flour.clone(), 4.0, 20.0)],
        )
        .await
        .unwrap();

    assert_eq!(stock_of(&db, &flour, &warehouse).await, 6.0);
    assert_eq!(stock_of(&db, &bread.slug, &warehouse).await, 8.0);
    assert_eq!(avg_price_of(&db, &bread.slug).await, 10.0);

    let children = db.transactions().children_of(&parent.slug).await.unwrap();
    assert_eq!(children.len(), 2);

    // Deleting the parent undoes both legs.
    db.ledger().delete(&parent.slug).await.unwrap();
    assert_eq!(stock_of(&db, &flour, &warehouse).await, 10.0);
    assert_eq!(stock_of(&db, &bread.slug, &warehouse).await, 0.0);
    assert!(db
        .transactions()
        .children_of(&parent.slug)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn manufacture_without_ingredients_in_stock_is_rejected() {
    let db = setup().await;
    let (_, _, _, warehouse, flour) = seed(&db).await;

    let mut bread = Product::new(BIZ, "Bread Loaf");
    bread.is_recipe = true;
    db.products().insert(&bread).await.unwrap();

    let err = db
        .ledger()
        .commit_manufacture(
            BIZ,
            &warehouse,
            &bread.slug,
            8.0,
            &[(flour.clone(), 4.0, 20.0)],
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::Core(CoreError::InsufficientStock { .. })
    ));
    assert_eq!(stock_of(&db, &bread.slug, &warehouse).await, 0.0);
}

// =============================================================================
// Transfers
// =============================================================================

#[tokio::test]
async fn payment_transfer_moves_between_methods() {
    let db = setup().await;
    let (_, _, cash, _, _) = seed(&db).await;

    let bank = PaymentMethod::new(BIZ, "Bank Account");
    db.payment_methods().insert(&bank).await.unwrap();

    let mut tx = Transaction::new(BIZ, TransactionType::PaymentTransfer);
    tx.from_payment_method_slug = Some(cash.clone());
    tx.to_payment_method_slug = Some(bank.slug.clone());
    tx.total_paid = 500.0;
    let committed = db.ledger().commit(tx).await.unwrap();

    assert_eq!(amount_of(&db, &cash).await, -500.0);
    assert_eq!(amount_of(&db, &bank.slug).await, 500.0);

    // Deleting the transfer sends the money back.
    db.ledger().delete(&committed.slug).await.unwrap();
    assert_eq!(amount_of(&db, &cash).await, 0.0);
    assert_eq!(amount_of(&db, &bank.slug).await, 0.0);
}

#[tokio::test]
async fn stock_transfer_moves_between_warehouses() {
    let db = setup().await;
    let (vendor, _, method, main, product) = seed(&db).await;

    let branch = Warehouse::new(BIZ, "Branch Store");
    db.warehouses().insert(&branch).await.unwrap();

    db.ledger()
        .commit(purchase(&vendor, &method, &main, &product, 10.0, 20.0))
        .await
        .unwrap();

    let mut tx = Transaction::new(BIZ, TransactionType::StockTransfer);
    tx.warehouse_slug = Some(main.clone());
    tx.to_warehouse_slug = Some(branch.slug.clone());
    tx.details
        .push(TransactionDetail::new(BIZ, &tx.slug, &product, 4.0, 0.0));
    db.ledger().commit(tx).await.unwrap();

    assert_eq!(stock_of(&db, &product, &main).await, 6.0);
    assert_eq!(stock_of(&db, &product, &branch.slug).await, 4.0);

    // More than the source holds is rejected.
    let mut too_much = Transaction::new(BIZ, TransactionType::StockTransfer);
    too_much.warehouse_slug = Some(main.clone());
    too_much.to_warehouse_slug = Some(branch.slug.clone());
    too_much
        .details
        .push(TransactionDetail::new(BIZ, &too_much.slug, &product, 7.0, 0.0));
    let err = db.ledger().commit(too_much).await.unwrap_err();
    assert!(matches!(
        err,
        DbError::Core(CoreError::InsufficientStock { .. })
    ));
}

// =============================================================================
// Records
// =============================================================================

#[tokio::test]
async fn record_kinds_store_without_touching_balances() {
    let db = setup().await;
    let (_, customer, method, _, _) = seed(&db).await;

    let mut note = Transaction::new(BIZ, TransactionType::ClientNote);
    note.party_slug = Some(customer.clone());
    note.description = Some("Prefers morning deliveries".into());
    let committed = db.ledger().commit(note).await.unwrap();

    assert!(db
        .transactions()
        .get_by_slug(&committed.slug)
        .await
        .unwrap()
        .is_some());
    assert_eq!(balance_of(&db, &customer).await, 0.0);
    assert_eq!(amount_of(&db, &method).await, 0.0);
}
