//! Shared fixtures for database tests.

use crate::pool::{Database, DbConfig};
use crate::repository::product::NewProduct;
use tillpoint_core::checkout::{CheckoutLine, CheckoutRequest, PaymentInput};
use tillpoint_core::{Branch, Category, Customer, PaymentMethod, Product, User};

/// A small store: two branches, two categories and four products.
///
/// | product      | price | stock | category |
/// |--------------|-------|-------|----------|
/// | cola         | 250   | 10    | drinks   |
/// | water        | 300   | 20    | drinks   |
/// | chips        | 199   | 5     | snacks   |
/// | out_of_stock | 99    | 0     | snacks   |
pub struct Catalog {
    pub branch: Branch,
    pub other_branch: Branch,
    pub cashier: User,
    pub customer: Customer,
    pub drinks: Category,
    pub snacks: Category,
    pub cola: Product,
    pub water: Product,
    pub chips: Product,
    pub out_of_stock: Product,
}

pub async fn test_db() -> Database {
    Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database")
}

/// A file-backed database with a real pool, for tests that need several
/// connections writing at once. Keep the directory alive for the test.
pub async fn file_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().expect("temp dir");
    let db = Database::new(DbConfig::new(dir.path().join("tillpoint.db")).max_connections(4))
        .await
        .expect("file database");
    (dir, db)
}

pub async fn seed_catalog(db: &Database) -> Catalog {
    let branch = db.branches().insert("branch-1", "Downtown").await.unwrap();
    let other_branch = db.branches().insert("branch-2", "Uptown").await.unwrap();
    let cashier = db
        .users()
        .insert("cashier-1", "Sam", Some(&branch.id))
        .await
        .unwrap();
    let customer = db.customers().insert("cust-1", "Lea").await.unwrap();

    let drinks = db.categories().insert("cat-drinks", "Drinks").await.unwrap();
    let snacks = db.categories().insert("cat-snacks", "Snacks").await.unwrap();

    let cola = product(db, "prod-cola", "Cola 330ml", 250, 10, &branch, &drinks).await;
    let water = product(db, "prod-water", "Still Water", 300, 20, &branch, &drinks).await;
    let chips = product(db, "prod-chips", "Salted Chips", 199, 5, &branch, &snacks).await;
    let out_of_stock = product(db, "prod-gum", "Mint Gum", 99, 0, &branch, &snacks).await;

    Catalog {
        branch,
        other_branch,
        cashier,
        customer,
        drinks,
        snacks,
        cola,
        water,
        chips,
        out_of_stock,
    }
}

async fn product(
    db: &Database,
    id: &str,
    name: &str,
    price_cents: i64,
    initial_stock: i64,
    branch: &Branch,
    category: &Category,
) -> Product {
    db.products()
        .insert(&NewProduct {
            id: id.to_string(),
            name: name.to_string(),
            price_cents,
            branch_id: branch.id.clone(),
            category_id: Some(category.id.clone()),
            initial_stock,
            active: true,
        })
        .await
        .unwrap()
}

/// `qty` colas at list price, paid in cash, no customer.
pub fn simple_checkout(catalog: &Catalog, qty: i64) -> CheckoutRequest {
    CheckoutRequest {
        branch_id: catalog.branch.id.clone(),
        cashier_id: Some(catalog.cashier.id.clone()),
        customer_id: None,
        lines: vec![CheckoutLine::new(
            catalog.cola.id.clone(),
            qty,
            catalog.cola.price_cents,
        )],
        payments: vec![PaymentInput {
            method: PaymentMethod::Cash,
            amount_cents: catalog.cola.price_cents * qty.max(1),
            reference: None,
        }],
        loyalty_points_earned: None,
        loyalty_points_used: None,
        metadata: None,
    }
}
