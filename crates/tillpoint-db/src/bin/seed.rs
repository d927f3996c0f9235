//! # Seed Data Generator
//!
//! Populates a database with a demo store for development.
//!
//! ## Usage
//! ```bash
//! # Seed the database named by TILLPOINT_DB_PATH (default ./tillpoint.db)
//! cargo run -p tillpoint-db --bin seed
//!
//! # Generate more products per category
//! cargo run -p tillpoint-db --bin seed -- --per-category 20
//!
//! # Specify database path
//! cargo run -p tillpoint-db --bin seed -- --db ./data/tillpoint.db
//! ```
//!
//! ## Generated Data
//! - Two branches, one cashier each, three customers
//! - Products across beverages, snacks and dairy with opening stock
//! - One promotion of each type: a category percentage, a product fixed
//!   amount and a buy-2-get-1

use std::env;

use tillpoint_core::PromotionScope;
use tillpoint_db::repository::product::NewProduct;
use tillpoint_db::repository::promotion::NewPromotion;
use tillpoint_db::{Database, EngineConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// (category id, category name, product names)
const CATEGORIES: &[(&str, &str, &[&str])] = &[
    (
        "cat-bev",
        "Beverages",
        &[
            "Cola",
            "Lemon Soda",
            "Sparkling Water",
            "Still Water",
            "Orange Juice",
            "Apple Juice",
            "Iced Tea",
            "Cold Brew",
            "Energy Drink",
            "Lemonade",
        ],
    ),
    (
        "cat-snk",
        "Snacks",
        &[
            "Salted Chips",
            "Paprika Chips",
            "Tortilla Chips",
            "Pretzels",
            "Salted Peanuts",
            "Chocolate Bar",
            "Gummy Bears",
            "Oat Cookies",
            "Popcorn",
            "Trail Mix",
        ],
    ),
    (
        "cat-dry",
        "Dairy",
        &[
            "Whole Milk",
            "Oat Milk",
            "Greek Yogurt",
            "Cheddar",
            "Mozzarella",
            "Butter",
            "Cream Cheese",
            "Eggs Dozen",
            "Sour Cream",
            "Kefir",
        ],
    ),
];

const BRANCHES: &[(&str, &str)] = &[("branch-1", "Downtown"), ("branch-2", "Harbour")];

const CUSTOMERS: &[(&str, &str)] = &[
    ("cust-1", "Lea Novak"),
    ("cust-2", "Omar Haddad"),
    ("cust-3", "Iris Chen"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tillpoint=debug,sqlx=warn")),
        )
        .init();

    let mut engine = EngineConfig::from_env()?;
    let mut per_category: usize = 10;

    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--per-category" | "-n" => {
                if i + 1 < args.len() {
                    per_category = args[i + 1].parse().unwrap_or(per_category);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    engine.database_path = args[i + 1].clone().into();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tillpoint Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -n, --per-category <N>  Products per category (default: 10)");
                println!("  -d, --db <PATH>         Database file path (default: $TILLPOINT_DB_PATH or ./tillpoint.db)");
                println!("  -h, --help              Show this help message");
                return Ok(());
            }
            other => warn!(argument = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    println!("🌱 Tillpoint Seed Data Generator");
    println!("================================");
    println!("Database: {}", engine.database_path.display());
    println!("Products per category: {}", per_category);
    println!();

    let db = Database::connect(engine).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    for (id, name) in BRANCHES {
        db.branches().insert(id, name).await?;
        db.users()
            .insert(&format!("cashier-{id}"), &format!("{name} Till"), Some(*id))
            .await?;
    }
    for (id, name) in CUSTOMERS {
        db.customers().insert(id, name).await?;
    }
    db.customers().grant_points("cust-1", 250).await?;
    println!("✓ {} branches, {} customers", BRANCHES.len(), CUSTOMERS.len());

    let start = std::time::Instant::now();
    let mut generated = 0;
    let mut first_products = Vec::new();

    for (category_idx, (category_id, category_name, names)) in CATEGORIES.iter().enumerate() {
        db.categories().insert(category_id, category_name).await?;

        for index in 0..per_category {
            let product = generate_product(category_id, names, category_idx, index);
            if let Err(e) = db.products().insert(&product).await {
                eprintln!("Failed to insert {}: {}", product.id, e);
                continue;
            }
            if index == 0 {
                first_products.push(product.id.clone());
            }
            generated += 1;
        }
    }

    let elapsed = start.elapsed();
    println!("✓ Generated {} products in {:?}", generated, elapsed);

    let mut promotions = vec![NewPromotion::percentage(
        "promo-bev-10",
        "10% off beverages",
        PromotionScope::Category,
        1000,
    )
    .categories(&["cat-bev"])];

    if let Some(snack) = first_products.get(1) {
        promotions.push(
            NewPromotion::fixed_amount("promo-snack-50", "50c off", PromotionScope::Product, 50)
                .priority(1)
                .products(&[snack.as_str()]),
        );
    }
    if let Some(dairy) = first_products.get(2) {
        promotions.push(
            NewPromotion::buy_x_get_y("promo-dairy-b2g1", "Buy 2 get 1", PromotionScope::Product, 2, 1)
                .products(&[dairy.as_str()])
                .branches(&["branch-1"]),
        );
    }

    for promotion in &promotions {
        db.promotions().insert(promotion).await?;
    }
    println!("✓ {} promotions", promotions.len());

    info!(products = generated, promotions = promotions.len(), "Seed complete");
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Builds one product with deterministic price and stock.
fn generate_product(category_id: &str, names: &[&str], category_idx: usize, index: usize) -> NewProduct {
    let name = names[index % names.len()];
    let round = index / names.len();
    let full_name = if round == 0 {
        name.to_string()
    } else {
        format!("{name} #{}", round + 1)
    };

    let seed = category_idx * 1000 + index;

    NewProduct {
        id: format!("{}-{:03}", category_id.trim_start_matches("cat-"), index),
        name: full_name,
        // $0.99 - $8.98
        price_cents: 99 + ((seed * 37) % 800) as i64,
        branch_id: BRANCHES[seed % BRANCHES.len()].0.to_string(),
        category_id: Some(category_id.to_string()),
        initial_stock: (seed % 61) as i64,
        active: true,
    }
}
