//! # Seed Data Generator
//!
//! Populates the database with a demo catalog and a first manager account
//! for development.
//!
//! ## Usage
//! ```bash
//! # Seed the default database
//! cargo run -p tally-db --bin seed
//!
//! # Specify database path
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db
//!
//! # Bootstrap manager credentials
//! TALLY_SEED_MANAGER_EMAIL=owner@shop.test \
//! TALLY_SEED_MANAGER_PASSWORD=changeme \
//!     cargo run -p tally-db --bin seed
//! ```
//!
//! Products get SKUs of the form `{CATEGORY}-{INDEX}` and stock levels that
//! put a few of them under the low stock threshold on purpose.

use std::env;

use anyhow::Context;
use tally_core::{NewProduct, NewUser, Role, DEFAULT_LOW_STOCK_THRESHOLD};
use tally_db::migrations::migration_status;
use tally_db::{Database, DbConfig};
use tracing_subscriber::EnvFilter;

/// Demo catalog: (category code, [(name, price in cents)])
const CATALOG: &[(&str, &[(&str, i64)])] = &[
    (
        "BEV",
        &[
            ("Cola 330ml", 150),
            ("Sparkling Water 500ml", 120),
            ("Orange Juice 1L", 349),
            ("Iced Tea 500ml", 199),
            ("Cold Brew Coffee", 425),
        ],
    ),
    (
        "SNK",
        &[
            ("Salted Crisps", 225),
            ("Chocolate Bar", 175),
            ("Trail Mix", 499),
            ("Pretzels", 250),
        ],
    ),
    (
        "DRY",
        &[
            ("Whole Milk 1L", 189),
            ("Greek Yogurt", 299),
            ("Cheddar Block", 649),
            ("Butter 250g", 399),
        ],
    ),
    (
        "GRO",
        &[
            ("White Bread", 279),
            ("Spaghetti 500g", 159),
            ("Basmati Rice 1kg", 549),
            ("Peanut Butter", 459),
            ("Honey 350g", 799),
        ],
    ),
];

const DEFAULT_MANAGER_EMAIL: &str = "manager@tally.local";
const DEFAULT_MANAGER_PASSWORD: &str = "tally-dev";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut db_path = env::var("TALLY_DB_PATH").unwrap_or_else(|_| "data/tally.db".to_string());

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: $TALLY_DB_PATH or data/tally.db)");
                println!("  -h, --help         Show this help message");
                println!();
                println!("Environment:");
                println!("  TALLY_SEED_MANAGER_EMAIL     Manager login (default: {DEFAULT_MANAGER_EMAIL})");
                println!("  TALLY_SEED_MANAGER_PASSWORD  Manager password (default: {DEFAULT_MANAGER_PASSWORD})");
                return Ok(());
            }
            other => anyhow::bail!("unknown argument: {other}"),
        }
        i += 1;
    }

    println!("🌱 Tally POS Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path))
        .await
        .with_context(|| format!("failed to open {db_path}"))?;

    let (total, applied) = migration_status(db.pool()).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied ({applied}/{total})");

    seed_manager(&db).await?;
    seed_products(&db).await?;

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}

/// Creates the first manager account unless any user already exists.
async fn seed_manager(db: &Database) -> anyhow::Result<()> {
    if db.users().count().await? > 0 {
        println!("⚠ Users already exist, skipping manager bootstrap");
        return Ok(());
    }

    let email =
        env::var("TALLY_SEED_MANAGER_EMAIL").unwrap_or_else(|_| DEFAULT_MANAGER_EMAIL.to_string());
    let password = env::var("TALLY_SEED_MANAGER_PASSWORD")
        .unwrap_or_else(|_| DEFAULT_MANAGER_PASSWORD.to_string());

    let manager = db
        .users()
        .create(&NewUser {
            name: "Store Manager".to_string(),
            email,
            password,
            role: Role::Manager,
        })
        .await
        .context("failed to create manager account")?;

    println!("✓ Created manager {}", manager.email);
    Ok(())
}

/// Inserts the demo catalog into an empty products table.
async fn seed_products(db: &Database) -> anyhow::Result<()> {
    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping catalog to avoid duplicate SKUs.");
        return Ok(());
    }

    println!();
    println!("Generating products...");

    let mut generated = 0usize;
    for (code, products) in CATALOG {
        for (index, (name, price_cents)) in products.iter().enumerate() {
            let product = NewProduct {
                name: name.to_string(),
                sku: format!("{code}-{:03}", index + 1),
                price_cents: *price_cents,
                stock: demo_stock(generated),
            };

            if let Err(e) = db.products().create(&product).await {
                eprintln!("Failed to insert {}: {}", product.sku, e);
                continue;
            }
            generated += 1;
        }
    }

    let low = db
        .products()
        .list_low_stock(DEFAULT_LOW_STOCK_THRESHOLD)
        .await?;

    println!("✓ Generated {} products", generated);
    println!("  {} at or below the low stock threshold", low.len());
    Ok(())
}

/// Every fifth product starts nearly sold out.
fn demo_stock(seed: usize) -> i64 {
    if seed % 5 == 4 {
        (seed % 4) as i64
    } else {
        20 + ((seed * 13) % 80) as i64
    }
}
