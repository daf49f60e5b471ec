//! # Seed Data Generator
//!
//! Fills a development database with a small pharmacy catalog and batches.
//!
//! ## Usage
//! ```bash
//! # Default database (./pharma_dev.db)
//! cargo run -p pharma-db --bin seed
//!
//! # Specify database path
//! cargo run -p pharma-db --bin seed -- --db ./data/pharma.db
//! ```
//!
//! Each product gets a barcode, prices, a minimum level and one or two
//! batches. Expiry dates are spread so that the dashboard shows expired,
//! critical, warning and healthy batches, and some products start low or
//! out of stock.

use chrono::{Duration, Utc};
use pharma_core::inventory::ReceiveStock;
use pharma_core::{ProductInput, TherapeuticClass};
use pharma_db::{Database, DbConfig};
use std::env;

const ACTOR: &str = "seed";

/// (name, DCI, class, cost cents, selling cents, minimum level)
const CATALOG: &[(&str, &str, TherapeuticClass, i64, i64, i64)] = &[
    ("Doliprane 500mg", "Paracétamol", TherapeuticClass::Analgesic, 450, 750, 20),
    ("Doliprane 1000mg", "Paracétamol", TherapeuticClass::Analgesic, 600, 950, 20),
    ("Efferalgan 500mg", "Paracétamol", TherapeuticClass::Analgesic, 500, 850, 10),
    ("Advil 400mg", "Ibuprofène", TherapeuticClass::Antiinflammatory, 900, 1500, 10),
    ("Voltarène gel", "Diclofénac", TherapeuticClass::Antiinflammatory, 1200, 1900, 5),
    ("Amoxicilline 500mg", "Amoxicilline", TherapeuticClass::Antibiotic, 1100, 1800, 10),
    ("Augmentin 1g", "Amoxicilline/Ac. clavulanique", TherapeuticClass::Antibiotic, 2400, 3500, 5),
    ("Amlor 5mg", "Amlodipine", TherapeuticClass::Antihypertensive, 1500, 2300, 5),
    ("Coversyl 5mg", "Périndopril", TherapeuticClass::Antihypertensive, 1800, 2700, 5),
    ("Glucophage 850mg", "Metformine", TherapeuticClass::Antidiabetic, 700, 1200, 10),
    ("Smecta", "Diosmectite", TherapeuticClass::Gastrointestinal, 800, 1300, 10),
    ("Gaviscon", "Alginate de sodium", TherapeuticClass::Gastrointestinal, 1000, 1600, 5),
    ("Ventoline", "Salbutamol", TherapeuticClass::Respiratory, 1300, 2100, 5),
    ("Biafine", "Trolamine", TherapeuticClass::Dermatological, 900, 1450, 5),
    ("Vitamine C 500", "Acide ascorbique", TherapeuticClass::Vitamin, 300, 600, 15),
    ("Sérum physiologique", "", TherapeuticClass::Other, 150, 300, 30),
];

/// Days until expiry for the generated batches, cycled over the catalog.
const EXPIRY_OFFSETS: &[i64] = &[-10, 12, 25, 60, 180, 400, 720];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./pharma_dev.db");

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
                println!("Pharma POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./pharma_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Pharma POS Seed Data Generator");
    println!("==============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected, migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    let today = Utc::now().date_naive();
    let mut batches = 0;

    for (idx, (name, dci, class, cost, selling, minimum)) in CATALOG.iter().enumerate() {
        let product = db
            .products()
            .insert(
                ProductInput {
                    name: name.to_string(),
                    dci: Some(dci.to_string()),
                    therapeutic_class: *class,
                    cost_price_cents: *cost,
                    selling_price_cents: *selling,
                    current_stock: 0,
                    minimum_stock_level: *minimum,
                    is_active: true,
                    barcode: Some(format!("34009{:08}", idx + 1)),
                },
                ACTOR,
            )
            .await?;

        // every fifth product stays out of stock
        if idx % 5 == 4 {
            continue;
        }

        let lots = 1 + idx % 2;
        for lot in 0..lots {
            let offset = EXPIRY_OFFSETS[(idx + lot * 3) % EXPIRY_OFFSETS.len()];
            // some products end up at or under their minimum
            let quantity = if idx % 3 == 0 { *minimum / 2 + 1 } else { *minimum * 3 };

            db.stock()
                .receive(
                    ReceiveStock {
                        product_id: product.id.clone(),
                        batch_number: format!("L{}-{:03}", today.format("%y%m"), idx * 10 + lot),
                        expiry_date: today + Duration::days(offset),
                        quantity,
                        purchase_price_cents: *cost,
                        supplier_name: Some("Laborex".to_string()),
                    },
                    ACTOR,
                )
                .await?;
            batches += 1;
        }
    }

    println!("✓ Created {} products and {} batches", CATALOG.len(), batches);

    let hits = db.products().search("doli", 10).await?;
    println!("  Search 'doli': {} results", hits.len());
    println!();
    println!("✓ Seed complete!");

    Ok(())
}
