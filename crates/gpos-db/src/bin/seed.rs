//! # Seed Data Generator
//!
//! Populates the catalog cache (and optionally a few offline invoices) for
//! development.
//!
//! ## Usage
//! ```bash
//! # Seed the catalog for "Standard Selling"
//! cargo run -p gpos-db --bin seed
//!
//! # Another price list, another database, plus 20 unsynced invoices
//! cargo run -p gpos-db --bin seed -- --price-list Retail --db ./data/gpos.db --invoices 20
//! ```
//!
//! ## Generated Data
//! Every item gets:
//! - Item code: `{CATEGORY}-{INDEX}`
//! - Units: `Nos` (stock unit) and a pack unit with its conversion factor
//! - A price per unit on the chosen price list
//! - A valuation rate on the stock unit (roughly 70% of the unit price)
//!
//! Items whose index ends in 9 get no valuation, so the cost fallback to 0
//! can be tried from the promotion form.

use chrono::{Duration, Utc};
use gpos_core::{Money, OfflineInvoiceRecord, DEFAULT_INVOICE_KIND};
use gpos_db::{Database, DbConfig};
use serde_json::json;
use std::env;
use uuid::Uuid;

/// Item categories for realistic test data: (code, pack unit, pack size, names)
const CATEGORIES: &[(&str, &str, i64, &[&str])] = &[
    (
        "BEV",
        "Carton",
        24,
        &[
            "Coca-Cola 330ml",
            "Pepsi 330ml",
            "Sprite 330ml",
            "Fanta Orange 330ml",
            "Mineral Water 500ml",
            "Orange Juice 1L",
            "Iced Tea 500ml",
            "Energy Drink 250ml",
            "Laban 200ml",
            "Apple Juice 1L",
        ],
    ),
    (
        "SNK",
        "Box",
        12,
        &[
            "Potato Chips Salted",
            "Cheese Puffs",
            "Chocolate Bar",
            "Wafer Biscuits",
            "Salted Peanuts",
            "Date Bar",
            "Granola Bar",
            "Popcorn Butter",
            "Pretzels",
            "Gummy Bears",
        ],
    ),
    (
        "DRY",
        "Case",
        6,
        &[
            "Basmati Rice 5kg",
            "Sugar 2kg",
            "Flour 1kg",
            "Lentils 1kg",
            "Olive Oil 1L",
            "Tea Bags 100s",
            "Instant Coffee 200g",
            "Pasta 500g",
            "Tomato Paste 400g",
            "Chickpeas 400g",
        ],
    ),
];

/// Base unit prices in cents, cycled through per item.
const BASE_PRICES: &[i64] = &[150, 275, 325, 499, 650, 899, 1250, 1575, 2200, 3450];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./gpos_dev.db");
    let mut price_list = String::from("Standard Selling");
    let mut invoices: usize = 0;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--price-list" | "-p" => {
                if i + 1 < args.len() {
                    price_list = args[i + 1].clone();
                    i += 1;
                }
            }
            "--invoices" | "-i" => {
                if i + 1 < args.len() {
                    invoices = args[i + 1].parse().unwrap_or(0);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("gpos Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>           Database file path (default: ./gpos_dev.db)");
                println!("  -p, --price-list <NAME>   Price list to fill (default: Standard Selling)");
                println!("  -i, --invoices <N>        Unsynced offline invoices to create (default: 0)");
                println!("  -h, --help                Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 gpos Seed Data Generator");
    println!("===========================");
    println!("Database:   {}", db_path);
    println!("Price list: {}", price_list);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let schema = db.schema_status().await?;
    println!("✓ Connected to database");
    println!("✓ Schema: {}/{} migrations applied", schema.applied, schema.embedded);

    let catalog = db.catalog();
    let mut items: Vec<(String, Money)> = Vec::new();
    let start = std::time::Instant::now();

    for (category_code, pack_uom, pack_size, names) in CATEGORIES {
        for (idx, _name) in names.iter().enumerate() {
            let item_code = format!("{}-{:03}", category_code, idx + 1);
            let unit_price = Money::from_cents(BASE_PRICES[idx % BASE_PRICES.len()]);

            catalog.upsert_uom(&item_code, "Nos", 1.0, true).await?;
            catalog
                .upsert_uom(&item_code, pack_uom, *pack_size as f64, false)
                .await?;

            catalog
                .upsert_price(&item_code, &price_list, Some("Nos"), unit_price)
                .await?;
            // Pack price carries a 5% volume discount.
            let pack_price = (unit_price * *pack_size)
                .apply_percentage_discount(gpos_core::Percentage::from_whole(5));
            catalog
                .upsert_price(&item_code, &price_list, Some(pack_uom), pack_price)
                .await?;

            if (idx + 1) % 10 != 9 {
                let cost = Money::from_cents(unit_price.cents() * 7 / 10);
                catalog.upsert_valuation(&item_code, "Nos", cost).await?;
            }

            items.push((item_code, unit_price));
        }
    }

    println!("✓ Seeded {} items in {:?}", items.len(), start.elapsed());

    if invoices > 0 {
        let repo = db.offline_invoices();
        let now = Utc::now();

        for n in 0..invoices {
            let (item_code, rate) = &items[n % items.len()];
            let number = format!("OFF-{}-{:05}", now.format("%Y%m%d"), n + 1);
            let payload = json!({
                "customer_name": "Walk-in Customer",
                "items": [{
                    "item_code": item_code,
                    "quantity": 1 + (n % 3),
                    "rate": rate.to_decimal_string(),
                    "uom": "Nos"
                }],
                "payments": [{"mode_of_payment": "Cash", "amount": rate.to_decimal_string()}],
                "discount_amount": "0.00",
                "unique_id": Uuid::new_v4().to_string(),
                "offline_invoice_number": number,
                "pos_profile": "Main Counter",
                "cashier": "cashier@example.com",
                "machine_name": "TILL-01",
                "custom_offline_creation_time": (now - Duration::minutes(n as i64)).to_rfc3339(),
            });

            let record = OfflineInvoiceRecord {
                name: format!("IU-{}", Uuid::new_v4().simple()),
                date_time: now - Duration::minutes((invoices - n) as i64),
                invoice_number: Some(number),
                json_dump: Some(payload.to_string()),
                manually_submitted: false,
                clearing_status: false,
                kind: DEFAULT_INVOICE_KIND.to_string(),
                api_response: None,
                created_at: now,
                updated_at: now,
            };
            repo.insert(&record).await?;
        }

        println!("✓ Created {} unsynced offline invoices", invoices);
    }

    println!();
    println!("Spot check:");
    let (first, _) = &items[0];
    let uoms = catalog.item_uoms(first).await?;
    let price = catalog.item_price(first, &price_list, Some("Nos")).await?;
    println!("  {} units: {:?}", first, uoms);
    println!(
        "  {} price: {}",
        first,
        price.map(|p| p.to_string()).unwrap_or_else(|| "-".into())
    );

    println!();
    println!("🎉 Seed complete!");
    Ok(())
}
