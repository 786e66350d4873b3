//! # Seed Data Generator
//!
//! Populates the database with a small catalog, an admin account and one
//! pending order for development.
//!
//! ## Usage
//! ```bash
//! cargo run -p bazaar-db --bin seed
//!
//! # Specify database path and admin credentials
//! cargo run -p bazaar-db --bin seed -- --db ./data/bazaar.db \
//!     --admin-email ops@bazaar.in --admin-password changeme
//! ```
//!
//! ## Generated Data
//! - Products across the common GST slabs, both inclusive and exclusive
//! - Clothing and shoe sizes using every price modifier kind
//! - One admin account for step-up checks
//! - One pending order priced through the cart

use bazaar_core::cart::Cart;
use bazaar_core::money::Money;
use bazaar_core::pricing::ShippingPolicy;
use bazaar_core::types::{
    GstRate, GstType, PriceModifier, Product, Role, ShippingAddress, Size, SizeType,
};
use bazaar_db::repository::generate_id;
use bazaar_db::{Database, DbConfig};
use chrono::Utc;
use rust_decimal::Decimal;
use std::env;
use tracing_subscriber::EnvFilter;

/// (name, base price in rupees, mrp in rupees, gst bps, gst type)
const CATALOG: &[(&str, i64, i64, u32, GstType)] = &[
    ("Handloom Cotton Saree", 2499, 3299, 500, GstType::Inclusive),
    ("Brass Diya Set", 1000, 1200, 1800, GstType::Exclusive),
    ("Darjeeling Tea 250g", 450, 450, 500, GstType::Inclusive),
    ("Leather Kolhapuri Chappal", 899, 1299, 1200, GstType::Inclusive),
    ("Silver Jhumka Earrings", 3150, 3500, 300, GstType::Exclusive),
    ("Block Print Kurta", 1180, 1599, 1200, GstType::Inclusive),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./bazaar_dev.db");
    let mut admin_email = String::from("admin@bazaar.local");
    let mut admin_password = String::from("admin");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--admin-email" => {
                if i + 1 < args.len() {
                    admin_email = args[i + 1].clone();
                    i += 1;
                }
            }
            "--admin-password" => {
                if i + 1 < args.len() {
                    admin_password = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Bazaar Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>             Database file path (default: ./bazaar_dev.db)");
                println!("      --admin-email <EMAIL>   Admin account email (default: admin@bazaar.local)");
                println!("      --admin-password <PW>   Admin account password (default: admin)");
                println!("  -h, --help                  Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Bazaar Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Catalog
    let mut products = Vec::with_capacity(CATALOG.len());
    for entry in CATALOG {
        let product = db.products().insert(&catalog_product(entry)).await?;
        println!(
            "  + {} ({} sizes, GST {}% {:?})",
            product.name,
            product.sizes.len(),
            product.gst_rate.percent(),
            product.gst_type
        );
        products.push(product);
    }

    // Admin
    db.admins().create(&admin_email, &admin_password, Role::Admin).await?;
    println!("✓ Admin account {}", admin_email);

    // One pending order
    let mut cart = Cart::new();
    cart.add_item(&products[1], None, 1)?;
    cart.add_item(&products[5], Some("M"), 2)?;

    let address = ShippingAddress {
        full_name: "Seed Customer".to_string(),
        phone: "9876543210".to_string(),
        line1: "1 Residency Road".to_string(),
        line2: None,
        city: "Bengaluru".to_string(),
        state: "Karnataka".to_string(),
        pincode: "560025".to_string(),
    };
    let order = cart.place_order("seed-customer", address, &ShippingPolicy::default())?;
    db.orders().insert(&order).await?;
    println!(
        "✓ Order {} ({} items, grand total {})",
        order.id,
        order.total_quantity(),
        order.grand_total
    );

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Builds a catalog product; apparel and footwear get sizes.
fn catalog_product(entry: &(&str, i64, i64, u32, GstType)) -> Product {
    let (name, price, mrp, bps, gst_type) = *entry;
    let now = Utc::now();
    let id = generate_id();

    let size = |size_type: SizeType, label: &str, order: i64, modifier: PriceModifier| Size {
        id: generate_id(),
        product_id: id.clone(),
        size_type,
        size_value: label.to_string(),
        display_order: order,
        is_available: true,
        price_modifier: modifier,
        mrp: None,
    };

    let sizes = if name.contains("Kurta") {
        vec![
            size(SizeType::Clothing, "S", 0, PriceModifier::None),
            size(SizeType::Clothing, "M", 1, PriceModifier::None),
            size(SizeType::Clothing, "L", 2, PriceModifier::Percentage { value: Decimal::from(10) }),
            size(SizeType::Clothing, "XL", 3, PriceModifier::Fixed { price: Money::from_rupees(1399) }),
        ]
    } else if name.contains("Chappal") {
        (6..=10)
            .map(|uk| size(SizeType::Shoes, &format!("UK {}", uk), uk, PriceModifier::None))
            .collect()
    } else {
        Vec::new()
    };

    Product {
        id: id.clone(),
        name: name.to_string(),
        base_price: Money::from_rupees(price),
        mrp: Some(Money::from_rupees(mrp)),
        gst_rate: GstRate::from_bps(bps),
        gst_type,
        sizes,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
