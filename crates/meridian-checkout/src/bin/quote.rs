//! # Quote
//!
//! Prices a saved cart against the live backend and prints the totals.
//!
//! ## Usage
//! ```bash
//! # Price a saved cart in its own currency
//! cargo run -p meridian-checkout --bin quote -- --cart ./cart.json
//!
//! # In euros, shipped to California
//! cargo run -p meridian-checkout --bin quote -- --cart ./cart.json --currency EUR --country US --state CA
//! ```
//!
//! `--cart` accepts either a saved cart state document or a bare JSON array
//! of line items priced in the base currency.

use meridian_checkout::{
    init_tracing, CartStore, CheckoutConfig, HttpBackend, MemoryCartPersistence, PersistedCart,
};
use meridian_core::{CartLineItem, CurrencyCode, ShippingDestination};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

struct Args {
    cart: PathBuf,
    currency: Option<CurrencyCode>,
    country: Option<String>,
    state: Option<String>,
    config: Option<PathBuf>,
}

fn print_help() {
    println!("Meridian Checkout Quote");
    println!();
    println!("Usage: quote --cart <PATH> [OPTIONS]");
    println!();
    println!("Options:");
    println!("      --cart <PATH>        Cart JSON (saved state or array of lines)");
    println!("      --currency <CODE>    Display currency (default: the cart's)");
    println!("      --country <CODE>     Destination country");
    println!("      --state <CODE>       Destination state or region");
    println!("      --config <PATH>      Config file (default: platform config dir)");
    println!("  -h, --help               Show this help message");
}

/// `Ok(None)` when help was requested.
fn parse_args() -> Result<Option<Args>, String> {
    let args: Vec<String> = env::args().collect();

    let mut cart = None;
    let mut currency = None;
    let mut country = None;
    let mut state = None;
    let mut config = None;

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        if flag == "--help" || flag == "-h" {
            return Ok(None);
        }
        let value = args
            .get(i + 1)
            .cloned()
            .ok_or_else(|| format!("{} needs a value", flag))?;
        match flag {
            "--cart" => cart = Some(PathBuf::from(value)),
            "--currency" => currency = Some(CurrencyCode::new(value)),
            "--country" => country = Some(value),
            "--state" => state = Some(value),
            "--config" => config = Some(PathBuf::from(value)),
            other => return Err(format!("unknown option {}", other)),
        }
        i += 2;
    }

    let cart = cart.ok_or("--cart is required")?;
    if state.is_some() && country.is_none() {
        return Err("--state needs --country".to_string());
    }
    Ok(Some(Args {
        cart,
        currency,
        country,
        state,
        config,
    }))
}

fn read_cart(args: &Args, config: &CheckoutConfig) -> Result<PersistedCart, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(&args.cart)?;
    let mut saved = match serde_json::from_str::<PersistedCart>(&contents) {
        Ok(saved) => saved,
        Err(_) => PersistedCart {
            items: serde_json::from_str::<Vec<CartLineItem>>(&contents)?,
            currency_code: config.base_currency(),
            address: None,
            language_code: None,
        },
    };
    if let Some(currency) = &args.currency {
        saved.currency_code = currency.clone();
    }
    Ok(saved)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = match parse_args() {
        Ok(Some(args)) => args,
        Ok(None) => {
            print_help();
            return Ok(());
        }
        Err(message) => {
            eprintln!("error: {}", message);
            print_help();
            std::process::exit(2);
        }
    };

    let config = CheckoutConfig::load_or_default(args.config.clone());
    init_tracing();
    info!(backend = %config.backend.base_url, "Pricing cart");

    let saved = read_cart(&args, &config)?;
    let requested = saved.currency_code.clone();
    let line_count = saved.items.len();

    let backend = Arc::new(HttpBackend::from_config(&config)?);
    let persistence = Arc::new(MemoryCartPersistence::with_state(saved));
    let store = CartStore::open(backend, config.base_currency(), Some(persistence)).await?;

    if store.currency().code != requested {
        return Err(format!("currency {} is not offered", requested).into());
    }
    if store.items().len() != line_count {
        return Err("cart lines could not be restored, see log".into());
    }

    if let Some(country) = &args.country {
        store
            .set_address(Some(ShippingDestination {
                address_id: "quote".to_string(),
                recipient_name: String::new(),
                line1: String::new(),
                line2: None,
                city: String::new(),
                state: args.state.clone(),
                postal_code: String::new(),
                country: country.clone(),
            }))
            .await?;
    }

    let snapshot = store.snapshot()?;
    let destination = snapshot
        .address
        .as_ref()
        .map(|a| a.rate_key().to_string())
        .unwrap_or_else(|| "-".to_string());

    println!("Currency:    {}", snapshot.currency.code);
    println!("Destination: {}", destination);
    println!("Lines:       {}", snapshot.items.len());
    println!();
    println!("Subtotal:    {}", snapshot.formatted.subtotal);
    println!("Discount:    {}", snapshot.formatted.discount_amount);
    println!("Shipping:    {}", snapshot.formatted.shipping_cost);
    println!("Tax:         {}", snapshot.formatted.tax_amount);
    println!("Total:       {}", snapshot.formatted.total);

    if let Some(reason) = snapshot.undeliverable_reason {
        println!();
        println!("⚠ Not deliverable to {}: {}", destination, reason);
    }

    Ok(())
}
