//! # Cart Probe
//!
//! Connects to a cart backend, hydrates a session and prints what it sees.
//! Handy for checking a backend deployment and the local config.
//!
//! ## Usage
//! ```bash
//! # Use cart.toml from the platform config dir (or defaults)
//! cargo run -p cartline-sync --bin cart-probe
//!
//! # Explicit config file
//! cargo run -p cartline-sync --bin cart-probe -- --config ./cart.toml
//!
//! # Override the backend and check add-ons for an item
//! CARTLINE_BASE_URL=https://staging.example.com/api/ \
//!     cargo run -p cartline-sync --bin cart-probe -- --add-ons flight LH400
//!
//! # More logging
//! RUST_LOG=cartline_sync=trace cargo run -p cartline-sync --bin cart-probe
//! ```

use std::env;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cartline_sync::{CartConfig, CartEngine, CartSnapshot};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut add_ons_for: Option<(String, String)> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--add-ons" | "-a" => {
                if i + 2 < args.len() {
                    add_ons_for = Some((args[i + 1].clone(), args[i + 2].clone()));
                    i += 2;
                }
            }
            "--help" | "-h" => {
                println!("Cartline Cart Probe");
                println!();
                println!("Usage: cart-probe [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>            Config file (default: platform config dir)");
                println!("  -a, --add-ons <TYPE> <ITEM>    Also list add-ons offered for an item");
                println!("  -h, --help                     Show this help message");
                return Ok(());
            }
            other => warn!(arg = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let config = CartConfig::load(config_path)?;
    info!(base_url = %config.gateway.base_url, "Probing cart backend");

    let engine = CartEngine::from_config(&config)?;
    engine.subscribe(|snapshot: &CartSnapshot| {
        info!(
            revision = snapshot.revision,
            phase = ?snapshot.phase,
            items = snapshot.cart.item_count(),
            total = %snapshot.cart.total(),
            "Cart snapshot"
        );
    });

    let cart = engine.hydrate().await?;
    println!("Items: {}", cart.item_count());
    for item in cart.items() {
        println!(
            "  {} [{}] {} ({} add-ons, {})",
            item.id,
            item.item_type,
            item.price,
            item.add_ons.len(),
            item.contribution()
                .map_or_else(|| "out of range".to_string(), |total| total.to_string())
        );
    }
    println!("Local total: {}", cart.total());

    let summary = engine.cart_summary().await?;
    println!(
        "Summary: subtotal {} + taxes {} + fees {} = {} {}",
        summary.subtotal, summary.taxes, summary.fees, summary.total, summary.currency
    );

    let validation = engine.validate_cart().await?;
    if validation.valid {
        println!("Checkout: ready");
    } else {
        println!("Checkout: blocked");
        for error in &validation.errors {
            println!("  - {}", error);
        }
    }

    if let Some((item_type, item_id)) = add_ons_for {
        let offered = engine.available_add_ons(&item_type, &item_id).await?;
        println!("Add-ons for {} {}:", item_type, item_id);
        for add_on in offered {
            println!("  {} {} ({})", add_on.id, add_on.name, add_on.price);
        }
    }

    engine.shutdown();
    Ok(())
}

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` wins; otherwise INFO with debug output for the cartline crates.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cartline_core=debug,cartline_sync=debug"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
