//! Shopping Cart Checkout Experiment
//!
//! Demonstrates configuring experiments from a document, persisting
//! assignments to disk, reporting start/goal events through `tracing`, and
//! pinning a bucket with an override command.
//!
//! Run with: RUST_LOG=debug cargo run --example shopping_cart

use std::sync::Arc;

use anyhow::Context;
use customers_choice::admin::OverrideCommand;
use customers_choice::fetch::StaticSource;
use customers_choice::kv::FileKvStore;
use customers_choice::logger::{Logger, TracingLogger};
use customers_choice::reporter::LogReporter;
use customers_choice::{CustomersChoice, Lifetime, RefreshOutcome};
use tracing_subscriber::EnvFilter;

const CONFIG: &str = r#"{
    "variants": [
        {"name": "checkout-flow", "spreading": [50, 50]},
        {"name": "free-shipping-banner", "spreading": [80, 15, 5]},
        {"name": "holiday-theme", "startTime": 0, "endTime": 1000}
    ]
}"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Customers-Choice Shopping Cart ===\n");

    let state_dir = std::env::temp_dir().join("customers-choice-demo");
    let store = Arc::new(
        FileKvStore::open(state_dir.join("choices.json"))
            .await
            .context("opening assignment store")?,
    );

    let logger: Arc<dyn Logger> = Arc::new(TracingLogger);
    let engine = CustomersChoice::builder()
        .namespace("shop")
        .kv_store(store.clone())
        .logger(logger.clone())
        .reporter(Arc::new(LogReporter::new(logger)))
        .build()?;

    // -------------------------------------------------------------------------
    // 1. Load experiments
    // -------------------------------------------------------------------------
    println!("1. Loading experiments...");
    let source = StaticSource::new("embedded://shop", CONFIG);
    if let RefreshOutcome::Updated(summary) = engine.refresh(&source).await? {
        println!("   {} experiment(s) configured", summary.applied);
    }
    engine.set_lifetime(Lifetime::Persistent).await?;

    // -------------------------------------------------------------------------
    // 2. Render the cart
    // -------------------------------------------------------------------------
    println!("\n2. Rendering cart...");
    let flow = engine.get_variant("checkout-flow");
    let banner = engine.get_variant("free-shipping-banner");
    let theme = engine.get_variant("holiday-theme");

    println!(
        "   Checkout flow: {}",
        if flow == 1 { "classic" } else { "one-page" }
    );
    println!("   Shipping banner: variant {banner}");
    println!("   Holiday theme (expired window): variant {theme}");

    // -------------------------------------------------------------------------
    // 3. Customer completes the purchase
    // -------------------------------------------------------------------------
    println!("\n3. Customer checks out...");
    engine.reaches_goal("checkout-flow");
    engine.reaches_goal("holiday-theme");

    // -------------------------------------------------------------------------
    // 4. QA pins the one-page flow
    // -------------------------------------------------------------------------
    println!("\n4. Applying override...");
    let command: OverrideCommand = "checkout-flow=2".parse()?;
    engine.apply_override(&command)?;
    println!("   checkout-flow is now {}", engine.get_variant("checkout-flow"));

    engine.shutdown().await;
    println!(
        "\nState persisted to {} ({} keys)",
        store.path().display(),
        store.len().await
    );
    Ok(())
}
