//! # Token Dashboard Example
//!
//! This example demonstrates wiring the data store the way a token-management
//! front end would:
//! - Settings configuration
//! - Registering a bundle of fetch sources
//! - Speculative preloading
//! - Cached reads, TTL behavior, and forced refresh
//!
//! ## Usage
//!
//! ```bash
//! cargo run --example token_dashboard
//! ```

use std::time::Duration;

use anyhow::Result;
use datastore_sdk::{DataStore, Settings};
use serde_json::json;
use tokio::time::sleep;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    println!("🚀 Initializing data store...");

    // 1. Load settings from Config.toml or environment
    let settings = Settings::new()?;
    let store = DataStore::with_settings(&settings);
    println!("✅ Store created (default TTL: {}s)", settings.default_ttl_seconds);

    // 2. Register the fetch source bundle. Real consumers wrap RPC/HTTP
    //    calls here; the simulated latency stands in for the network.
    store.register_fn("token_list", |_args| async move {
        sleep(Duration::from_millis(120)).await;
        Ok(json!([
            { "symbol": "SOL", "decimals": 9 },
            { "symbol": "USDC", "decimals": 6 },
        ]))
    });
    store.register_fn("network_status", |_args| async move {
        sleep(Duration::from_millis(80)).await;
        Ok(json!({ "cluster": "mainnet-beta", "healthy": true }))
    });
    store.register_fn("mint_fee", |args| async move {
        sleep(Duration::from_millis(60)).await;
        let decimals = args.first().and_then(|v| v.as_u64()).unwrap_or(9);
        Ok(json!({ "decimals": decimals, "lamports": 5000 + decimals * 10 }))
    });
    println!("✅ Fetch sources registered");

    // 3. Warm the configured sources plus the ones every page needs
    store.preload_all(&settings.preload_sources);
    store.preload_all(&["token_list", "network_status"]);

    // 4. First read fetches, second read is served from cache
    let tokens = store.get("token_list", &[]).await?;
    println!("tokens: {}", tokens);
    let tokens_again = store.get("token_list", &[]).await?;
    assert_eq!(tokens, tokens_again);

    // Argument lists partition the cache per key
    let fee_sol = store.get("mint_fee", &[json!(9)]).await?;
    let fee_usdc = store.get("mint_fee", &[json!(6)]).await?;
    println!("mint fee (9 decimals): {}", fee_sol);
    println!("mint fee (6 decimals): {}", fee_usdc);

    // 5. Force a refetch regardless of remaining TTL
    let status = store.refresh("network_status", &[]).await?;
    println!("network status after refresh: {}", status);

    let metrics = store.metrics();
    println!(
        "📊 cache: {} entries, {} hits / {} misses ({} joins)",
        metrics.cache_size, metrics.hits, metrics.misses, metrics.joins
    );

    Ok(())
}
