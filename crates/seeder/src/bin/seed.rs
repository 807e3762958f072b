//! Seeds the identifier tables and times one joined read.
//!
//! Run with:
//! ```
//! cargo run -p seeder --bin seed
//! ```
//!
//! Configuration comes from `SEED_CONFIG` (a JSON file) and `SEED_*`
//! environment variables; see `seeder::config`.

use std::sync::Arc;

use identifiers::{Database, MemoryStore, Store};
use rand::SeedableRng;
use rand::rngs::StdRng;
use seeder::config::{Backend, SeedConfig};
use seeder::run::SeedRun;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = SeedConfig::load()?;

    let store: Arc<dyn Store> = match config.backend {
        Backend::Postgres => {
            let db = Database::connect(&config.database_url, config.max_connections).await?;
            tracing::info!("Connected to database");
            db.migrate().await?;
            Arc::new(db)
        }
        Backend::Memory => {
            tracing::warn!("Using the in-memory store; nothing will be persisted");
            Arc::new(MemoryStore::new())
        }
    };

    let mut rng = match config.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping seeding");
            let _ = cancel_tx.send(true);
        }
    });

    let report = SeedRun::new(store, config)
        .execute(&mut rng, cancel_rx)
        .await?;

    // Summary output
    tracing::info!("Seed run {} completed!", report.run_id);
    tracing::info!(
        "  Probe: {} rows in {:.3}ms",
        report.probe.rows,
        report.probe.elapsed_ms
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
