//! Spreadwatch - Pair Analytics for Statistical Arbitrage

use anyhow::Result;
use spreadwatch::adapters::cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (SPREADWATCH_BIND_ADDR, RUST_LOG)
    dotenvy::dotenv().ok();

    let app = cli::init();
    cli::execute(app).await
}
