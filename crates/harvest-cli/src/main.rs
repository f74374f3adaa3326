use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use harvest_engine::{EngineConfig, HarvestEngine, PaperBroker, StaticCatalog};

mod fixture;

use fixture::PortfolioFixture;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    let config = EngineConfig::from_env()?;
    tracing::info!("Configuration loaded");
    tracing::info!(
        "  Long-term threshold: {} days",
        config.harvesting.long_term_threshold_days
    );
    tracing::info!(
        "  Rebalance fraction: {:.0}%",
        config.harvesting.rebalance_fraction * 100.0
    );
    tracing::info!("  Paper latency: {}ms", config.paper_latency_ms);

    let auto_accept: bool = std::env::var("HARVEST_AUTO_ACCEPT")
        .unwrap_or_else(|_| "false".to_string())
        .parse()
        .context("invalid value for HARVEST_AUTO_ACCEPT")?;

    let portfolio = match std::env::var("HARVEST_PORTFOLIO_FILE") {
        Ok(path) => {
            let path = PathBuf::from(path);
            tracing::info!("Loading portfolio from {}", path.display());
            PortfolioFixture::load(&path)?
        }
        Err(_) => {
            tracing::info!("HARVEST_PORTFOLIO_FILE not set, using demo portfolio");
            PortfolioFixture::demo()
        }
    };
    tracing::info!(
        "  {} instruments, {} holdings",
        portfolio.instruments.len(),
        portfolio.holdings.len()
    );

    let catalog = Arc::new(StaticCatalog::new(portfolio.instruments));
    let broker = Arc::new(
        PaperBroker::new(portfolio.holdings)
            .with_latency(Duration::from_millis(config.paper_latency_ms)),
    );
    let engine = HarvestEngine::new(config, catalog, broker.clone(), broker.clone());

    let report = engine.request_analysis().await?;
    println!("{}", serde_json::to_string_pretty(&*report)?);

    if !auto_accept {
        return Ok(());
    }

    // Accept the top-ranked suggestion and show where the session ends up
    let Some(top) = report.suggestions.first() else {
        tracing::info!("No suggestions to accept");
        return Ok(());
    };

    let receipt = engine
        .accept_suggestion(top)
        .await
        .with_context(|| format!("accepting {}", top.id))?;
    println!("{}", serde_json::to_string_pretty(&receipt)?);

    let view = engine.view();
    tracing::info!(
        "Session is {} (stale: {}), {} paper fills recorded",
        view.state.label(),
        engine.is_stale(),
        broker.fills().await.len()
    );
    println!("{}", serde_json::to_string_pretty(&view)?);

    Ok(())
}
