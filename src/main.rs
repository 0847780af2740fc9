//! CLOB market maker: one inventory-skewed quoting loop per configured market
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use clob_market_maker::config::{AppConfig, LoggingConfig, WidthSource};
use clob_market_maker::exchange::{ClobRestClient, Exchange};
use clob_market_maker::maker::{HttpSpreadPredictor, MarketMaker, SpreadPredictor, WidthProvider};

/// `RUST_LOG` wins over the configured level.
fn init_logging(cfg: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));
    match cfg.format.as_str() {
        "json" => tracing_subscriber::fmt().json().with_env_filter(filter).with_target(false).init(),
        _ => tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("MM_CONFIG").ok())
        .unwrap_or_else(|| "config.toml".to_string());
    let config = AppConfig::load(&path)?;
    init_logging(&config.logging);
    info!("═══ CLOB market maker: {} market(s) from {} ═══", config.markets.len(), path);

    let auth = config.exchange.resolve_auth()?;
    info!("[INIT] {:?}", auth);
    let exchange: Arc<dyn Exchange> = Arc::new(
        ClobRestClient::new(&config.exchange.endpoints(), auth, config.exchange.request_timeout())
            .context("Failed to build REST client")?,
    );

    let predictor: Option<Arc<dyn SpreadPredictor>> = match &config.predictor {
        Some(p) => {
            info!("[INIT] Spread model at {}", p.url);
            Some(Arc::new(HttpSpreadPredictor::new(p)?))
        }
        None => None,
    };

    // Every engine does its first fetch before any of them starts quoting.
    let mut makers = Vec::with_capacity(config.markets.len());
    for market in config.markets {
        let widths = match market.width_source {
            WidthSource::Fixed => WidthProvider::Fixed,
            WidthSource::Predicted => WidthProvider::Predicted(
                predictor.clone().context("predicted widths need a [predictor] section")?,
            ),
        };
        let token_id = market.token_id.clone();
        let maker = MarketMaker::create(market, exchange.clone(), widths)
            .await
            .with_context(|| format!("Initial state fetch failed for {token_id}"))?;
        makers.push(maker);
    }

    let cancel_handles: Vec<_> = makers.iter().map(|m| m.cancel_handle()).collect();
    let tasks: Vec<_> = makers
        .into_iter()
        .map(|mut maker| {
            tokio::spawn(async move {
                maker.run().await;
                maker.config().token_id.clone()
            })
        })
        .collect();

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("[SHUTDOWN] Signal received, stopping {} engine(s)", cancel_handles.len()),
        Err(e) => error!("[SHUTDOWN] Signal listener failed ({}), stopping {} engine(s)", e, cancel_handles.len()),
    }
    for handle in &cancel_handles {
        handle.cancel();
    }

    for task in tasks {
        match task.await {
            Ok(token_id) => info!("[SHUTDOWN] {} stopped", token_id),
            Err(e) => error!("[SHUTDOWN] Engine task failed: {}", e),
        }
    }
    Ok(())
}
