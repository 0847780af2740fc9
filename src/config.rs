//! Configuration loading from TOML.
//!
//! One `[[markets]]` table per quoted token. Secrets are referenced by
//! env-var name in the file and resolved at startup.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::exchange::{ClobAuth, ClobEndpoints};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub predictor: Option<PredictorConfig>,
    pub markets: Vec<MakerConfig>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExchangeConfig {
    pub clob_url: String,
    pub data_url: String,
    pub request_timeout_secs: u64,
    pub address_env: String,
    pub api_key_env: String,
    pub api_secret_env: String,
    pub passphrase_env: String,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        let endpoints = ClobEndpoints::default();
        Self {
            clob_url: endpoints.clob_url,
            data_url: endpoints.data_url,
            request_timeout_secs: 10,
            address_env: "POLYMARKET_PROXY_ADDRESS".into(),
            api_key_env: "CLOB_API_KEY".into(),
            api_secret_env: "CLOB_SECRET".into(),
            passphrase_env: "CLOB_PASS_PHRASE".into(),
        }
    }
}

impl ExchangeConfig {
    pub fn endpoints(&self) -> ClobEndpoints {
        ClobEndpoints {
            clob_url: self.clob_url.clone(),
            data_url: self.data_url.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Build credentials from the environment.
    pub fn resolve_auth(&self) -> Result<ClobAuth> {
        Ok(ClobAuth::new(
            resolve_env(&self.address_env)?,
            resolve_env(&self.api_key_env)?,
            resolve_env(&self.api_secret_env)?,
            resolve_env(&self.passphrase_env)?,
        ))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PredictorConfig {
    pub url: String,
    #[serde(default = "default_predictor_timeout_ms")]
    pub timeout_ms: u64,
}

// ═══════════════════════════════════════════════════════════════════
// PER-MARKET MAKER CONFIG
// ═══════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpreadMode {
    /// Same width both sides
    #[default]
    Symmetric,
    /// Widen the side that would add to the skew
    Asymmetric,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePolicy {
    /// Cancel/replace only when widths or sizes moved
    #[default]
    OnChange,
    /// Cancel/replace every tick
    Always,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WidthSource {
    #[default]
    Fixed,
    Predicted,
}

/// Immutable per-market parameters.
#[derive(Debug, Deserialize, Clone)]
pub struct MakerConfig {
    pub market_address: String,
    pub token_id: String,
    /// Seconds between iterations
    pub update_interval: f64,
    #[serde(default)]
    pub target_position: f64,
    #[serde(default = "default_max_position")]
    pub max_position: f64,
    /// Fraction of `max_position` at which rebalancing kicks in
    #[serde(default = "default_skew_threshold")]
    pub position_skew_threshold: f64,
    #[serde(default = "default_base_spread_width")]
    pub base_spread_width: f64,
    #[serde(default)]
    pub skew_adjustment: Option<f64>,
    #[serde(default)]
    pub spread_mode: SpreadMode,
    #[serde(default = "default_order_size")]
    pub base_order_size: f64,
    #[serde(default = "default_order_size")]
    pub min_order_size: f64,
    #[serde(default = "default_rebalance_chunk")]
    pub rebalance_chunk: f64,
    #[serde(default = "default_tick_size")]
    pub tick_size: f64,
    #[serde(default = "default_settle_delay")]
    pub settle_delay_secs: f64,
    #[serde(default)]
    pub reconcile_policy: ReconcilePolicy,
    #[serde(default)]
    pub width_source: WidthSource,
    #[serde(default = "default_true")]
    pub cancel_on_shutdown: bool,
    /// Log engine stats every N iterations (0 disables)
    #[serde(default = "default_stats_every")]
    pub stats_every: u64,
}

fn default_max_position() -> f64 {
    100.0
}
fn default_skew_threshold() -> f64 {
    0.3
}
fn default_base_spread_width() -> f64 {
    0.05
}
fn default_order_size() -> f64 {
    5.0
}
fn default_rebalance_chunk() -> f64 {
    10.0
}
fn default_tick_size() -> f64 {
    0.01
}
fn default_settle_delay() -> f64 {
    5.0
}
fn default_true() -> bool {
    true
}
fn default_stats_every() -> u64 {
    30
}
fn default_predictor_timeout_ms() -> u64 {
    500
}

/// Upper bound for `update_interval` and `settle_delay_secs`
pub const MAX_DURATION_SECS: f64 = 3600.0;

impl MakerConfig {
    /// Defaults for everything but identity and interval.
    pub fn new(market_address: &str, token_id: &str, update_interval: f64) -> Self {
        Self {
            market_address: market_address.to_string(),
            token_id: token_id.to_string(),
            update_interval,
            target_position: 0.0,
            max_position: default_max_position(),
            position_skew_threshold: default_skew_threshold(),
            base_spread_width: default_base_spread_width(),
            skew_adjustment: None,
            spread_mode: SpreadMode::Symmetric,
            base_order_size: default_order_size(),
            min_order_size: default_order_size(),
            rebalance_chunk: default_rebalance_chunk(),
            tick_size: default_tick_size(),
            settle_delay_secs: default_settle_delay(),
            reconcile_policy: ReconcilePolicy::OnChange,
            width_source: WidthSource::Fixed,
            cancel_on_shutdown: true,
            stats_every: default_stats_every(),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.update_interval)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs_f64(self.settle_delay_secs)
    }

    /// Absolute skew above which the rebalancer fires
    pub fn rebalance_threshold(&self) -> f64 {
        self.max_position * self.position_skew_threshold
    }

    pub fn validate(&self) -> Result<()> {
        let token = &self.token_id;
        if self.market_address.is_empty() || self.token_id.is_empty() {
            bail!("market_address and token_id are required");
        }

        // NaN and infinities fail every range check below
        let finite = [
            ("update_interval", self.update_interval),
            ("target_position", self.target_position),
            ("max_position", self.max_position),
            ("position_skew_threshold", self.position_skew_threshold),
            ("base_spread_width", self.base_spread_width),
            ("skew_adjustment", self.skew_adjustment.unwrap_or_default()),
            ("base_order_size", self.base_order_size),
            ("min_order_size", self.min_order_size),
            ("rebalance_chunk", self.rebalance_chunk),
            ("tick_size", self.tick_size),
            ("settle_delay_secs", self.settle_delay_secs),
        ];
        if let Some((name, value)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            bail!("[{token}] {name} must be a finite number, got {value}");
        }

        if !(self.update_interval > 0.0 && self.update_interval <= MAX_DURATION_SECS) {
            bail!("[{token}] update_interval must be within (0, {MAX_DURATION_SECS}]");
        }
        if !(0.0..=MAX_DURATION_SECS).contains(&self.settle_delay_secs) {
            bail!("[{token}] settle_delay_secs must be within [0, {MAX_DURATION_SECS}]");
        }
        if self.max_position <= 0.0 {
            bail!("[{token}] max_position must be > 0");
        }
        if !(0.0..=1.0).contains(&self.position_skew_threshold) {
            bail!("[{token}] position_skew_threshold must be within [0, 1]");
        }
        if self.base_spread_width <= 0.0 {
            bail!("[{token}] base_spread_width must be > 0");
        }
        if self.base_order_size <= 0.0 || self.min_order_size <= 0.0 || self.rebalance_chunk <= 0.0 {
            bail!("[{token}] order sizes must be > 0");
        }
        if !(self.tick_size > 0.0 && self.tick_size <= 0.1) {
            bail!("[{token}] tick_size must be within (0, 0.1]");
        }
        if self.spread_mode == SpreadMode::Asymmetric && self.skew_adjustment.is_none() {
            bail!("[{token}] asymmetric spread_mode needs skew_adjustment");
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Invalid config file: {path}"))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.markets.is_empty() {
            bail!("at least one [[markets]] entry is required");
        }
        for market in &self.markets {
            market.validate()?;
            if market.width_source == WidthSource::Predicted && self.predictor.is_none() {
                bail!("[{}] width_source = \"predicted\" needs a [predictor] section", market.token_id);
            }
        }
        Ok(())
    }
}

/// Resolve an environment variable name to its value.
pub fn resolve_env(env_name: &str) -> Result<String> {
    std::env::var(env_name).with_context(|| format!("Environment variable not set: {env_name}"))
}
