//! Daemon configuration — layered env/file settings via the `config` crate.

use plotpalette_core::domain::{Micros, TierRate};
use plotpalette_infra_system::TierEndpoint;
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "~/.plotpalette/meta.db";

/// Resolved daemon settings, built from defaults overridden by
/// `PLOTPALETTE_*` environment variables (and, if present, a
/// `config/plotpalette.toml` file in the working directory).
pub struct DaemonConfig {
    pub db_path: String,
    pub rpc_host: String,
    pub rpc_port: u16,
    pub log_format: String,
    pub model_base_url: String,
    pub model_api_key: Option<String>,
    pub model_tiers: BTreeMap<String, TierEndpoint>,
    pub rate_table: BTreeMap<String, TierRate>,
    pub heartbeat_timeout_ms: i64,
    pub preempt_grace_ms: i64,
    pub maintenance_interval_hours: u64,
}

impl DaemonConfig {
    pub fn load() -> anyhow::Result<Self> {
        let raw = config::Config::builder()
            .add_source(config::File::with_name("config/plotpalette").required(false))
            .add_source(config::Environment::with_prefix("PLOTPALETTE").separator("__"))
            .build()?;

        let db_path = raw
            .get_string("db_path")
            .unwrap_or_else(|_| shellexpand::tilde(DEFAULT_DB_PATH).into_owned());
        let rpc_host = raw.get_string("rpc_host").unwrap_or_else(|_| "127.0.0.1".to_string());
        let rpc_port: u16 = raw.get_int("rpc_port").map(|p| p as u16).unwrap_or(9527);
        let log_format = raw.get_string("log_format").unwrap_or_else(|_| "pretty".to_string());
        let model_base_url = raw
            .get_string("model_base_url")
            .unwrap_or_else(|_| "http://127.0.0.1:8090".to_string());
        let model_api_key = raw.get_string("model_api_key").ok();
        let heartbeat_timeout_ms = raw.get_int("heartbeat_timeout_ms").unwrap_or(600_000);
        let preempt_grace_ms = raw.get_int("preempt_grace_ms").unwrap_or(120_000);
        let maintenance_interval_hours = raw
            .get_int("maintenance_interval_hours")
            .map(|h| h as u64)
            .unwrap_or(24);

        let mut model_tiers = BTreeMap::new();
        model_tiers.insert(
            "standard".to_string(),
            TierEndpoint { model_id: "standard-v1".to_string(), timeout: Duration::from_secs(30) },
        );
        model_tiers.insert(
            "premium".to_string(),
            TierEndpoint { model_id: "premium-v1".to_string(), timeout: Duration::from_secs(60) },
        );

        let mut rate_table = BTreeMap::new();
        rate_table.insert(
            "standard".to_string(),
            TierRate {
                input_rate_per_million: Micros::from_dollars(0.50),
                output_rate_per_million: Micros::from_dollars(1.50),
            },
        );
        rate_table.insert(
            "premium".to_string(),
            TierRate {
                input_rate_per_million: Micros::from_dollars(3.00),
                output_rate_per_million: Micros::from_dollars(9.00),
            },
        );

        Ok(Self {
            db_path,
            rpc_host,
            rpc_port,
            log_format,
            model_base_url,
            model_api_key,
            model_tiers,
            rate_table,
            heartbeat_timeout_ms,
            preempt_grace_ms,
            maintenance_interval_hours,
        })
    }
}
