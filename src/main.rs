//! airly-sensor: Airly air-quality accessory.
//!
//! Single-binary Tokio application that:
//! 1. Loads the accessory configuration
//! 2. Registers the information and air-quality services with a local host
//! 3. Polls the AirQuality characteristic the way a smart-home host would
//! 4. Logs every characteristic change

mod config;

use std::{path::PathBuf, sync::Arc, time::Duration};

use chrono::{TimeZone, Utc};
use clap::Parser;
use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use sensor::{AirAccessory, Characteristic, CharacteristicValue, SensorHost, ACCESSORY_NAME, PLUGIN_NAME};

/// Airly air-quality sensor accessory
#[derive(Parser)]
#[command(name = "airly-sensor", about = "Airly air-quality sensor accessory")]
struct Cli {
    /// Path to the accessory config (.toml, or .json in host format).
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Perform a single read, print the category, and exit.
    #[arg(long)]
    once: bool,

    /// Seconds between host polls of the AirQuality characteristic.
    #[arg(long, default_value_t = 60)]
    interval_secs: u64,
}

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(300);

/// Local stand-in for the smart-home host: keeps the latest value of every
/// characteristic and logs changes.
#[derive(Debug, Default)]
struct RecordingHost {
    values: DashMap<Characteristic, CharacteristicValue>,
}

impl RecordingHost {
    fn snapshot(&self) -> String {
        let mut entries: Vec<String> = self
            .values
            .iter()
            .map(|entry| format!("{}={}", entry.key(), entry.value()))
            .collect();
        entries.sort();
        entries.join(" ")
    }
}

impl SensorHost for RecordingHost {
    fn set_characteristic(&self, kind: Characteristic, value: CharacteristicValue) {
        let previous = self.values.insert(kind, value.clone());
        if previous.as_ref() != Some(&value) {
            info!("{} -> {}", kind, value);
        } else {
            debug!("{} unchanged ({})", kind, value);
        }
    }

    fn identify(&self) {
        info!("Host identify: accessory acknowledged");
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "airly_sensor=info,airly_client=info,sensor=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    info!("Airly sensor starting up ({} / {})", PLUGIN_NAME, ACCESSORY_NAME);

    // Load configuration.
    let cfg = match config::load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Accessory '{}' at ({}, {}), cache_ttl={}s, request_timeout={}s",
        cfg.name, cfg.latitude, cfg.longitude, cfg.cache_ttl_secs, cfg.request_timeout_secs
    );

    let host = Arc::new(RecordingHost::default());
    let accessory = match AirAccessory::from_config(&cfg, host.clone()) {
        Ok(a) => Arc::new(a),
        Err(e) => {
            error!("Accessory initialization failed: {}", e);
            std::process::exit(1);
        }
    };

    for service in accessory.services() {
        info!(
            "Service {:?} name={:?} characteristics={:?}",
            service.kind, service.name, service.characteristics
        );
    }
    accessory.identify();

    // ── Single-read mode ─────────────────────────────────────────────
    if cli.once {
        match accessory.get_air_quality().await {
            Ok(category) => {
                println!("{} ({})", category, category.as_u8());
                return;
            }
            Err(e) => {
                error!("Read failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    if cli.interval_secs == 0 {
        warn!("--interval-secs 0 is not allowed, polling every second instead");
    }
    let poll_interval = Duration::from_secs(cli.interval_secs.max(1));

    // Task 1: host poll loop
    let poll_accessory = accessory.clone();
    let poll_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            poll_accessory
                .handle_get(|result| match result {
                    Ok(value) => debug!("AirQuality get -> {}", value),
                    Err(e) => warn!("AirQuality get failed: {}", e),
                })
                .await;
        }
    });

    // Task 2: heartbeat
    let hb_accessory = accessory.clone();
    let hb_host = host.clone();
    let heartbeat_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let cache = hb_accessory.controller().cache_state().await;
            let last_update = cache
                .last_update()
                .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_else(|| "never".to_string());
            info!(
                "HEARTBEAT: last_fetch={} values=[{}]",
                last_update,
                hb_host.snapshot()
            );
        }
    });

    // ── Wait for shutdown ────────────────────────────────────────────
    info!("Airly sensor is running. Press Ctrl+C to stop.");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        r = poll_handle => {
            error!("Poll task exited: {:?}", r);
        }
        r = heartbeat_handle => {
            error!("Heartbeat task exited: {:?}", r);
        }
    }

    info!("Airly sensor stopped");
}
