mod config;
mod discipline;
mod gps_reader;
mod monotonic;
mod nmea;
mod ntp_wire;
mod security;
mod sntp_client;
mod sntp_server;
mod stats;
mod web_server;

use anyhow::{Context, Result};
use config::Config;
use discipline::DisciplineEngine;
use gps_reader::GpsReader;
use monotonic::{MonotonicClock, SystemMonotonicClock};
use nmea::NmeaParser;
use sntp_client::{SntpClient, SntpClientConfig};
use sntp_server::{SntpServer, SntpServerConfig};
use stats::StatsManager;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use web_server::WebServer;

fn main() -> Result<()> {
    init_logging()?;

    info!("chronosync v{}", env!("CARGO_PKG_VERSION"));
    info!("GPS/SNTP time discipline appliance core");

    let config_path = get_config_path();
    let config = load_or_create_config(&config_path)?;

    info!("Configuration:");
    info!("  SNTP server bind address: {}", config.sntp_server.bind_address);
    info!("  GPS enabled: {}", config.gps.enabled);
    info!("  SNTP client enabled: {}", config.sntp_client.enabled);
    info!("  Rate limiting: {}", config.security.enable_rate_limiting);

    let stats = Arc::new(StatsManager::new());

    let monotonic: Arc<dyn MonotonicClock> = Arc::new(SystemMonotonicClock::new());
    let discipline = Arc::new(DisciplineEngine::new(monotonic.now_micros()));
    let nmea_parser = Arc::new(RwLock::new(NmeaParser::new()));

    if config.gps.enabled {
        info!("Starting GPS reader thread...");
        let reader = GpsReader::new(
            config.gps.clone(),
            Arc::clone(&nmea_parser),
            Arc::clone(&discipline),
            Arc::clone(&monotonic),
            Arc::clone(&stats),
        );
        let _gps_thread = reader.start();
        info!("GPS reader thread started successfully");
        std::thread::sleep(Duration::from_secs(2));
    } else {
        warn!("GPS module is disabled in configuration");
    }

    if config.sntp_client.enabled {
        let client_config = SntpClientConfig {
            server_addr: config.sntp_client.server_addr.clone(),
            poll_interval: Duration::from_secs(config.sntp_client.poll_interval_secs),
            reply_timeout: Duration::from_secs(config.sntp_client.reply_timeout_secs),
            ntp_version: config.sntp_client.ntp_version,
            ntp_min_version_ok: config.sntp_client.ntp_min_version_ok,
        };
        let client = SntpClient::new(client_config, Arc::clone(&discipline), Arc::clone(&monotonic));
        let client_stats = client.stats();
        let stats_for_client = Arc::clone(&stats);
        std::thread::spawn(move || client.run_loop());
        std::thread::spawn(move || loop {
            stats_for_client.update_sntp_client(|s| {
                s.polls_sent = client_stats.polls_sent.load(std::sync::atomic::Ordering::Relaxed);
                s.replies_received = client_stats
                    .replies_received
                    .load(std::sync::atomic::Ordering::Relaxed);
                s.replies_rejected = client_stats
                    .replies_rejected
                    .load(std::sync::atomic::Ordering::Relaxed);
                s.last_offset_micros = client_stats
                    .last_offset_micros
                    .load(std::sync::atomic::Ordering::Relaxed);
            });
            std::thread::sleep(Duration::from_secs(1));
        });
        info!("SNTP client polling {}", config.sntp_client.server_addr);
    }

    let server_config = SntpServerConfig {
        bind_addr: config.sntp_server.bind_address.clone(),
        max_requests_per_second: config.sntp_server.max_requests_per_second,
        whitelist: config.security.ip_whitelist.clone(),
        blacklist: config.security.ip_blacklist.clone(),
    };
    let sntp_server = SntpServer::new(server_config, Arc::clone(&discipline), Arc::clone(&monotonic));
    let sntp_server_stats = sntp_server.stats();
    let stats_for_server = Arc::clone(&stats);
    std::thread::spawn(move || loop {
        stats_for_server.update_sntp_server(|s| {
            s.requests_served = sntp_server_stats
                .requests_served
                .load(std::sync::atomic::Ordering::Relaxed);
            s.requests_rejected = sntp_server_stats
                .requests_rejected
                .load(std::sync::atomic::Ordering::Relaxed);
            s.requests_rate_limited = sntp_server_stats
                .requests_rate_limited
                .load(std::sync::atomic::Ordering::Relaxed);
        });
        std::thread::sleep(Duration::from_secs(1));
    });

    {
        let stats_for_clock = Arc::clone(&stats);
        let discipline_for_clock = Arc::clone(&discipline);
        let monotonic_for_clock = Arc::clone(&monotonic);
        std::thread::spawn(move || loop {
            stats_for_clock.update_clock(|info| {
                let now = monotonic_for_clock.now_micros();
                info.stratum = discipline_for_clock.get_stratum();
                info.reference_id = String::from_utf8_lossy(
                    &discipline_for_clock.get_reference_id().to_be_bytes(),
                )
                .trim_end_matches('\0')
                .to_string();
                info.current_utc_micros = discipline_for_clock.get_utc_micros(now);
            });
            std::thread::sleep(Duration::from_millis(500));
        });
    }

    let web_bind = format!("{}:{}", config.webserver.bind_address, config.webserver.port);
    info!("Starting web interface on http://{}", web_bind);
    let web_server = WebServer::new(web_bind, Arc::clone(&stats), Arc::clone(&discipline), Arc::clone(&monotonic));
    let _web_thread = web_server.start();

    let shutdown_requested = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let ctrl_c_count = Arc::new(std::sync::atomic::AtomicU8::new(0));

    let shutdown_clone = Arc::clone(&shutdown_requested);
    let count_clone = Arc::clone(&ctrl_c_count);

    ctrlc::set_handler(move || {
        let count = count_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        if count == 0 {
            warn!("Ctrl+C detected. Press again within 5 seconds to stop the server.");

            let count_disarm = Arc::clone(&count_clone);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_secs(5));
                let current = count_disarm.load(std::sync::atomic::Ordering::SeqCst);
                if current == 1 {
                    count_disarm.store(0, std::sync::atomic::Ordering::SeqCst);
                    info!("Shutdown cancelled, server continuing.");
                }
            });
        } else {
            warn!("Shutdown confirmed, closing server...");
            shutdown_clone.store(true, std::sync::atomic::Ordering::SeqCst);
            std::thread::spawn(|| {
                std::thread::sleep(Duration::from_secs(2));
                error!("Forced shutdown (timeout)");
                std::process::exit(0);
            });
        }
    })
    .context("Failed to set Ctrl+C handler")?;

    info!("Press Ctrl+C twice (within 5 seconds) to stop");
    while !shutdown_requested.load(std::sync::atomic::Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(200));
    }

    Ok(())
}

/// Initialise le système de logging
fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Failed to create log filter")?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .with(filter)
        .init();

    Ok(())
}

/// Obtient le chemin du fichier de configuration
fn get_config_path() -> PathBuf {
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        return PathBuf::from(&args[1]);
    }

    #[cfg(target_os = "linux")]
    return PathBuf::from("/etc/chronosync/config.toml");

    #[cfg(not(target_os = "linux"))]
    return PathBuf::from("config.toml");
}

/// Charge la configuration ou crée un fichier exemple
fn load_or_create_config(path: &PathBuf) -> Result<Config> {
    if path.exists() {
        info!("Loading configuration from {}", path.display());
        Config::from_file(path)
    } else {
        warn!("Configuration file not found: {}", path.display());
        warn!("Creating example configuration...");

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
        }

        Config::create_example_config(path).context("Failed to create example config")?;

        info!("Example configuration created at {}", path.display());
        info!("Please edit the configuration file and restart the server.");

        Config::from_file(path)
    }
}
