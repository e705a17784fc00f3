//! Irrigation event gateway
//!
//! Run with: cargo run --example irrigation_server [BIND_ADDR]
//!
//! Replay limits come from the environment:
//!   EVENTS_REPLAY_HISTORYSIZE   events kept for late joiners (default 500)
//!   EVENTS_REPLAY_MAXAGE        maximum age in milliseconds (default 60000, <= 0 disables)
//!
//! ## Try it
//!
//! Dashboard (replays recent readings, then streams):
//!   nc localhost 7070
//!   SUB sensor-readings
//!
//! Device (live commands only):
//!   nc localhost 7070
//!   SUB commands
//!
//! Operator:
//!   nc localhost 7070
//!   PUB commands {"deviceId":"d1","command":"OPEN_VALVE","valve":1}

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use replay_hub::hub::{DEFAULT_REPLAY_HISTORY_SIZE, DEFAULT_REPLAY_MAX_AGE_MILLIS};
use replay_hub::{BroadcastHub, HubConfig, HubServer, IrrigationChannels, ServerConfig};

const DEFAULT_PORT: u16 = 7070;

/// Parse bind address from command line argument.
///
/// Accepts "localhost", "localhost:PORT", "IP" or "IP:PORT".
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn env_i64(name: &str, default: i64) -> Result<i64, String> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| format!("{} must be an integer, got '{}'", name, value)),
        Err(_) => Ok(default),
    }
}

/// Publish a fake device state report every couple of seconds
async fn simulate_device(channels: IrrigationChannels) {
    let mut ticker = tokio::time::interval(Duration::from_secs(2));
    let mut tick: u64 = 0;

    loop {
        ticker.tick().await;
        tick += 1;

        let reading = format!(
            r#"{{"type":"state","deviceId":"sim-1","time":{},"valves":[0,0,0],"moists":[{},{}]}}"#,
            tick * 2000,
            40 + tick % 7,
            52 - tick % 5
        );

        if channels.publish_reading(reading).await.is_err() {
            break;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        eprintln!("Usage: irrigation_server [BIND_ADDR] [--simulate]");
        return Ok(());
    }

    let bind_addr = match args.get(1).filter(|a| !a.starts_with("--")) {
        Some(addr) => parse_bind_addr(addr)?,
        None => SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
    };
    let simulate = args.iter().any(|a| a == "--simulate");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("replay_hub=debug".parse()?)
                .add_directive("irrigation_server=debug".parse()?),
        )
        .init();

    let history_size = env_i64(
        "EVENTS_REPLAY_HISTORYSIZE",
        DEFAULT_REPLAY_HISTORY_SIZE as i64,
    )?;
    let max_age = env_i64("EVENTS_REPLAY_MAXAGE", DEFAULT_REPLAY_MAX_AGE_MILLIS as i64)?;

    let hub = Arc::new(BroadcastHub::with_config(HubConfig::from_millis(
        history_size,
        max_age,
    )?));
    let channels = IrrigationChannels::declare(Arc::clone(&hub)).await?;

    if simulate {
        tokio::spawn(simulate_device(channels.clone()));
    }

    let server = HubServer::new(ServerConfig::with_addr(bind_addr), Arc::clone(&hub));

    println!("Irrigation gateway on {}", bind_addr);
    println!("Topics: sensor-readings (replay {}), commands (live)", history_size);

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    // Shutdown drains every topic, so read the totals first
    let stats = hub.stats().await;
    hub.shutdown().await;

    println!(
        "Published {} events, dropped {} deliveries",
        stats.published, stats.dropped
    );

    Ok(())
}
