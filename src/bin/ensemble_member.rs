//! Ensemble Member - command line group member
//!
//! Joins a group, prints every upcall and optionally casts a numbered
//! stream of messages once the first view arrives. Leaves after the given
//! duration and waits for the exit.
//!
//! # Usage
//!
//! ```text
//! cargo run --features cli --bin ensemble_member -- --group chat --cast 10 --duration 30
//! ```
//!
//! # Options
//!
//! - `--host ADDR` - Server host (default: $ENSEMBLE_HOST or 127.0.0.1)
//! - `--port PORT` - Server port (default: $ENSEMBLE_PORT or 5002)
//! - `--group NAME` - Group to join (default: ensemble)
//! - `--cast N` - Messages to cast after the first view (default: 0)
//! - `--duration SEC` - Time in the group before leaving (default: 10)

use std::thread;
use std::time::{Duration, Instant};

use ensemble::{ClientConfig, Connection, JoinOps, Member, MessageKind, Status};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Member configuration
struct MemberConfig {
    client: ClientConfig,
    group: String,
    casts: usize,
    duration_secs: u64,
}

impl Default for MemberConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::from_env(),
            group: "ensemble".to_string(),
            casts: 0,
            duration_secs: 10,
        }
    }
}

#[derive(Default)]
struct Counters {
    views: u64,
    casts: u64,
    sends: u64,
    blocks: u64,
}

fn run_member(config: MemberConfig) -> ensemble::Result<()> {
    println!("Ensemble Member");
    println!("===============\n");
    println!("  Server:     {}:{}", config.client.host, config.client.port);
    println!("  Group:      {}", config.group);
    println!("  Duration:   {}s\n", config.duration_secs);

    let conn = Connection::connect(&config.client)?;
    let member = Member::new();
    conn.join(&member, JoinOps::new(config.group.as_str()))?;

    let start_time = Instant::now();
    let leave_at = start_time + Duration::from_secs(config.duration_secs);
    let mut counters = Counters::default();
    let mut casts_sent = 0usize;

    loop {
        if member.status() == Status::Normal {
            if casts_sent < config.casts {
                let text = format!("message {} from {:?}", casts_sent, member.id());
                conn.cast(&member, text.as_bytes())?;
                casts_sent += 1;
            } else if Instant::now() >= leave_at {
                conn.leave(&member)?;
            }
        }

        // Poll so the leave deadline is honored even when the group is quiet
        if !conn.poll()? {
            thread::sleep(Duration::from_millis(1));
            continue;
        }

        let msg = conn.recv()?;
        match msg.kind {
            MessageKind::View(view) => {
                counters.views += 1;
                println!(
                    "  [view] ltime={} rank={}/{} members={:?}",
                    view.ltime, view.rank, view.nmembers, view.view
                );
            }
            MessageKind::Cast { origin, data } => {
                counters.casts += 1;
                println!("  [cast] from {}: {}", origin, String::from_utf8_lossy(&data));
            }
            MessageKind::Send { origin, data } => {
                counters.sends += 1;
                println!("  [send] from {}: {}", origin, String::from_utf8_lossy(&data));
            }
            MessageKind::Block => {
                counters.blocks += 1;
                conn.block_ok(&msg.member)?;
            }
            MessageKind::Exit => break,
        }
    }

    conn.close()?;

    println!("\nSummary:");
    println!("  In group:   {:.2}s", start_time.elapsed().as_secs_f64());
    println!("  Views:      {}", counters.views);
    println!("  Casts:      {} received, {} sent", counters.casts, casts_sent);
    println!("  Sends:      {}", counters.sends);
    println!("  Blocks:     {}", counters.blocks);
    Ok(())
}

fn parse_args() -> MemberConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = MemberConfig::default();

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--host" | "-h", Some(v)) => {
                config.client.host = v.clone();
                i += 1;
            }
            ("--port" | "-p", Some(v)) => {
                config.client.port = v.parse().unwrap_or(config.client.port);
                i += 1;
            }
            ("--group" | "-g", Some(v)) => {
                config.group = v.clone();
                i += 1;
            }
            ("--cast" | "-c", Some(v)) => {
                config.casts = v.parse().unwrap_or(0);
                i += 1;
            }
            ("--duration" | "-d", Some(v)) => {
                config.duration_secs = v.parse().unwrap_or(10);
                i += 1;
            }
            ("--help", _) => {
                println!("Ensemble Member\n");
                println!("Usage: ensemble_member [OPTIONS]\n");
                println!("Options:");
                println!("  -h, --host <ADDR>      Server host (default: 127.0.0.1)");
                println!("  -p, --port <PORT>      Server port (default: 5002)");
                println!("  -g, --group <NAME>     Group to join (default: ensemble)");
                println!("  -c, --cast <N>         Messages to cast (default: 0)");
                println!("  -d, --duration <SEC>   Time before leaving (default: 10)");
                println!("      --help             Show this help");
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = parse_args();
    info!(group = %config.group, "starting member");

    if let Err(e) = run_member(config) {
        error!(error = %e, "member failed");
        eprintln!("\nMake sure the Ensemble server is running and reachable.");
        std::process::exit(1);
    }
}
