mod autopilot;
mod config;
mod events;
mod local;
mod runner;
mod transport;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use config::PeerConfig;
use rally::PacketLossSimulation;

#[derive(Parser)]
#[command(name = "rally-peer")]
#[command(about = "Peer-to-peer paddle match over UDP")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = rally::DEFAULT_PORT)]
    port: u16,

    #[arg(long, help = "Address of the other peer, e.g. 192.168.1.20:7878")]
    peer: Option<String>,

    #[arg(long, default_value_t = 1, help = "Stable id used to break random ties")]
    peer_id: u32,

    #[arg(long, help = "JSON file overriding the sync configuration")]
    config: Option<PathBuf>,

    #[arg(long, help = "Run both peers in-process over a simulated link")]
    local: bool,

    #[arg(long, help = "Let the local paddle follow the ball")]
    autoplay: bool,

    #[arg(long, help = "Stop after this many seconds")]
    duration: Option<u64>,

    #[arg(long, help = "Base64-wrap every datagram")]
    text_safe: bool,

    #[arg(long, help = "Enable packet loss simulation on outbound traffic")]
    simulate_packet_loss: bool,

    #[arg(long, default_value_t = 0.0, help = "Packet loss percentage (0-100)")]
    loss_percent: f32,

    #[arg(long, default_value_t = 0, help = "Minimum latency in ms")]
    min_latency: u32,

    #[arg(long, default_value_t = 0, help = "Maximum latency in ms")]
    max_latency: u32,

    #[arg(long, default_value_t = 0, help = "Jitter in ms")]
    jitter: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut sync = config::load_sync_config(args.config.as_deref())?;
    if args.text_safe {
        sync.text_safe = true;
    }

    let link = if args.simulate_packet_loss || args.local {
        Some(PacketLossSimulation {
            enabled: args.simulate_packet_loss,
            loss_percent: args.loss_percent,
            min_latency_ms: args.min_latency,
            max_latency_ms: args.max_latency,
            jitter_ms: args.jitter,
        })
    } else {
        None
    };

    let config = PeerConfig {
        bind_addr: format!("{}:{}", args.bind, args.port),
        peer_addr: args.peer,
        peer_id: args.peer_id,
        sync,
        link,
        autoplay: args.autoplay || args.local,
        duration_secs: args.duration,
    };

    if args.local {
        local::run(config).await
    } else {
        runner::run(config).await
    }
}
