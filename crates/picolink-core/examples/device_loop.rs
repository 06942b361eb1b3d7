//! Device-style polling loop
//!
//! Drives the engine the way device firmware does: block on the next
//! inbound frame, dispatch it, repeat. Run it against a peer on the other
//! end of a serial port (or a pty pair for local experiments).
//!
//! Usage:
//!   cargo run --example device_loop -- [PORT] [BAUD]
//!
//! Defaults: first detected port, 115200 baud.

use picolink_core::protocol::{list_ports, Link, LinkConfig};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "picolink_core=debug".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let port_name = match args.get(1) {
        Some(name) => name.clone(),
        None => {
            let ports = list_ports();
            let first = ports
                .first()
                .ok_or_else(|| anyhow::anyhow!("no serial ports found"))?;
            first.name.clone()
        }
    };
    let baud_rate = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(115200);

    let config = LinkConfig {
        port_name,
        baud_rate,
        read_timeout_ms: None,
    };
    println!("listening on {} @ {}", config.port_name, config.baud_rate);

    let mut link = Link::open(&config)?;
    link.set_diagnostics_hook(|| println!("diagnostics requested"));

    loop {
        let len = link.receive_packet()?;
        let (tx_bytes, rx_bytes, tx_frames, rx_frames) = link.counters();
        println!(
            "frame of {} bytes (tx {}B/{} frames, rx {}B/{} frames)",
            len, tx_bytes, tx_frames, rx_bytes, rx_frames
        );
    }
}
