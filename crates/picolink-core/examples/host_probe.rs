//! Host-side probe session
//!
//! Opens the device's CDC port, performs the open handshake, exercises the
//! echo and diagnostics commands, and drains the replies.
//!
//! Usage:
//!   cargo run --example host_probe -- [PORT] [BAUD]

use picolink_core::protocol::{list_ports, Link, LinkConfig};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "picolink_core=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let port_name = match args.get(1) {
        Some(name) => name.clone(),
        None => {
            println!("available ports:");
            let ports = list_ports();
            for p in &ports {
                println!("  {} {:?}", p.name, p.product);
            }
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
        // A probe should not hang forever on a silent device
        read_timeout_ms: Some(2000),
    };
    println!("probing {} @ {}", config.port_name, config.baud_rate);

    let mut link = Link::open(&config)?;

    // Open handshake: the device answers with an open confirmation
    link.send_open()?;
    link.receive_packet()?;

    // Echo: the payload should come back as a data frame
    link.send_echo(b"hello from the host")?;
    link.receive_packet()?;

    // Run the device's self-test harness and drain its reports
    link.send_diagnostics_request()?;
    loop {
        match link.receive_packet() {
            Ok(_) => {}
            Err(_) => break,
        }
    }

    link.send_close()?;
    let _ = link.receive_packet();

    let (tx_bytes, rx_bytes, tx_frames, rx_frames) = link.counters();
    println!(
        "session done: tx {}B/{} frames, rx {}B/{} frames",
        tx_bytes, tx_frames, rx_bytes, rx_frames
    );
    Ok(())
}
