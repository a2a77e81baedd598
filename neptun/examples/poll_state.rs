//! Poll a controller and print every state change

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use neptun::{Config, Device, Poller};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let host = std::env::var("NEPTUN_HOST").unwrap_or_else(|_| "192.168.1.30".to_string());
    let port = match std::env::var("NEPTUN_PORT") {
        Ok(port) => port.parse().context("NEPTUN_PORT is not a port number")?,
        Err(_) => neptun_core::DEFAULT_PORT,
    };

    let config = Config::new(host).with_port(port).with_poll_interval(Duration::from_secs(30));
    let interval = config.poll_interval;
    let device = Arc::new(Device::new(config));

    let poller = Poller::spawn(device.clone(), interval);
    let mut updates = poller.subscribe();

    println!("Polling every {:?}, Ctrl-C to stop", interval);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                changed?;
                let status = updates.borrow_and_update().clone();

                match (&status.snapshot, status.reachable) {
                    (Some(snapshot), true) => {
                        println!("{}", snapshot);
                        for sensor in &snapshot.state.sensors {
                            println!(
                                "  sensor {}: {}, battery {}%, signal {}",
                                sensor.index, sensor.state, sensor.battery_percent, sensor.signal
                            );
                        }
                        for (number, line) in snapshot.state.lines.iter().enumerate() {
                            println!("  line {}: {} {}", number + 1, line.mode, line.value);
                        }
                        if snapshot.leak_alarm() {
                            println!("  LEAK ALARM");
                        }
                    }
                    _ => println!(
                        "Unreachable ({}), online: {}",
                        status.last_error.as_deref().unwrap_or("no response"),
                        device.is_online()
                    ),
                }
            }
        }
    }

    poller.shutdown().await;
    device.close().await?;

    Ok(())
}
