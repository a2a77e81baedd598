//! Close the valve, wait for it to settle, then open it again

use std::time::Duration;

use neptun::{Config, Device, Error};
use tokio::time::sleep;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let host = std::env::var("NEPTUN_HOST").unwrap_or_else(|_| "192.168.1.30".to_string());
    let device = Device::new(Config::new(host));

    let snapshot = device.query_state().await?;
    println!("Device: {}", snapshot.state.info);
    println!("Valve is {}", if snapshot.state.valve_open { "open" } else { "closed" });

    println!("Closing valve...");
    device.set_valve(false).await?;

    // Refused until the valve has settled
    match device.set_valve(true).await {
        Err(Error::OperationInProgress { remaining }) => {
            println!("Valve busy, waiting {:?}", remaining);
            sleep(remaining).await;
        }
        other => {
            other?;
        }
    }

    while device.valve_settling() {
        sleep(Duration::from_secs(1)).await;
        device.query_state().await?;
    }

    println!("Opening valve...");
    device.set_valve(true).await?;

    println!("Done!");
    device.close().await?;

    Ok(())
}
