// SPDX-License-Identifier: GPL-3.0-only

//! Dump the presentable topology, then follow pool events as JSON lines.
//!
//! Usage: `pool_monitor [dbus-address]`. Without an argument the local
//! system bus is used.

use anyhow::Result;
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use pool_udisks::{Pool, PoolEvent, Transport};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let transport = match std::env::args().nth(1) {
        Some(address) => Transport::Address(address),
        None => Transport::SystemBus,
    };

    let (pool, mut events) = Pool::connect(&transport).await?;

    println!(
        "{}",
        serde_json::json!({
            "daemon_version": pool.daemon_version(),
            "supports_luks_devices": pool.supports_luks_devices(),
        })
    );
    for presentable in pool.presentables() {
        println!("{}", serde_json::to_string(&presentable)?);
    }

    while let Some(event) = events.next().await {
        println!("{}", serde_json::to_string(&event)?);
        if event == PoolEvent::Disconnected {
            break;
        }
    }

    Ok(())
}
