// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]
#![deny(rustdoc::all)]
#![allow(rustdoc::missing_crate_level_docs)]

use clap::Parser;
use std::path::PathBuf;
use devmon::{Reporter, watch_links};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "device_manager")]
#[command(about = "Streams kernel link events to the forwarder", long_about = None)]
struct CmdArgs {
    /// Local datagram socket address the observer binds for itself
    #[arg(value_name = "observer-address")]
    observer_address: PathBuf,

    /// Control socket address of the forwarder
    #[arg(value_name = "forwarder-address")]
    forwarder_address: PathBuf,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_thread_names(true)
        .with_env_filter(EnvFilter::new("debug"))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging();
    info!("Starting device manager process...");

    let args = CmdArgs::parse();

    let reporter = match Reporter::new(&args.observer_address, &args.forwarder_address) {
        Ok(reporter) => reporter,
        Err(e) => {
            error!(
                "Failed to bind observer socket {}: {e}",
                args.observer_address.display()
            );
            std::process::exit(1);
        }
    };

    if let Err(e) = watch_links(&reporter).await {
        error!("Link watcher stopped: {e}");
        std::process::exit(1);
    }
}
