// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]
#![deny(rustdoc::all)]
#![allow(rustdoc::missing_crate_level_docs)]

mod args;

use crate::args::{CmdArgs, Parser};
use forwarding::ForwardingPlane;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

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

fn main() {
    init_logging();
    info!("Starting forwarder process...");

    let args = CmdArgs::parse();

    let plane = match ForwardingPlane::new() {
        Ok(plane) => plane,
        Err(e) => {
            error!("Failed to create the forwarding plane: {e}");
            std::process::exit(1);
        }
    };

    plane.bootstrap();

    if let Err(e) = plane.run(args.control_address()) {
        error!("Forwarding plane stopped: {e}");
        std::process::exit(1);
    }
}
