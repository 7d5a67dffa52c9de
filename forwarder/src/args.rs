// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

pub(crate) use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "forwarder")]
#[command(about = "User-space learning ethernet bridge", long_about = None)]
pub(crate) struct CmdArgs {
    /// Local datagram socket address to receive device updates on
    #[arg(value_name = "forwarder-address")]
    control_address: PathBuf,
}

impl CmdArgs {
    pub(crate) fn control_address(&self) -> &PathBuf {
        &self.control_address
    }
}
