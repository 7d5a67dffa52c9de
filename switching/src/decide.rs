// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The per-frame switching decision.

use crate::fdb::Fdb;
use net::eth::EthHeader;
use net::interface::InterfaceName;
use tracing::trace;

/// What the forwarding plane should do with a received frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send the frame out of exactly this interface.
    Deliver(InterfaceName),
    /// Copy the frame to every live, non-loopback interface other than the
    /// ingress.
    Flood,
    /// Discard the frame.
    Drop,
}

/// Decide the fate of `frame` received on `ingress`, updating the learning
/// table on the way.
///
/// A frame too short to hold an ethernet header is dropped, as is any frame
/// claiming the broadcast address as its source. Expired entries are swept
/// opportunistically on every decision, so no periodic sweep is needed.
pub fn decide(
    fdb: &mut Fdb,
    ingress: &InterfaceName,
    frame: &[u8],
    now_ns: u64,
    ttl_ns: u64,
) -> Action {
    let Ok(header) = EthHeader::parse(frame) else {
        trace!("runt frame on {ingress}");
        return Action::Drop;
    };
    if header.src.is_broadcast() {
        trace!("broadcast source on {ingress}");
        return Action::Drop;
    }

    fdb.expire(now_ns, ttl_ns);
    fdb.observe(ingress, header.src, now_ns);

    match fdb.lookup(ingress, header.dst) {
        Some(egress) => Action::Deliver(egress.clone()),
        None => Action::Flood,
    }
}
