// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Initial interface discovery: before the threads start, every interface
//! the kernel already reports as link-up is registered with the plane.

use crate::plane::PlaneShared;
use net::devmsg::{DevFlags, DeviceInfo};
use net::eth::mac::Mac;
use net::interface::InterfaceName;
use net::interface::mtu::Mtu;
use tracing::{debug, warn};

/// Enumerate current interfaces and register the link-up ones. Failures are
/// reported per interface; the plane starts with whatever succeeded.
pub(crate) fn scan(shared: &PlaneShared) {
    let interfaces = netdev::get_interfaces();
    debug!("bootstrap found {} interfaces", interfaces.len());
    for interface in &interfaces {
        let name = match InterfaceName::try_from(interface.name.as_str()) {
            Ok(name) => name,
            Err(e) => {
                warn!("skipping interface with unusable name: {e}");
                continue;
            }
        };
        let info = DeviceInfo {
            name,
            flags: flags_from_bits(interface.flags),
            mtu: Mtu::from_link(interface.mtu.unwrap_or(0)),
            mac: interface
                .mac_addr
                .as_ref()
                .map_or(Mac::ZERO, |mac| Mac(mac.octets())),
        };
        if info.lower_up() {
            shared.update_device(&info);
        }
    }
    let registered = shared.state.lock().ifaces.len();
    debug!("bootstrap registered {registered} interfaces");
}

/// Map kernel `IFF_*` bits onto the flag set the plane tracks.
fn flags_from_bits(bits: u32) -> DevFlags {
    #[allow(clippy::cast_sign_loss)]
    let pairs = [
        (libc::IFF_LOOPBACK as u32, DevFlags::LOOPBACK),
        (libc::IFF_BROADCAST as u32, DevFlags::BROADCAST),
        (libc::IFF_MULTICAST as u32, DevFlags::MULTICAST),
        (libc::IFF_LOWER_UP as u32, DevFlags::LOWER_UP),
    ];
    pairs
        .into_iter()
        .filter(|(bit, _)| bits & bit != 0)
        .fold(DevFlags::empty(), |acc, (_, flag)| acc | flag)
}
