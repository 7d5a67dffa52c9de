// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

//! The device observer: watches kernel link events and streams compact
//! interface-state datagrams to the forwarding plane's control socket.

use futures::StreamExt;
use net::devmsg::{DevFlags, DeviceInfo, DeviceMessage, MAX_DATAGRAM};
use net::eth::mac::Mac;
use net::interface::InterfaceName;
use net::interface::mtu::Mtu;
use rtnetlink::new_connection;
use rtnetlink::packet_core::NetlinkPayload;
use rtnetlink::packet_route::RouteNetlinkMessage;
use rtnetlink::packet_route::link::{LinkAttribute, LinkFlags, LinkMessage};
use rtnetlink::sys::{AsyncSocket, SocketAddr};
use std::fs;
use std::io;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Sends rendered device messages from the observer's own bound socket to
/// the forwarder's control socket.
pub struct Reporter {
    sock: UnixDatagram,
    forwarder: PathBuf,
}

impl Reporter {
    /// Bind the observer address, replacing any stale socket file.
    ///
    /// # Errors
    ///
    /// Fails if the socket cannot be bound.
    pub fn new(observer_address: &Path, forwarder_address: &Path) -> io::Result<Reporter> {
        let _ = fs::remove_file(observer_address);
        let sock = UnixDatagram::bind(observer_address)?;
        Ok(Reporter {
            sock,
            forwarder: forwarder_address.to_path_buf(),
        })
    }

    /// Emit one message, honoring the datagram budget: anything that would
    /// not fit is skipped rather than truncated.
    ///
    /// # Errors
    ///
    /// Fails if the datagram cannot be sent.
    pub fn report(&self, message: &DeviceMessage) -> io::Result<()> {
        let line = message.to_string();
        if line.len() > MAX_DATAGRAM {
            warn!("device message exceeds the datagram budget, skipping: {line}");
            return Ok(());
        }
        debug!("reporting: {line}");
        self.sock.send_to(line.as_bytes(), &self.forwarder)?;
        Ok(())
    }
}

/// Subscribe to the kernel's link multicast group and report every state
/// change until the netlink stream ends.
///
/// # Errors
///
/// Fails if the netlink connection cannot be created or bound.
pub async fn watch_links(reporter: &Reporter) -> io::Result<()> {
    let (mut conn, _handle, mut messages) = new_connection()?;
    #[allow(clippy::cast_sign_loss)]
    let groups = libc::RTMGRP_LINK as u32;
    conn.socket_mut().socket_mut().bind(&SocketAddr::new(0, groups))?;
    tokio::spawn(conn);

    info!("watching kernel link events");
    while let Some((message, _)) = messages.next().await {
        let NetlinkPayload::InnerMessage(route_message) = message.payload else {
            continue;
        };
        let report = match &route_message {
            RouteNetlinkMessage::NewLink(link) => new_link_message(link),
            RouteNetlinkMessage::DelLink(link) => del_link_message(link),
            _ => None,
        };
        if let Some(report) = report {
            if let Err(e) = reporter.report(&report) {
                warn!("could not reach the forwarder: {e}");
            }
        }
    }
    info!("netlink stream ended");
    Ok(())
}

/// Render an RTM_NEWLINK as a NEW message. Loopback links are not reported;
/// the forwarder discovers those at bootstrap.
fn new_link_message(link: &LinkMessage) -> Option<DeviceMessage> {
    if link.header.flags.contains(LinkFlags::Loopback) {
        return None;
    }
    let mut name = None;
    let mut mtu = 0u32;
    let mut mac = Mac::ZERO;
    for attr in &link.attributes {
        match attr {
            LinkAttribute::IfName(ifname) => match InterfaceName::try_from(ifname.as_str()) {
                Ok(parsed) => name = Some(parsed),
                Err(e) => {
                    warn!("link event with unusable name: {e}");
                    return None;
                }
            },
            LinkAttribute::Mtu(raw) => mtu = *raw,
            LinkAttribute::Address(addr) => {
                if let Ok(octets) = <[u8; 6]>::try_from(addr.as_slice()) {
                    mac = Mac(octets);
                }
            }
            _ => {}
        }
    }
    Some(DeviceMessage::New(DeviceInfo {
        name: name?,
        flags: flags_from_link(link.header.flags),
        mtu: Mtu::from_link(mtu),
        mac,
    }))
}

fn del_link_message(link: &LinkMessage) -> Option<DeviceMessage> {
    if link.header.flags.contains(LinkFlags::Loopback) {
        return None;
    }
    link.attributes.iter().find_map(|attr| match attr {
        LinkAttribute::IfName(ifname) => InterfaceName::try_from(ifname.as_str())
            .ok()
            .map(|name| DeviceMessage::Del { name }),
        _ => None,
    })
}

fn flags_from_link(flags: LinkFlags) -> DevFlags {
    let pairs = [
        (LinkFlags::Loopback, DevFlags::LOOPBACK),
        (LinkFlags::Broadcast, DevFlags::BROADCAST),
        (LinkFlags::Multicast, DevFlags::MULTICAST),
        (LinkFlags::LowerUp, DevFlags::LOWER_UP),
    ];
    pairs
        .into_iter()
        .filter(|(link_flag, _)| flags.contains(*link_flag))
        .fold(DevFlags::empty(), |acc, (_, flag)| acc | flag)
}

#[cfg(test)]
mod tests {
    use super::{del_link_message, flags_from_link, new_link_message};
    use net::devmsg::{DevFlags, DeviceMessage};
    use rtnetlink::packet_route::link::{LinkAttribute, LinkFlags, LinkMessage};

    fn link(name: &str, flags: LinkFlags, mtu: u32, mac: &[u8]) -> LinkMessage {
        let mut message = LinkMessage::default();
        message.header.flags = flags;
        message
            .attributes
            .push(LinkAttribute::IfName(name.to_string()));
        message.attributes.push(LinkAttribute::Mtu(mtu));
        message
            .attributes
            .push(LinkAttribute::Address(mac.to_vec()));
        message
    }

    #[test]
    fn renders_a_new_link_in_the_wire_format() {
        let message = link(
            "veth0",
            LinkFlags::Broadcast | LinkFlags::Multicast | LinkFlags::LowerUp,
            1500,
            &[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff],
        );
        let rendered = new_link_message(&message).unwrap().to_string();
        assert_eq!(
            rendered,
            "veth0 NEW <BROADCAST,MULTICAST,LOWER_UP> 1500 aa:bb:cc:dd:ee:ff"
        );
    }

    #[test]
    fn link_down_renders_without_lower_up() {
        let message = link(
            "veth0",
            LinkFlags::Broadcast | LinkFlags::Multicast,
            1500,
            &[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff],
        );
        let rendered = new_link_message(&message).unwrap().to_string();
        assert_eq!(
            rendered,
            "veth0 NEW <BROADCAST,MULTICAST> 1500 aa:bb:cc:dd:ee:ff"
        );
    }

    #[test]
    fn loopback_links_are_not_reported() {
        let message = link(
            "lo",
            LinkFlags::Loopback | LinkFlags::LowerUp,
            65536,
            &[0; 6],
        );
        assert!(new_link_message(&message).is_none());
        assert!(del_link_message(&message).is_none());
    }

    #[test]
    fn del_link_renders_a_del() {
        let message = link("veth0", LinkFlags::Broadcast, 1500, &[0; 6]);
        assert_eq!(
            del_link_message(&message).unwrap(),
            "veth0 DEL".parse::<DeviceMessage>().unwrap()
        );
    }

    #[test]
    fn unparseable_names_are_skipped() {
        let message = link(
            "a-name-that-is-way-too-long",
            LinkFlags::LowerUp,
            1500,
            &[0; 6],
        );
        assert!(new_link_message(&message).is_none());
    }

    #[test]
    fn kernel_flags_map_onto_wire_flags() {
        assert_eq!(
            flags_from_link(LinkFlags::Broadcast | LinkFlags::Multicast | LinkFlags::LowerUp),
            DevFlags::BROADCAST | DevFlags::MULTICAST | DevFlags::LOWER_UP
        );
        assert_eq!(flags_from_link(LinkFlags::Up), DevFlags::empty());
    }
}
