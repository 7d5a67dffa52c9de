// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The device-observation wire format.
//!
//! Each message is a single local-socket datagram carrying one ASCII line,
//! either `<ifname> NEW <FLAG_LIST> <mtu> <mac>` or `<ifname> DEL`. The
//! observer emits these; the forwarder consumes them. Datagrams never exceed
//! [`MAX_DATAGRAM`] bytes.

use crate::eth::mac::{Mac, MacFromStringError};
use crate::interface::mtu::Mtu;
use crate::interface::{IllegalInterfaceName, InterfaceName};
use bitflags::bitflags;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Upper bound on the size of a device-observation datagram, in bytes.
pub const MAX_DATAGRAM: usize = 64;

bitflags! {
    /// Link state bits carried in the `FLAG_LIST` of a NEW message.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DevFlags: u8 {
        /// The interface is a loopback device.
        const LOOPBACK = 1;
        /// The interface supports broadcast.
        const BROADCAST = 1 << 1;
        /// The interface supports multicast.
        const MULTICAST = 1 << 2;
        /// The kernel reports the physical link as up.
        const LOWER_UP = 1 << 3;
    }
}

impl Display for DevFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "<")?;
        let mut first = true;
        for (name, _) in self.iter_names() {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{name}")?;
            first = false;
        }
        write!(f, ">")
    }
}

impl FromStr for DevFlags {
    type Err = DeviceMessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s
            .strip_prefix('<')
            .and_then(|rest| rest.strip_suffix('>'))
            .ok_or_else(|| DeviceMessageError::BadFlags(s.to_string()))?;
        let mut flags = DevFlags::empty();
        for token in inner.split(',').filter(|token| !token.is_empty()) {
            // tokens outside the known set are tolerated
            if let Some(flag) = DevFlags::from_name(token) {
                flags |= flag;
            }
        }
        Ok(flags)
    }
}

/// The payload of a NEW message: everything the forwarder needs to open or
/// refresh an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Interface the message describes.
    pub name: InterfaceName,
    /// Link state bits.
    pub flags: DevFlags,
    /// Reported MTU (zero on the wire maps to the 1500 default).
    pub mtu: Mtu,
    /// The interface's own hardware address.
    pub mac: Mac,
}

impl DeviceInfo {
    /// True iff the kernel reports the physical link as up.
    #[must_use]
    pub fn lower_up(&self) -> bool {
        self.flags.contains(DevFlags::LOWER_UP)
    }

    /// True iff the interface is a loopback device.
    #[must_use]
    pub fn loopback(&self) -> bool {
        self.flags.contains(DevFlags::LOOPBACK)
    }
}

/// One parsed device-observation datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceMessage {
    /// Link appeared or changed state.
    New(DeviceInfo),
    /// Link disappeared.
    Del {
        /// Interface the message describes.
        name: InterfaceName,
    },
}

/// Errors which may occur while parsing a [`DeviceMessage`].
#[derive(Debug, thiserror::Error)]
pub enum DeviceMessageError {
    /// The datagram held no tokens at all.
    #[error("empty device message")]
    Empty,
    /// The datagram did not match either message shape.
    #[error("malformed device message: {0}")]
    Malformed(String),
    /// The interface name field is not a legal interface name.
    #[error(transparent)]
    BadName(#[from] IllegalInterfaceName),
    /// The flag list is not bracket-wrapped.
    #[error("bad flag list: {0}")]
    BadFlags(String),
    /// The mtu field is not a decimal integer.
    #[error("bad mtu: {0}")]
    BadMtu(String),
    /// The mac field is not a colon-separated hardware address.
    #[error(transparent)]
    BadMac(#[from] MacFromStringError),
}

impl Display for DeviceMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceMessage::New(info) => write!(
                f,
                "{} NEW {} {} {}",
                info.name, info.flags, info.mtu, info.mac
            ),
            DeviceMessage::Del { name } => write!(f, "{name} DEL"),
        }
    }
}

impl FromStr for DeviceMessage {
    type Err = DeviceMessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        match tokens.as_slice() {
            [] => Err(DeviceMessageError::Empty),
            [name, "DEL"] => Ok(DeviceMessage::Del {
                name: InterfaceName::try_from(*name)?,
            }),
            [name, "NEW", flags, mtu, mac] => {
                let name = InterfaceName::try_from(*name)?;
                let flags = flags.parse::<DevFlags>()?;
                let mtu = mtu
                    .parse::<u32>()
                    .map_err(|_| DeviceMessageError::BadMtu((*mtu).to_string()))?;
                let mac = Mac::try_from(*mac)?;
                Ok(DeviceMessage::New(DeviceInfo {
                    name,
                    flags,
                    mtu: Mtu::from_link(mtu),
                    mac,
                }))
            }
            _ => Err(DeviceMessageError::Malformed(s.to_string())),
        }
    }
}
