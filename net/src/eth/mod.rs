// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Ethernet header parsing.

pub mod mac;

use crate::eth::mac::Mac;
use linux_raw_sys::if_ether;

/// The fixed 14-byte Ethernet header at the front of every frame.
///
/// Only the fields the switch consults are modeled; the payload is carried
/// opaquely behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EthHeader {
    /// Destination hardware address.
    pub dst: Mac,
    /// Source hardware address.
    pub src: Mac,
    /// Ethertype, host byte order.
    pub ethertype: u16,
}

/// Errors which can occur while parsing an [`EthHeader`] from raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EthHeaderError {
    /// The frame is shorter than the 14-byte header.
    #[error("frame of {0} bytes is shorter than an ethernet header")]
    TooShort(usize),
}

impl EthHeader {
    /// Length of the header in bytes.
    pub const LEN: usize = if_ether::ETH_HLEN as usize;

    /// Parse the leading [`EthHeader::LEN`] bytes of `frame`.
    ///
    /// # Errors
    ///
    /// Returns [`EthHeaderError::TooShort`] if `frame` cannot hold a full header.
    pub fn parse(frame: &[u8]) -> Result<EthHeader, EthHeaderError> {
        if frame.len() < Self::LEN {
            return Err(EthHeaderError::TooShort(frame.len()));
        }
        let mut dst = [0u8; 6];
        let mut src = [0u8; 6];
        dst.copy_from_slice(&frame[0..6]);
        src.copy_from_slice(&frame[6..12]);
        Ok(EthHeader {
            dst: Mac(dst),
            src: Mac(src),
            ethertype: u16::from_be_bytes([frame[12], frame[13]]),
        })
    }
}
