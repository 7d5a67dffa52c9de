// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Raw link-layer sockets.

use afpacket::sync::RawPacketStream;
use net::interface::InterfaceName;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use tracing::error;

/// A non-blocking frame-granular socket the readiness loop can drive.
///
/// Production interfaces are [`RawSock`]s; tests substitute a datagram
/// socketpair so the plane can be exercised without privileges.
pub trait FrameSock: Send {
    /// Receive one frame. Non-blocking.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// Transmit one frame. Non-blocking.
    fn send(&mut self, frame: &[u8]) -> io::Result<usize>;
    /// The descriptor to register with the readiness multiplexer.
    fn raw_fd(&self) -> RawFd;
}

/// An `AF_PACKET` socket bound to one interface: promiscuous, non-blocking,
/// with locally transmitted frames filtered out so the switch never reads
/// back its own output.
pub struct RawSock {
    stream: RawPacketStream,
    fd: RawFd,
}

impl RawSock {
    /// Open a raw socket on the named interface.
    ///
    /// # Errors
    ///
    /// Fails if the socket cannot be opened, bound, or configured.
    pub fn open(name: &InterfaceName) -> io::Result<RawSock> {
        let mut stream = RawPacketStream::new().map_err(|e| {
            error!("failed to open raw sock for interface {name}: {e}");
            e
        })?;
        stream.set_non_blocking();
        stream
            .bind(name.as_str())
            .inspect_err(|e| error!("failed to bind raw sock to interface {name}: {e}"))?;
        let fd = stream.as_raw_fd();
        let ifindex = opts::interface_index(name)?;
        opts::set_promiscuous(fd, ifindex)
            .inspect_err(|e| error!("failed to set promiscuous mode on {name}: {e}"))?;
        opts::set_ignore_outgoing(fd)
            .inspect_err(|e| error!("failed to set ignore-outgoing on {name}: {e}"))?;
        Ok(RawSock { stream, fd })
    }
}

impl FrameSock for RawSock {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }

    fn send(&mut self, frame: &[u8]) -> io::Result<usize> {
        self.stream.write(frame)
    }

    fn raw_fd(&self) -> RawFd {
        self.fd
    }
}

/// The two packet-socket options afpacket does not wrap.
mod opts {
    use net::interface::InterfaceName;
    use std::ffi::CString;
    use std::io;
    use std::os::fd::RawFd;

    // linux/if_packet.h; not exported by the libc crate
    const PACKET_IGNORE_OUTGOING: libc::c_int = 23;

    pub(super) fn interface_index(name: &InterfaceName) -> io::Result<u32> {
        let cname = CString::new(name.as_str())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "interior nul"))?;
        #[allow(unsafe_code)]
        let index = unsafe { libc::if_nametoindex(cname.as_ptr()) };
        if index == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(index)
    }

    pub(super) fn set_promiscuous(fd: RawFd, ifindex: u32) -> io::Result<()> {
        #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
        let mreq = libc::packet_mreq {
            mr_ifindex: ifindex as libc::c_int,
            mr_type: libc::PACKET_MR_PROMISC as libc::c_ushort,
            mr_alen: 0,
            mr_address: [0; 8],
        };
        setsockopt(fd, libc::SOL_PACKET, libc::PACKET_ADD_MEMBERSHIP, &mreq)
    }

    pub(super) fn set_ignore_outgoing(fd: RawFd) -> io::Result<()> {
        let enable: libc::c_int = 1;
        setsockopt(fd, libc::SOL_PACKET, PACKET_IGNORE_OUTGOING, &enable)
    }

    fn setsockopt<T>(fd: RawFd, level: libc::c_int, option: libc::c_int, value: &T) -> io::Result<()> {
        #[allow(clippy::cast_possible_truncation)]
        let len = size_of::<T>() as libc::socklen_t;
        #[allow(unsafe_code)]
        let rc = unsafe {
            libc::setsockopt(fd, level, option, std::ptr::from_ref(value).cast(), len)
        };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

/// One end of a datagram socketpair masquerading as a raw interface socket.
/// Message boundaries give the same frame-at-a-time semantics.
#[cfg(test)]
pub(crate) struct PairSock {
    sock: std::os::unix::net::UnixDatagram,
}

#[cfg(test)]
impl PairSock {
    /// Build a connected pair: the [`PairSock`] goes into the interface
    /// table, the peer stays with the test to inject and observe frames.
    pub(crate) fn pair() -> (PairSock, std::os::unix::net::UnixDatagram) {
        #[allow(clippy::unwrap_used)]
        let (sock, peer) = std::os::unix::net::UnixDatagram::pair().unwrap();
        #[allow(clippy::unwrap_used)]
        {
            sock.set_nonblocking(true).unwrap();
            peer.set_nonblocking(true).unwrap();
        }
        (PairSock { sock }, peer)
    }
}

#[cfg(test)]
impl FrameSock for PairSock {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.sock.recv(buf)
    }

    fn send(&mut self, frame: &[u8]) -> io::Result<usize> {
        self.sock.send(frame)
    }

    fn raw_fd(&self) -> RawFd {
        self.sock.as_raw_fd()
    }
}
