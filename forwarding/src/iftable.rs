// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The table of participating interfaces, indexed both by name and by
//! poller token. Both indices always describe the same set of entries.

use crate::sock::FrameSock;
use mio::unix::SourceFd;
use mio::{Interest, Registry, Token};
use net::devmsg::{DevFlags, DeviceInfo};
use net::eth::mac::Mac;
use net::interface::InterfaceName;
use net::interface::mtu::Mtu;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::os::fd::RawFd;
use tracing::{debug, warn};

/// Frames a single interface may hold awaiting transmission. The newest
/// frame is dropped once the queue is full.
pub(crate) const TX_QUEUE_DEPTH: usize = 512;

/// State of one participating interface.
pub(crate) struct IfEntry {
    pub(crate) name: InterfaceName,
    pub(crate) sock: Box<dyn FrameSock>,
    pub(crate) fd: RawFd,
    pub(crate) token: Token,
    pub(crate) loopback: bool,
    pub(crate) broadcast: bool,
    pub(crate) multicast: bool,
    pub(crate) mtu: Mtu,
    pub(crate) mac: Mac,
    pub(crate) outq: VecDeque<Vec<u8>>,
    pub(crate) wants_write: bool,
}

impl IfEntry {
    /// Append a frame to the transmit queue unless it is full.
    /// Returns whether the frame was queued.
    pub(crate) fn enqueue(&mut self, frame: Vec<u8>) -> bool {
        if self.outq.len() >= TX_QUEUE_DEPTH {
            warn!("tx queue full on {}: dropping frame", self.name);
            return false;
        }
        self.outq.push_back(frame);
        true
    }
}

/// All participating interfaces, plus the registry half of the readiness
/// multiplexer they are registered with.
pub(crate) struct IfTable {
    registry: Registry,
    by_name: HashMap<InterfaceName, Token>,
    by_token: HashMap<Token, IfEntry>,
    next_token: usize,
}

impl IfTable {
    pub(crate) fn new(registry: Registry) -> IfTable {
        IfTable {
            registry,
            by_name: HashMap::new(),
            by_token: HashMap::new(),
            next_token: 1,
        }
    }

    /// Insert a brand-new interface entry, registering its socket for
    /// readable events unless it is a loopback device.
    ///
    /// The caller checks for an existing entry first (see [`IfTable::update`]).
    pub(crate) fn insert(&mut self, info: &DeviceInfo, sock: Box<dyn FrameSock>) -> io::Result<Token> {
        let token = Token(self.next_token);
        let fd = sock.raw_fd();
        let loopback = info.loopback();
        if !loopback {
            self.registry
                .register(&mut SourceFd(&fd), token, Interest::READABLE)?;
        }
        let entry = IfEntry {
            name: info.name.clone(),
            sock,
            fd,
            token,
            loopback,
            broadcast: info.flags.contains(DevFlags::BROADCAST),
            multicast: info.flags.contains(DevFlags::MULTICAST),
            mtu: info.mtu,
            mac: info.mac,
            outq: VecDeque::new(),
            wants_write: false,
        };
        debug!(
            "adding {} token={token:?} loopback={} broadcast={} multicast={} mtu={} mac={}",
            entry.name, entry.loopback, entry.broadcast, entry.multicast, entry.mtu, entry.mac
        );
        self.by_name.insert(info.name.clone(), token);
        self.by_token.insert(token, entry);
        self.next_token += 1;
        Ok(token)
    }

    /// Refresh the mutable attributes of an existing entry in place.
    /// Returns whether an entry with that name existed.
    pub(crate) fn update(&mut self, info: &DeviceInfo) -> bool {
        let Some(token) = self.by_name.get(&info.name) else {
            return false;
        };
        if let Some(entry) = self.by_token.get_mut(token) {
            entry.mtu = info.mtu;
            entry.broadcast = info.flags.contains(DevFlags::BROADCAST);
            entry.multicast = info.flags.contains(DevFlags::MULTICAST);
            entry.mac = info.mac;
        }
        true
    }

    pub(crate) fn token_of(&self, name: &InterfaceName) -> Option<Token> {
        self.by_name.get(name).copied()
    }

    pub(crate) fn get_mut(&mut self, token: Token) -> Option<&mut IfEntry> {
        self.by_token.get_mut(&token)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &IfEntry> {
        self.by_token.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_token.len()
    }

    /// Remove an entry by name. Dropping the returned entry closes the
    /// socket and discards any queued output.
    pub(crate) fn remove_by_name(&mut self, name: &InterfaceName) -> Option<IfEntry> {
        let token = self.by_name.remove(name)?;
        let entry = self.by_token.remove(&token)?;
        self.deregister(&entry);
        Some(entry)
    }

    /// Remove an entry by token: the error path, where only the poller
    /// token identifies the failed socket.
    pub(crate) fn remove_by_token(&mut self, token: Token) -> Option<IfEntry> {
        let entry = self.by_token.remove(&token)?;
        self.by_name.remove(&entry.name);
        self.deregister(&entry);
        Some(entry)
    }

    fn deregister(&self, entry: &IfEntry) {
        if entry.loopback {
            return;
        }
        if let Err(e) = self.registry.deregister(&mut SourceFd(&entry.fd)) {
            warn!("error deregistering {}: {e}", entry.name);
        }
    }

    /// Subscribe the entry to writable events (in addition to readable).
    pub(crate) fn arm_write(&mut self, token: Token) {
        self.set_write_interest(token, true);
    }

    /// Drop the writable subscription, leaving readable only.
    pub(crate) fn disarm_write(&mut self, token: Token) {
        self.set_write_interest(token, false);
    }

    fn set_write_interest(&mut self, token: Token, wanted: bool) {
        let Some(entry) = self.by_token.get_mut(&token) else {
            return;
        };
        if entry.wants_write == wanted || entry.loopback {
            return;
        }
        let interests = if wanted {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        };
        match self
            .registry
            .reregister(&mut SourceFd(&entry.fd), token, interests)
        {
            Ok(()) => entry.wants_write = wanted,
            Err(e) => warn!("error updating interest for {}: {e}", entry.name),
        }
    }

    /// Both indices agree: every name maps to a token whose entry carries
    /// that name, and no entry is reachable from only one side.
    #[cfg(test)]
    pub(crate) fn indices_agree(&self) -> bool {
        self.by_name.len() == self.by_token.len()
            && self.by_name.iter().all(|(name, token)| {
                self.by_token
                    .get(token)
                    .is_some_and(|entry| entry.name == *name && entry.token == *token)
            })
    }
}
