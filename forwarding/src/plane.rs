// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The forwarding plane proper: shared switch state, the device lifecycle
//! operations, and the packet-processor readiness loop.

use crate::bootstrap;
use crate::control;
use crate::iftable::IfTable;
use crate::sock::RawSock;
use mio::event::Event;
use mio::{Events, Poll, Token};
use net::devmsg::DeviceInfo;
use net::eth::EthHeader;
use net::interface::InterfaceName;
use parking_lot::Mutex;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use switching::fdb::{FDB_TTL_NS, Fdb};
use switching::{Action, clock, decide};
use tracing::{debug, error, info, warn};

/// Initial capacity of the event batch; doubled whenever a batch fills it.
const EVENTS_START: usize = 256;

/// Everything both threads touch, behind one coarse lock. The readiness
/// loop holds the lock for a whole event batch; the control thread only for
/// a device update, at link-event rate.
pub(crate) struct SwitchState {
    pub(crate) ifaces: IfTable,
    pub(crate) fdb: Fdb,
}

/// The handle the packet processor, control thread, and bootstrap share.
pub struct PlaneShared {
    pub(crate) state: Mutex<SwitchState>,
}

impl PlaneShared {
    /// Open and register the described interface, or refresh its mutable
    /// attributes if it is already present. Idempotent.
    pub fn update_device(&self, info: &DeviceInfo) {
        let mut state = self.state.lock();
        if state.ifaces.update(info) {
            return;
        }
        let sock = match RawSock::open(&info.name) {
            Ok(sock) => sock,
            Err(e) => {
                error!("skipping interface {}: {e}", info.name);
                return;
            }
        };
        if let Err(e) = state.ifaces.insert(info, Box::new(sock)) {
            error!("skipping interface {}: {e}", info.name);
        }
    }

    /// Remove the named interface: both indices, its socket, its queued
    /// output, and everything learned on it.
    pub fn remove_device(&self, name: &InterfaceName) {
        let mut state = self.state.lock();
        if let Some(entry) = state.ifaces.remove_by_name(name) {
            debug!("removing {}", entry.name);
            state.fdb.purge(name);
        }
    }

    /// Insert a pre-built socket; the test seam behind `update_device`.
    #[cfg(test)]
    pub(crate) fn install_sock(&self, info: &DeviceInfo, sock: Box<dyn crate::sock::FrameSock>) {
        let mut state = self.state.lock();
        if state.ifaces.update(info) {
            return;
        }
        if let Err(e) = state.ifaces.insert(info, sock) {
            error!("skipping interface {}: {e}", info.name);
        }
    }
}

/// The forwarding plane: owns the poller until [`ForwardingPlane::run`]
/// hands it to the packet-processor thread.
pub struct ForwardingPlane {
    poll: Poll,
    shared: Arc<PlaneShared>,
}

impl ForwardingPlane {
    /// Create the plane with an empty interface table.
    ///
    /// # Errors
    ///
    /// Fails if the readiness multiplexer cannot be created.
    pub fn new() -> io::Result<ForwardingPlane> {
        let poll = Poll::new()?;
        let registry = poll.registry().try_clone()?;
        Ok(ForwardingPlane {
            poll,
            shared: Arc::new(PlaneShared {
                state: Mutex::new(SwitchState {
                    ifaces: IfTable::new(registry),
                    fdb: Fdb::new(),
                }),
            }),
        })
    }

    /// Shared handle for the control thread and bootstrap.
    #[must_use]
    pub fn shared(&self) -> Arc<PlaneShared> {
        self.shared.clone()
    }

    /// Register every interface the kernel currently reports as link-up.
    pub fn bootstrap(&self) {
        bootstrap::scan(&self.shared);
    }

    /// Start the control thread and the packet processor, then run forever.
    ///
    /// A control-channel bind failure is reported and the plane continues
    /// with the interfaces it already has.
    ///
    /// # Errors
    ///
    /// Fails only if a thread cannot be spawned or the processor dies.
    pub fn run(self, control_path: &Path) -> io::Result<()> {
        match control::bind_control(control_path) {
            Ok(sock) => {
                info!("listening for device updates at {}", control_path.display());
                let shared = self.shared.clone();
                thread::Builder::new()
                    .name("devctl".to_string())
                    .spawn(move || control::control_listener(&shared, &sock))?;
            }
            Err(e) => {
                error!(
                    "control channel unavailable at {}: {e}; continuing without device updates",
                    control_path.display()
                );
            }
        }

        let shared = self.shared;
        let mut poll = self.poll;
        let processor = thread::Builder::new()
            .name("packets".to_string())
            .spawn(move || packet_processor(&mut poll, &shared))?;
        processor
            .join()
            .map_err(|_| io::Error::other("packet processor panicked"))?;
        Ok(())
    }
}

/// The readiness loop. Exits only on a fatal multiplexer error.
fn packet_processor(poll: &mut Poll, shared: &PlaneShared) {
    let mut capacity = EVENTS_START;
    let mut events = Events::with_capacity(capacity);
    info!("entering packet processor loop");
    loop {
        match poll.poll(&mut events, None) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                error!("readiness wait failed: {e}");
                return;
            }
        }

        let batch = {
            let mut state = shared.state.lock();
            let mut batch = 0;
            for event in &events {
                batch += 1;
                handle_event(&mut state, event);
            }
            batch
        };

        if batch == capacity {
            capacity *= 2;
            events = Events::with_capacity(capacity);
        }
    }
}

pub(crate) fn handle_event(state: &mut SwitchState, event: &Event) {
    let token = event.token();
    if event.is_error() || event.is_read_closed() {
        remove_token(state, token);
        return;
    }
    if event.is_readable() {
        drain_recv(state, token);
    }
    if event.is_writable() {
        drain_send(state, token);
    }
}

fn remove_token(state: &mut SwitchState, token: Token) {
    if let Some(entry) = state.ifaces.remove_by_token(token) {
        debug!("removing {}", entry.name);
        state.fdb.purge(&entry.name);
    }
}

/// Read frames off the socket until it would block, pushing each through
/// the switching decision.
fn drain_recv(state: &mut SwitchState, token: Token) {
    loop {
        let Some(entry) = state.ifaces.get_mut(token) else {
            return;
        };
        let ingress = entry.name.clone();
        let mut frame = vec![0u8; EthHeader::LEN + entry.mtu.to_usize()];
        match entry.sock.recv(&mut frame) {
            Ok(n) => {
                frame.truncate(n);
                forward(state, &ingress, frame);
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                return;
            }
            Err(e) => {
                error!("recv failed on {ingress}: {e}");
                remove_token(state, token);
                return;
            }
        }
    }
}

fn forward(state: &mut SwitchState, ingress: &InterfaceName, frame: Vec<u8>) {
    let now_ns = clock::now_ns();
    match decide(&mut state.fdb, ingress, &frame, now_ns, FDB_TTL_NS) {
        Action::Drop => {}
        Action::Deliver(egress) => deliver(state, &egress, frame),
        Action::Flood => flood(state, ingress, &frame),
    }
}

fn deliver(state: &mut SwitchState, egress: &InterfaceName, frame: Vec<u8>) {
    let Some(token) = state.ifaces.token_of(egress) else {
        warn!("switching decision points at unknown interface {egress}");
        return;
    };
    let queued = match state.ifaces.get_mut(token) {
        Some(entry) => entry.enqueue(frame),
        None => return,
    };
    if queued {
        state.ifaces.arm_write(token);
    }
}

/// Copy the frame to every live, non-loopback interface other than the
/// ingress.
fn flood(state: &mut SwitchState, ingress: &InterfaceName, frame: &[u8]) {
    let targets: Vec<Token> = state
        .ifaces
        .iter()
        .filter(|entry| !entry.loopback && entry.name != *ingress)
        .map(|entry| entry.token)
        .collect();
    for token in targets {
        let queued = match state.ifaces.get_mut(token) {
            Some(entry) => entry.enqueue(frame.to_vec()),
            None => continue,
        };
        if queued {
            state.ifaces.arm_write(token);
        }
    }
}

enum TxOutcome {
    Drained,
    Blocked,
    Failed,
}

/// Flush the transmit queue as far as the socket allows.
fn drain_send(state: &mut SwitchState, token: Token) {
    let outcome = {
        let Some(entry) = state.ifaces.get_mut(token) else {
            return;
        };
        loop {
            let Some(frame) = entry.outq.front() else {
                break TxOutcome::Drained;
            };
            match entry.sock.send(frame) {
                Ok(_) => {
                    entry.outq.pop_front();
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                    ) =>
                {
                    break TxOutcome::Blocked;
                }
                Err(e) => {
                    error!("send failed on {}: {e}", entry.name);
                    entry.outq.pop_front();
                    break TxOutcome::Failed;
                }
            }
        }
    };
    match outcome {
        TxOutcome::Drained => state.ifaces.disarm_write(token),
        TxOutcome::Blocked => {}
        TxOutcome::Failed => remove_token(state, token),
    }
}

#[cfg(test)]
mod tests {
    use super::{ForwardingPlane, handle_event};
    use crate::sock::PairSock;
    use mio::Events;
    use net::devmsg::{DevFlags, DeviceInfo, DeviceMessage};
    use net::eth::EthHeader;
    use net::eth::mac::Mac;
    use net::interface::InterfaceName;
    use net::interface::mtu::Mtu;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::ErrorKind;
    use std::os::unix::net::UnixDatagram;
    use std::time::Duration;

    const MAC_A: Mac = Mac([0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0x01]);
    const MAC_B: Mac = Mac([0xbb, 0xbb, 0xbb, 0xbb, 0xbb, 0x02]);
    const MAC_C: Mac = Mac([0xcc, 0xcc, 0xcc, 0xcc, 0xcc, 0xcc]);
    const MAC_E: Mac = Mac([0xee, 0xee, 0xee, 0xee, 0xee, 0x01]);

    fn ifname(name: &str) -> InterfaceName {
        InterfaceName::try_from(name).unwrap()
    }

    fn info(name: &str, last_mac_octet: u8, flags: DevFlags) -> DeviceInfo {
        DeviceInfo {
            name: ifname(name),
            flags,
            mtu: Mtu::DEFAULT,
            mac: Mac([0x02, 0, 0, 0, 0, last_mac_octet]),
        }
    }

    fn frame(dst: Mac, src: Mac, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(EthHeader::LEN + payload.len());
        out.extend_from_slice(dst.as_ref());
        out.extend_from_slice(src.as_ref());
        out.extend_from_slice(&0x0800u16.to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    struct Harness {
        plane: ForwardingPlane,
        peers: HashMap<String, UnixDatagram>,
    }

    impl Harness {
        fn new(names: &[&str]) -> Harness {
            let mut harness = Harness {
                plane: ForwardingPlane::new().unwrap(),
                peers: HashMap::new(),
            };
            for (i, name) in names.iter().enumerate() {
                #[allow(clippy::cast_possible_truncation)]
                harness.add_iface(
                    name,
                    i as u8 + 1,
                    DevFlags::BROADCAST | DevFlags::MULTICAST | DevFlags::LOWER_UP,
                );
            }
            harness
        }

        fn add_iface(&mut self, name: &str, last_mac_octet: u8, flags: DevFlags) {
            let (sock, peer) = PairSock::pair();
            self.plane
                .shared
                .install_sock(&info(name, last_mac_octet, flags), Box::new(sock));
            self.peers.insert(name.to_string(), peer);
        }

        fn inject(&self, name: &str, frame: &[u8]) {
            self.peers[name].send(frame).unwrap();
        }

        /// Run a few bounded iterations of the readiness loop: enough for a
        /// receive, the write-interest rearm, and the transmit to complete.
        fn pump(&mut self) {
            let mut events = Events::with_capacity(64);
            for _ in 0..4 {
                self.plane
                    .poll
                    .poll(&mut events, Some(Duration::from_millis(20)))
                    .unwrap();
                let mut state = self.plane.shared.state.lock();
                for event in &events {
                    handle_event(&mut state, event);
                }
            }
        }

        fn recv_from(&self, name: &str) -> Option<Vec<u8>> {
            let mut buf = [0u8; 2048];
            match self.peers[name].recv(&mut buf) {
                Ok(n) => Some(buf[..n].to_vec()),
                Err(e) if e.kind() == ErrorKind::WouldBlock => None,
                Err(e) => panic!("peer recv on {name}: {e}"),
            }
        }

        fn drain_peers(&self) {
            for name in self.peers.keys() {
                while self.recv_from(name).is_some() {}
            }
        }
    }

    #[test]
    fn unknown_destination_floods_with_identical_copies() {
        let mut harness = Harness::new(&["eth0", "eth1", "eth2"]);
        let sent = frame(MAC_B, MAC_A, b"hello from a");
        harness.inject("eth0", &sent);
        harness.pump();

        assert_eq!(harness.recv_from("eth1"), Some(sent.clone()));
        assert_eq!(harness.recv_from("eth2"), Some(sent));
        assert_eq!(harness.recv_from("eth0"), None);
    }

    #[test]
    fn learned_destination_is_delivered_on_one_interface_only() {
        let mut harness = Harness::new(&["eth0", "eth1", "eth2"]);
        harness.inject("eth0", &frame(MAC_B, MAC_A, b"learn a"));
        harness.pump();
        harness.drain_peers();

        let reply = frame(MAC_A, MAC_B, b"reply to a");
        harness.inject("eth1", &reply);
        harness.pump();

        assert_eq!(harness.recv_from("eth0"), Some(reply));
        assert_eq!(harness.recv_from("eth2"), None);
        assert_eq!(harness.recv_from("eth1"), None);
    }

    #[test]
    fn broadcast_source_is_dropped_everywhere() {
        let mut harness = Harness::new(&["eth0", "eth1", "eth2"]);
        harness.inject("eth0", &frame(MAC_A, Mac::BROADCAST, b"storm"));
        harness.pump();

        for name in ["eth0", "eth1", "eth2"] {
            assert_eq!(harness.recv_from(name), None);
        }
        assert!(harness.plane.shared.state.lock().fdb.is_empty());
    }

    #[test]
    fn unknown_unicast_floods_to_all_but_ingress() {
        let mut harness = Harness::new(&["eth0", "eth1", "eth2"]);
        harness.inject("eth0", &frame(MAC_B, MAC_A, b"learn a"));
        harness.pump();
        harness.drain_peers();

        let unknown = frame(MAC_C, MAC_A, b"anyone?");
        harness.inject("eth0", &unknown);
        harness.pump();

        assert_eq!(harness.recv_from("eth1"), Some(unknown.clone()));
        assert_eq!(harness.recv_from("eth2"), Some(unknown));
        assert_eq!(harness.recv_from("eth0"), None);
    }

    #[test]
    fn moved_station_receives_only_at_its_new_interface() {
        let mut harness = Harness::new(&["eth0", "eth1", "eth2"]);
        harness.inject("eth0", &frame(MAC_C, MAC_E, b"from old home"));
        harness.pump();
        harness.inject("eth1", &frame(MAC_C, MAC_E, b"from new home"));
        harness.pump();
        harness.drain_peers();

        let toward = frame(MAC_E, MAC_B, b"find e");
        harness.inject("eth2", &toward);
        harness.pump();

        assert_eq!(harness.recv_from("eth1"), Some(toward));
        assert_eq!(harness.recv_from("eth0"), None);
        assert_eq!(harness.recv_from("eth2"), None);
    }

    #[test]
    fn removal_discards_queued_output_and_spares_the_rest() {
        let harness = Harness::new(&["eth0", "eth1", "eth2"]);
        let eth1 = ifname("eth1");
        {
            let mut state = harness.plane.shared.state.lock();
            state.fdb.observe(&eth1, MAC_B, 1);
            let token = state.ifaces.token_of(&eth1).unwrap();
            let entry = state.ifaces.get_mut(token).unwrap();
            for _ in 0..3 {
                assert!(entry.enqueue(frame(MAC_B, MAC_A, b"queued")));
            }
        }

        harness.plane.shared.remove_device(&eth1);

        let state = harness.plane.shared.state.lock();
        assert!(state.ifaces.token_of(&eth1).is_none());
        assert!(state.ifaces.indices_agree());
        assert_eq!(state.ifaces.len(), 2);
        assert!(state.ifaces.token_of(&ifname("eth0")).is_some());
        assert!(state.ifaces.token_of(&ifname("eth2")).is_some());
        // everything learned on the removed interface is forgotten
        assert_eq!(state.fdb.lookup(&ifname("eth0"), MAC_B), None);
    }

    #[test]
    fn forwarding_continues_after_a_removal() {
        let mut harness = Harness::new(&["eth0", "eth1", "eth2"]);
        harness.plane.shared.remove_device(&ifname("eth1"));

        let sent = frame(MAC_B, MAC_A, b"still alive");
        harness.inject("eth0", &sent);
        harness.pump();

        assert_eq!(harness.recv_from("eth2"), Some(sent));
        assert_eq!(harness.recv_from("eth1"), None);
    }

    #[test]
    fn update_device_is_idempotent() {
        let mut harness = Harness::new(&["eth0"]);
        let flags = DevFlags::BROADCAST | DevFlags::MULTICAST | DevFlags::LOWER_UP;
        let before = {
            let state = harness.plane.shared.state.lock();
            state.ifaces.token_of(&ifname("eth0")).unwrap()
        };

        // identical arguments: nothing changes
        harness.add_iface("eth0", 1, flags);
        // changed mtu: refreshed in place
        let mut refreshed = info("eth0", 1, flags);
        refreshed.mtu = Mtu::from_link(9000);
        harness
            .plane
            .shared
            .install_sock(&refreshed, Box::new(PairSock::pair().0));

        let mut state = harness.plane.shared.state.lock();
        assert_eq!(state.ifaces.len(), 1);
        assert_eq!(state.ifaces.token_of(&ifname("eth0")), Some(before));
        assert!(state.ifaces.indices_agree());
        let entry = state.ifaces.get_mut(before).unwrap();
        assert_eq!(entry.mtu.to_u32(), 9000);
    }

    #[test]
    fn update_device_order_does_not_matter_on_disjoint_names() {
        let forward = Harness::new(&["eth0", "eth1", "eth2"]);
        let reverse = Harness::new(&["eth2", "eth1", "eth0"]);

        let names = |harness: &Harness| {
            let state = harness.plane.shared.state.lock();
            let mut names: Vec<String> = state.ifaces.iter().map(|e| e.name.to_string()).collect();
            names.sort();
            names
        };
        assert_eq!(names(&forward), names(&reverse));
        assert!(forward.plane.shared.state.lock().ifaces.indices_agree());
    }

    #[test]
    fn loopback_interfaces_are_tracked_but_never_polled_or_flooded() {
        let mut harness = Harness::new(&["eth0", "eth1"]);
        harness.add_iface("lo", 9, DevFlags::LOOPBACK | DevFlags::LOWER_UP);

        // frames arriving on the loopback socket are never read
        harness.inject("lo", &frame(MAC_B, MAC_A, b"ignored"));
        harness.pump();
        assert_eq!(harness.recv_from("eth0"), None);
        assert_eq!(harness.recv_from("eth1"), None);

        // floods skip the loopback entry
        let sent = frame(MAC_B, MAC_A, b"flooded");
        harness.inject("eth0", &sent);
        harness.pump();
        assert_eq!(harness.recv_from("eth1"), Some(sent));
        assert_eq!(harness.recv_from("lo"), None);

        let state = harness.plane.shared.state.lock();
        assert_eq!(state.ifaces.len(), 3);
        assert!(state.ifaces.indices_agree());
    }

    #[test]
    fn frames_toward_one_egress_stay_in_order() {
        let mut harness = Harness::new(&["eth0", "eth1"]);
        let first = frame(MAC_B, MAC_A, b"first");
        let second = frame(MAC_B, MAC_A, b"second");
        harness.inject("eth0", &first);
        harness.inject("eth0", &second);
        harness.pump();

        assert_eq!(harness.recv_from("eth1"), Some(first));
        assert_eq!(harness.recv_from("eth1"), Some(second));
    }

    #[test]
    fn control_message_without_lower_up_removes_the_device() {
        let harness = Harness::new(&["eth0", "eth1"]);
        let msg: DeviceMessage = "eth1 NEW <BROADCAST,MULTICAST> 1500 02:00:00:00:00:02"
            .parse()
            .unwrap();
        match msg {
            DeviceMessage::New(down) => {
                assert!(!down.lower_up());
                harness.plane.shared.remove_device(&down.name);
            }
            DeviceMessage::Del { .. } => unreachable!(),
        }
        let state = harness.plane.shared.state.lock();
        assert!(state.ifaces.token_of(&ifname("eth1")).is_none());
        assert_eq!(state.ifaces.len(), 1);
    }
}
