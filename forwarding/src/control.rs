// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The device-control channel: a local datagram socket fed by the device
//! observer with the messages described in [`net::devmsg`].

use crate::plane::PlaneShared;
use net::devmsg::{DeviceMessage, MAX_DATAGRAM};
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::UnixDatagram;
use std::path::Path;
use tracing::{debug, error, info};

/// Bind the control socket, replacing any stale socket file. The observer
/// runs as a sibling process, so the socket is left world-writable.
pub(crate) fn bind_control(path: &Path) -> io::Result<UnixDatagram> {
    let _ = fs::remove_file(path);
    let sock = UnixDatagram::bind(path)?;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o777);
    fs::set_permissions(path, perms)?;
    Ok(sock)
}

/// Service the control socket until it fails or closes. Each datagram is one
/// device message; a NEW with LOWER_UP opens or refreshes the interface, a
/// NEW without it removes the interface. The forwarding thread keeps running
/// after this thread exits.
pub(crate) fn control_listener(shared: &PlaneShared, sock: &UnixDatagram) {
    let mut buf = [0u8; MAX_DATAGRAM];
    loop {
        let read = match sock.recv(&mut buf) {
            Ok(0) => {
                info!("device manager closed the control channel");
                return;
            }
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                error!("control channel receive failed: {e}");
                return;
            }
        };

        let Ok(text) = std::str::from_utf8(&buf[..read]) else {
            error!("control message is not ascii");
            return;
        };
        debug!("control message: {text}");

        match text.parse::<DeviceMessage>() {
            Ok(DeviceMessage::New(info)) if info.lower_up() => shared.update_device(&info),
            Ok(DeviceMessage::New(info)) => shared.remove_device(&info.name),
            // DEL is defined but the observed device manager never relies on
            // it; the removal signal is a NEW without LOWER_UP
            Ok(DeviceMessage::Del { name }) => debug!("ignoring DEL for {name}"),
            Err(e) => {
                error!("malformed control message {text:?}: {e}");
                return;
            }
        }
    }
}
