// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The forwarding database: which interface last saw which source MAC.

use net::eth::mac::Mac;
use net::interface::InterfaceName;
use std::collections::HashMap;
use tracing::debug;

/// How long a learned entry survives without a refresh.
pub const FDB_TTL_NS: u64 = if cfg!(debug_assertions) {
    10_000_000_000 // 10 s
} else {
    300_000_000_000 // 5 min
};

/// A two-level map: interface name to (packed MAC to last-seen nanosecond
/// timestamp). Lookup walks the outer map; interface counts stay in the tens,
/// so the walk is cheap.
#[derive(Debug, Default, Clone)]
pub struct Fdb {
    table: HashMap<InterfaceName, HashMap<u64, u64>>,
}

impl Fdb {
    /// Create an empty forwarding database.
    #[must_use]
    pub fn new() -> Fdb {
        Fdb::default()
    }

    /// Record that `mac` was seen on `name` at `now_ns`, refreshing the
    /// timestamp if the entry already exists.
    pub fn observe(&mut self, name: &InterfaceName, mac: Mac, now_ns: u64) {
        self.table
            .entry(name.clone())
            .or_default()
            .insert(mac.to_u64(), now_ns);
    }

    /// Return the interface currently associated with `mac`, skipping the
    /// `ingress` bucket.
    ///
    /// When the same MAC is present on several interfaces (the station moved
    /// and its old entry has not aged out yet) the bucket with the newest
    /// timestamp wins.
    #[must_use]
    pub fn lookup(&self, ingress: &InterfaceName, mac: Mac) -> Option<&InterfaceName> {
        let packed = mac.to_u64();
        self.table
            .iter()
            .filter(|(name, _)| *name != ingress)
            .filter_map(|(name, bucket)| bucket.get(&packed).map(|seen| (name, *seen)))
            .max_by_key(|(_, seen)| *seen)
            .map(|(name, _)| name)
    }

    /// Drop every entry whose timestamp is older than `now_ns - ttl_ns`.
    pub fn expire(&mut self, now_ns: u64, ttl_ns: u64) {
        for (name, bucket) in &mut self.table {
            bucket.retain(|packed, seen| {
                let live = now_ns.saturating_sub(*seen) < ttl_ns;
                if !live {
                    debug!("expired {} on {name}", Mac::from_u64(*packed));
                }
                live
            });
        }
    }

    /// Drop every entry learned on `name`.
    pub fn purge(&mut self, name: &InterfaceName) {
        self.table.remove(name);
    }

    /// Number of live learned entries across all interfaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.values().map(HashMap::len).sum()
    }

    /// True iff no entry is currently learned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
