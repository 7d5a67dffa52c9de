// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

//! MAC learning and the per-frame switching decision.

pub mod clock;
pub mod decide;
pub mod fdb;

pub use decide::{Action, decide};
pub use fdb::{FDB_TTL_NS, Fdb};
