// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt::{Display, Formatter};
use std::num::NonZero;

/// The MTU of a network interface.
#[derive(Copy, Clone, Debug, Hash, Ord, PartialOrd, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
#[repr(transparent)]
pub struct Mtu(NonZero<u32>);

impl Mtu {
    pub(crate) const DEFAULT_U32: u32 = 1500;

    /// The typical MTU for an ethernet interface
    pub const DEFAULT: Mtu = Mtu(NonZero::new(Self::DEFAULT_U32).unwrap());

    /// Interpret an MTU as reported over a link message or interface query.
    ///
    /// Zero means "unknown" on that path and maps to [`Mtu::DEFAULT`].
    #[must_use]
    pub fn from_link(raw: u32) -> Mtu {
        NonZero::new(raw).map_or(Mtu::DEFAULT, Mtu)
    }

    /// Return the `Mtu` represented as a u32
    #[must_use]
    pub fn to_u32(&self) -> u32 {
        self.0.get()
    }

    /// Return the `Mtu` represented as a usize
    #[must_use]
    pub fn to_usize(&self) -> usize {
        self.to_u32() as usize
    }
}

impl Default for Mtu {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for Mtu {
    type Error = MtuError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        NonZero::new(value).map(Mtu).ok_or(MtuError::Zero)
    }
}

impl From<Mtu> for u32 {
    fn from(value: Mtu) -> Self {
        value.0.get()
    }
}

impl Display for Mtu {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.get())
    }
}

/// Errors which may occur when constructing an [`Mtu`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, thiserror::Error)]
pub enum MtuError {
    /// Zero is not a legal MTU.
    #[error("zero is not a legal MTU")]
    Zero,
}
