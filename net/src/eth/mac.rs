// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Mac address type and logic.

use arrayvec::ArrayVec;
use std::fmt::Display;

/// A [MAC Address] type.
///
/// `Mac` is a transparent wrapper around `[u8; 6]` which provides a
/// small collection of methods and type safety.
///
/// [MAC Address]: https://en.wikipedia.org/wiki/MAC_address
#[repr(transparent)]
#[cfg_attr(any(test, feature = "bolero"), derive(bolero::TypeGenerator))]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct Mac(pub [u8; 6]);

impl From<[u8; 6]> for Mac {
    fn from(value: [u8; 6]) -> Self {
        Mac(value)
    }
}

impl From<Mac> for [u8; 6] {
    fn from(value: Mac) -> Self {
        value.0
    }
}

impl AsRef<[u8; 6]> for Mac {
    fn as_ref(&self) -> &[u8; 6] {
        &self.0
    }
}

/// Errors which can occur while converting a string to a [`Mac`]
#[derive(Debug, thiserror::Error)]
pub enum MacFromStringError {
    /// Invalid string representation of mac address
    #[error("invalid string representation of mac address: {0}")]
    Invalid(String),
}

impl TryFrom<&str> for Mac {
    type Error = MacFromStringError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        const MAX_OCTETS: usize = 6;
        let mut octets_strs = value.split(':');
        let octets_parsed =
            octets_strs.try_fold(ArrayVec::<_, MAX_OCTETS>::new(), |mut acc, octet_str| {
                if octet_str.len() != 2 {
                    return Err(MacFromStringError::Invalid(value.to_string()));
                }
                if octet_str.chars().any(|c| !c.is_ascii_hexdigit()) {
                    return Err(MacFromStringError::Invalid(value.to_string()));
                }
                let parsed = u8::from_str_radix(octet_str, 16)
                    .map_err(|_| MacFromStringError::Invalid(value.to_string()))?;
                acc.try_push(parsed)
                    .map_err(|_| MacFromStringError::Invalid(value.to_string()))?;
                Ok(acc)
            })?;

        let octets = match octets_parsed.as_slice() {
            [o0, o1, o2, o3, o4, o5] => [*o0, *o1, *o2, *o3, *o4, *o5],
            _ => return Err(MacFromStringError::Invalid(value.to_string())),
        };

        Ok(Mac(octets))
    }
}

impl Mac {
    /// The broadcast `Mac`
    pub const BROADCAST: Mac = Mac([u8::MAX; 6]);
    /// The zero `Mac`.
    pub const ZERO: Mac = Mac([0; 6]);

    /// Returns true iff the binary representation of the [`Mac`] is exclusively ones.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self == &Mac::BROADCAST
    }

    /// Returns true iff the least significant bit of the first octet of the [`Mac`] is one.
    #[must_use]
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }

    /// Returns true iff the least significant bit of the first octet of the [`Mac`] is zero.
    #[must_use]
    pub fn is_unicast(&self) -> bool {
        !self.is_multicast()
    }

    /// Returns true iff the binary representation of the [`Mac`] is exclusively zeros.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self == &Mac::ZERO
    }

    /// Pack the six octets big-endian into the low 48 bits of a `u64`.
    ///
    /// This is the form the learning table stores.
    #[must_use]
    pub fn to_u64(self) -> u64 {
        let mut packed = 0u64;
        for octet in self.0 {
            packed = (packed << 8) | u64::from(octet);
        }
        packed
    }

    /// Unpack the low 48 bits of a `u64` back into a [`Mac`].
    ///
    /// The upper 16 bits are discarded.
    #[must_use]
    pub fn from_u64(packed: u64) -> Mac {
        let mut octets = [0u8; 6];
        for (i, octet) in octets.iter_mut().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            {
                *octet = (packed >> (40 - 8 * i)) as u8;
            }
        }
        Mac(octets)
    }
}

impl Display for Mac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Mac;

    #[test]
    fn packed_form_round_trips() {
        bolero::check!().with_type::<Mac>().for_each(|mac: &Mac| {
            let packed = mac.to_u64();
            assert!(packed <= 0xFFFF_FFFF_FFFF);
            assert_eq!(Mac::from_u64(packed), *mac);
        });
    }

    #[test]
    fn packed_form_is_big_endian() {
        let mac = Mac([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]);
        assert_eq!(mac.to_u64(), 0xaabb_ccdd_ee01);
    }

    #[test]
    fn display_round_trips() {
        bolero::check!().with_type::<Mac>().for_each(|mac: &Mac| {
            let shown = mac.to_string();
            assert_eq!(Mac::try_from(shown.as_str()).unwrap(), *mac);
        });
    }

    #[test]
    fn parse_valid_string() {
        let mac = Mac::try_from("aa:bb:cc:dd:ee:01").unwrap();
        assert_eq!(mac, Mac([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]));
    }

    #[test]
    fn parse_rejects_wrong_octet_count() {
        assert!(Mac::try_from("00:00:00:00:00").is_err());
        assert!(Mac::try_from("00:00:00:00:00:00:00").is_err());
    }

    #[test]
    fn parse_rejects_non_hex() {
        assert!(Mac::try_from("zz:00:00:00:00:00").is_err());
        assert!(Mac::try_from("0:00:00:00:00:000").is_err());
        assert!(Mac::try_from("").is_err());
    }

    #[test]
    fn broadcast_predicates() {
        assert!(Mac::BROADCAST.is_broadcast());
        assert!(Mac::BROADCAST.is_multicast());
        assert!(Mac::ZERO.is_zero());
        assert!(!Mac([0xfe, 0xff, 0xff, 0xff, 0xff, 0xff]).is_broadcast());
        assert!(Mac([0x02, 0, 0, 0, 0, 1]).is_unicast());
        assert!(Mac([0x01, 0, 0x5e, 0, 0, 1]).is_multicast());
    }
}
