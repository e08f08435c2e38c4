//! Protocol identities, their wire version numbers and revision constants.

use serde::{Deserialize, Serialize};

/// A wire protocol.
///
/// Variants are ordered by protocol family; code relies on
/// `protocol >= Protocol::R1q2` meaning "speaks the extended connect line".
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// Unknown or unset.
    #[default]
    Invalid,
    /// Original release demos (26).
    OldDemo,
    /// Vanilla (34).
    Vanilla,
    /// R1Q2 (35).
    R1q2,
    /// Q2PRO (36).
    Q2pro,
    /// Q2PRO extended demos (3434).
    Q2proExtendedDemo,
    /// Q2PRO extended v2 demos (3435).
    Q2proExtendedV2Demo,
    /// Q2PRO extended demos with player fog (3436).
    Q2proExtendedDemoPlayerfog,
    /// Q2rePRO (1038).
    Q2repro,
    /// Rerelease demos (2022).
    KexDemos,
    /// Rerelease (2023).
    Kex,
}

/// Netver of [`Protocol::OldDemo`].
pub const PROTOCOL_OLD_DEMO: i32 = 26;
/// Netver of [`Protocol::Vanilla`].
pub const PROTOCOL_VANILLA: i32 = 34;
/// Netver of [`Protocol::R1q2`].
pub const PROTOCOL_R1Q2: i32 = 35;
/// Netver of [`Protocol::Q2pro`].
pub const PROTOCOL_Q2PRO: i32 = 36;
/// Netver of [`Protocol::Q2proExtendedDemo`].
pub const PROTOCOL_Q2PRO_DEMO_EXT: i32 = 3434;
/// Netver of [`Protocol::Q2proExtendedV2Demo`].
pub const PROTOCOL_Q2PRO_DEMO_EXT_LIMITS_2: i32 = 3435;
/// Netver of [`Protocol::Q2proExtendedDemoPlayerfog`].
pub const PROTOCOL_Q2PRO_DEMO_EXT_PLAYERFOG: i32 = 3436;
/// Netver of [`Protocol::Q2repro`].
pub const PROTOCOL_Q2REPRO: i32 = 1038;
/// Netver of [`Protocol::KexDemos`].
pub const PROTOCOL_KEX_DEMOS: i32 = 2022;
/// Netver of [`Protocol::Kex`].
pub const PROTOCOL_KEX: i32 = 2023;

/// Oldest R1Q2 revision.
pub const R1Q2_VERSION_MINIMUM: i32 = 1903;
/// R1Q2: extended user commands.
pub const R1Q2_VERSION_UCMD: i32 = 1904;
/// R1Q2: 32-bit solids.
pub const R1Q2_VERSION_LONG_SOLID: i32 = 1905;
/// Newest R1Q2 revision.
pub const R1Q2_VERSION_CURRENT: i32 = 1905;

/// Oldest Q2PRO revision.
pub const Q2PRO_VERSION_MINIMUM: i32 = 1015;
/// Q2PRO: never negotiated.
pub const Q2PRO_VERSION_RESERVED: i32 = 1016;
/// Q2PRO: beam old origin fix.
pub const Q2PRO_VERSION_BEAM_ORIGIN: i32 = 1017;
/// Q2PRO: 16-bit entity angles.
pub const Q2PRO_VERSION_SHORT_ANGLES: i32 = 1018;
/// Q2PRO: server state in serverdata.
pub const Q2PRO_VERSION_SERVER_STATE: i32 = 1019;
/// Q2PRO: extended layout.
pub const Q2PRO_VERSION_EXTENDED_LAYOUT: i32 = 1020;
/// Q2PRO: compressed downloads.
pub const Q2PRO_VERSION_ZLIB_DOWNLOADS: i32 = 1021;
/// Q2PRO: 16-bit client number.
pub const Q2PRO_VERSION_CLIENTNUM_SHORT: i32 = 1022;
/// Q2PRO: cinematics.
pub const Q2PRO_VERSION_CINEMATICS: i32 = 1023;
/// Q2PRO: extended limits.
pub const Q2PRO_VERSION_EXTENDED_LIMITS: i32 = 1024;
/// Q2PRO: extended limits, second revision.
pub const Q2PRO_VERSION_EXTENDED_LIMITS_2: i32 = 1025;
/// Q2PRO: player fog.
pub const Q2PRO_VERSION_PLAYERFOG: i32 = 1026;
/// Newest Q2PRO revision.
pub const Q2PRO_VERSION_CURRENT: i32 = 1026;

/// Q2rePRO revision.
pub const Q2REPRO_VERSION_CURRENT: i32 = 1024;

impl Protocol {
    /// Every valid protocol, in enum order.
    pub const ALL: [Self; 10] = [
        Self::OldDemo,
        Self::Vanilla,
        Self::R1q2,
        Self::Q2pro,
        Self::Q2proExtendedDemo,
        Self::Q2proExtendedV2Demo,
        Self::Q2proExtendedDemoPlayerfog,
        Self::Q2repro,
        Self::KexDemos,
        Self::Kex,
    ];

    /// Version number sent on the wire; 0 for [`Protocol::Invalid`].
    #[must_use]
    pub const fn netver(self) -> i32 {
        match self {
            Self::Invalid => 0,
            Self::OldDemo => PROTOCOL_OLD_DEMO,
            Self::Vanilla => PROTOCOL_VANILLA,
            Self::R1q2 => PROTOCOL_R1Q2,
            Self::Q2pro => PROTOCOL_Q2PRO,
            Self::Q2proExtendedDemo => PROTOCOL_Q2PRO_DEMO_EXT,
            Self::Q2proExtendedV2Demo => PROTOCOL_Q2PRO_DEMO_EXT_LIMITS_2,
            Self::Q2proExtendedDemoPlayerfog => PROTOCOL_Q2PRO_DEMO_EXT_PLAYERFOG,
            Self::Q2repro => PROTOCOL_Q2REPRO,
            Self::KexDemos => PROTOCOL_KEX_DEMOS,
            Self::Kex => PROTOCOL_KEX,
        }
    }

    /// Protocol for a wire version number; unknown numbers map to
    /// [`Protocol::Invalid`].
    #[must_use]
    pub const fn from_netver(netver: i32) -> Self {
        match netver {
            PROTOCOL_OLD_DEMO => Self::OldDemo,
            PROTOCOL_VANILLA => Self::Vanilla,
            PROTOCOL_R1Q2 => Self::R1q2,
            PROTOCOL_Q2PRO => Self::Q2pro,
            PROTOCOL_Q2PRO_DEMO_EXT => Self::Q2proExtendedDemo,
            PROTOCOL_Q2PRO_DEMO_EXT_LIMITS_2 => Self::Q2proExtendedV2Demo,
            PROTOCOL_Q2PRO_DEMO_EXT_PLAYERFOG => Self::Q2proExtendedDemoPlayerfog,
            PROTOCOL_Q2REPRO => Self::Q2repro,
            PROTOCOL_KEX_DEMOS => Self::KexDemos,
            PROTOCOL_KEX => Self::Kex,
            _ => Self::Invalid,
        }
    }

    /// Bit used in protocol masks.
    #[inline]
    #[must_use]
    pub(crate) const fn mask_bit(self) -> u32 {
        1 << self as u32
    }

    /// True for protocols only found in recorded demos.
    #[must_use]
    pub const fn is_demo(self) -> bool {
        matches!(
            self,
            Self::OldDemo
                | Self::Q2proExtendedDemo
                | Self::Q2proExtendedV2Demo
                | Self::Q2proExtendedDemoPlayerfog
                | Self::KexDemos
        )
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Invalid => "invalid",
            Self::OldDemo => "old demo",
            Self::Vanilla => "vanilla",
            Self::R1q2 => "R1Q2",
            Self::Q2pro => "Q2PRO",
            Self::Q2proExtendedDemo => "Q2PRO extended demo",
            Self::Q2proExtendedV2Demo => "Q2PRO extended v2 demo",
            Self::Q2proExtendedDemoPlayerfog => "Q2PRO extended demo (player fog)",
            Self::Q2repro => "Q2rePRO",
            Self::KexDemos => "rerelease demo",
            Self::Kex => "rerelease",
        };
        write!(f, "{name} ({})", self.netver())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_netver_round_trip() {
        for protocol in Protocol::ALL {
            assert_eq!(Protocol::from_netver(protocol.netver()), protocol);
        }
    }

    #[test]
    fn test_q2pro_is_36() {
        assert_eq!(Protocol::from_netver(36), Protocol::Q2pro);
        assert_eq!(Protocol::Q2pro.netver(), 36);
    }

    #[test]
    fn test_invalid() {
        assert_eq!(Protocol::from_netver(0), Protocol::Invalid);
        assert_eq!(Protocol::from_netver(33), Protocol::Invalid);
        assert_eq!(Protocol::from_netver(-1), Protocol::Invalid);
        assert_eq!(Protocol::Invalid.netver(), 0);
    }

    #[test]
    fn test_ordering() {
        assert!(Protocol::Vanilla < Protocol::R1q2);
        assert!(Protocol::Q2repro >= Protocol::R1q2);
        assert!(Protocol::OldDemo < Protocol::R1q2);
    }

    #[test]
    fn test_display() {
        assert_eq!(Protocol::Q2pro.to_string(), "Q2PRO (36)");
    }
}
