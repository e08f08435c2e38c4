//! Game module APIs and the protocols each one can be served over.

use serde::{Deserialize, Serialize};

use super::version::Protocol;

/// The API the server's game module implements.
///
/// Ordered by capability; later variants carry more state.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum GameApi {
    /// Original game API.
    #[default]
    Vanilla,
    /// Q2PRO extended game API.
    Q2proExtended,
    /// Q2PRO extended game API, second revision.
    Q2proExtendedV2,
    /// Rerelease game API.
    Rerelease,
}

impl GameApi {
    /// Bit mask of the protocols a live connection can use with this API.
    #[must_use]
    pub(crate) const fn protocol_mask(self) -> u32 {
        match self {
            Self::Vanilla => {
                Protocol::Vanilla.mask_bit() | Protocol::R1q2.mask_bit() | Protocol::Q2pro.mask_bit()
            }
            Self::Q2proExtended | Self::Q2proExtendedV2 => Protocol::Q2pro.mask_bit(),
            Self::Rerelease => Protocol::Q2repro.mask_bit(),
        }
    }

    /// True if a live connection can use `protocol` with this API.
    #[must_use]
    pub const fn supports(self, protocol: Protocol) -> bool {
        self.protocol_mask() & protocol.mask_bit() != 0
    }

    /// Protocols a live connection can use with this API, newest first.
    #[must_use]
    pub fn supported_protocols(self) -> Vec<Protocol> {
        protocols_for_game_apis(&[self])
    }
}

/// Protocols usable with any of `apis`, in descending protocol order.
#[must_use]
pub fn protocols_for_game_apis(apis: &[GameApi]) -> Vec<Protocol> {
    let mask = apis.iter().fold(0, |mask, api| mask | api.protocol_mask());
    Protocol::ALL
        .iter()
        .rev()
        .copied()
        .filter(|p| mask & p.mask_bit() != 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vanilla_protocols() {
        assert_eq!(
            protocols_for_game_apis(&[GameApi::Vanilla]),
            vec![Protocol::Q2pro, Protocol::R1q2, Protocol::Vanilla]
        );
    }

    #[test]
    fn test_union_descending() {
        assert_eq!(
            protocols_for_game_apis(&[GameApi::Q2proExtended, GameApi::Rerelease]),
            vec![Protocol::Q2repro, Protocol::Q2pro]
        );
        assert!(protocols_for_game_apis(&[]).is_empty());
    }

    #[test]
    fn test_supports() {
        assert!(GameApi::Q2proExtendedV2.supports(Protocol::Q2pro));
        assert!(!GameApi::Q2proExtendedV2.supports(Protocol::R1q2));
        assert!(!GameApi::Rerelease.supports(Protocol::Kex));
        assert!(!GameApi::Vanilla.supports(Protocol::Invalid));
    }
}
