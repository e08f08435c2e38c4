//! # Codec Configuration
//!
//! Server-side settings loaded once at startup from TOML.
//!
//! ```toml
//! game_api = "q2pro_extended_v2"
//! accepted_protocols = ["q2pro"]
//! default_packet_length = 1390
//! enable_deflate = true
//! zpacket_min_payload = 64
//! ```
//!
//! Every key is optional. Without `accepted_protocols`, every protocol the
//! game API supports is accepted.

use serde::{Deserialize, Serialize};

use crate::error::{WireError, WireResult};
use crate::protocol::{GameApi, MulticastProtocol, Protocol};
use crate::server::ServerInfo;

/// Codec settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecConfig {
    /// Game module API.
    pub game_api: GameApi,
    /// Protocols clients may connect with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_protocols: Option<Vec<Protocol>>,
    /// Packet length for clients that don't ask for one.
    pub default_packet_length: u16,
    /// Allow zpackets at all.
    pub enable_deflate: bool,
    /// Messages shorter than this are sent uncompressed.
    pub zpacket_min_payload: usize,
}

impl Default for CodecConfig {
    #[allow(clippy::cast_possible_truncation)]
    fn default() -> Self {
        Self {
            game_api: GameApi::Vanilla,
            accepted_protocols: None,
            default_packet_length: crate::MAX_PACKETLEN_WRITABLE as u16,
            enable_deflate: true,
            zpacket_min_payload: 0,
        }
    }
}

impl CodecConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`WireError::InvalidConfig`] if the document does not parse or does
    /// not validate.
    pub fn from_toml_str(text: &str) -> WireResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|err| WireError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        tracing::debug!(?config, "codec config loaded");
        Ok(config)
    }

    /// Serializes to TOML.
    ///
    /// # Errors
    ///
    /// [`WireError::InvalidConfig`] if serialization fails.
    pub fn to_toml_string(&self) -> WireResult<String> {
        toml::to_string(self).map_err(|err| WireError::InvalidConfig(err.to_string()))
    }

    /// Protocols clients may connect with, newest first.
    #[must_use]
    pub fn accepted_protocols(&self) -> Vec<Protocol> {
        match &self.accepted_protocols {
            Some(protocols) => {
                let mut protocols = protocols.clone();
                protocols.sort_unstable_by(|a, b| b.cmp(a));
                protocols.dedup();
                protocols
            }
            None => self.game_api.supported_protocols(),
        }
    }

    /// Checks the settings for consistency.
    ///
    /// # Errors
    ///
    /// [`WireError::InvalidConfig`] if no protocol is accepted, if the
    /// accepted protocols have no common multicast format with the game
    /// API, or if the packet length is zero.
    pub fn validate(&self) -> WireResult<()> {
        let accepted = self.accepted_protocols();
        if accepted.is_empty() {
            return Err(WireError::InvalidConfig(
                "accepted_protocols must not be empty".into(),
            ));
        }
        if self.multicast_protocol() == MulticastProtocol::Invalid {
            return Err(WireError::InvalidConfig(format!(
                "protocols {accepted:?} cannot all be served to a {:?} game",
                self.game_api
            )));
        }
        if self.default_packet_length == 0 {
            return Err(WireError::InvalidConfig(
                "default_packet_length must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Server settings for building connection contexts.
    #[must_use]
    pub fn server_info(&self) -> ServerInfo {
        ServerInfo {
            game_api: self.game_api,
            default_packet_length: usize::from(self.default_packet_length),
            zpacket_min_payload: self.zpacket_min_payload,
            enable_deflate: self.enable_deflate,
        }
    }

    /// Position format for messages multicast to every client.
    #[must_use]
    pub fn multicast_protocol(&self) -> MulticastProtocol {
        MulticastProtocol::select(&self.accepted_protocols(), self.game_api)
    }
}
