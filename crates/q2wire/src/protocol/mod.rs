//! # Protocol Resolution
//!
//! Which wire protocol a peer speaks, which protocols a game module can be
//! served over, and the connect handshake that settles it.
//!
//! ## Design Philosophy
//!
//! - Protocols and game APIs are plain ordered enums
//! - Support is a bit mask per game API
//! - Resolution happens once per connection; nothing here is on a hot path

mod connect;
mod game_api;
mod multicast;
mod version;

pub use connect::{challenge_extras, parse_connect, ConnectInfo, Q2PRO_NETCHAN_NEW};
pub use game_api::{protocols_for_game_apis, GameApi};
pub use multicast::MulticastProtocol;
pub use version::*;
