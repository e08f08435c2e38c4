//! # Q2WIRE
//!
//! Server-side wire codec for the Quake II protocol family: vanilla (34),
//! R1Q2 (35), Q2PRO (36) and its extended demo formats, Q2rePRO (1038) and
//! the rerelease (KEX) formats.
//!
//! The game hands over one logical state. The codec turns it into the
//! bytes each client expects.
//!
//! ## Architecture Rules
//!
//! 1. **Pack once, write many** - Game state is packed to integers per
//!    packing flavor, diffed into deltas, then written per protocol
//! 2. **No allocation on encode** - Writers target caller-owned buffers;
//!    compression reuses caller-owned staging and compressor scratch
//! 3. **Protocol branching in one place** - [`ServerContext`] decides,
//!    the codecs take plain parameters
//!
//! ## Example
//!
//! ```rust,ignore
//! use q2wire::{parse_connect, CodecConfig, PacketWriter, ServerContext};
//!
//! let config = CodecConfig::from_toml_str(&std::fs::read_to_string("q2wire.toml")?)?;
//! let connect = parse_connect(&args, &config.accepted_protocols(), 1390)?;
//! let context = ServerContext::new(config.server_info(), &connect)?;
//!
//! let mut packet = PacketWriter::new(context.max_msg_len());
//! let player = context.make_player_delta(Some(&old_player), &new_player);
//! context.write_frame(&mut packet, &header, &player)?;
//! let delta = context.make_entity_delta(Some(&old), &new, false);
//! context.write_entity_delta(&mut packet, entnum, &delta)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod direction;
pub mod entity_bits;
pub mod error;
pub mod frame;
pub mod io;
pub mod messages;
pub mod packing;
pub mod protocol;
pub mod q2pro;
pub mod q2repro;
pub mod server;
pub mod solid;
pub mod sound;
pub mod values;
pub mod vanilla;
pub mod zpacket;

pub use config::CodecConfig;
pub use error::{WireError, WireResult};
pub use frame::FrameHeader;
pub use io::{PacketReader, PacketWriter, WireRead, WireWrite};
pub use packing::{
    EntityStateDelta, PackedEntityState, PackedPlayerState, PackingFlavor, PlayerStateDelta,
};
pub use protocol::{parse_connect, ConnectInfo, GameApi, MulticastProtocol, Protocol};
pub use server::{Features, ServerContext, ServerInfo};
pub use solid::SolidFormat;
pub use sound::SoundMessage;
pub use zpacket::{Deflater, Inflater, Lz4Block, ZPacketSession};

/// A 3D vector in game units.
pub type Vec3 = [f32; 3];

/// Largest packet any client is guaranteed to accept.
pub const MAX_PACKETLEN_WRITABLE: usize = 1390;

/// Largest message a reliable channel or demo frame can carry.
pub const MAX_MSGLEN: usize = 0x8000;
