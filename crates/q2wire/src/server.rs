//! # Server Context
//!
//! Everything a server needs to know about one connection (or one demo
//! recording) to pick encodings: the negotiated protocol and revision, the
//! features both sides support, and the packing flavor and solid format
//! the game's snapshots must use.
//!
//! ## Design Philosophy
//!
//! - Built once per connection, read-only afterwards
//! - All protocol branching lives here; the codecs below take plain
//!   parameters

use crate::error::{WireError, WireResult};
use crate::frame::FrameHeader;
use crate::io::{PacketWriter, WireWrite};
use crate::messages::{SVC_Q2REPRO_ZPACKET, SVC_ZPACKET};
use crate::packing::{
    make_entity_state_delta, make_player_state_delta, EntityStateDelta, PackedEntityState,
    PackedPlayerState, PackingFlavor, PlayerStateDelta,
};
use crate::protocol::{
    ConnectInfo, GameApi, MulticastProtocol, Protocol, Q2PRO_VERSION_BEAM_ORIGIN,
    Q2PRO_VERSION_CURRENT, Q2PRO_VERSION_EXTENDED_LIMITS, Q2PRO_VERSION_PLAYERFOG,
    Q2PRO_VERSION_ZLIB_DOWNLOADS, R1Q2_VERSION_LONG_SOLID,
};
use crate::q2pro::Q2proParams;
use crate::solid::SolidFormat;
use crate::sound::{write_sound, write_sound_kex, SoundMessage};
use crate::{q2pro, q2repro, vanilla};
use crate::zpacket::{write_zpacket, Deflater, ZPacketSession};

/// Smallest packet a demo is written with.
pub const MIN_DEMO_PACKET: usize = 512;

/// Server-wide settings shared by every connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerInfo {
    /// Game module API.
    pub game_api: GameApi,
    /// Packet length for clients that don't ask for one.
    pub default_packet_length: usize,
    /// Messages shorter than this are not worth compressing.
    pub zpacket_min_payload: usize,
    /// Compression may be negotiated at all.
    pub enable_deflate: bool,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            game_api: GameApi::Vanilla,
            default_packet_length: crate::MAX_PACKETLEN_WRITABLE,
            zpacket_min_payload: 0,
            enable_deflate: true,
        }
    }
}

/// Capabilities negotiated for a connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Features {
    /// zpackets may be sent.
    pub enable_deflate: bool,
    /// Downloads may be sent compressed without a zpacket wrapper.
    pub download_compress_raw: bool,
    /// The client reads beam old origins the fixed way.
    pub has_beam_old_origin_fix: bool,
    /// Player state carries fog.
    pub has_playerfog: bool,
    /// Player state carries the client number.
    pub playerstate_clientnum: bool,
}

/// Per-connection encoding state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerContext {
    info: ServerInfo,
    protocol: Protocol,
    protocol_version: i32,
    zpacket_cmd: Option<u8>,
    features: Features,
    max_msg_len: usize,
}

impl ServerContext {
    /// Builds the context for a client that connected with `connect`.
    ///
    /// # Errors
    ///
    /// - [`WireError::ProtocolNotSupported`] for an invalid protocol or the
    ///   old demo protocol
    /// - [`WireError::GametypeUnsupported`] if the game API cannot be served
    ///   over the protocol
    pub fn new(info: ServerInfo, connect: &ConnectInfo) -> WireResult<Self> {
        let mut features = Features::default();
        let mut protocol_version = 0;
        let mut zpacket_cmd = None;

        match connect.protocol {
            Protocol::Invalid | Protocol::OldDemo => {
                tracing::warn!(protocol = ?connect.protocol, "no server context for protocol");
                return Err(WireError::ProtocolNotSupported);
            }
            Protocol::Vanilla => {
                if info.game_api != GameApi::Vanilla {
                    return Err(WireError::GametypeUnsupported);
                }
            }
            Protocol::R1q2 => {
                if info.game_api != GameApi::Vanilla {
                    return Err(WireError::GametypeUnsupported);
                }
                protocol_version = connect.version;
                zpacket_cmd = Some(SVC_ZPACKET);
                features.enable_deflate = connect.has_zlib;
                features.has_beam_old_origin_fix = true;
            }
            Protocol::Q2pro => {
                if info.game_api > GameApi::Q2proExtendedV2 {
                    return Err(WireError::GametypeUnsupported);
                }
                protocol_version = connect.version;
                zpacket_cmd = Some(SVC_ZPACKET);
                features = q2pro_features(protocol_version, connect.has_zlib);
                features.has_playerfog = protocol_version >= Q2PRO_VERSION_PLAYERFOG;
            }
            Protocol::Q2proExtendedDemo
            | Protocol::Q2proExtendedV2Demo
            | Protocol::Q2proExtendedDemoPlayerfog => {
                protocol_version = if info.game_api == GameApi::Q2proExtendedV2 {
                    Q2PRO_VERSION_CURRENT
                } else {
                    Q2PRO_VERSION_EXTENDED_LIMITS
                };
                features = q2pro_features(protocol_version, connect.has_zlib);
                features.has_playerfog = connect.protocol >= Protocol::Q2proExtendedDemoPlayerfog;
            }
            Protocol::Q2repro => {
                protocol_version = connect.version;
                zpacket_cmd = Some(SVC_Q2REPRO_ZPACKET);
                features.enable_deflate = connect.has_zlib;
                features.download_compress_raw = true;
                features.has_beam_old_origin_fix = true;
                features.playerstate_clientnum = true;
            }
            Protocol::KexDemos | Protocol::Kex => {
                features.has_beam_old_origin_fix = true;
            }
        }

        features.enable_deflate &= info.enable_deflate;

        let max_msg_len = if connect.packet_length > 0 {
            connect.packet_length
        } else {
            info.default_packet_length
        };

        tracing::debug!(
            protocol = %connect.protocol,
            protocol_version,
            game_api = ?info.game_api,
            ?features,
            max_msg_len,
            "server context"
        );
        Ok(Self {
            info,
            protocol: connect.protocol,
            protocol_version,
            zpacket_cmd,
            features,
            max_msg_len,
        })
    }

    /// Builds the context for recording a demo.
    ///
    /// The demo protocol follows the game API: vanilla games record
    /// protocol 34 at the packet length, extended games record the Q2PRO
    /// extended demo formats and rerelease games Q2rePRO, both up to
    /// [`crate::MAX_MSGLEN`].
    ///
    /// # Errors
    ///
    /// Same as [`ServerContext::new`].
    pub fn for_demo(info: ServerInfo) -> WireResult<Self> {
        let packet_length = if info.default_packet_length == 0 {
            crate::MAX_PACKETLEN_WRITABLE
        } else {
            info.default_packet_length
        }
        .max(MIN_DEMO_PACKET);

        let (protocol, max_msg_len) = match info.game_api {
            GameApi::Vanilla => (Protocol::Vanilla, packet_length),
            GameApi::Q2proExtended => (Protocol::Q2proExtendedDemo, crate::MAX_MSGLEN),
            GameApi::Q2proExtendedV2 => (Protocol::Q2proExtendedDemoPlayerfog, crate::MAX_MSGLEN),
            GameApi::Rerelease => (Protocol::Q2repro, crate::MAX_MSGLEN),
        };
        let connect = ConnectInfo {
            protocol,
            packet_length,
            ..ConnectInfo::default()
        };
        let mut context = Self::new(info, &connect)?;
        context.max_msg_len = max_msg_len;
        Ok(context)
    }

    /// Negotiated protocol.
    #[inline]
    #[must_use]
    pub const fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Negotiated protocol revision (0 where the protocol has none).
    #[inline]
    #[must_use]
    pub const fn protocol_version(&self) -> i32 {
        self.protocol_version
    }

    /// Server settings the context was built with.
    #[inline]
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.info
    }

    /// Negotiated features.
    #[inline]
    #[must_use]
    pub const fn features(&self) -> &Features {
        &self.features
    }

    /// Largest message the peer accepts.
    #[inline]
    #[must_use]
    pub const fn max_msg_len(&self) -> usize {
        self.max_msg_len
    }

    /// Command byte for zpackets, if the protocol has them.
    #[inline]
    #[must_use]
    pub const fn zpacket_cmd(&self) -> Option<u8> {
        self.zpacket_cmd
    }

    /// True if entity deltas carry the extended fields.
    #[inline]
    #[must_use]
    pub fn extended_fields(&self) -> bool {
        self.info.game_api != GameApi::Vanilla
    }

    /// How the game must pack snapshots for this connection.
    #[must_use]
    pub fn packing_flavor(&self) -> PackingFlavor {
        if self.protocol == Protocol::Q2repro {
            PackingFlavor::Repro
        } else {
            PackingFlavor::Vanilla
        }
    }

    /// How bounding boxes are packed for this connection.
    #[must_use]
    pub fn solid_format(&self) -> SolidFormat {
        match self.protocol {
            Protocol::R1q2 if self.protocol_version >= R1Q2_VERSION_LONG_SOLID => {
                SolidFormat::R1q2Long
            }
            Protocol::Q2pro if self.info.game_api >= GameApi::Q2proExtended => {
                SolidFormat::Q2proV2
            }
            Protocol::Q2pro => SolidFormat::R1q2Long,
            Protocol::Q2proExtendedDemo
            | Protocol::Q2proExtendedV2Demo
            | Protocol::Q2proExtendedDemoPlayerfog
            | Protocol::Q2repro
            | Protocol::KexDemos
            | Protocol::Kex => SolidFormat::Q2proV2,
            Protocol::Invalid | Protocol::OldDemo | Protocol::Vanilla | Protocol::R1q2 => {
                SolidFormat::Vanilla16
            }
        }
    }

    /// Position format of sounds sent on this connection.
    #[must_use]
    pub fn multicast_protocol(&self) -> MulticastProtocol {
        match self.protocol {
            Protocol::Q2pro
            | Protocol::Q2proExtendedDemo
            | Protocol::Q2proExtendedV2Demo
            | Protocol::Q2proExtendedDemoPlayerfog
                if self.info.game_api >= GameApi::Q2proExtendedV2 =>
            {
                MulticastProtocol::Q2proExtendedCoords
            }
            Protocol::Q2repro | Protocol::Kex => MulticastProtocol::Float,
            Protocol::Invalid => MulticastProtocol::Invalid,
            _ => MulticastProtocol::Short,
        }
    }

    /// Diffs two entity snapshots for this connection.
    #[must_use]
    pub fn make_entity_delta(
        &self,
        from: Option<&PackedEntityState>,
        to: &PackedEntityState,
        write_old_origin: bool,
    ) -> EntityStateDelta {
        make_entity_state_delta(
            self.packing_flavor(),
            from,
            to,
            write_old_origin,
            self.extended_fields(),
        )
    }

    /// Diffs two player snapshots for this connection.
    #[must_use]
    pub fn make_player_delta(
        &self,
        from: Option<&PackedPlayerState>,
        to: &PackedPlayerState,
    ) -> PlayerStateDelta {
        let fog_enabled =
            self.features.has_playerfog && self.info.game_api == GameApi::Q2proExtendedV2;
        make_player_state_delta(self.packing_flavor(), from, to, fog_enabled)
    }

    /// R1Q2 or Q2PRO record layout, for connections that use one.
    #[must_use]
    pub const fn q2pro_params(&self) -> Option<Q2proParams> {
        match self.protocol {
            Protocol::R1q2 => Some(Q2proParams::r1q2(self.protocol_version)),
            Protocol::Q2pro
            | Protocol::Q2proExtendedDemo
            | Protocol::Q2proExtendedV2Demo
            | Protocol::Q2proExtendedDemoPlayerfog => Some(Q2proParams::q2pro(
                self.info.game_api,
                self.protocol_version,
            )),
            _ => None,
        }
    }

    /// Writes an entity update in this connection's layout and returns the
    /// header bits.
    ///
    /// # Errors
    ///
    /// - [`WireError::NotImplemented`] for the rerelease (KEX) protocols
    /// - [`WireError::BadData`] if the delta does not fit the layout
    /// - any write error
    pub fn write_entity_delta<W: WireWrite + ?Sized>(
        &self,
        out: &mut W,
        entnum: u16,
        delta: &EntityStateDelta,
    ) -> WireResult<u64> {
        match (self.protocol, self.q2pro_params()) {
            (Protocol::Vanilla, _) => vanilla::write_entity_delta(out, entnum, delta),
            (Protocol::Q2repro, _) => q2repro::write_entity_delta(out, entnum, delta),
            (_, Some(params)) => q2pro::write_entity_delta(out, &params, entnum, delta),
            (_, None) => Err(WireError::NotImplemented),
        }
    }

    /// Writes `svc_spawnbaseline` in this connection's layout.
    ///
    /// # Errors
    ///
    /// Same as [`write_entity_delta`](Self::write_entity_delta).
    pub fn write_spawnbaseline<W: WireWrite + ?Sized>(
        &self,
        out: &mut W,
        entnum: u16,
        delta: &EntityStateDelta,
    ) -> WireResult<()> {
        match (self.protocol, self.q2pro_params()) {
            (Protocol::Vanilla, _) => vanilla::write_spawnbaseline(out, entnum, delta),
            (Protocol::Q2repro, _) => q2repro::write_spawnbaseline(out, entnum, delta),
            (_, Some(params)) => q2pro::write_spawnbaseline(out, &params, entnum, delta),
            (_, None) => Err(WireError::NotImplemented),
        }
    }

    /// Writes `svc_frame` and the player state in this connection's layout.
    /// Entity updates follow.
    ///
    /// # Errors
    ///
    /// - [`WireError::NotImplemented`] for the rerelease (KEX) protocols
    /// - [`WireError::BadData`] if the header or player state does not fit
    ///   the layout; nothing is written then
    /// - any write error
    pub fn write_frame<W: WireWrite + ?Sized>(
        &self,
        out: &mut W,
        header: &FrameHeader<'_>,
        player: &PlayerStateDelta,
    ) -> WireResult<()> {
        let result = match (self.protocol, self.q2pro_params()) {
            (Protocol::Vanilla, _) => vanilla::write_frame(out, header, player),
            (Protocol::Q2repro, _) => q2repro::write_frame(out, header, player),
            (_, Some(params)) => q2pro::write_frame(out, &params, header, player),
            (_, None) => Err(WireError::NotImplemented),
        };
        if let Err(err) = &result {
            tracing::debug!(protocol = ?self.protocol, %err, "frame rejected");
        }
        result
    }

    /// Writes `svc_sound` in this connection's layout.
    ///
    /// # Errors
    ///
    /// Any write error.
    pub fn write_sound<W: WireWrite + ?Sized>(
        &self,
        out: &mut W,
        sound: &SoundMessage,
    ) -> WireResult<()> {
        match self.protocol {
            Protocol::Kex => write_sound_kex(out, false, sound),
            Protocol::KexDemos => write_sound_kex(out, true, sound),
            _ => write_sound(out, self.multicast_protocol(), sound),
        }
    }

    /// Starts a zpacket session on `target`, staging the uncompressed
    /// message in `staging`.
    ///
    /// The session compresses only if the connection negotiated compression
    /// and a `deflater` is given.
    pub fn begin_zpacket<'a, W: WireWrite + ?Sized, D: Deflater + ?Sized>(
        &self,
        target: &'a mut W,
        staging: &'a mut PacketWriter,
        deflater: Option<&'a mut D>,
    ) -> ZPacketSession<'a, W, D> {
        match self.zpacket_cmd {
            Some(cmd) if self.features.enable_deflate => {
                ZPacketSession::begin(target, staging, deflater, cmd)
            }
            _ => ZPacketSession::begin(target, staging, None, 0),
        }
    }

    /// Compresses a complete message into a zpacket.
    ///
    /// # Errors
    ///
    /// - [`WireError::DeflateNotSupported`] if the connection has no
    ///   compression
    /// - [`WireError::AlreadyCompressed`] if `packet` is below the
    ///   configured minimum payload; send it as is
    /// - anything [`write_zpacket`] reports
    pub fn write_zpacket<W: WireWrite + ?Sized, D: Deflater + ?Sized>(
        &self,
        out: &mut W,
        deflater: &mut D,
        packet: &[u8],
    ) -> WireResult<()> {
        let Some(cmd) = self.zpacket_cmd.filter(|_| self.features.enable_deflate) else {
            return Err(WireError::DeflateNotSupported);
        };
        if packet.len() < self.info.zpacket_min_payload {
            return Err(WireError::AlreadyCompressed);
        }
        write_zpacket(out, deflater, cmd, packet)
    }
}

fn q2pro_features(protocol_version: i32, has_zlib: bool) -> Features {
    Features {
        enable_deflate: has_zlib,
        download_compress_raw: has_zlib && protocol_version >= Q2PRO_VERSION_ZLIB_DOWNLOADS,
        has_beam_old_origin_fix: protocol_version >= Q2PRO_VERSION_BEAM_ORIGIN,
        has_playerfog: false,
        playerstate_clientnum: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::PacketReader;
    use crate::messages::{SVC_FRAME, SVC_LAYOUT, SVC_PACKETENTITIES};
    use crate::protocol::{parse_connect, R1Q2_VERSION_UCMD};
    use crate::sound::{read_sound, read_sound_kex, SoundFlags};
    use crate::zpacket::{read_zpacket, Lz4Block};

    fn connect(protocol: Protocol, version: i32, has_zlib: bool) -> ConnectInfo {
        ConnectInfo {
            protocol,
            version,
            has_zlib,
            packet_length: 1390,
            ..ConnectInfo::default()
        }
    }

    fn info(game_api: GameApi) -> ServerInfo {
        ServerInfo {
            game_api,
            ..ServerInfo::default()
        }
    }

    #[test]
    fn test_rejects_protocols() {
        for protocol in [Protocol::Invalid, Protocol::OldDemo] {
            assert_eq!(
                ServerContext::new(ServerInfo::default(), &connect(protocol, 0, false)),
                Err(WireError::ProtocolNotSupported)
            );
        }
        assert_eq!(
            ServerContext::new(info(GameApi::Q2proExtended), &connect(Protocol::R1q2, 1905, true)),
            Err(WireError::GametypeUnsupported)
        );
        assert_eq!(
            ServerContext::new(info(GameApi::Rerelease), &connect(Protocol::Q2pro, 1026, true)),
            Err(WireError::GametypeUnsupported)
        );
    }

    #[test]
    fn test_q2pro_features() {
        let old = ServerContext::new(
            ServerInfo::default(),
            &connect(Protocol::Q2pro, Q2PRO_VERSION_BEAM_ORIGIN - 1, true),
        )
        .unwrap();
        assert!(old.features().enable_deflate);
        assert!(!old.features().download_compress_raw);
        assert!(!old.features().has_beam_old_origin_fix);
        assert!(old.features().playerstate_clientnum);
        assert_eq!(old.zpacket_cmd(), Some(SVC_ZPACKET));
        assert_eq!(old.solid_format(), SolidFormat::R1q2Long);

        let current = ServerContext::new(
            info(GameApi::Q2proExtendedV2),
            &connect(Protocol::Q2pro, Q2PRO_VERSION_CURRENT, false),
        )
        .unwrap();
        assert!(!current.features().enable_deflate);
        assert!(current.features().has_playerfog);
        assert_eq!(current.solid_format(), SolidFormat::Q2proV2);
        assert_eq!(
            current.multicast_protocol(),
            MulticastProtocol::Q2proExtendedCoords
        );
    }

    #[test]
    fn test_r1q2_solid_by_revision() {
        let ucmd = ServerContext::new(
            ServerInfo::default(),
            &connect(Protocol::R1q2, R1Q2_VERSION_UCMD, true),
        )
        .unwrap();
        assert_eq!(ucmd.solid_format(), SolidFormat::Vanilla16);
        let long = ServerContext::new(
            ServerInfo::default(),
            &connect(Protocol::R1q2, R1Q2_VERSION_LONG_SOLID, true),
        )
        .unwrap();
        assert_eq!(long.solid_format(), SolidFormat::R1q2Long);
        assert!(long.features().has_beam_old_origin_fix);
    }

    #[test]
    fn test_from_parsed_connect() {
        let accepted = [Protocol::Vanilla, Protocol::R1q2, Protocol::Q2pro];
        let parsed = parse_connect(
            "36 123 456 \"\\name\\player\" 1400 1 1 1026",
            &accepted,
            1390,
        )
        .unwrap();
        let context = ServerContext::new(ServerInfo::default(), &parsed).unwrap();
        assert_eq!(context.protocol(), Protocol::Q2pro);
        assert_eq!(context.max_msg_len(), parsed.packet_length);
        assert_eq!(context.packing_flavor(), PackingFlavor::Vanilla);
    }

    #[test]
    fn test_demo_contexts() {
        let vanilla = ServerContext::for_demo(ServerInfo {
            default_packet_length: 100,
            ..ServerInfo::default()
        })
        .unwrap();
        assert_eq!(vanilla.protocol(), Protocol::Vanilla);
        assert_eq!(vanilla.max_msg_len(), MIN_DEMO_PACKET);

        let defaulted = ServerContext::for_demo(ServerInfo {
            default_packet_length: 0,
            ..ServerInfo::default()
        })
        .unwrap();
        assert_eq!(defaulted.max_msg_len(), crate::MAX_PACKETLEN_WRITABLE);

        let extended = ServerContext::for_demo(info(GameApi::Q2proExtended)).unwrap();
        assert_eq!(extended.protocol(), Protocol::Q2proExtendedDemo);
        assert_eq!(extended.protocol_version(), Q2PRO_VERSION_EXTENDED_LIMITS);
        assert_eq!(extended.max_msg_len(), crate::MAX_MSGLEN);
        assert!(!extended.features().has_playerfog);
        assert_eq!(extended.zpacket_cmd(), None);

        let v2 = ServerContext::for_demo(info(GameApi::Q2proExtendedV2)).unwrap();
        assert_eq!(v2.protocol(), Protocol::Q2proExtendedDemoPlayerfog);
        assert_eq!(v2.protocol_version(), Q2PRO_VERSION_CURRENT);
        assert!(v2.features().has_playerfog);

        let rerelease = ServerContext::for_demo(info(GameApi::Rerelease)).unwrap();
        assert_eq!(rerelease.protocol(), Protocol::Q2repro);
        assert_eq!(rerelease.packing_flavor(), PackingFlavor::Repro);
        assert_eq!(rerelease.multicast_protocol(), MulticastProtocol::Float);
    }

    #[test]
    fn test_entity_delta_extended_fields() {
        let to = PackedEntityState {
            modelindex: [1, 0, 0, 0],
            alpha: 128,
            ..PackedEntityState::default()
        };
        let vanilla = ServerContext::new(
            ServerInfo::default(),
            &connect(Protocol::Q2pro, Q2PRO_VERSION_CURRENT, false),
        )
        .unwrap();
        assert!(!vanilla.make_entity_delta(None, &to, false).bits.contains(
            crate::packing::EntityDeltaFlags::ALPHA
        ));

        let extended = ServerContext::new(
            info(GameApi::Q2proExtended),
            &connect(Protocol::Q2pro, Q2PRO_VERSION_CURRENT, false),
        )
        .unwrap();
        assert!(extended.make_entity_delta(None, &to, false).bits.contains(
            crate::packing::EntityDeltaFlags::ALPHA
        ));
    }

    #[test]
    fn test_player_fog_only_for_v2() {
        let to = PackedPlayerState {
            fog_density: 0x2000,
            ..PackedPlayerState::default()
        };
        let extended = ServerContext::new(
            info(GameApi::Q2proExtended),
            &connect(Protocol::Q2pro, Q2PRO_VERSION_CURRENT, false),
        )
        .unwrap();
        assert!(extended.make_player_delta(None, &to).fog.is_empty());

        let v2 = ServerContext::new(
            info(GameApi::Q2proExtendedV2),
            &connect(Protocol::Q2pro, Q2PRO_VERSION_CURRENT, false),
        )
        .unwrap();
        assert!(!v2.make_player_delta(None, &to).fog.is_empty());
    }

    #[test]
    fn test_sound_layouts() {
        let sound = SoundMessage {
            flags: SoundFlags::ENT | SoundFlags::POS,
            index: 12,
            entity: 70_000,
            channel: 2,
            pos: crate::values::VarCoords::from_ints([80, 160, -240]),
            ..SoundMessage::default()
        };

        let kex = ServerContext::new(info(GameApi::Rerelease), &connect(Protocol::Kex, 0, false))
            .unwrap();
        let mut out = PacketWriter::new(64);
        kex.write_sound(&mut out, &sound).unwrap();
        let mut reader = PacketReader::new(&out.as_slice()[1..]);
        let read = read_sound_kex(&mut reader, false).unwrap();
        assert_eq!(read.entity, 70_000);
        assert!(read.flags.contains(SoundFlags::KEX_LARGE_ENT));

        let small = SoundMessage {
            entity: 5,
            ..sound
        };
        let vanilla =
            ServerContext::new(ServerInfo::default(), &connect(Protocol::Vanilla, 0, false))
                .unwrap();
        let mut out = PacketWriter::new(64);
        vanilla.write_sound(&mut out, &small).unwrap();
        let mut reader = PacketReader::new(&out.as_slice()[1..]);
        let read = read_sound(&mut reader, MulticastProtocol::Short).unwrap();
        assert_eq!(read.entity, 5);
        assert_eq!(read.pos.get_int(), [80, 160, -240]);
    }

    #[test]
    fn test_zpacket_gating() {
        let mut packet = vec![SVC_LAYOUT];
        packet.extend_from_slice(&b"xv 32 yv 8 picn help ".repeat(16));
        packet.push(0);

        let plain = ServerContext::new(ServerInfo::default(), &connect(Protocol::Vanilla, 0, true))
            .unwrap();
        let mut out = PacketWriter::new(1400);
        let mut deflater = Lz4Block::default();
        assert_eq!(
            plain.write_zpacket(&mut out, &mut deflater, &packet),
            Err(WireError::DeflateNotSupported)
        );
        let mut staging = PacketWriter::new(crate::MAX_MSGLEN);
        let mut session = plain.begin_zpacket(&mut out, &mut staging, Some(&mut deflater));
        assert!(!session.is_compressing());
        session.write_u8(1).unwrap();
        session.end().unwrap();
        assert_eq!(out.as_slice(), &[1]);

        let repro = ServerContext::new(
            ServerInfo {
                game_api: GameApi::Rerelease,
                zpacket_min_payload: 1000,
                ..ServerInfo::default()
            },
            &connect(Protocol::Q2repro, 1024, true),
        )
        .unwrap();
        let mut out = PacketWriter::new(1400);
        assert_eq!(
            repro.write_zpacket(&mut out, &mut deflater, &packet),
            Err(WireError::AlreadyCompressed)
        );

        let mut session = repro.begin_zpacket(&mut out, &mut staging, Some(&mut deflater));
        assert!(session.is_compressing());
        session.write_raw(&packet).unwrap();
        session.end().unwrap();
        assert_eq!(out.as_slice()[0], SVC_Q2REPRO_ZPACKET);

        let mut reader = PacketReader::new(&out.as_slice()[1..]);
        let mut inflated = vec![0u8; packet.len()];
        read_zpacket(&mut reader, &mut Lz4Block::default(), &mut inflated).unwrap();
        assert_eq!(inflated, packet);
    }

    #[test]
    fn test_server_wide_deflate_switch() {
        let context = ServerContext::new(
            ServerInfo {
                enable_deflate: false,
                ..ServerInfo::default()
            },
            &connect(Protocol::R1q2, R1Q2_VERSION_UCMD, true),
        )
        .unwrap();
        assert!(!context.features().enable_deflate);
        assert_eq!(context.zpacket_cmd(), Some(SVC_ZPACKET));
    }

    #[test]
    fn test_frame_dispatch() {
        let to = PackedPlayerState {
            pm_viewheight: 22,
            ..PackedPlayerState::default()
        };
        let header = FrameHeader {
            serverframe: 10,
            deltaframe: None,
            flags: 0,
            areabits: &[0xff],
        };

        let repro = ServerContext::new(
            info(GameApi::Rerelease),
            &connect(Protocol::Q2repro, 1024, false),
        )
        .unwrap();
        let mut out = PacketWriter::new(256);
        repro
            .write_frame(&mut out, &header, &repro.make_player_delta(None, &to))
            .unwrap();
        let mut reader = PacketReader::new(&out.as_slice()[1..]);
        let (_, player) = q2repro::read_frame(&mut reader).unwrap();
        assert_eq!(player.pm_viewheight, 22);

        let extended_v2 = ServerContext::new(
            info(GameApi::Q2proExtendedV2),
            &connect(Protocol::Q2pro, Q2PRO_VERSION_CURRENT, false),
        )
        .unwrap();
        let delta = extended_v2.make_player_delta(None, &to);
        let mut out = PacketWriter::new(256);
        assert_eq!(
            extended_v2.write_frame(&mut out, &header, &delta),
            Err(WireError::BadData)
        );
        assert!(out.is_empty());

        let vanilla =
            ServerContext::new(ServerInfo::default(), &connect(Protocol::Vanilla, 0, false))
                .unwrap();
        let delta = vanilla.make_player_delta(None, &PackedPlayerState::default());
        vanilla.write_frame(&mut out, &header, &delta).unwrap();
        assert_eq!(out.as_slice()[0], SVC_FRAME);
        assert_eq!(out.as_slice().last(), Some(&SVC_PACKETENTITIES));

        let kex = ServerContext::new(info(GameApi::Rerelease), &connect(Protocol::Kex, 0, false))
            .unwrap();
        let mut out = PacketWriter::new(256);
        assert_eq!(
            kex.write_frame(&mut out, &header, &delta),
            Err(WireError::NotImplemented)
        );
    }

    #[test]
    fn test_entity_dispatch() {
        let to = PackedEntityState {
            modelindex: [300, 0, 0, 0],
            ..PackedEntityState::default()
        };
        let r1q2 = ServerContext::new(
            ServerInfo::default(),
            &connect(Protocol::R1q2, R1Q2_VERSION_LONG_SOLID, false),
        )
        .unwrap();
        assert_eq!(
            r1q2.q2pro_params(),
            Some(Q2proParams::r1q2(R1Q2_VERSION_LONG_SOLID))
        );
        let mut out = PacketWriter::new(64);
        assert_eq!(
            r1q2.write_spawnbaseline(&mut out, 1, &r1q2.make_entity_delta(None, &to, false)),
            Err(WireError::BadData)
        );
        assert!(out.is_empty());

        let extended = ServerContext::new(
            info(GameApi::Q2proExtended),
            &connect(Protocol::Q2pro, Q2PRO_VERSION_CURRENT, false),
        )
        .unwrap();
        let delta = extended.make_entity_delta(None, &to, false);
        let bits = extended.write_entity_delta(&mut out, 1, &delta).unwrap();
        assert_ne!(bits & crate::entity_bits::U_MODEL16, 0);

        let vanilla =
            ServerContext::new(ServerInfo::default(), &connect(Protocol::Vanilla, 0, false))
                .unwrap();
        assert_eq!(vanilla.q2pro_params(), None);
    }
}
