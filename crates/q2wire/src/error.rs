//! # Wire Error Types
//!
//! Every failure the codec can report. A composite read or write stops at the
//! first error and hands it back unchanged; nothing is retried here.

use thiserror::Error;

/// Errors that can occur while encoding or decoding wire data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// The input ran out before the message was complete.
    #[error("no more input")]
    NoMoreInput,

    /// The output packet has no room left for the requested write.
    #[error("not enough packet space")]
    NotEnoughPacketSpace,

    /// A download finished; no more chunks follow.
    #[error("download complete")]
    DownloadComplete,

    /// A zpacket was requested while one is already open on the target.
    #[error("packet is already compressed")]
    AlreadyCompressed,

    /// The operation exists but has no implementation for this protocol.
    #[error("not implemented")]
    NotImplemented,

    /// A caller passed a value the operation cannot accept.
    #[error("invalid argument")]
    InvalidArgument,

    /// Wire data or a field value is outside what the format can carry.
    #[error("bad data")]
    BadData,

    /// An unknown command byte was encountered.
    #[error("bad command: {0}")]
    BadCommand(u8),

    /// The game API cannot be served over the negotiated protocol.
    #[error("game type unsupported by protocol")]
    GametypeUnsupported,

    /// A caller-provided buffer is too small for the result.
    #[error("buffer too small")]
    BufferTooSmall,

    /// None of the offered protocols is acceptable.
    #[error("no acceptable protocol")]
    NoAcceptableProtocol,

    /// The first message from the server was not `serverdata`.
    #[error("expected serverdata")]
    ExpectedServerdata,

    /// The protocol is known but not supported in this position.
    #[error("protocol not supported")]
    ProtocolNotSupported,

    /// Compression was requested but no compressor is available.
    #[error("deflate not supported")]
    DeflateNotSupported,

    /// The compressor produced more output than fits.
    #[error("more data deflated than fits in the packet")]
    MoreDataDeflated,

    /// Decompressing a payload failed.
    #[error("inflate failed")]
    InflateFailed,

    /// Compressing a payload failed.
    #[error("deflate failed")]
    DeflateFailed,

    /// Raw download compression is unavailable.
    #[error("raw compression not supported")]
    RawCompressNotSupported,

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for wire operations.
pub type WireResult<T> = Result<T, WireError>;

impl WireError {
    /// Returns true for errors caused by running out of buffer, in either direction.
    #[must_use]
    pub const fn is_exhaustion(&self) -> bool {
        matches!(self, Self::NoMoreInput | Self::NotEnoughPacketSpace)
    }
}
