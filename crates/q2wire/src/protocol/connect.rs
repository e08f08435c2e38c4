//! Connect handshake: the protocol list offered with a challenge and the
//! `connect` line a client answers with.

use std::fmt::Write as _;

use super::version::{
    Protocol, Q2PRO_VERSION_CURRENT, Q2PRO_VERSION_MINIMUM, Q2PRO_VERSION_RESERVED,
    Q2REPRO_VERSION_CURRENT, R1Q2_VERSION_CURRENT, R1Q2_VERSION_MINIMUM,
};
use crate::error::{WireError, WireResult};

/// Netchan type Q2PRO clients use unless they ask otherwise.
pub const Q2PRO_NETCHAN_NEW: i32 = 1;

/// Builds the `p=...` suffix of a challenge response listing `accepted`
/// netvers in ascending order. Empty input gives an empty string.
#[must_use]
pub fn challenge_extras(accepted: &[Protocol]) -> String {
    let mut netvers: Vec<i32> = accepted.iter().map(|p| p.netver()).collect();
    netvers.sort_unstable();

    let mut extras = String::new();
    for (i, netver) in netvers.iter().enumerate() {
        let prefix = if i == 0 { "p=" } else { "," };
        // Writing to a String cannot fail.
        let _ = write!(extras, "{prefix}{netver}");
    }
    extras
}

/// Everything a `connect` line tells the server.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectInfo {
    /// Negotiated protocol.
    pub protocol: Protocol,
    /// Protocol revision (R1Q2, Q2PRO and Q2rePRO only).
    pub version: i32,
    /// Client port disambiguator.
    pub qport: i32,
    /// Challenge echoed back by the client.
    pub challenge: i32,
    /// The client's userinfo string.
    pub userinfo: String,
    /// Largest packet the client accepts.
    pub packet_length: usize,
    /// Client can inflate zpackets.
    pub has_zlib: bool,
    /// Q2PRO netchan type.
    pub q2pro_nctype: i32,
}

/// Splits on single spaces the way the client builds the line: runs of
/// spaces yield empty tokens.
struct Tokens<'a> {
    rest: Option<&'a str>,
}

impl<'a> Tokens<'a> {
    const fn new(line: &'a str) -> Self {
        Self { rest: Some(line) }
    }

    fn next_token(&mut self) -> Option<&'a str> {
        let rest = self.rest?;
        match rest.split_once(' ') {
            Some((token, tail)) => {
                self.rest = Some(tail);
                Some(token)
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }

    /// A mandatory integer.
    fn next_int(&mut self) -> WireResult<i32> {
        let token = self.next_token().ok_or(WireError::BadData)?;
        token.trim().parse().map_err(|_| WireError::BadData)
    }

    /// An optional integer; `None` when the token is missing or empty.
    fn next_lenient(&mut self) -> Option<i64> {
        self.next_token()
            .filter(|token| !token.is_empty())
            .map(lenient_int)
    }
}

/// Parses leading decimal digits with an optional sign; anything else is 0.
fn lenient_int(token: &str) -> i64 {
    let token = token.trim_start();
    let (negative, digits) = match token.as_bytes().first() {
        Some(b'-') => (true, &token[1..]),
        Some(b'+') => (false, &token[1..]),
        _ => (false, token),
    };
    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| {
            acc.saturating_mul(10).saturating_add(i64::from(d - b'0'))
        });
    if negative {
        -value
    } else {
        value
    }
}

#[allow(clippy::cast_possible_truncation)]
fn clamp_version(value: i64, min: i32, max: i32) -> i32 {
    value.clamp(i64::from(min), i64::from(max)) as i32
}

/// Parses the arguments of a client's `connect` command.
///
/// # Errors
///
/// - [`WireError::BadData`] for a malformed protocol, qport or challenge, a
///   missing userinfo, or a missing packet length on R1Q2 and later
/// - [`WireError::ProtocolNotSupported`] when the protocol is not in
///   `accepted` or cannot be used for a live connection
pub fn parse_connect(
    args: &str,
    accepted: &[Protocol],
    default_packet_length: usize,
) -> WireResult<ConnectInfo> {
    let mut tokens = Tokens::new(args);

    let protocol = Protocol::from_netver(tokens.next_int()?);
    if !accepted.contains(&protocol) {
        tracing::warn!(?protocol, "connect with unaccepted protocol");
        return Err(WireError::ProtocolNotSupported);
    }

    let mut info = ConnectInfo {
        protocol,
        qport: tokens.next_int()?,
        challenge: tokens.next_int()?,
        userinfo: tokens.next_token().ok_or(WireError::BadData)?.to_owned(),
        packet_length: default_packet_length,
        ..ConnectInfo::default()
    };

    if protocol >= Protocol::R1q2 {
        let token = tokens.next_token().ok_or(WireError::BadData)?;
        if !token.is_empty() {
            info.packet_length = usize::try_from(lenient_int(token)).unwrap_or(0);
        }
    }

    match protocol {
        Protocol::Invalid
        | Protocol::Q2proExtendedDemo
        | Protocol::Q2proExtendedV2Demo
        | Protocol::Q2proExtendedDemoPlayerfog
        | Protocol::KexDemos
        | Protocol::Kex => {
            tracing::warn!(?protocol, "protocol cannot be used for a live connection");
            return Err(WireError::ProtocolNotSupported);
        }
        Protocol::OldDemo | Protocol::Vanilla => {}
        Protocol::R1q2 => {
            info.version = tokens.next_lenient().map_or(R1Q2_VERSION_MINIMUM, |v| {
                clamp_version(v, R1Q2_VERSION_MINIMUM, R1Q2_VERSION_CURRENT)
            });
            info.has_zlib = true;
        }
        Protocol::Q2pro => {
            #[allow(clippy::cast_possible_truncation)]
            let nctype = tokens.next_lenient().map_or(Q2PRO_NETCHAN_NEW, |v| v as i32);
            info.q2pro_nctype = nctype;
            info.has_zlib = tokens.next_lenient().unwrap_or(0) != 0;
            info.version = tokens.next_lenient().map_or(Q2PRO_VERSION_MINIMUM, |v| {
                match clamp_version(v, Q2PRO_VERSION_MINIMUM, Q2PRO_VERSION_CURRENT) {
                    Q2PRO_VERSION_RESERVED => Q2PRO_VERSION_RESERVED - 1,
                    version => version,
                }
            });
        }
        Protocol::Q2repro => {
            info.q2pro_nctype = Q2PRO_NETCHAN_NEW;
            info.has_zlib = tokens.next_lenient().unwrap_or(0) != 0;
            info.version = Q2REPRO_VERSION_CURRENT;
        }
    }

    tracing::debug!(
        ?protocol,
        version = info.version,
        packet_length = info.packet_length,
        has_zlib = info.has_zlib,
        "parsed connect"
    );
    Ok(info)
}

impl ConnectInfo {
    /// Client side: fills in what a client sends for its own protocol.
    ///
    /// Unset versions become the newest revision, compression is offered
    /// and the qport is cut to one byte for the protocols that send it that
    /// way.
    pub fn complete(&mut self) {
        match self.protocol {
            Protocol::R1q2 | Protocol::Q2pro | Protocol::Q2repro => {
                if self.version == 0 {
                    self.version = match self.protocol {
                        Protocol::R1q2 => R1Q2_VERSION_CURRENT,
                        Protocol::Q2pro => Q2PRO_VERSION_CURRENT,
                        _ => Q2REPRO_VERSION_CURRENT,
                    };
                }
                self.has_zlib = true;
                self.qport &= 0xff;
                if self.protocol == Protocol::Q2repro {
                    self.q2pro_nctype = Q2PRO_NETCHAN_NEW;
                }
            }
            _ => {}
        }
    }

    /// Client side: the protocol specific arguments appended after the
    /// userinfo, or `None` if the protocol has none.
    #[must_use]
    pub fn connect_tail(&self) -> Option<String> {
        match self.protocol {
            Protocol::R1q2 => Some(format!("{} {}", self.packet_length, self.version)),
            Protocol::Q2pro => Some(format!(
                "{} {} {} {}",
                self.packet_length,
                self.q2pro_nctype,
                i32::from(self.has_zlib),
                self.version
            )),
            Protocol::Q2repro => Some(format!(
                "{} {}",
                self.packet_length,
                i32::from(self.has_zlib)
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIVE: [Protocol; 4] = [
        Protocol::Vanilla,
        Protocol::R1q2,
        Protocol::Q2pro,
        Protocol::Q2repro,
    ];

    #[test]
    fn test_challenge_extras() {
        assert_eq!(
            challenge_extras(&[Protocol::Q2pro, Protocol::Vanilla, Protocol::R1q2]),
            "p=34,35,36"
        );
        assert_eq!(challenge_extras(&[Protocol::Q2repro]), "p=1038");
        assert_eq!(challenge_extras(&[]), "");
    }

    #[test]
    fn test_vanilla_connect() {
        let info = parse_connect("34 1234 5678 \\name\\player", &LIVE, 1390).unwrap();
        assert_eq!(info.protocol, Protocol::Vanilla);
        assert_eq!(info.qport, 1234);
        assert_eq!(info.challenge, 5678);
        assert_eq!(info.userinfo, "\\name\\player");
        assert_eq!(info.packet_length, 1390);
        assert!(!info.has_zlib);
    }

    #[test]
    fn test_r1q2_connect() {
        let info = parse_connect("35 12 99 \\name\\a 1400 1999", &LIVE, 1390).unwrap();
        assert_eq!(info.packet_length, 1400);
        assert_eq!(info.version, R1Q2_VERSION_CURRENT);
        assert!(info.has_zlib);

        let info = parse_connect("35 12 99 \\name\\a  ", &LIVE, 1390).unwrap();
        assert_eq!(info.packet_length, 1390);
        assert_eq!(info.version, R1Q2_VERSION_MINIMUM);
    }

    #[test]
    fn test_r1q2_requires_packet_length_token() {
        assert_eq!(
            parse_connect("35 12 99 \\name\\a", &LIVE, 1390),
            Err(WireError::BadData)
        );
    }

    #[test]
    fn test_q2pro_connect() {
        let info = parse_connect("36 7 42 \\name\\b 1390 2 1 1016", &LIVE, 1390).unwrap();
        assert_eq!(info.q2pro_nctype, 2);
        assert!(info.has_zlib);
        assert_eq!(info.version, Q2PRO_VERSION_MINIMUM);

        let info = parse_connect("36 7 42 \\name\\b 1390", &LIVE, 1390).unwrap();
        assert_eq!(info.q2pro_nctype, Q2PRO_NETCHAN_NEW);
        assert!(!info.has_zlib);
        assert_eq!(info.version, Q2PRO_VERSION_MINIMUM);

        let info = parse_connect("36 7 42 \\name\\b 1390 1 0 5000", &LIVE, 1390).unwrap();
        assert_eq!(info.version, Q2PRO_VERSION_CURRENT);
    }

    #[test]
    fn test_q2repro_connect() {
        let info = parse_connect("1038 7 42 \\name\\c 4000 1", &LIVE, 1390).unwrap();
        assert_eq!(info.protocol, Protocol::Q2repro);
        assert_eq!(info.packet_length, 4000);
        assert!(info.has_zlib);
        assert_eq!(info.q2pro_nctype, Q2PRO_NETCHAN_NEW);
        assert_eq!(info.version, Q2REPRO_VERSION_CURRENT);
    }

    #[test]
    fn test_rejections() {
        assert_eq!(
            parse_connect("2023 1 1 \\x 1390", &[Protocol::Kex], 1390),
            Err(WireError::ProtocolNotSupported)
        );
        assert_eq!(
            parse_connect("36 1 1 \\x 1390", &[Protocol::Vanilla], 1390),
            Err(WireError::ProtocolNotSupported)
        );
        assert_eq!(parse_connect("abc 1 1 \\x", &LIVE, 1390), Err(WireError::BadData));
        assert_eq!(parse_connect("34 x 1 \\x", &LIVE, 1390), Err(WireError::BadData));
        assert_eq!(parse_connect("34 1 1", &LIVE, 1390), Err(WireError::BadData));
    }

    #[test]
    fn test_connect_tail_round_trip() {
        let mut info = ConnectInfo {
            protocol: Protocol::Q2pro,
            qport: 0x1234,
            packet_length: 1390,
            q2pro_nctype: Q2PRO_NETCHAN_NEW,
            ..ConnectInfo::default()
        };
        info.complete();
        assert_eq!(info.qport, 0x34);
        let tail = info.connect_tail().unwrap();
        assert_eq!(tail, "1390 1 1 1026");

        let line = format!("36 {} 9 \\name\\d {tail}", info.qport);
        let parsed = parse_connect(&line, &LIVE, 1390).unwrap();
        assert_eq!(parsed.version, info.version);
        assert!(parsed.has_zlib);
    }

    #[test]
    fn test_lenient_int() {
        assert_eq!(lenient_int("1400abc"), 1400);
        assert_eq!(lenient_int("-5"), -5);
        assert_eq!(lenient_int("x"), 0);
    }
}
