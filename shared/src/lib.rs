//! Binary wire protocol shared by the relay server and its clients.
//!
//! Every frame starts with an 8-byte header, the message kind followed by the
//! protocol version, both big-endian `u32`. The payload after the header is
//! not self-describing: its layout is implied by the kind and fields are read
//! positionally.
//!
//! | Field kind | Encoding                                   |
//! |------------|--------------------------------------------|
//! | id         | big-endian `u32`                           |
//! | number     | big-endian IEEE-754 `f32`                  |
//! | string     | big-endian `u32` byte length, then bytes   |
//!
//! The transport delivers whole messages, so there is no framing beyond one
//! buffer per message.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PROTOCOL_VERSION: u32 = 0;
pub const HEADER_LEN: usize = 8;
/// Minimum length of a StateUpdate frame: header, id, vitality, x, y.
pub const STATE_UPDATE_LEN: usize = HEADER_LEN + 16;

pub const INITIAL_VITALITY: f32 = 60.0;
pub const SPAWN_RADIUS: f32 = 400.0;
pub const SPAWN_ATTEMPTS: usize = 5;
/// Entities whose centres are at most 100 units apart overlap.
pub const COLLISION_DISTANCE_SQ: f32 = 10_000.0;

/// Message type tags carried in the first header word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    InitSelf,
    PeerState,
    StateUpdate,
    PeerLeft,
    PeerEaten,
}

impl MessageKind {
    pub fn tag(self) -> u32 {
        match self {
            MessageKind::InitSelf => 1,
            MessageKind::PeerState => 2,
            MessageKind::StateUpdate => 3,
            MessageKind::PeerLeft => 4,
            MessageKind::PeerEaten => 5,
        }
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            1 => Some(MessageKind::InitSelf),
            2 => Some(MessageKind::PeerState),
            3 => Some(MessageKind::StateUpdate),
            4 => Some(MessageKind::PeerLeft),
            5 => Some(MessageKind::PeerEaten),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("expected a binary frame")]
    NotBinary,
    #[error("frame truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },
    #[error("malformed frame: {0}")]
    Malformed(#[from] bincode::Error),
    #[error("protocol version {found} does not match {expected}")]
    VersionMismatch { found: u32, expected: u32 },
    #[error("unknown message kind {0}")]
    UnknownKind(u32),
}

/// Fixed 8-byte frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub kind: u32,
    pub version: u32,
}

impl Header {
    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::from_tag(self.kind)
    }
}

/// One positional payload value. The encoder dispatches on the variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field<'a> {
    Id(u32),
    Number(f32),
    Text(&'a str),
    Raw(&'a [u8]),
}

impl Field<'_> {
    fn encoded_len(&self) -> usize {
        match self {
            Field::Id(_) | Field::Number(_) => 4,
            Field::Text(text) => 4 + text.len(),
            Field::Raw(raw) => raw.len(),
        }
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        match *self {
            Field::Id(id) => buf.extend_from_slice(&id.to_be_bytes()),
            Field::Number(number) => buf.extend_from_slice(&number.to_be_bytes()),
            Field::Text(text) => {
                // Display names are generated server-side and stay far below u32::MAX.
                let len = text.len() as u32;
                buf.extend_from_slice(&len.to_be_bytes());
                buf.extend_from_slice(text.as_bytes());
            }
            Field::Raw(raw) => buf.extend_from_slice(raw),
        }
    }
}

/// Serializes a header for `kind` followed by `fields` in order.
pub fn encode(kind: MessageKind, fields: &[Field<'_>]) -> Vec<u8> {
    let payload_len: usize = fields.iter().map(Field::encoded_len).sum();
    let mut buf = Vec::with_capacity(HEADER_LEN + payload_len);
    buf.extend_from_slice(&kind.tag().to_be_bytes());
    buf.extend_from_slice(&PROTOCOL_VERSION.to_be_bytes());
    for field in fields {
        field.write_to(&mut buf);
    }
    buf
}

/// Reads the header of `frame`, rejecting frames from another protocol version.
///
/// The payload is left to the caller, who knows its layout from the kind.
pub fn decode(frame: &[u8]) -> Result<Header, ProtocolError> {
    let header: Header = WireReader::new(frame).fixed(HEADER_LEN)?;
    if header.version != PROTOCOL_VERSION {
        return Err(ProtocolError::VersionMismatch {
            found: header.version,
            expected: PROTOCOL_VERSION,
        });
    }
    Ok(header)
}

/// Identity and state of one participant, as carried by InitSelf and PeerState.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerInfo {
    pub id: u32,
    pub name: String,
    pub vitality: f32,
    pub x: f32,
    pub y: f32,
}

impl PeerInfo {
    pub fn encode_as(&self, kind: MessageKind) -> Vec<u8> {
        encode(
            kind,
            &[
                Field::Id(self.id),
                Field::Text(&self.name),
                Field::Number(self.vitality),
                Field::Number(self.x),
                Field::Number(self.y),
            ],
        )
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// Client-reported state. Clients may append fields after `y`; the server
/// ignores them but relays them untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub id: u32,
    pub vitality: f32,
    pub x: f32,
    pub y: f32,
}

impl StateUpdate {
    /// Parses the fixed StateUpdate payload. The header must already have
    /// been checked with [`decode`].
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = WireReader::new(frame);
        reader.skip(HEADER_LEN)?;
        reader.fixed(STATE_UPDATE_LEN - HEADER_LEN)
    }

    pub fn encode(&self) -> Vec<u8> {
        encode(
            MessageKind::StateUpdate,
            &[
                Field::Id(self.id),
                Field::Number(self.vitality),
                Field::Number(self.x),
                Field::Number(self.y),
            ],
        )
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// Any message a client can receive from the server, fully decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    InitSelf(PeerInfo),
    PeerState(PeerInfo),
    StateUpdate(StateUpdate),
    PeerLeft(u32),
    PeerEaten(f32),
}

impl ServerMessage {
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        let header = decode(frame)?;
        let mut reader = WireReader::new(frame);
        reader.skip(HEADER_LEN)?;
        match header.kind() {
            Some(MessageKind::InitSelf) => Ok(ServerMessage::InitSelf(reader.peer_info()?)),
            Some(MessageKind::PeerState) => Ok(ServerMessage::PeerState(reader.peer_info()?)),
            Some(MessageKind::StateUpdate) => Ok(ServerMessage::StateUpdate(
                reader.fixed(STATE_UPDATE_LEN - HEADER_LEN)?,
            )),
            Some(MessageKind::PeerLeft) => Ok(ServerMessage::PeerLeft(reader.fixed(4)?)),
            Some(MessageKind::PeerEaten) => Ok(ServerMessage::PeerEaten(reader.fixed(4)?)),
            None => Err(ProtocolError::UnknownKind(header.kind)),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            ServerMessage::InitSelf(_) => MessageKind::InitSelf,
            ServerMessage::PeerState(_) => MessageKind::PeerState,
            ServerMessage::StateUpdate(_) => MessageKind::StateUpdate,
            ServerMessage::PeerLeft(_) => MessageKind::PeerLeft,
            ServerMessage::PeerEaten(_) => MessageKind::PeerEaten,
        }
    }
}

fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_big_endian()
        .with_fixint_encoding()
}

/// Positional reader over one frame.
struct WireReader<'a> {
    rest: &'a [u8],
    consumed: usize,
}

impl<'a> WireReader<'a> {
    fn new(frame: &'a [u8]) -> Self {
        Self {
            rest: frame,
            consumed: 0,
        }
    }

    fn ensure(&self, width: usize) -> Result<(), ProtocolError> {
        if self.rest.len() < width {
            return Err(ProtocolError::Truncated {
                needed: self.consumed + width,
                available: self.consumed + self.rest.len(),
            });
        }
        Ok(())
    }

    fn skip(&mut self, width: usize) -> Result<(), ProtocolError> {
        self.ensure(width)?;
        self.rest = &self.rest[width..];
        self.consumed += width;
        Ok(())
    }

    /// Reads a fixed-width value occupying exactly `width` bytes on the wire.
    fn fixed<T: DeserializeOwned>(&mut self, width: usize) -> Result<T, ProtocolError> {
        self.ensure(width)?;
        let (head, tail) = self.rest.split_at(width);
        let value = wire_options().deserialize(head)?;
        self.rest = tail;
        self.consumed += width;
        Ok(value)
    }

    fn text(&mut self) -> Result<String, ProtocolError> {
        let len: u32 = self.fixed(4)?;
        let len = len as usize;
        self.ensure(len)?;
        let (head, tail) = self.rest.split_at(len);
        self.rest = tail;
        self.consumed += len;
        Ok(String::from_utf8_lossy(head).into_owned())
    }

    fn peer_info(&mut self) -> Result<PeerInfo, ProtocolError> {
        Ok(PeerInfo {
            id: self.fixed(4)?,
            name: self.text()?,
            vitality: self.fixed(4)?,
            x: self.fixed(4)?,
            y: self.fixed(4)?,
        })
    }
}

/// A point in the shared 2D world.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_squared(self, other: Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Two entities collide when their centres are within 100 units, inclusive.
pub fn collide(a: Position, b: Position) -> bool {
    a.distance_squared(b) <= COLLISION_DISTANCE_SQ
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn sample_peer() -> PeerInfo {
        PeerInfo {
            id: 7,
            name: "Ada Byron".to_string(),
            vitality: 42.5,
            x: -120.25,
            y: 300.0,
        }
    }

    #[test]
    fn test_message_kind_tags() {
        for tag in 1..=5 {
            let kind = MessageKind::from_tag(tag).unwrap();
            assert_eq!(kind.tag(), tag);
        }
        assert_eq!(MessageKind::from_tag(0), None);
        assert_eq!(MessageKind::from_tag(6), None);
    }

    #[test]
    fn test_encode_header_layout() {
        let frame = encode(MessageKind::PeerLeft, &[Field::Id(0x0102_0304)]);
        assert_eq!(frame, vec![0, 0, 0, 4, 0, 0, 0, 0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_encode_text_is_length_prefixed_without_terminator() {
        let frame = encode(MessageKind::InitSelf, &[Field::Text("Bo")]);
        assert_eq!(&frame[HEADER_LEN..], &[0, 0, 0, 2, b'B', b'o']);
    }

    #[test]
    fn test_encode_number_is_big_endian_f32() {
        let frame = encode(MessageKind::PeerEaten, &[Field::Number(5.0)]);
        assert_eq!(&frame[HEADER_LEN..], &5.0f32.to_be_bytes());
    }

    #[test]
    fn test_encode_raw_bytes_pass_through() {
        let frame = encode(MessageKind::StateUpdate, &[Field::Raw(&[9, 8, 7])]);
        assert_eq!(&frame[HEADER_LEN..], &[9, 8, 7]);
    }

    #[test]
    fn test_init_self_byte_layout() {
        let frame = sample_peer().encode_as(MessageKind::InitSelf);
        assert_eq!(frame.len(), HEADER_LEN + 4 + 4 + 9 + 12);
        assert_eq!(&frame[0..4], &1u32.to_be_bytes());
        assert_eq!(&frame[8..12], &7u32.to_be_bytes());
        assert_eq!(&frame[12..16], &9u32.to_be_bytes());
        assert_eq!(&frame[16..25], b"Ada Byron");
        assert_eq!(&frame[25..29], &42.5f32.to_be_bytes());
    }

    #[test]
    fn test_peer_info_roundtrip() {
        let peer = sample_peer();
        let decoded = ServerMessage::decode(&peer.encode_as(MessageKind::PeerState)).unwrap();
        assert_eq!(decoded, ServerMessage::PeerState(peer));
    }

    #[test]
    fn test_state_update_roundtrip_is_bit_exact() {
        let update = StateUpdate {
            id: 3,
            vitality: 0.1,
            x: f32::MIN_POSITIVE,
            y: -0.0,
        };
        let decoded = StateUpdate::decode(&update.encode()).unwrap();
        assert_eq!(decoded.id, 3);
        assert_eq!(decoded.vitality.to_bits(), update.vitality.to_bits());
        assert_eq!(decoded.x.to_bits(), update.x.to_bits());
        assert_eq!(decoded.y.to_bits(), update.y.to_bits());
    }

    #[test]
    fn test_state_update_ignores_trailing_fields() {
        let mut frame = StateUpdate {
            id: 1,
            vitality: 12.0,
            x: 3.0,
            y: 4.0,
        }
        .encode();
        frame.extend_from_slice(&1.5f32.to_be_bytes());
        frame.extend_from_slice(&2.5f32.to_be_bytes());

        let decoded = StateUpdate::decode(&frame).unwrap();
        assert_approx_eq!(decoded.vitality, 12.0);
        assert_approx_eq!(decoded.x, 3.0);
        assert_approx_eq!(decoded.y, 4.0);
    }

    #[test]
    fn test_small_messages_roundtrip() {
        let left = encode(MessageKind::PeerLeft, &[Field::Id(99)]);
        assert_eq!(ServerMessage::decode(&left).unwrap(), ServerMessage::PeerLeft(99));

        let eaten = encode(MessageKind::PeerEaten, &[Field::Number(5.0)]);
        assert_eq!(
            ServerMessage::decode(&eaten).unwrap(),
            ServerMessage::PeerEaten(5.0)
        );
    }

    #[test]
    fn test_decode_rejects_short_header() {
        match decode(&[0, 0, 0, 3, 0]) {
            Err(ProtocolError::Truncated { needed, available }) => {
                assert_eq!(needed, HEADER_LEN);
                assert_eq!(available, 5);
            }
            other => panic!("expected truncation, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_other_version() {
        let mut frame = encode(MessageKind::StateUpdate, &[]);
        frame[4..8].copy_from_slice(&7u32.to_be_bytes());
        match decode(&frame) {
            Err(ProtocolError::VersionMismatch { found, expected }) => {
                assert_eq!(found, 7);
                assert_eq!(expected, PROTOCOL_VERSION);
            }
            other => panic!("expected version mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_state_update_rejects_truncated_payload() {
        let frame = StateUpdate {
            id: 1,
            vitality: 1.0,
            x: 1.0,
            y: 1.0,
        }
        .encode();
        let result = StateUpdate::decode(&frame[..STATE_UPDATE_LEN - 1]);
        assert!(matches!(result, Err(ProtocolError::Truncated { .. })));
    }

    #[test]
    fn test_peer_info_rejects_overlong_name_length() {
        let mut frame = sample_peer().encode_as(MessageKind::PeerState);
        frame[12..16].copy_from_slice(&1000u32.to_be_bytes());
        let result = ServerMessage::decode(&frame);
        assert!(matches!(result, Err(ProtocolError::Truncated { .. })));
    }

    #[test]
    fn test_unknown_kind() {
        let mut frame = encode(MessageKind::PeerLeft, &[Field::Id(1)]);
        frame[0..4].copy_from_slice(&42u32.to_be_bytes());
        assert!(matches!(
            ServerMessage::decode(&frame),
            Err(ProtocolError::UnknownKind(42))
        ));
    }

    #[test]
    fn test_collision_boundary() {
        let origin = Position::ORIGIN;
        assert!(collide(origin, Position::new(100.0, 0.0)));
        assert!(collide(origin, Position::new(60.0, 80.0)));
        assert!(!collide(origin, Position::new(100.0001, 0.0)));
        assert!(!collide(origin, Position::new(0.0, -100.0001)));
    }

    #[test]
    fn test_collision_is_symmetric() {
        let points = [
            Position::new(0.0, 0.0),
            Position::new(99.5, 3.0),
            Position::new(-50.0, 86.6),
            Position::new(400.0, -400.0),
            Position::new(1.0e6, 1.0e-6),
        ];
        for a in points {
            for b in points {
                assert_eq!(collide(a, b), collide(b, a));
            }
        }
    }
}
