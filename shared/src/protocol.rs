//! Binary wire protocol spoken between the arena server and its clients.
//!
//! Every datagram starts with a fixed 13-byte header followed by a body whose
//! layout depends on the packet type:
//!
//! ```text
//! type: u8 | sequence: u32 | tick: u32 | player_id: u32 | body...
//! ```
//!
//! All integers and floats are little-endian and fixed-width with no padding.
//! Strings are prefixed with a `u16` byte length and are never
//! null-terminated. Fixed-width fields are written through `bincode` configured
//! for fixint little-endian encoding, which lays structs out as the plain
//! concatenation of their fields and `Option<T>` as a `u8` presence flag
//! followed by the value.
//!
//! Decoding is fail-fast: a short read anywhere aborts the whole packet.

use crate::math::{Rgba, Vec2};
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read};
use thiserror::Error;

/// Player id carried in the header before the server has assigned an entity.
pub const INVALID_PLAYER_ID: u32 = u32::MAX;

/// Size of the encoded [`PacketHeader`] in bytes.
pub const HEADER_SIZE: usize = 13;

/// Largest payload a single UDP datagram can carry.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Longest string the `u16` length prefix can describe.
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed packet: {0}")]
    Malformed(#[from] bincode::Error),
    #[error("packet truncated")]
    Truncated,
    #[error("unknown packet type {0}")]
    UnknownPacketType(u8),
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,
    #[error("snapshot holds too many entities ({0})")]
    TooManyEntities(usize),
}

fn wire() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
}

/// Packet type tag stored in the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Connect = 0,
    ConnectAck = 1,
    Input = 2,
    Shoot = 3,
    Snapshot = 4,
    Heartbeat = 5,
    Disconnect = 6,
}

impl TryFrom<u8> for PacketType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PacketType::Connect),
            1 => Ok(PacketType::ConnectAck),
            2 => Ok(PacketType::Input),
            3 => Ok(PacketType::Shoot),
            4 => Ok(PacketType::Snapshot),
            5 => Ok(PacketType::Heartbeat),
            6 => Ok(PacketType::Disconnect),
            other => Err(ProtocolError::UnknownPacketType(other)),
        }
    }
}

/// Fixed header preceding every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketHeader {
    pub packet_type: u8,
    pub sequence: u32,
    /// Server tick for server packets, client timestamp for client packets.
    pub tick: u32,
    pub player_id: u32,
}

/// Optional payload of a CONNECT packet.
///
/// The spawn hint is advisory only; the server may ignore it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectRequest {
    pub spawn_hint: Vec2,
    pub name: Option<String>,
}

/// Velocity intent sent by a client each frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InputIntent {
    pub velocity: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthState {
    pub current: f32,
    pub max: f32,
}

/// One entity as it appears in a SNAPSHOT body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntity {
    pub id: u32,
    pub position: Vec2,
    pub size: Vec2,
    pub color: Rgba,
    pub health: Option<HealthState>,
    pub kills: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub entities: Vec<SnapshotEntity>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PacketBody {
    Connect(Option<ConnectRequest>),
    ConnectAck { entity_id: u32 },
    Input(InputIntent),
    Shoot { target: Vec2 },
    Snapshot(Snapshot),
    Heartbeat,
    Disconnect,
}

impl PacketBody {
    pub fn packet_type(&self) -> PacketType {
        match self {
            PacketBody::Connect(_) => PacketType::Connect,
            PacketBody::ConnectAck { .. } => PacketType::ConnectAck,
            PacketBody::Input(_) => PacketType::Input,
            PacketBody::Shoot { .. } => PacketType::Shoot,
            PacketBody::Snapshot(_) => PacketType::Snapshot,
            PacketBody::Heartbeat => PacketType::Heartbeat,
            PacketBody::Disconnect => PacketType::Disconnect,
        }
    }
}

/// A decoded datagram: header fields plus typed body.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub sequence: u32,
    pub tick: u32,
    pub player_id: u32,
    pub body: PacketBody,
}

impl Packet {
    pub fn new(body: PacketBody) -> Self {
        Self {
            sequence: 0,
            tick: 0,
            player_id: INVALID_PLAYER_ID,
            body,
        }
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_tick(mut self, tick: u32) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_player(mut self, player_id: u32) -> Self {
        self.player_id = player_id;
        self
    }

    pub fn packet_type(&self) -> PacketType {
        self.body.packet_type()
    }

    pub fn header(&self) -> PacketHeader {
        PacketHeader {
            packet_type: self.packet_type() as u8,
            sequence: self.sequence,
            tick: self.tick,
            player_id: self.player_id,
        }
    }

    /// Serializes the packet into a datagram.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut writer = PacketWriter::new();
        writer.write(&self.header())?;

        match &self.body {
            PacketBody::Connect(None) | PacketBody::Heartbeat | PacketBody::Disconnect => {}
            PacketBody::Connect(Some(request)) => {
                writer.write(&request.spawn_hint)?;
                if let Some(name) = &request.name {
                    writer.write_string(name)?;
                }
            }
            PacketBody::ConnectAck { entity_id } => writer.write(entity_id)?,
            PacketBody::Input(intent) => writer.write(intent)?,
            PacketBody::Shoot { target } => writer.write(target)?,
            PacketBody::Snapshot(snapshot) => {
                let count = u32::try_from(snapshot.entities.len())
                    .map_err(|_| ProtocolError::TooManyEntities(snapshot.entities.len()))?;
                writer.write(&count)?;
                for entity in &snapshot.entities {
                    writer.write(entity)?;
                }
            }
        }

        Ok(writer.into_inner())
    }

    /// Parses a datagram. Trailing bytes after a complete body are ignored.
    pub fn decode(data: &[u8]) -> Result<Packet, ProtocolError> {
        let mut reader = PacketReader::new(data);
        let header: PacketHeader = reader.read()?;
        let packet_type = PacketType::try_from(header.packet_type)?;

        let body = match packet_type {
            PacketType::Connect => {
                if reader.remaining() == 0 {
                    PacketBody::Connect(None)
                } else {
                    let spawn_hint: Vec2 = reader.read()?;
                    let name = if reader.remaining() > 0 {
                        Some(reader.read_string()?)
                    } else {
                        None
                    };
                    PacketBody::Connect(Some(ConnectRequest { spawn_hint, name }))
                }
            }
            PacketType::ConnectAck => PacketBody::ConnectAck {
                entity_id: reader.read()?,
            },
            PacketType::Input => PacketBody::Input(reader.read()?),
            PacketType::Shoot => PacketBody::Shoot {
                target: reader.read()?,
            },
            PacketType::Snapshot => {
                let count: u32 = reader.read()?;
                // The count is untrusted; grow as entities actually decode.
                let mut entities = Vec::with_capacity((count as usize).min(256));
                for _ in 0..count {
                    entities.push(reader.read::<SnapshotEntity>()?);
                }
                PacketBody::Snapshot(Snapshot { entities })
            }
            PacketType::Heartbeat => PacketBody::Heartbeat,
            PacketType::Disconnect => PacketBody::Disconnect,
        };

        Ok(Packet {
            sequence: header.sequence,
            tick: header.tick,
            player_id: header.player_id,
            body,
        })
    }
}

/// Cuts `s` to at most `max` bytes without splitting a UTF-8 sequence.
pub fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

struct PacketWriter {
    buf: Vec<u8>,
}

impl PacketWriter {
    fn new() -> Self {
        Self {
            buf: Vec::with_capacity(64),
        }
    }

    fn write<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ProtocolError> {
        wire().serialize_into(&mut self.buf, value)?;
        Ok(())
    }

    fn write_string(&mut self, s: &str) -> Result<(), ProtocolError> {
        let s = truncate_utf8(s, MAX_STRING_LEN);
        self.write(&(s.len() as u16))?;
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }

    fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

struct PacketReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> PacketReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len() as u64;
        len.saturating_sub(self.cursor.position()) as usize
    }

    fn read<T: DeserializeOwned>(&mut self) -> Result<T, ProtocolError> {
        Ok(wire().deserialize_from(&mut self.cursor)?)
    }

    fn read_string(&mut self) -> Result<String, ProtocolError> {
        let len: u16 = self.read()?;
        let mut bytes = vec![0u8; len as usize];
        self.cursor
            .read_exact(&mut bytes)
            .map_err(|_| ProtocolError::Truncated)?;
        String::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(packet: Packet) {
        let bytes = packet.encode().unwrap();
        let decoded = Packet::decode(&bytes).unwrap();
        assert_eq!(decoded, packet);
    }

    fn sample_entity(id: u32) -> SnapshotEntity {
        SnapshotEntity {
            id,
            position: Vec2::new(10.5, -3.25),
            size: Vec2::new(3.0, 5.0),
            color: Rgba::GREEN,
            health: Some(HealthState {
                current: 7.0,
                max: 10.0,
            }),
            kills: Some(2),
        }
    }

    #[test]
    fn test_header_is_thirteen_bytes_little_endian() {
        let packet = Packet::new(PacketBody::Heartbeat)
            .with_sequence(0x0102_0304)
            .with_tick(7)
            .with_player(9);
        let bytes = packet.encode().unwrap();

        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(bytes[0], PacketType::Heartbeat as u8);
        assert_eq!(&bytes[1..5], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&bytes[5..9], &7u32.to_le_bytes());
        assert_eq!(&bytes[9..13], &9u32.to_le_bytes());
    }

    #[test]
    fn test_roundtrip_every_packet_type() {
        let packets = vec![
            Packet::new(PacketBody::Connect(None)),
            Packet::new(PacketBody::Connect(Some(ConnectRequest {
                spawn_hint: Vec2::new(120.0, 64.0),
                name: None,
            }))),
            Packet::new(PacketBody::Connect(Some(ConnectRequest {
                spawn_hint: Vec2::new(1.0, 2.0),
                name: Some("pilot".to_string()),
            }))),
            Packet::new(PacketBody::ConnectAck { entity_id: 42 }).with_tick(100),
            Packet::new(PacketBody::Input(InputIntent {
                velocity: Vec2::new(-30.0, 15.0),
            }))
            .with_sequence(5)
            .with_player(3),
            Packet::new(PacketBody::Shoot {
                target: Vec2::new(200.0, 80.0),
            })
            .with_player(3),
            Packet::new(PacketBody::Snapshot(Snapshot {
                entities: vec![
                    sample_entity(1),
                    SnapshotEntity {
                        id: 2,
                        position: Vec2::new(0.0, 0.0),
                        size: Vec2::new(2.0, 2.0),
                        color: Rgba::YELLOW,
                        health: None,
                        kills: None,
                    },
                ],
            })),
            Packet::new(PacketBody::Snapshot(Snapshot::default())),
            Packet::new(PacketBody::Heartbeat),
            Packet::new(PacketBody::Disconnect).with_player(8),
        ];

        for packet in packets {
            roundtrip(packet);
        }
    }

    #[test]
    fn test_roundtrip_boundary_name_lengths() {
        for len in [0usize, MAX_STRING_LEN] {
            roundtrip(Packet::new(PacketBody::Connect(Some(ConnectRequest {
                spawn_hint: Vec2::ZERO,
                name: Some("a".repeat(len)),
            }))));
        }
    }

    #[test]
    fn test_overlong_name_is_truncated() {
        let packet = Packet::new(PacketBody::Connect(Some(ConnectRequest {
            spawn_hint: Vec2::ZERO,
            name: Some("b".repeat(MAX_STRING_LEN + 100)),
        })));
        let decoded = Packet::decode(&packet.encode().unwrap()).unwrap();

        match decoded.body {
            PacketBody::Connect(Some(ConnectRequest {
                name: Some(name), ..
            })) => assert_eq!(name.len(), MAX_STRING_LEN),
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_truncate_utf8_respects_char_boundary() {
        let s = "aé";
        assert_eq!(truncate_utf8(s, 2), "a");
        assert_eq!(truncate_utf8(s, 3), "aé");
        assert_eq!(truncate_utf8("", 0), "");
    }

    #[test]
    fn test_snapshot_entity_layout() {
        let packet = Packet::new(PacketBody::Snapshot(Snapshot {
            entities: vec![sample_entity(5)],
        }));
        let bytes = packet.encode().unwrap();
        let body = &bytes[HEADER_SIZE..];

        // count + id + pos + size + rgba + flag + health + flag + kills
        assert_eq!(body.len(), 4 + 4 + 8 + 8 + 4 + 1 + 8 + 1 + 4);
        assert_eq!(&body[0..4], &1u32.to_le_bytes());
        assert_eq!(&body[4..8], &5u32.to_le_bytes());
        assert_eq!(&body[8..12], &10.5f32.to_le_bytes());
        assert_eq!(&body[24..28], &[0, 255, 0, 255]);
        assert_eq!(body[28], 1);
        assert_eq!(&body[29..33], &7.0f32.to_le_bytes());
        assert_eq!(body[37], 1);
        assert_eq!(&body[38..42], &2i32.to_le_bytes());
    }

    #[test]
    fn test_short_reads_fail() {
        let packet = Packet::new(PacketBody::Snapshot(Snapshot {
            entities: vec![sample_entity(1), sample_entity(2)],
        }));
        let bytes = packet.encode().unwrap();

        for cut in 0..bytes.len() {
            assert!(
                Packet::decode(&bytes[..cut]).is_err(),
                "decode should fail at length {}",
                cut
            );
        }
    }

    #[test]
    fn test_truncated_name_fails() {
        let packet = Packet::new(PacketBody::Connect(Some(ConnectRequest {
            spawn_hint: Vec2::ZERO,
            name: Some("longname".to_string()),
        })));
        let bytes = packet.encode().unwrap();
        let result = Packet::decode(&bytes[..bytes.len() - 3]);
        assert!(matches!(result, Err(ProtocolError::Truncated)));
    }

    #[test]
    fn test_unknown_packet_type() {
        let mut bytes = Packet::new(PacketBody::Heartbeat).encode().unwrap();
        bytes[0] = 0xEE;
        assert!(matches!(
            Packet::decode(&bytes),
            Err(ProtocolError::UnknownPacketType(0xEE))
        ));
    }

    #[test]
    fn test_invalid_utf8_name() {
        let mut bytes = Packet::new(PacketBody::Connect(Some(ConnectRequest {
            spawn_hint: Vec2::ZERO,
            name: Some("ab".to_string()),
        })))
        .encode()
        .unwrap();
        let len = bytes.len();
        bytes[len - 1] = 0xFF;
        assert!(matches!(
            Packet::decode(&bytes),
            Err(ProtocolError::InvalidUtf8)
        ));
    }

    #[test]
    fn test_trailing_bytes_are_ignored() {
        let packet = Packet::new(PacketBody::Shoot {
            target: Vec2::new(1.0, 2.0),
        });
        let mut bytes = packet.encode().unwrap();
        bytes.extend_from_slice(&[1, 2, 3]);
        assert_eq!(Packet::decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_packet_type_tags() {
        for tag in 0u8..=6 {
            let packet_type = PacketType::try_from(tag).unwrap();
            assert_eq!(packet_type as u8, tag);
        }
        assert!(PacketType::try_from(7).is_err());
    }
}
