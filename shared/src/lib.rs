//! Types shared between the arena server and its clients: 2D math primitives
//! and the binary wire protocol.

pub mod math;
pub mod protocol;

pub use math::{Rect, Rgba, Vec2};
pub use protocol::{
    ConnectRequest, HealthState, InputIntent, Packet, PacketBody, PacketHeader, PacketType,
    ProtocolError, Snapshot, SnapshotEntity, INVALID_PLAYER_ID,
};

pub const DEFAULT_PORT: u16 = 7777;

/// How often an idle client should send HEARTBEAT to keep its session alive.
pub const HEARTBEAT_INTERVAL_SECS: f32 = 1.0;
