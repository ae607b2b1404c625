use log::{debug, info, warn};
use shared::protocol::MAX_DATAGRAM_SIZE;
use shared::{
    ConnectRequest, InputIntent, Packet, PacketBody, Snapshot, Vec2, INVALID_PLAYER_ID,
};
use std::net::SocketAddr;
use tokio::net::UdpSocket;

pub type ClientError = Box<dyn std::error::Error + Send + Sync>;

/// Server-to-client traffic the bot cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected { entity_id: u32 },
    Snapshot { tick: u32, snapshot: Snapshot },
    Disconnected,
}

/// UDP endpoint speaking the arena protocol.
pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    player_id: Option<u32>,
    sequence: u32,
    buffer: Vec<u8>,
}

impl Client {
    pub async fn new(server_addr: &str) -> Result<Self, ClientError> {
        let server_addr: SocketAddr = server_addr.parse()?;
        let bind_addr = if server_addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr).await?;

        Ok(Client {
            socket,
            server_addr,
            player_id: None,
            sequence: 0,
            buffer: vec![0u8; MAX_DATAGRAM_SIZE],
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Entity id assigned by the server, once acknowledged.
    pub fn player_id(&self) -> Option<u32> {
        self.player_id
    }

    pub fn is_connected(&self) -> bool {
        self.player_id.is_some()
    }

    async fn send(&mut self, body: PacketBody) -> Result<(), ClientError> {
        self.sequence = self.sequence.wrapping_add(1);
        let packet = Packet::new(body)
            .with_sequence(self.sequence)
            .with_player(self.player_id.unwrap_or(INVALID_PLAYER_ID));
        let data = packet.encode()?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    /// Sends CONNECT. Safe to repeat until the ack arrives.
    pub async fn connect(
        &mut self,
        spawn_hint: Option<Vec2>,
        name: Option<String>,
    ) -> Result<(), ClientError> {
        let request = match (spawn_hint, name) {
            (None, None) => None,
            (hint, name) => Some(ConnectRequest {
                spawn_hint: hint.unwrap_or_default(),
                name,
            }),
        };
        self.send(PacketBody::Connect(request)).await
    }

    pub async fn send_input(&mut self, velocity: Vec2) -> Result<(), ClientError> {
        self.send(PacketBody::Input(InputIntent { velocity })).await
    }

    pub async fn shoot(&mut self, target: Vec2) -> Result<(), ClientError> {
        self.send(PacketBody::Shoot { target }).await
    }

    pub async fn heartbeat(&mut self) -> Result<(), ClientError> {
        self.send(PacketBody::Heartbeat).await
    }

    pub async fn disconnect(&mut self) -> Result<(), ClientError> {
        self.send(PacketBody::Disconnect).await?;
        self.player_id = None;
        Ok(())
    }

    /// Waits for the next packet from the server that means something to a
    /// client. Datagrams from other senders and undecodable ones are skipped.
    pub async fn recv(&mut self) -> Result<ClientEvent, ClientError> {
        loop {
            let (len, from) = self.socket.recv_from(&mut self.buffer).await?;
            if from != self.server_addr {
                debug!("Ignoring datagram from stranger {}", from);
                continue;
            }
            let packet = match Packet::decode(&self.buffer[..len]) {
                Ok(packet) => packet,
                Err(e) => {
                    warn!("Dropping malformed packet from server: {}", e);
                    continue;
                }
            };
            if let Some(event) = self.handle_packet(packet) {
                return Ok(event);
            }
        }
    }

    fn handle_packet(&mut self, packet: Packet) -> Option<ClientEvent> {
        match packet.body {
            PacketBody::ConnectAck { entity_id } => {
                if self.player_id != Some(entity_id) {
                    info!("Connected! Player ID: {}", entity_id);
                }
                self.player_id = Some(entity_id);
                Some(ClientEvent::Connected { entity_id })
            }
            PacketBody::Snapshot(snapshot) => Some(ClientEvent::Snapshot {
                tick: packet.tick,
                snapshot,
            }),
            PacketBody::Disconnect => {
                warn!("Disconnected by server");
                self.player_id = None;
                Some(ClientEvent::Disconnected)
            }
            other => {
                debug!("Unexpected {:?} from server", other.packet_type());
                None
            }
        }
    }
}
