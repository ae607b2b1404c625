//! Server network layer: the UDP socket and the fixed-timestep main loop

use crate::arena::Arena;
use crate::config::ServerConfig;
use crate::game::Game;
use log::{debug, error, info, warn};
use shared::protocol::MAX_DATAGRAM_SIZE;
use shared::Packet;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;

pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

/// Idle sleep at the end of each loop iteration.
const LOOP_SLEEP: Duration = Duration::from_millis(1);

/// Packets queued by the game for the socket
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    /// Sent to every session with a player entity.
    BroadcastPacket { packet: Packet },
}

/// What one loop iteration owes the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSteps {
    pub ticks: u32,
    pub snapshot_due: bool,
}

/// Fixed-timestep accumulator and snapshot timer driven by wall-clock frame
/// times.
#[derive(Debug, Clone)]
pub struct FrameClock {
    fixed_dt: f32,
    snapshot_interval: f32,
    max_frame_time: f32,
    accumulator: f32,
    snapshot_timer: f32,
}

impl FrameClock {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            fixed_dt: config.fixed_timestep(),
            snapshot_interval: config.snapshot_interval(),
            max_frame_time: config.max_frame_time.max(0.0),
            accumulator: 0.0,
            snapshot_timer: 0.0,
        }
    }

    pub fn fixed_dt(&self) -> f32 {
        self.fixed_dt
    }

    /// Accounts for `frame_time` seconds of wall clock.
    ///
    /// The frame time is clamped to `max_frame_time` first, so a stall never
    /// turns into a burst of catch-up ticks. At most one snapshot is due per
    /// frame.
    pub fn advance(&mut self, frame_time: f32) -> FrameSteps {
        let frame_time = frame_time.min(self.max_frame_time).max(0.0);

        self.accumulator += frame_time;
        let mut ticks = 0;
        while self.accumulator >= self.fixed_dt {
            self.accumulator -= self.fixed_dt;
            ticks += 1;
        }

        self.snapshot_timer += frame_time;
        let snapshot_due = self.snapshot_timer >= self.snapshot_interval;
        if snapshot_due {
            self.snapshot_timer =
                (self.snapshot_timer - self.snapshot_interval).min(self.snapshot_interval);
        }

        FrameSteps {
            ticks,
            snapshot_due,
        }
    }
}

/// Stops a running [`Server`] from any task or thread.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    running: Arc<AtomicBool>,
}

impl ServerHandle {
    /// The loop exits at the start of its next iteration.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Main server coordinating networking and game simulation
pub struct Server {
    socket: UdpSocket,
    game: Game,
    config: ServerConfig,
    running: Arc<AtomicBool>,
}

impl Server {
    pub async fn new(config: ServerConfig, arena: Arena) -> Result<Self, ServerError> {
        let socket = UdpSocket::bind(config.bind_address()).await?;
        info!("Server listening on {}", socket.local_addr()?);

        Ok(Server {
            socket,
            game: Game::new(config.clone(), arena),
            config,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            running: Arc::clone(&self.running),
        }
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    /// Reads every datagram currently queued on the socket without waiting.
    fn poll_network(&mut self, buffer: &mut [u8], now: Instant) {
        loop {
            match self.socket.try_recv_from(buffer) {
                Ok((len, addr)) => self.game.handle_datagram(addr, &buffer[..len], now),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    debug!("Error receiving packet: {}", e);
                    break;
                }
            }
        }
    }

    async fn send_packet(socket: &UdpSocket, data: &[u8], addr: SocketAddr) {
        if let Err(e) = socket.send_to(data, addr).await {
            warn!("Failed to send packet to {}: {}", addr, e);
        }
    }

    /// Sends everything the game queued this iteration.
    async fn flush_outbox(&mut self) {
        for message in self.game.take_outbox() {
            match message {
                GameMessage::SendPacket { packet, addr } => match packet.encode() {
                    Ok(data) => Self::send_packet(&self.socket, &data, addr).await,
                    Err(e) => error!("Failed to encode {:?}: {}", packet.packet_type(), e),
                },
                GameMessage::BroadcastPacket { packet } => {
                    let data = match packet.encode() {
                        Ok(data) => data,
                        Err(e) => {
                            error!("Failed to encode {:?}: {}", packet.packet_type(), e);
                            continue;
                        }
                    };
                    if data.len() > MAX_DATAGRAM_SIZE {
                        error!(
                            "Dropping {:?} of {} bytes: exceeds datagram limit",
                            packet.packet_type(),
                            data.len()
                        );
                        continue;
                    }
                    for addr in self.game.sessions().bound_addresses() {
                        Self::send_packet(&self.socket, &data, addr).await;
                    }
                }
            }
        }
    }

    /// Main server loop
    ///
    /// Each iteration drains the socket, runs session housekeeping, advances
    /// the simulation in fixed steps, broadcasts a snapshot when one is due
    /// and flushes queued packets. Runs until [`ServerHandle::stop`] is
    /// called or the world runs out of entity slots.
    pub async fn run(&mut self) -> Result<(), ServerError> {
        let mut clock = FrameClock::new(&self.config);
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];
        let mut last_frame = Instant::now();

        info!(
            "Server started: {} Hz simulation, {} Hz snapshots, {} walls",
            self.config.tick_rate,
            self.config.snapshot_rate,
            self.game.arena().walls.len()
        );

        while self.running.load(Ordering::SeqCst) {
            let now = Instant::now();
            let steps = clock.advance(now.duration_since(last_frame).as_secs_f32());
            last_frame = now;

            self.poll_network(&mut buffer, now);
            self.game.process_network(now)?;

            for _ in 0..steps.ticks {
                self.game.fixed_update(clock.fixed_dt())?;
            }
            if steps.snapshot_due {
                self.game.broadcast_snapshot();
            }

            self.flush_outbox().await;
            tokio::time::sleep(LOOP_SLEEP).await;
        }

        info!("Server stopped at tick {}", self.game.tick());
        Ok(())
    }
}
