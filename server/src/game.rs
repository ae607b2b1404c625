//! Authoritative game state: the world, the sessions driving it and the
//! per-tick bookkeeping between network and simulation.
//!
//! `Game` never touches the socket. Outgoing packets are queued as
//! [`GameMessage`]s and flushed by the server loop.

use crate::arena::Arena;
use crate::collision::find_safe_spawn_position;
use crate::components::{Health, KillCounter, Position, Sprite, Velocity};
use crate::config::{DeathPolicy, ServerConfig, Tuning};
use crate::ecs::{ComponentSet, Entity, World, WorldError};
use crate::network::GameMessage;
use crate::session::{SessionEvent, SessionManager};
use crate::systems::{SystemPipeline, TickContext};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{HealthState, Packet, PacketBody, Snapshot, SnapshotEntity, Vec2};
use std::net::SocketAddr;
use std::time::Instant;

/// Ticks between periodic status log lines.
const STATUS_LOG_INTERVAL: u32 = 300;

pub struct Game {
    world: World,
    sessions: SessionManager,
    pipeline: SystemPipeline,
    arena: Arena,
    config: ServerConfig,
    tuning: Tuning,
    tick: u32,
    sequence: u32,
    rng: StdRng,
    outbox: Vec<GameMessage>,
}

impl Game {
    pub fn new(config: ServerConfig, arena: Arena) -> Self {
        Self::with_rng(config, arena, StdRng::from_entropy())
    }

    /// Same as [`Game::new`] with a caller-supplied RNG for spawn placement.
    pub fn with_rng(config: ServerConfig, arena: Arena, rng: StdRng) -> Self {
        Self {
            world: World::with_entity_limit(config.entity_limit),
            sessions: SessionManager::new(config.max_players, config.timeout),
            pipeline: SystemPipeline::with_default_systems(),
            arena,
            config,
            tuning: Tuning::default(),
            tick: 0,
            sequence: 0,
            rng,
            outbox: Vec::new(),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    /// Decodes and classifies one inbound datagram.
    ///
    /// Malformed datagrams are dropped without a reply.
    pub fn handle_datagram(&mut self, addr: SocketAddr, data: &[u8], now: Instant) {
        let packet = match Packet::decode(data) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("Dropping malformed datagram from {}: {}", addr, e);
                return;
            }
        };

        match self.sessions.handle_packet(addr, &packet, now, self.tick) {
            SessionEvent::Rejected => {
                self.send(addr, PacketBody::Disconnect, None);
            }
            SessionEvent::Reconnect {
                entity: Some(entity),
            } => {
                self.send_connect_ack(addr, entity);
            }
            SessionEvent::Disconnected {
                entity: Some(entity),
            } => {
                self.world.destroy(entity);
            }
            _ => {}
        }
    }

    /// Session housekeeping run once per loop iteration, after packets have
    /// been read: timeouts, the death sweep, then player spawns for new
    /// sessions.
    pub fn process_network(&mut self, now: Instant) -> Result<(), WorldError> {
        for session in self.sessions.check_timeouts(now) {
            if let Some(entity) = session.entity {
                self.world.destroy(entity);
            }
        }

        self.sweep_dead_players();

        for addr in self.sessions.pending_spawns() {
            let entity = self.spawn_player()?;
            self.sessions.bind_entity(addr, entity);
            info!("Spawned player {} for {}", entity, addr);
            self.send_connect_ack(addr, entity);
        }
        Ok(())
    }

    /// Advances the simulation by one fixed step.
    pub fn fixed_update(&mut self, dt: f32) -> Result<(), WorldError> {
        self.apply_inputs();

        let mut ctx = TickContext {
            sessions: &mut self.sessions,
            walls: &self.arena.walls,
            tuning: &self.tuning,
        };
        self.pipeline.run(dt, &mut self.world, &mut ctx)?;

        self.tick = self.tick.wrapping_add(1);
        if self.tick % STATUS_LOG_INTERVAL == 0 {
            debug!(
                "Tick {}: {} sessions, {} entities",
                self.tick,
                self.sessions.len(),
                self.world.entity_count()
            );
        }
        Ok(())
    }

    /// Copies each session's latest intent into its player's velocity. A
    /// session that sent nothing since the last tick stops.
    fn apply_inputs(&mut self) {
        let max_speed = self.config.max_player_speed;
        for (entity, input) in self.sessions.take_inputs() {
            let velocity = input
                .map(|i| i.velocity)
                .filter(Vec2::is_finite)
                .map_or(Vec2::ZERO, |v| v.clamp_length(max_speed));
            if let Some(v) = self.world.get_mut::<Velocity>(entity) {
                v.0 = velocity;
            }
        }
    }

    fn sweep_dead_players(&mut self) {
        for (addr, entity) in self.sessions.bound() {
            let dead = self
                .world
                .get::<Health>(entity)
                .is_some_and(Health::is_dead);
            if !dead {
                continue;
            }

            match self.config.death_policy {
                DeathPolicy::Respawn => self.respawn_player(entity),
                DeathPolicy::Disconnect => {
                    info!("Player {} died, disconnecting {}", entity, addr);
                    self.send(addr, PacketBody::Disconnect, None);
                    self.sessions.remove(addr);
                    self.world.destroy(entity);
                }
            }
        }
    }

    fn spawn_position(&mut self) -> Vec2 {
        find_safe_spawn_position(
            &self.arena.walls,
            &self.arena.spawn_bounds,
            self.tuning.player_size,
            &mut self.rng,
        )
    }

    /// Creates a player entity at a safe spawn point.
    pub fn spawn_player(&mut self) -> Result<Entity, WorldError> {
        let position = self.spawn_position();
        let entity = self.world.create()?;
        self.world.add_component(entity, Position(position));
        self.world.add_component(entity, Velocity::default());
        self.world.add_component(
            entity,
            Sprite::new(self.tuning.player_size, self.tuning.player_color),
        );
        self.world
            .add_component(entity, Health::new(self.tuning.player_health));
        self.world.add_component(entity, KillCounter::default());
        Ok(entity)
    }

    /// Puts a player back at a fresh spawn point with full health. Kills are
    /// kept.
    pub fn respawn_player(&mut self, entity: Entity) {
        if !self.world.is_alive(entity) {
            warn!("Cannot respawn stale player {}", entity);
            return;
        }
        let position = self.spawn_position();
        if let Some(p) = self.world.get_mut::<Position>(entity) {
            p.0 = position;
        }
        if let Some(v) = self.world.get_mut::<Velocity>(entity) {
            v.0 = Vec2::ZERO;
        }
        if let Some(h) = self.world.get_mut::<Health>(entity) {
            h.restore();
        }
        info!("Respawned player {} at ({:.1}, {:.1})", entity, position.x, position.y);
    }

    /// Full state of every visible entity, ordered by id.
    pub fn snapshot(&self) -> Snapshot {
        let mut visible = self
            .world
            .query(ComponentSet::POSITION | ComponentSet::SPRITE);
        visible.sort_by_key(|e| e.id);

        let entities = visible
            .into_iter()
            .filter_map(|entity| {
                let position = self.world.get::<Position>(entity)?.0;
                let sprite = self.world.get::<Sprite>(entity)?;
                Some(SnapshotEntity {
                    id: entity.id,
                    position,
                    size: sprite.size,
                    color: sprite.color,
                    health: self.world.get::<Health>(entity).map(|h| HealthState {
                        current: h.current,
                        max: h.max,
                    }),
                    kills: self.world.get::<KillCounter>(entity).map(|k| k.count),
                })
            })
            .collect();

        Snapshot { entities }
    }

    /// Queues a snapshot for every session. Does nothing with no sessions.
    pub fn broadcast_snapshot(&mut self) {
        if self.sessions.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        let packet = self.next_packet(PacketBody::Snapshot(snapshot), None);
        self.outbox.push(GameMessage::BroadcastPacket { packet });
    }

    /// Hands queued packets to the caller.
    pub fn take_outbox(&mut self) -> Vec<GameMessage> {
        std::mem::take(&mut self.outbox)
    }

    fn send_connect_ack(&mut self, addr: SocketAddr, entity: Entity) {
        self.send(
            addr,
            PacketBody::ConnectAck {
                entity_id: entity.id,
            },
            Some(entity),
        );
    }

    fn send(&mut self, addr: SocketAddr, body: PacketBody, player: Option<Entity>) {
        let packet = self.next_packet(body, player);
        self.outbox.push(GameMessage::SendPacket { packet, addr });
    }

    fn next_packet(&mut self, body: PacketBody, player: Option<Entity>) -> Packet {
        self.sequence = self.sequence.wrapping_add(1);
        let packet = Packet::new(body)
            .with_sequence(self.sequence)
            .with_tick(self.tick);
        match player {
            Some(entity) => packet.with_player(entity.id),
            None => packet,
        }
    }
}
