//! Per-address session tracking for the arena server
//!
//! A session is created by the first CONNECT from an unknown address and lives
//! until the client disconnects, times out, or is kicked by the death policy.
//! The manager only classifies and caches what arrives from the network:
//! - the latest INPUT per session (overwritten, never queued)
//! - SHOOT requests, queued in arrival order until the next tick drains them
//! - activity timestamps for timeout detection
//!
//! Sessions never own simulation data. They hold an [`Entity`] handle that is
//! resolved through the [`World`](crate::ecs::World) on every use.

use crate::ecs::Entity;
use log::{debug, info};
use shared::{InputIntent, Packet, PacketBody, Vec2};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// SHOOT requests a session may queue between two ticks. Extra ones are
/// dropped.
pub const MAX_QUEUED_SHOTS: usize = 4;

/// Lifecycle of a client address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session exists for the address.
    Unbound,
    Connected,
    /// Terminal. The session has been removed from the manager.
    Disconnected,
}

/// A SHOOT request waiting for the shooting system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShootEvent {
    /// Player id claimed in the packet header.
    pub player_id: u32,
    pub target: Vec2,
}

/// What the manager did with an inbound packet.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// New session created. Its entity is spawned on the next tick.
    Connected,
    /// CONNECT from an address that already has a session.
    Reconnect { entity: Option<Entity> },
    /// CONNECT refused because the server is full.
    Rejected,
    /// Session closed by the client.
    Disconnected { entity: Option<Entity> },
    Input,
    Shoot,
    Heartbeat,
    /// Not from a session, or not a packet clients send.
    Ignored,
}

#[derive(Debug)]
pub struct Session {
    pub addr: SocketAddr,
    /// Player entity, set once the game loop has spawned one.
    pub entity: Option<Entity>,
    pub last_input: Option<InputIntent>,
    pub shoot_queue: VecDeque<ShootEvent>,
    pub name: Option<String>,
    /// Client-suggested spawn point. Informational only.
    pub spawn_hint: Option<Vec2>,
    pub last_seen: Instant,
    pub last_seen_tick: u32,
    pub state: SessionState,
}

impl Session {
    pub fn new(addr: SocketAddr, now: Instant, tick: u32) -> Self {
        Self {
            addr,
            entity: None,
            last_input: None,
            shoot_queue: VecDeque::new(),
            name: None,
            spawn_hint: None,
            last_seen: now,
            last_seen_tick: tick,
            state: SessionState::Connected,
        }
    }

    fn touch(&mut self, now: Instant, tick: u32) {
        self.last_seen = now;
        self.last_seen_tick = tick;
    }

    pub fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > timeout
    }

    /// Name for log lines: the display name if one was sent, else the address.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{} ({})", name, self.addr),
            None => self.addr.to_string(),
        }
    }
}

pub struct SessionManager {
    sessions: HashMap<SocketAddr, Session>,
    max_sessions: usize,
    timeout: Duration,
}

impl SessionManager {
    pub fn new(max_sessions: usize, timeout: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            max_sessions,
            timeout,
        }
    }

    /// Classifies one decoded packet and updates session state.
    ///
    /// Anything other than CONNECT from an address without a session is
    /// ignored. Every packet from a known address refreshes its activity
    /// timestamp.
    pub fn handle_packet(
        &mut self,
        addr: SocketAddr,
        packet: &Packet,
        now: Instant,
        tick: u32,
    ) -> SessionEvent {
        if let PacketBody::Connect(request) = &packet.body {
            if let Some(session) = self.sessions.get_mut(&addr) {
                session.touch(now, tick);
                debug!("Repeated CONNECT from {}", session.label());
                return SessionEvent::Reconnect {
                    entity: session.entity,
                };
            }

            if self.sessions.len() >= self.max_sessions {
                info!("Rejecting {}: server full", addr);
                return SessionEvent::Rejected;
            }

            let mut session = Session::new(addr, now, tick);
            if let Some(request) = request {
                session.spawn_hint = Some(request.spawn_hint).filter(Vec2::is_finite);
                session.name = request.name.clone();
            }
            info!("Session opened for {}", session.label());
            self.sessions.insert(addr, session);
            return SessionEvent::Connected;
        }

        let Some(session) = self.sessions.get_mut(&addr) else {
            debug!(
                "Ignoring {:?} from unknown address {}",
                packet.packet_type(),
                addr
            );
            return SessionEvent::Ignored;
        };
        session.touch(now, tick);

        match &packet.body {
            PacketBody::Input(intent) if !intent.velocity.is_finite() => {
                debug!("Non-finite input from {}, stopping", session.label());
                session.last_input = None;
                SessionEvent::Ignored
            }
            PacketBody::Input(intent) => {
                session.last_input = Some(*intent);
                SessionEvent::Input
            }
            PacketBody::Shoot { target } if !target.is_finite() => {
                debug!("Dropping non-finite shot from {}", session.label());
                SessionEvent::Ignored
            }
            PacketBody::Shoot { .. } if session.shoot_queue.len() >= MAX_QUEUED_SHOTS => {
                debug!("Shoot queue full for {}", session.label());
                SessionEvent::Ignored
            }
            PacketBody::Shoot { target } => {
                session.shoot_queue.push_back(ShootEvent {
                    player_id: packet.player_id,
                    target: *target,
                });
                SessionEvent::Shoot
            }
            PacketBody::Heartbeat => SessionEvent::Heartbeat,
            PacketBody::Disconnect => {
                let entity = session.entity;
                if let Some(session) = self.remove(addr) {
                    info!("{} disconnected", session.label());
                }
                SessionEvent::Disconnected { entity }
            }
            _ => SessionEvent::Ignored,
        }
    }

    /// Removes the session and marks it terminal.
    pub fn remove(&mut self, addr: SocketAddr) -> Option<Session> {
        let mut session = self.sessions.remove(&addr)?;
        session.state = SessionState::Disconnected;
        Some(session)
    }

    /// Removes every session that has been silent for longer than the
    /// configured timeout and returns them.
    pub fn check_timeouts(&mut self, now: Instant) -> Vec<Session> {
        let timeout = self.timeout;
        let expired: Vec<SocketAddr> = self
            .sessions
            .values()
            .filter(|session| session.is_timed_out(now, timeout))
            .map(|session| session.addr)
            .collect();

        expired
            .into_iter()
            .filter_map(|addr| self.remove(addr))
            .inspect(|session| info!("{} timed out", session.label()))
            .collect()
    }

    /// Connected sessions still waiting for a player entity.
    pub fn pending_spawns(&self) -> Vec<SocketAddr> {
        self.sessions
            .values()
            .filter(|s| s.state == SessionState::Connected && s.entity.is_none())
            .map(|s| s.addr)
            .collect()
    }

    pub fn bind_entity(&mut self, addr: SocketAddr, entity: Entity) -> bool {
        match self.sessions.get_mut(&addr) {
            Some(session) => {
                session.entity = Some(entity);
                true
            }
            None => false,
        }
    }

    /// Takes this tick's input for every bound session. `None` means the
    /// client sent nothing since the last call.
    pub fn take_inputs(&mut self) -> Vec<(Entity, Option<InputIntent>)> {
        self.sessions
            .values_mut()
            .filter_map(|s| s.entity.map(|entity| (entity, s.last_input.take())))
            .collect()
    }

    /// Empties every shoot queue.
    pub fn drain_shoot_events(&mut self) -> Vec<(SocketAddr, ShootEvent)> {
        let mut events = Vec::new();
        for session in self.sessions.values_mut() {
            let addr = session.addr;
            events.extend(session.shoot_queue.drain(..).map(|event| (addr, event)));
        }
        events
    }

    /// Every session that has a player entity.
    pub fn bound(&self) -> Vec<(SocketAddr, Entity)> {
        self.sessions
            .values()
            .filter_map(|s| s.entity.map(|entity| (s.addr, entity)))
            .collect()
    }

    /// Broadcast targets: sessions still waiting for their spawn are left
    /// out.
    pub fn bound_addresses(&self) -> Vec<SocketAddr> {
        self.bound().into_iter().map(|(addr, _)| addr).collect()
    }

    pub fn entity_of(&self, addr: SocketAddr) -> Option<Entity> {
        self.sessions.get(&addr).and_then(|s| s.entity)
    }

    pub fn addr_of(&self, entity: Entity) -> Option<SocketAddr> {
        self.sessions
            .values()
            .find(|s| s.entity == Some(entity))
            .map(|s| s.addr)
    }

    pub fn get(&self, addr: SocketAddr) -> Option<&Session> {
        self.sessions.get(&addr)
    }

    pub fn state_of(&self, addr: SocketAddr) -> SessionState {
        self.sessions
            .get(&addr)
            .map_or(SessionState::Unbound, |s| s.state)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ConnectRequest;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn connect() -> Packet {
        Packet::new(PacketBody::Connect(None))
    }

    fn manager() -> SessionManager {
        SessionManager::new(4, Duration::from_secs(5))
    }

    #[test]
    fn test_connect_creates_unbound_entity_session() {
        let mut manager = manager();
        let now = Instant::now();
        assert_eq!(manager.state_of(test_addr()), SessionState::Unbound);

        let event = manager.handle_packet(test_addr(), &connect(), now, 0);
        assert_eq!(event, SessionEvent::Connected);
        assert_eq!(manager.state_of(test_addr()), SessionState::Connected);
        assert_eq!(manager.entity_of(test_addr()), None);
        assert_eq!(manager.pending_spawns(), vec![test_addr()]);
    }

    #[test]
    fn test_connect_keeps_name_and_hint() {
        let mut manager = manager();
        let packet = Packet::new(PacketBody::Connect(Some(ConnectRequest {
            spawn_hint: Vec2::new(4.0, 2.0),
            name: Some("alice".to_string()),
        })));
        manager.handle_packet(test_addr(), &packet, Instant::now(), 0);

        let session = manager.get(test_addr()).unwrap();
        assert_eq!(session.name.as_deref(), Some("alice"));
        assert_eq!(session.spawn_hint, Some(Vec2::new(4.0, 2.0)));
        assert_eq!(session.label(), "alice (127.0.0.1:8080)");
    }

    #[test]
    fn test_repeated_connect_reports_bound_entity() {
        let mut manager = manager();
        let now = Instant::now();
        manager.handle_packet(test_addr(), &connect(), now, 0);
        let entity = Entity::new(3, 1);
        assert!(manager.bind_entity(test_addr(), entity));

        let event = manager.handle_packet(test_addr(), &connect(), now, 1);
        assert_eq!(
            event,
            SessionEvent::Reconnect {
                entity: Some(entity)
            }
        );
        assert_eq!(manager.len(), 1);
        assert!(manager.pending_spawns().is_empty());
    }

    #[test]
    fn test_capacity_rejects_new_addresses() {
        let mut manager = SessionManager::new(1, Duration::from_secs(5));
        let now = Instant::now();
        manager.handle_packet(test_addr(), &connect(), now, 0);

        let event = manager.handle_packet(test_addr2(), &connect(), now, 0);
        assert_eq!(event, SessionEvent::Rejected);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.state_of(test_addr2()), SessionState::Unbound);
    }

    #[test]
    fn test_packets_from_unknown_address_are_ignored() {
        let mut manager = manager();
        let now = Instant::now();
        let packets = [
            Packet::new(PacketBody::Input(InputIntent::default())),
            Packet::new(PacketBody::Shoot {
                target: Vec2::ZERO,
            }),
            Packet::new(PacketBody::Heartbeat),
            Packet::new(PacketBody::Disconnect),
        ];
        for packet in &packets {
            assert_eq!(
                manager.handle_packet(test_addr(), packet, now, 0),
                SessionEvent::Ignored
            );
        }
        assert!(manager.is_empty());
    }

    #[test]
    fn test_input_overwrites_previous() {
        let mut manager = manager();
        let now = Instant::now();
        manager.handle_packet(test_addr(), &connect(), now, 0);
        let entity = Entity::new(0, 0);
        manager.bind_entity(test_addr(), entity);

        for x in [1.0, 2.0, 3.0] {
            let packet = Packet::new(PacketBody::Input(InputIntent {
                velocity: Vec2::new(x, 0.0),
            }));
            assert_eq!(
                manager.handle_packet(test_addr(), &packet, now, 0),
                SessionEvent::Input
            );
        }

        let inputs = manager.take_inputs();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].0, entity);
        assert_eq!(inputs[0].1.unwrap().velocity.x, 3.0);

        // Consumed: next tick sees no input.
        assert_eq!(manager.take_inputs(), vec![(entity, None)]);
    }

    #[test]
    fn test_only_bound_sessions_receive_broadcasts() {
        let mut manager = manager();
        let now = Instant::now();
        manager.handle_packet(test_addr(), &connect(), now, 0);
        manager.handle_packet(test_addr2(), &connect(), now, 0);
        assert!(manager.bound_addresses().is_empty());

        manager.bind_entity(test_addr2(), Entity::new(1, 0));
        assert_eq!(manager.bound_addresses(), vec![test_addr2()]);
    }

    #[test]
    fn test_unbound_sessions_have_no_inputs() {
        let mut manager = manager();
        let now = Instant::now();
        manager.handle_packet(test_addr(), &connect(), now, 0);
        assert!(manager.take_inputs().is_empty());
    }

    #[test]
    fn test_shoot_events_queue_in_order_and_drain() {
        let mut manager = manager();
        let now = Instant::now();
        manager.handle_packet(test_addr(), &connect(), now, 0);

        for x in [5.0, 6.0] {
            let packet = Packet::new(PacketBody::Shoot {
                target: Vec2::new(x, 1.0),
            })
            .with_player(7);
            manager.handle_packet(test_addr(), &packet, now, 0);
        }

        let events = manager.drain_shoot_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].1.target.x, 5.0);
        assert_eq!(events[1].1.target.x, 6.0);
        assert_eq!(events[0].1.player_id, 7);
        assert!(manager.drain_shoot_events().is_empty());
    }

    #[test]
    fn test_non_finite_input_means_stop() {
        let mut manager = manager();
        let now = Instant::now();
        manager.handle_packet(test_addr(), &connect(), now, 0);
        let entity = Entity::new(0, 0);
        manager.bind_entity(test_addr(), entity);

        let good = Packet::new(PacketBody::Input(InputIntent {
            velocity: Vec2::new(10.0, 0.0),
        }));
        manager.handle_packet(test_addr(), &good, now, 0);
        for velocity in [
            Vec2::new(f32::NAN, 0.0),
            Vec2::new(0.0, f32::INFINITY),
            Vec2::new(f32::NEG_INFINITY, 1.0),
        ] {
            let bad = Packet::new(PacketBody::Input(InputIntent { velocity }));
            assert_eq!(
                manager.handle_packet(test_addr(), &bad, now, 0),
                SessionEvent::Ignored
            );
        }

        assert_eq!(manager.take_inputs(), vec![(entity, None)]);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_non_finite_hint_and_shot_are_dropped() {
        let mut manager = manager();
        let now = Instant::now();
        let packet = Packet::new(PacketBody::Connect(Some(ConnectRequest {
            spawn_hint: Vec2::new(f32::NAN, 2.0),
            name: None,
        })));
        manager.handle_packet(test_addr(), &packet, now, 0);
        assert_eq!(manager.get(test_addr()).unwrap().spawn_hint, None);

        let shot = Packet::new(PacketBody::Shoot {
            target: Vec2::new(f32::INFINITY, 0.0),
        });
        assert_eq!(
            manager.handle_packet(test_addr(), &shot, now, 0),
            SessionEvent::Ignored
        );
        assert!(manager.drain_shoot_events().is_empty());
    }

    #[test]
    fn test_shoot_queue_is_capped_per_tick() {
        let mut manager = manager();
        let now = Instant::now();
        manager.handle_packet(test_addr(), &connect(), now, 0);

        let shot = Packet::new(PacketBody::Shoot {
            target: Vec2::new(1.0, 1.0),
        });
        let queued = (0..100)
            .map(|_| manager.handle_packet(test_addr(), &shot, now, 0))
            .filter(|event| *event == SessionEvent::Shoot)
            .count();
        assert_eq!(queued, MAX_QUEUED_SHOTS);
        assert_eq!(manager.drain_shoot_events().len(), MAX_QUEUED_SHOTS);

        // Draining frees the queue for the next tick.
        assert_eq!(
            manager.handle_packet(test_addr(), &shot, now, 1),
            SessionEvent::Shoot
        );
    }

    #[test]
    fn test_disconnect_removes_session() {
        let mut manager = manager();
        let now = Instant::now();
        manager.handle_packet(test_addr(), &connect(), now, 0);
        let entity = Entity::new(2, 0);
        manager.bind_entity(test_addr(), entity);

        let event = manager.handle_packet(test_addr(), &Packet::new(PacketBody::Disconnect), now, 0);
        assert_eq!(
            event,
            SessionEvent::Disconnected {
                entity: Some(entity)
            }
        );
        assert!(manager.is_empty());
        assert_eq!(manager.addr_of(entity), None);
    }

    #[test]
    fn test_timeouts_and_heartbeat() {
        let mut manager = manager();
        let start = Instant::now();
        manager.handle_packet(test_addr(), &connect(), start, 0);
        manager.handle_packet(test_addr2(), &connect(), start, 0);

        let later = start + Duration::from_secs(4);
        let heartbeat = Packet::new(PacketBody::Heartbeat);
        assert_eq!(
            manager.handle_packet(test_addr2(), &heartbeat, later, 120),
            SessionEvent::Heartbeat
        );
        assert_eq!(manager.get(test_addr2()).unwrap().last_seen_tick, 120);

        let expired = manager.check_timeouts(start + Duration::from_secs(6));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].addr, test_addr());
        assert_eq!(expired[0].state, SessionState::Disconnected);
        assert_eq!(manager.len(), 1);
        assert!(manager.get(test_addr2()).is_some());
    }

    #[test]
    fn test_server_only_packets_are_ignored_but_refresh() {
        let mut manager = manager();
        let start = Instant::now();
        manager.handle_packet(test_addr(), &connect(), start, 0);

        let later = start + Duration::from_secs(3);
        let packet = Packet::new(PacketBody::ConnectAck { entity_id: 1 });
        assert_eq!(
            manager.handle_packet(test_addr(), &packet, later, 5),
            SessionEvent::Ignored
        );
        assert_eq!(manager.get(test_addr()).unwrap().last_seen, later);
    }
}
