//! # Arena Server Library
//!
//! Authoritative server for a 2D multiplayer arena shooter. The server owns
//! the only true copy of the game: player avatars, projectiles, health and
//! kill counts. Clients send intent (movement, shots) and receive periodic
//! snapshots of the whole arena over UDP.
//!
//! ## Architecture
//!
//! ### Single Writer
//! One task runs the whole server loop. Packet handling, simulation and
//! snapshot encoding happen sequentially, so no game state is ever shared
//! between threads and nothing needs a lock.
//!
//! ### Entity Store (`ecs`)
//! Generational entity handles and one sparse-set table per component kind.
//! A handle that outlives its entity can never read the slot's next
//! occupant.
//!
//! ### Systems (`systems`)
//! Shooting, wall collision, projectile lifecycle and movement, run every
//! fixed tick in that order. Each system sees the writes of the ones before
//! it.
//!
//! ### Sessions (`session`)
//! Maps client addresses to player entities, caches the latest input and
//! queues shots between ticks, and detects silent clients.
//!
//! ### Game Core (`game`)
//! Glues the above together: decodes datagrams, spawns and respawns
//! players, applies input, builds snapshots and queues outgoing packets.
//!
//! ### Network (`network`)
//! The UDP socket and the fixed-timestep loop with its snapshot cadence.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::arena::Arena;
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut server = Server::new(ServerConfig::default(), Arena::default_arena()).await?;
//!     let handle = server.handle();
//!
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         handle.stop();
//!     });
//!
//!     server.run().await
//! }
//! ```

pub mod arena;
pub mod collision;
pub mod components;
pub mod config;
pub mod ecs;
pub mod game;
pub mod network;
pub mod session;
pub mod systems;
