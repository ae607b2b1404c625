//! # Arena Bot Client Library
//!
//! Headless client for the arena server. It speaks the same wire protocol a
//! graphical client would, which makes it useful for load testing and for
//! exercising the server end to end.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! The UDP endpoint: sends CONNECT, INPUT, SHOOT, HEARTBEAT and DISCONNECT,
//! and turns CONNECT_ACK, SNAPSHOT and DISCONNECT into [`ClientEvent`]s.
//!
//! ### Bot Module (`bot`)
//! Pure decision logic: random-walk velocity intents and picking the nearest
//! target from the latest snapshot. No I/O, so it is unit-testable.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::{Client, ClientEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut client = Client::new("127.0.0.1:7777").await?;
//!     client.connect(None, Some("bot".to_string())).await?;
//!
//!     if let ClientEvent::Connected { entity_id } = client.recv().await? {
//!         println!("playing as {}", entity_id);
//!     }
//!     client.disconnect().await
//! }
//! ```

pub mod bot;
pub mod network;

pub use network::{Client, ClientError, ClientEvent};
