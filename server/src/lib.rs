//! # Arena Relay Server Library
//!
//! This library provides the relay and arbitration server for a browser-based
//! multiplayer arena. Each connected participant steers one entity in a
//! shared 2D world; the server assigns spawn points, relays state between
//! participants and settles collisions by eliminating the weaker entity.
//!
//! ## Core Responsibilities
//!
//! ### Relay
//! Clients are authoritative over their own position and vitality. Every
//! StateUpdate a client sends is applied to its session and forwarded,
//! byte for byte, to every other client.
//!
//! ### Arbitration
//! The server owns collision outcomes. Each session scans for overlaps every
//! 100ms; on contact the higher-vitality side is told what it ate and the
//! other side's connection is closed.
//!
//! ### Presence
//! A new session is announced to its peers (and they to it) one second after
//! connecting, then re-announced every second as a heartbeat. Departures are
//! broadcast as PeerLeft.
//!
//! ## Architecture Design
//!
//! ### One Task Per Connection
//! Each WebSocket connection is served by a single task that multiplexes
//! inbound frames, outbound frames, its three timers and its elimination
//! signal. All handlers for one session therefore run one at a time, while
//! different sessions proceed concurrently.
//!
//! ### Shared Registry
//! The session registry is the only shared structure. It is guarded by an
//! async read-write lock and hands out snapshots for scans, with each
//! session's mutable state behind its own lock. Admission of a new session
//! (spawn scan, id, registration) happens under a single write lock.
//!
//! ### Bounded Outbound Queues
//! Frames for a session are queued without waiting. When a client falls
//! behind and its queue fills up, further frames are dropped.
//!
//! ## Module Organization
//!
//! ### Registry Module (`registry`)
//! Session records, the live roster and id allocation.
//!
//! ### Game Module (`game`)
//! Spawn placement and the collision/elimination rule.
//!
//! ### Broadcast Module (`broadcast`)
//! Single-recipient and fan-out delivery of encoded frames.
//!
//! ### Arena Module (`arena`)
//! The connection lifecycle: open, announce, state handling, collision scans
//! and close.
//!
//! ### Network Module (`network`)
//! The WebSocket listener and the per-connection event loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::names::RandomNames;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind("0.0.0.0:8090", ServerConfig::default(), Box::new(RandomNames)).await?;
//!     server.run().await;
//!     Ok(())
//! }
//! ```

pub mod arena;
pub mod broadcast;
pub mod config;
pub mod game;
pub mod names;
pub mod network;
pub mod registry;
