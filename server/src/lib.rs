//! # Arena Server Library
//!
//! Authoritative server for the real-time rock-paper-scissors arena. It
//! owns the canonical world state, applies client commands, advances the
//! simulation on a fixed tick, and streams a text snapshot of the world
//! back to every connected client.
//!
//! ## Architecture
//!
//! Everything shared lives in one [`game::World`] behind a single
//! `tokio::sync::RwLock`:
//!
//! - **Acceptor task**: accepts TCP connections, registers a player, sends
//!   the joining client a one-shot snapshot, and spawns its handler.
//! - **Connection tasks** (one per client): read newline-delimited command
//!   lines (`move:<x>,<y>`, `shoot:<Kind>,<vx>,<vy>`) and apply them to
//!   the world; drain an outbound channel of snapshot lines onto the
//!   socket. A read or write fault tears down only that connection.
//! - **Tick task**: at the configured rate (60 Hz by default) integrates
//!   positions, resolves rock-paper-scissors collisions, and queues the
//!   resulting snapshot line on every player's outbound channel. Slow
//!   ticks skip forward rather than replaying missed steps.
//!
//! Commands are last-writer-wins: a movement command replaces the
//! player's velocity, it never accumulates, and whatever arrives between
//! two ticks is simply the state the next tick sees.
//!
//! ## Module Organization
//!
//! - [`game`]: world store, entities, integration and collision rules.
//! - [`network`]: listener, connection handling, tick driver, broadcast.
//!
//! The wire types themselves (commands, snapshot codec, arena constants)
//! live in the `shared` crate so headless clients and tests can speak the
//! same protocol.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 60 Hz tick, at most 32 simultaneous clients.
//!     let mut server = Server::new("0.0.0.0:8080", Duration::from_millis(16), 32).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod network;
