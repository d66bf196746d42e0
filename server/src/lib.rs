//! # Connect Dots Server Library
//!
//! This library provides the authoritative server for a networked game of
//! dots and boxes. Players take turns drawing lines between adjacent dots;
//! whoever draws the fourth side of a box scores it. The server owns the
//! single source of truth and broadcasts every accepted move so that all
//! connected clients show the same board.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Rules
//! Every move is validated here: the two dots must be adjacent and on the
//! board, the proposer must be the player to move, and the line must not
//! already exist. Clients never mutate state on their own.
//!
//! ### Client Management
//! Handles the lifecycle of client connections:
//! - Seating connections in arrival order up to the configured player count
//! - Assigning each seat an id and a color from a fixed palette
//! - Dropping stalled or closed connections from the broadcast set
//!
//! ### State Broadcasting
//! Accepted moves, score changes, turn changes and the final ranking are
//! pushed to every live session as one JSON object per line.
//!
//! ## Architecture Design
//!
//! ### Single-Writer Event Loop
//! All game state lives on one task. Connection tasks decode input and
//! forward it over a channel, so move validation and commit run one at a
//! time and can never interleave. The occupancy check and the write that
//! follows it always happen in the same step.
//!
//! ### TCP, One Message Per Line
//! Each player holds one TCP connection. Outbound messages go through a
//! bounded per-session queue with a write timeout, so a slow client can only
//! hurt itself.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The turn state machine: edges, scored boxes, scores, phase and ranking.
//!
//! ### Client Manager Module (`client_manager`)
//! The lobby: id and color assignment and capacity limits.
//!
//! ### Session Module (`session`)
//! One task per connection: line decoding, outbound writes and teardown.
//!
//! ### Broadcast Module (`broadcast`)
//! Non-blocking fan-out to every registered session.
//!
//! ### Network Module (`network`)
//! Listener, configuration and the main event loop tying it all together.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = ServerConfig {
//!         port: 12345,
//!         max_players: 2,
//!         ..ServerConfig::default()
//!     };
//!
//!     // Binds the port; this is the only step that can fail fatally
//!     let server = Server::new(config).await?;
//!
//!     // Seats players, starts the game once the lobby is full and
//!     // relays moves until shut down
//!     server.run().await;
//!
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod client_manager;
pub mod game;
pub mod network;
pub mod session;
