//! Lobby bookkeeping: who is seated, with which id and color
//!
//! Connections are admitted in arrival order until the configured player
//! count is reached. Each admitted connection gets the next client id and
//! the next palette color. Seats are never released, so a color is never
//! handed out twice, even after a disconnect.

use log::info;
use shared::Color;
use std::net::SocketAddr;
use thiserror::Error;

/// Why a connection could not be seated
///
/// The display text is sent verbatim to the refused peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LobbyError {
    #[error("server full")]
    LobbyFull,
    #[error("game already started")]
    GameAlreadyStarted,
}

/// An admitted connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    /// Unique client identifier assigned by the server
    pub id: u32,
    pub color: Color,
    pub addr: SocketAddr,
}

/// Manages seating for the lobby
///
/// Tracks every admitted connection in arrival order and hands out client
/// IDs and palette colors. The lobby accepts connections until it is full
/// or explicitly closed when the game starts.
pub struct ClientManager {
    seats: Vec<Seat>,
    /// Next available client ID for new connections
    next_client_id: u32,
    max_players: usize,
    /// Cleared once the game starts
    open: bool,
}

impl ClientManager {
    /// Creates an open lobby. Client IDs start from 1.
    pub fn new(max_players: usize) -> Self {
        Self {
            seats: Vec::new(),
            next_client_id: 1,
            max_players,
            open: true,
        }
    }

    /// Seats a new connection, or explains why it cannot be seated
    pub fn admit(&mut self, addr: SocketAddr) -> Result<Seat, LobbyError> {
        if !self.open {
            return Err(LobbyError::GameAlreadyStarted);
        }
        if self.is_full() {
            return Err(LobbyError::LobbyFull);
        }
        let color = Color::for_seat(self.seats.len()).ok_or(LobbyError::LobbyFull)?;

        let seat = Seat {
            id: self.next_client_id,
            color,
            addr,
        };
        self.next_client_id += 1;

        info!("Client {} connected from {} as {}", seat.id, addr, color);
        self.seats.push(seat.clone());
        Ok(seat)
    }

    /// Stops admitting connections
    ///
    /// Called when the game starts. Later connections are refused with
    /// [`LobbyError::GameAlreadyStarted`], even if seats are left.
    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// True once every configured seat is taken
    pub fn is_full(&self) -> bool {
        self.seats.len() >= self.max_players
    }

    /// Looks up the seat assigned to `client_id`
    pub fn seat(&self, client_id: u32) -> Option<&Seat> {
        self.seats.iter().find(|s| s.id == client_id)
    }

    /// All seats in arrival order, which is also turn order
    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }
}
