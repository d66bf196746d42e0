//! Server network layer: TCP listener, lobby and the game event loop
//!
//! One listener task accepts connections and one task per connection runs
//! its [`Session`]. Everything that touches shared state happens on the
//! main loop in [`Server::run`], which owns the [`GameState`], the lobby and
//! the broadcaster. Sessions talk to it only through [`NetworkEvent`]s, so
//! each move is validated and committed without any other move in between.

use crate::broadcast::Broadcaster;
use crate::client_manager::{ClientManager, LobbyError};
use crate::game::{GameEvent, GameState, MoveError, Phase};
use crate::session::{write_message, Session};
use log::{debug, error, info, warn};
use shared::{
    Grid, Point, ServerMessage, DEFAULT_GRID_SIZE, DEFAULT_PORT, MAX_GRID_SIZE,
    MIN_GRID_SIZE, PALETTE,
};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A [`ServerConfig`] value the server cannot run with
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("grid size must be at least 2, got {0}")]
    GridTooSmall(u32),
    #[error("grid size must be at most {max}, got {got}")]
    GridTooLarge { got: u32, max: u32 },
    #[error("max players must be between 1 and {max}, got {got}")]
    BadPlayerCount { got: usize, max: usize },
}

/// Everything needed to start a server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Dots along each side of the board
    pub grid_size: u32,
    /// Seats in the lobby; the game starts when they are all taken
    pub max_players: usize,
    /// Messages buffered per session before it is considered stalled
    pub outbound_capacity: usize,
    pub write_timeout: Duration,
    /// Tell a proposer why their move was refused
    pub notify_rejections: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            grid_size: DEFAULT_GRID_SIZE,
            max_players: 2,
            outbound_capacity: 64,
            write_timeout: Duration::from_millis(2000),
            notify_rejections: false,
        }
    }
}

impl ServerConfig {
    /// Checks the board size and seat count against what the game supports
    ///
    /// The board must hold at least one box and stay under
    /// [`MAX_GRID_SIZE`]. Seats are limited by the color palette, since
    /// every player needs a distinct color.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_size < MIN_GRID_SIZE {
            return Err(ConfigError::GridTooSmall(self.grid_size));
        }
        if self.grid_size > MAX_GRID_SIZE {
            return Err(ConfigError::GridTooLarge {
                got: self.grid_size,
                max: MAX_GRID_SIZE,
            });
        }
        if self.max_players == 0 || self.max_players > PALETTE.len() {
            return Err(ConfigError::BadPlayerCount {
                got: self.max_players,
                max: PALETTE.len(),
            });
        }
        Ok(())
    }

    /// `host:port` string handed to the listener
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum NetworkEvent {
    NewConnection {
        stream: TcpStream,
        addr: SocketAddr,
    },
    MoveProposed {
        client_id: u32,
        p1: Point,
        p2: Point,
    },
    StartRequested {
        client_id: u32,
    },
    ClientDisconnected {
        client_id: u32,
    },
    Shutdown,
}

/// Main server coordinating the lobby, sessions and the game
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    config: ServerConfig,
    clients: ClientManager,
    broadcaster: Broadcaster,
    game_state: GameState,

    // Communication channels
    event_tx: mpsc::UnboundedSender<NetworkEvent>,
    event_rx: mpsc::UnboundedReceiver<NetworkEvent>,
}

impl Server {
    /// Validates the config and binds the listening socket
    pub async fn new(config: ServerConfig) -> Result<Self, BoxError> {
        config.validate()?;

        let listener = TcpListener::bind(config.address()).await?;
        let local_addr = listener.local_addr()?;
        info!(
            "Server listening on {} ({} players, {}x{} grid)",
            local_addr, config.max_players, config.grid_size, config.grid_size
        );

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            clients: ClientManager::new(config.max_players),
            broadcaster: Broadcaster::new(),
            game_state: GameState::new(Grid::new(config.grid_size)),
            config,
            event_tx,
            event_rx,
        })
    }

    /// The bound address; useful when port 0 was requested
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A handle for stopping the loop: send [`NetworkEvent::Shutdown`]
    pub fn event_sender(&self) -> mpsc::UnboundedSender<NetworkEvent> {
        self.event_tx.clone()
    }

    /// Spawns task that accepts incoming connections
    fn spawn_listener(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        if event_tx
                            .send(NetworkEvent::NewConnection { stream, addr })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Main server loop; returns after a shutdown request
    pub async fn run(mut self) {
        self.spawn_listener();
        info!("Server started successfully");

        while let Some(event) = self.event_rx.recv().await {
            match event {
                NetworkEvent::NewConnection { stream, addr } => {
                    self.handle_connection(stream, addr);
                }
                NetworkEvent::MoveProposed { client_id, p1, p2 } => {
                    self.handle_move(client_id, p1, p2);
                }
                NetworkEvent::StartRequested { client_id } => {
                    info!("Client {} asked to start the game", client_id);
                    self.start_game();
                }
                NetworkEvent::ClientDisconnected { client_id } => {
                    self.handle_disconnect(client_id);
                }
                NetworkEvent::Shutdown => {
                    info!("Server shutting down");
                    break;
                }
            }
        }
    }

    /// Seats a new connection or refuses it
    fn handle_connection(&mut self, mut stream: TcpStream, addr: SocketAddr) {
        let seat = match self.clients.admit(addr) {
            Ok(seat) => seat,
            Err(e) => {
                warn!("Refusing connection from {}: {}", addr, e);
                let refusal = ServerMessage::from(e);
                let write_timeout = self.config.write_timeout;
                tokio::spawn(async move {
                    if let Err(e) = write_message(&mut stream, &refusal, write_timeout).await {
                        debug!("Could not deliver refusal to {}: {}", addr, e);
                    }
                });
                return;
            }
        };

        self.game_state.add_player(seat.id, seat.color);

        let session = Session::new(seat.id, seat.color, addr);
        let outbound = session.spawn(
            stream,
            self.event_tx.clone(),
            self.config.outbound_capacity,
            self.config.write_timeout,
        );
        self.broadcaster.register(seat.id, outbound);
        info!(
            "Client {} ({}) seated as {}, {} of {} seats taken",
            seat.id,
            addr,
            seat.color,
            self.clients.len(),
            self.config.max_players
        );

        if self.clients.is_full() {
            self.start_game();
        }
    }

    /// Closes the lobby and lets the first player move
    fn start_game(&mut self) {
        if let Some(event) = self.game_state.start() {
            self.clients.close();
            let seated: Vec<String> = self
                .clients
                .seats()
                .iter()
                .map(|seat| format!("{}={}", seat.id, seat.color))
                .collect();
            info!("Game started with players [{}]", seated.join(", "));
            self.broadcast_events(vec![event]);
        } else if self.game_state.phase() != Phase::WaitingForPlayers {
            debug!("Ignoring start request, game already started");
        }
    }

    fn handle_move(&mut self, client_id: u32, p1: Point, p2: Point) {
        if !self.broadcaster.contains(client_id) {
            debug!("Ignoring move from detached client {}", client_id);
            return;
        }
        match self.game_state.propose_move(client_id, p1, p2) {
            Ok(events) => self.broadcast_events(events),
            Err(e) => {
                warn!(
                    "Rejected move {:?}-{:?} from client {}: {}",
                    p1, p2, client_id, e
                );
                if self.config.notify_rejections {
                    self.reject(client_id, &e);
                }
            }
        }
    }

    fn reject(&mut self, client_id: u32, reason: &MoveError) {
        let message = ServerMessage::Rejected {
            reason: reason.to_string(),
        };
        self.broadcaster.send_to(client_id, message);
    }

    /// The player keeps their seat; only the broadcast entry goes
    fn handle_disconnect(&mut self, client_id: u32) {
        self.broadcaster.unregister(client_id);
        if let (Some(player), Some(seat)) = (
            self.game_state.player(client_id),
            self.clients.seat(client_id),
        ) {
            info!(
                "Player {} ({}, {}) left with {} points, {} still connected",
                client_id,
                seat.addr,
                player.color,
                player.score,
                self.broadcaster.len()
            );
        }
        if let Some(event) = self.game_state.mark_disconnected(client_id) {
            self.broadcast_events(vec![event]);
        }
    }

    /// Fans out events in order, dropping sessions that cannot keep up
    fn broadcast_events(&mut self, events: Vec<GameEvent>) {
        for event in events {
            let message = to_server_message(event);
            for client_id in self.broadcaster.broadcast(&message) {
                warn!("Dropped client {} from broadcast", client_id);
            }
        }
    }
}

impl From<LobbyError> for ServerMessage {
    fn from(e: LobbyError) -> Self {
        ServerMessage::Refused {
            reason: e.to_string(),
        }
    }
}

pub fn to_server_message(event: GameEvent) -> ServerMessage {
    match event {
        GameEvent::LineDrawn { edge, color } => ServerMessage::line(&edge, color),
        GameEvent::ScoreUpdated { color, score } => ServerMessage::Score { color, score },
        GameEvent::TurnChanged { color } => ServerMessage::Turn { color },
        GameEvent::GameOver { ranking } => ServerMessage::GameOver { ranking },
    }
}
