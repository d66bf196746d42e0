//! Authoritative game state and move validation
//!
//! `GameState` is owned by the server's event loop and is the only thing
//! that mutates edges, boxes, scores or the turn index. Every accepted move
//! yields a list of [`GameEvent`]s for the caller to broadcast.

use log::{debug, info};
use shared::{BoxCell, Color, Edge, GeometryError, Grid, Point, RankEntry};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Lifecycle of a single game
///
/// Moves are only accepted `InProgress`. The game ends `Completed` once
/// every edge on the board is drawn; there is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    WaitingForPlayers,
    InProgress,
    Completed,
}

/// Reasons a move proposal is refused. Only the proposer ever learns of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("invalid move: {0}")]
    InvalidMove(#[from] GeometryError),
    #[error("it is not this player's turn")]
    OutOfTurn,
    #[error("that line has already been drawn")]
    EdgeOccupied,
    #[error("the game is already over")]
    GameAlreadyOver,
}

/// State changes produced by a committed move, in broadcast order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    LineDrawn { edge: Edge, color: Color },
    ScoreUpdated { color: Color, score: u32 },
    TurnChanged { color: Color },
    GameOver { ranking: Vec<RankEntry> },
}

/// A seated player. Seats are never removed once taken.
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: u32,
    pub color: Color,
    pub score: u32,
    pub connected: bool,
}

/// The single authoritative copy of a game
///
/// Holds the drawn edges with their owners, the set of boxes already
/// credited, the seated players and whose turn it is. A box enters
/// `scored` at most once, so no edge can credit it again.
#[derive(Debug, Clone)]
pub struct GameState {
    grid: Grid,
    phase: Phase,
    /// Turn order is seating order
    players: Vec<PlayerState>,
    current_player: usize,
    drawn: HashMap<Edge, Color>,
    scored: HashSet<BoxCell>,
}

impl GameState {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            phase: Phase::WaitingForPlayers,
            players: Vec::new(),
            current_player: 0,
            drawn: HashMap::new(),
            scored: HashSet::new(),
        }
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn players(&self) -> &[PlayerState] {
        &self.players
    }

    pub fn player(&self, client_id: u32) -> Option<&PlayerState> {
        self.players.iter().find(|p| p.id == client_id)
    }

    /// The player allowed to move, or `None` outside `InProgress`
    pub fn current_player(&self) -> Option<&PlayerState> {
        match self.phase {
            Phase::InProgress => self.players.get(self.current_player),
            _ => None,
        }
    }

    /// Color of the player who drew `edge`, if it has been drawn
    pub fn owner_of(&self, edge: &Edge) -> Option<Color> {
        self.drawn.get(edge).copied()
    }

    pub fn drawn_count(&self) -> usize {
        self.drawn.len()
    }

    pub fn scored_count(&self) -> usize {
        self.scored.len()
    }

    /// Seats a player at the end of the turn order
    ///
    /// Only possible before the game starts; returns false otherwise.
    pub fn add_player(&mut self, id: u32, color: Color) -> bool {
        if self.phase != Phase::WaitingForPlayers {
            return false;
        }

        self.players.push(PlayerState {
            id,
            color,
            score: 0,
            connected: true,
        });
        info!("Seated player {} as {}", id, color);
        true
    }

    /// Moves from `WaitingForPlayers` to `InProgress`
    ///
    /// Returns the opening turn announcement, or `None` if the game cannot
    /// start (already started, or nobody seated).
    pub fn start(&mut self) -> Option<GameEvent> {
        if self.phase != Phase::WaitingForPlayers || self.players.is_empty() {
            return None;
        }

        self.phase = Phase::InProgress;
        self.current_player = 0;
        if !self.players[0].connected {
            self.current_player = self.next_connected_after(0).unwrap_or(0);
        }

        let first = &self.players[self.current_player];
        info!(
            "Game started with {} players on a {}x{} grid, player {} ({}) to move",
            self.players.len(),
            self.grid.size(),
            self.grid.size(),
            first.id,
            first.color
        );
        Some(GameEvent::TurnChanged { color: first.color })
    }

    /// Validates and commits one move
    ///
    /// Checks run in order: geometry and bounds, game phase, turn, then
    /// whether the edge is already drawn. On success the edge is recorded,
    /// any boxes it closes are credited to the mover, and the turn passes
    /// (or the game ends when the board is full). The returned events are
    /// in the order they must be broadcast.
    pub fn propose_move(
        &mut self,
        client_id: u32,
        p1: Point,
        p2: Point,
    ) -> Result<Vec<GameEvent>, MoveError> {
        let edge = self.grid.edge(p1, p2)?;

        match self.phase {
            Phase::Completed => return Err(MoveError::GameAlreadyOver),
            Phase::WaitingForPlayers => return Err(MoveError::OutOfTurn),
            Phase::InProgress => {}
        }

        let mover = self.current_player;
        if self.players[mover].id != client_id {
            return Err(MoveError::OutOfTurn);
        }

        if self.drawn.contains_key(&edge) {
            return Err(MoveError::EdgeOccupied);
        }

        let color = self.players[mover].color;
        self.drawn.insert(edge, color);
        debug!("Player {} drew {:?}", client_id, edge);

        let mut events = vec![GameEvent::LineDrawn { edge, color }];

        let mut completed = 0;
        for cell in self.grid.boxes_adjacent_to(&edge) {
            if cell.is_complete(&self.drawn) && self.scored.insert(cell) {
                completed += 1;
            }
        }

        if completed > 0 {
            let player = &mut self.players[mover];
            player.score += completed;
            info!(
                "Player {} closed {} box(es), score now {}",
                player.id, completed, player.score
            );
            events.push(GameEvent::ScoreUpdated {
                color,
                score: player.score,
            });
        }

        if self.drawn.len() == self.grid.total_edges() {
            self.phase = Phase::Completed;
            let ranking = self.ranking();
            info!("Game over, ranking: {:?}", ranking);
            events.push(GameEvent::GameOver { ranking });
        } else if let Some(event) = self.advance_turn() {
            events.push(event);
        }

        Ok(events)
    }

    /// Flags a player as gone. Their seat and score stay; the turn skips them.
    ///
    /// Returns a turn announcement if the disconnected player was the mover
    /// and someone else could take over.
    pub fn mark_disconnected(&mut self, client_id: u32) -> Option<GameEvent> {
        let index = self.players.iter().position(|p| p.id == client_id)?;
        self.players[index].connected = false;
        info!("Player {} disconnected, seat kept", client_id);

        if self.phase == Phase::InProgress && index == self.current_player {
            self.advance_turn()
        } else {
            None
        }
    }

    /// Standings sorted by score, ties kept in seating order
    pub fn ranking(&self) -> Vec<RankEntry> {
        let mut ranking: Vec<RankEntry> = self
            .players
            .iter()
            .map(|p| RankEntry {
                client_id: p.id,
                score: p.score,
            })
            .collect();
        ranking.sort_by(|a, b| b.score.cmp(&a.score));
        ranking
    }

    /// Passes the turn to the next connected player
    fn advance_turn(&mut self) -> Option<GameEvent> {
        let next = self.next_connected_after(self.current_player)?;
        self.current_player = next;
        Some(GameEvent::TurnChanged {
            color: self.players[next].color,
        })
    }

    fn next_connected_after(&self, index: usize) -> Option<usize> {
        let count = self.players.len();
        (1..=count)
            .map(|step| (index + step) % count)
            .find(|&i| self.players[i].connected)
    }
}
