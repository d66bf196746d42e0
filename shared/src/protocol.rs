//! Line-delimited JSON messages exchanged between server and clients
//!
//! Every message is one JSON object on its own line, discriminated by a
//! `"type"` field. Field names are camelCase so that existing board
//! front-ends can keep parsing them.

use crate::board::{Edge, Point};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest inbound line accepted, newline excluded
pub const MAX_LINE_LENGTH: usize = 4096;

/// Player colors in the order they are handed out
pub const PALETTE: [Color; 4] = [Color::Blue, Color::Red, Color::Yellow, Color::Purple];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Blue,
    Red,
    Yellow,
    Purple,
}

impl Color {
    /// Color for the player seated at `index` (0-based), if the palette has one
    pub fn for_seat(index: usize) -> Option<Self> {
        PALETTE.get(index).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Blue => "blue",
            Color::Red => "red",
            Color::Yellow => "yellow",
            Color::Purple => "purple",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One place in the final standings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankEntry {
    pub client_id: u32,
    pub score: u32,
}

/// Messages a client may send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Proposal to draw the edge between two dots
    Move { x1: i32, y1: i32, x2: i32, y2: i32 },
    /// Older clients propose moves in the same shape the server broadcasts
    #[serde(rename_all = "camelCase")]
    Line {
        start_x: i32,
        start_y: i32,
        end_x: i32,
        end_y: i32,
    },
    /// Start the game with the players seated so far
    Start,
}

impl ClientMessage {
    pub fn move_between(p1: Point, p2: Point) -> Self {
        ClientMessage::Move {
            x1: p1.x,
            y1: p1.y,
            x2: p2.x,
            y2: p2.y,
        }
    }

    /// The two dots of a move proposal, if this is one
    pub fn proposed_points(&self) -> Option<(Point, Point)> {
        match *self {
            ClientMessage::Move { x1, y1, x2, y2 } => Some((Point::new(x1, y1), Point::new(x2, y2))),
            ClientMessage::Line {
                start_x,
                start_y,
                end_x,
                end_y,
            } => Some((Point::new(start_x, start_y), Point::new(end_x, end_y))),
            ClientMessage::Start => None,
        }
    }
}

/// Messages the server sends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Unicast once per connection: the color this player draws with
    Color { color: Color },
    /// An accepted move
    #[serde(rename_all = "camelCase")]
    Line {
        start_x: i32,
        start_y: i32,
        end_x: i32,
        end_y: i32,
        color: Color,
    },
    /// New total for the player who just closed one or more boxes
    Score { color: Color, score: u32 },
    /// Whose move it is now
    Turn { color: Color },
    /// Final standings, best first
    GameOver { ranking: Vec<RankEntry> },
    /// Sent only to the proposer of a move that was not accepted
    Rejected { reason: String },
    /// Sent to a connection that could not be seated, just before closing it
    Refused { reason: String },
}

impl ServerMessage {
    pub fn line(edge: &Edge, color: Color) -> Self {
        ServerMessage::Line {
            start_x: edge.start().x,
            start_y: edge.start().y,
            end_x: edge.end().x,
            end_y: edge.end().y,
            color,
        }
    }
}

/// Serializes a message as a single newline-terminated line
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

/// Parses one line of input, ignoring surrounding whitespace
pub fn decode_line<T: for<'de> Deserialize<'de>>(line: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(line.trim())
}
