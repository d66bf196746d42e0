//! Types shared by the Connect Dots server and any client front-end:
//! board geometry in [`board`] and the wire protocol in [`protocol`].

pub mod board;
pub mod protocol;

pub use board::{
    BoxCell, Edge, GeometryError, Grid, Point, DEFAULT_GRID_SIZE, MAX_GRID_SIZE, MIN_GRID_SIZE,
};
pub use protocol::{
    decode_line, encode_line, ClientMessage, Color, RankEntry, ServerMessage, MAX_LINE_LENGTH,
    PALETTE,
};

/// Default TCP port the server listens on
pub const DEFAULT_PORT: u16 = 12345;
