//! Integration tests for the networked game
//!
//! These tests run a real server on an ephemeral port and talk to it over
//! TCP exactly like a board front-end would.

use server::network::{NetworkEvent, Server, ServerConfig};
use shared::{decode_line, encode_line, ClientMessage, Color, Grid, Point, RankEntry, ServerMessage};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);
const SILENCE: Duration = Duration::from_millis(150);

struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("Failed to connect");
        let (read_half, writer) = stream.into_split();
        Self {
            lines: BufReader::new(read_half).lines(),
            writer,
        }
    }

    /// Connects and consumes the color greeting
    async fn join(addr: SocketAddr) -> (Self, Color) {
        let mut client = Self::connect(addr).await;
        match client.recv().await {
            ServerMessage::Color { color } => (client, color),
            other => panic!("Expected color first, got {:?}", other),
        }
    }

    async fn recv(&mut self) -> ServerMessage {
        let line = timeout(RECV_TIMEOUT, self.lines.next_line())
            .await
            .expect("Timed out waiting for server")
            .expect("Read failed")
            .expect("Server closed the connection");
        decode_line(&line).expect("Server sent malformed line")
    }

    async fn expect_silence(&mut self) {
        let result = timeout(SILENCE, self.lines.next_line()).await;
        assert!(result.is_err(), "Unexpected message: {:?}", result);
    }

    async fn send_raw(&mut self, raw: &str) {
        self.writer.write_all(raw.as_bytes()).await.unwrap();
    }

    async fn send(&mut self, message: &ClientMessage) {
        let line = encode_line(message).unwrap();
        self.send_raw(&line).await;
    }

    async fn draw(&mut self, x1: i32, y1: i32, x2: i32, y2: i32) {
        self.send(&ClientMessage::move_between(Point::new(x1, y1), Point::new(x2, y2)))
            .await;
    }
}

async fn start_server(config: ServerConfig) -> (SocketAddr, UnboundedSender<NetworkEvent>) {
    let config = ServerConfig {
        port: 0,
        ..config
    };
    let server = Server::new(config).await.expect("Failed to start server");
    let addr = server.local_addr();
    let events = server.event_sender();
    tokio::spawn(server.run());
    (addr, events)
}

fn line(x1: i32, y1: i32, x2: i32, y2: i32, color: Color) -> ServerMessage {
    ServerMessage::Line {
        start_x: x1,
        start_y: y1,
        end_x: x2,
        end_y: y2,
        color,
    }
}

/// Seats two players in a default game and consumes the opening turn
async fn two_player_game(config: ServerConfig) -> (TestClient, TestClient) {
    let (addr, _events) = start_server(config).await;
    let (mut a, color_a) = TestClient::join(addr).await;
    let (mut b, color_b) = TestClient::join(addr).await;
    assert_eq!(color_a, Color::Blue);
    assert_eq!(color_b, Color::Red);

    let opening = ServerMessage::Turn { color: Color::Blue };
    assert_eq!(a.recv().await, opening);
    assert_eq!(b.recv().await, opening);
    (a, b)
}

/// LOBBY TESTS
mod lobby_tests {
    use super::*;

    #[tokio::test]
    async fn colors_follow_connection_order() {
        let config = ServerConfig {
            max_players: 4,
            ..ServerConfig::default()
        };
        let (addr, _events) = start_server(config).await;

        let mut colors = Vec::new();
        let mut clients = Vec::new();
        for _ in 0..4 {
            let (client, color) = TestClient::join(addr).await;
            colors.push(color);
            clients.push(client);
        }
        assert_eq!(colors, vec![Color::Blue, Color::Red, Color::Yellow, Color::Purple]);

        for client in &mut clients {
            assert_eq!(client.recv().await, ServerMessage::Turn { color: Color::Blue });
        }
    }

    #[tokio::test]
    async fn no_moves_before_game_starts() {
        let (addr, _events) = start_server(ServerConfig::default()).await;
        let (mut a, _) = TestClient::join(addr).await;

        a.draw(1, 1, 2, 1).await;
        a.expect_silence().await;
    }

    #[tokio::test]
    async fn connection_after_start_is_refused() {
        let (addr, _events) = start_server(ServerConfig::default()).await;
        let (_a, _) = TestClient::join(addr).await;
        let (_b, _) = TestClient::join(addr).await;

        let mut late = TestClient::connect(addr).await;
        assert!(matches!(late.recv().await, ServerMessage::Refused { .. }));
        let closed = timeout(RECV_TIMEOUT, late.lines.next_line()).await.unwrap();
        assert!(matches!(closed, Ok(None) | Err(_)));
    }

    #[tokio::test]
    async fn explicit_start_with_partial_lobby() {
        let config = ServerConfig {
            max_players: 4,
            ..ServerConfig::default()
        };
        let (addr, _events) = start_server(config).await;
        let (mut a, _) = TestClient::join(addr).await;
        let (mut b, _) = TestClient::join(addr).await;

        b.send(&ClientMessage::Start).await;
        assert_eq!(a.recv().await, ServerMessage::Turn { color: Color::Blue });
        assert_eq!(b.recv().await, ServerMessage::Turn { color: Color::Blue });

        let mut late = TestClient::connect(addr).await;
        assert_eq!(
            late.recv().await,
            ServerMessage::Refused {
                reason: "game already started".to_string()
            }
        );

        // Turn order only covers the two seated players
        a.draw(1, 1, 2, 1).await;
        assert_eq!(b.recv().await, line(1, 1, 2, 1, Color::Blue));
        assert_eq!(b.recv().await, ServerMessage::Turn { color: Color::Red });
    }
}

/// GAMEPLAY TESTS
mod gameplay_tests {
    use super::*;

    #[tokio::test]
    async fn two_player_scenario() {
        let (mut a, mut b) = two_player_game(ServerConfig::default()).await;

        // A draws the top of box (1,1)
        a.draw(1, 1, 2, 1).await;
        for client in [&mut a, &mut b] {
            assert_eq!(client.recv().await, line(1, 1, 2, 1, Color::Blue));
            assert_eq!(client.recv().await, ServerMessage::Turn { color: Color::Red });
        }

        // B repeats it, reversed: rejected, nothing broadcast
        b.draw(2, 1, 1, 1).await;
        // A is out of turn
        a.draw(1, 1, 1, 2).await;
        // Diagonal
        b.draw(1, 1, 2, 2).await;

        b.draw(1, 1, 1, 2).await;
        for client in [&mut a, &mut b] {
            assert_eq!(client.recv().await, line(1, 1, 1, 2, Color::Red));
            assert_eq!(client.recv().await, ServerMessage::Turn { color: Color::Blue });
        }

        a.draw(2, 2, 2, 1).await;
        for client in [&mut a, &mut b] {
            assert_eq!(client.recv().await, line(2, 1, 2, 2, Color::Blue));
            assert_eq!(client.recv().await, ServerMessage::Turn { color: Color::Red });
        }

        // B closes the box and scores; the turn still passes
        b.draw(1, 2, 2, 2).await;
        for client in [&mut a, &mut b] {
            assert_eq!(client.recv().await, line(1, 2, 2, 2, Color::Red));
            assert_eq!(
                client.recv().await,
                ServerMessage::Score {
                    color: Color::Red,
                    score: 1
                }
            );
            assert_eq!(client.recv().await, ServerMessage::Turn { color: Color::Blue });
        }

        a.expect_silence().await;
        b.expect_silence().await;
    }

    #[tokio::test]
    async fn malformed_input_is_not_fatal() {
        let (mut a, mut b) = two_player_game(ServerConfig::default()).await;

        a.send_raw("this is not json\n").await;
        a.send_raw("{\"type\":\"warp\",\"x\":1}\n").await;
        a.send_raw("\n").await;
        a.send_raw("{\"type\":\"line\",\"startX\":3,\"startY\":4,\"endX\":4,\"endY\":4,\"color\":\"red\"}\n")
            .await;

        // The legacy proposal is drawn in the mover's color, not the claimed one
        assert_eq!(b.recv().await, line(3, 4, 4, 4, Color::Blue));
        assert_eq!(a.recv().await, line(3, 4, 4, 4, Color::Blue));
    }

    #[tokio::test]
    async fn full_game_ends_with_single_gameover() {
        let (mut a, mut b) = two_player_game(ServerConfig::default()).await;
        let edges = Grid::new(4).all_edges();
        assert_eq!(edges.len(), 24);

        let mut to_move = Color::Blue;
        let mut game_overs = Vec::new();
        let mut lines_seen = 0;

        for (i, edge) in edges.iter().enumerate() {
            let mover = if to_move == Color::Blue { &mut a } else { &mut b };
            mover
                .draw(edge.start().x, edge.start().y, edge.end().x, edge.end().y)
                .await;

            // Both clients see the same sequence; follow A and mirror on B
            loop {
                let message = a.recv().await;
                assert_eq!(b.recv().await, message);
                match message {
                    ServerMessage::Line { .. } => lines_seen += 1,
                    ServerMessage::Score { .. } => {}
                    ServerMessage::Turn { color } => {
                        assert!(i < 23, "Turn announced after the last edge");
                        to_move = color;
                        break;
                    }
                    ServerMessage::GameOver { ranking } => {
                        game_overs.push(ranking);
                        break;
                    }
                    other => panic!("Unexpected message {:?}", other),
                }
            }
            if i < 23 {
                assert!(game_overs.is_empty(), "Game ended early at edge {}", i + 1);
            }
        }

        assert_eq!(lines_seen, 24);
        assert_eq!(game_overs.len(), 1);

        let ranking: &Vec<RankEntry> = &game_overs[0];
        assert_eq!(ranking.len(), 2);
        assert!(ranking[0].score >= ranking[1].score);
        assert_eq!(ranking[0].score + ranking[1].score, 9);

        // The game is over: further moves are ignored
        a.draw(1, 1, 2, 1).await;
        b.draw(1, 1, 2, 1).await;
        a.expect_silence().await;
        b.expect_silence().await;
    }

    #[tokio::test]
    async fn rejection_replies_go_only_to_the_proposer() {
        let config = ServerConfig {
            notify_rejections: true,
            ..ServerConfig::default()
        };
        let (mut a, mut b) = two_player_game(config).await;

        b.draw(1, 1, 2, 1).await;
        assert!(matches!(b.recv().await, ServerMessage::Rejected { .. }));

        a.draw(1, 1, 3, 1).await;
        assert!(matches!(a.recv().await, ServerMessage::Rejected { .. }));

        a.draw(1, 1, 2, 1).await;
        // B's first broadcast is the line, so it never saw A's rejection
        assert_eq!(b.recv().await, line(1, 1, 2, 1, Color::Blue));
        assert_eq!(a.recv().await, line(1, 1, 2, 1, Color::Blue));
    }
}

/// CONNECTION LIFECYCLE TESTS
mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn mover_disconnect_passes_turn() {
        let (a, mut b) = two_player_game(ServerConfig::default()).await;

        drop(a);
        assert_eq!(b.recv().await, ServerMessage::Turn { color: Color::Red });

        // B is the only connected player and keeps the turn
        b.draw(1, 1, 2, 1).await;
        assert_eq!(b.recv().await, line(1, 1, 2, 1, Color::Red));
        assert_eq!(b.recv().await, ServerMessage::Turn { color: Color::Red });
    }

    #[tokio::test]
    async fn shutdown_closes_sessions() {
        let (addr, events) = start_server(ServerConfig::default()).await;
        let (mut a, _) = TestClient::join(addr).await;

        events.send(NetworkEvent::Shutdown).unwrap();

        // Stopping the loop drops every outbound queue, which closes sessions
        let closed = timeout(RECV_TIMEOUT, a.lines.next_line())
            .await
            .expect("Connection left open after shutdown");
        assert!(matches!(closed, Ok(None) | Err(_)));
    }
}
