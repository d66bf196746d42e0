//! Bare-bones terminal client for poking at a running server.
//!
//! Prints every line the server sends. Reads commands from stdin:
//! `x1 y1 x2 y2` proposes a move, `start` starts the game early.

use clap::Parser;
use shared::{decode_line, encode_line, ClientMessage, Point, ServerMessage, DEFAULT_PORT};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[derive(Parser, Debug)]
#[command(author, version, about = "Terminal client for the Connect Dots server")]
struct Args {
    /// Server address to connect to
    #[arg(short, long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,
}

fn parse_command(input: &str) -> Option<ClientMessage> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("start") {
        return Some(ClientMessage::Start);
    }

    let numbers: Vec<i32> = input
        .split_whitespace()
        .map(str::parse::<i32>)
        .collect::<Result<_, _>>()
        .ok()?;
    match numbers.as_slice() {
        [x1, y1, x2, y2] => Some(ClientMessage::move_between(
            Point::new(*x1, *y1),
            Point::new(*x2, *y2),
        )),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let stream = TcpStream::connect(&args.server).await?;
    println!("Connected to {}", args.server);
    println!("Type `x1 y1 x2 y2` to draw a line or `start` to begin");

    let (read_half, mut write_half) = stream.into_split();
    let mut server_lines = BufReader::new(read_half).lines();
    let mut stdin_lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = server_lines.next_line() => match line? {
                Some(line) => match decode_line::<ServerMessage>(&line) {
                    Ok(message) => println!("<- {:?}", message),
                    Err(_) => println!("<- (unparsed) {}", line),
                },
                None => {
                    println!("Server closed the connection");
                    break;
                }
            },

            input = stdin_lines.next_line() => match input? {
                Some(input) => match parse_command(&input) {
                    Some(message) => {
                        write_half.write_all(encode_line(&message)?.as_bytes()).await?;
                    }
                    None => println!("Expected `x1 y1 x2 y2` or `start`"),
                },
                None => break,
            },
        }
    }

    Ok(())
}
