//! Per-connection session task
//!
//! A session owns one TCP connection. It decodes one client message per
//! line and forwards it to the server loop, and it writes whatever the
//! broadcaster queues for it. Malformed input is logged and skipped. The
//! session ends when the peer closes the stream, a read or write fails, a
//! line runs past [`MAX_LINE_LENGTH`], or the broadcaster drops its queue.

use crate::network::NetworkEvent;
use log::{debug, error, info, warn};
use shared::{decode_line, encode_line, ClientMessage, Color, ServerMessage, MAX_LINE_LENGTH};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// A seated player's connection, before its task is started
#[derive(Debug, Clone)]
pub struct Session {
    pub client_id: u32,
    pub color: Color,
    pub addr: SocketAddr,
}

impl Session {
    /// Describes a freshly seated connection; nothing runs until [`spawn`](Self::spawn)
    pub fn new(client_id: u32, color: Color, addr: SocketAddr) -> Self {
        Self {
            client_id,
            color,
            addr,
        }
    }

    /// Starts the connection task and returns its outbound queue
    ///
    /// The player's color is queued first, so it is the first line the
    /// peer receives.
    pub fn spawn(
        self,
        stream: TcpStream,
        events: mpsc::UnboundedSender<NetworkEvent>,
        outbound_capacity: usize,
        write_timeout: Duration,
    ) -> mpsc::Sender<ServerMessage> {
        let (tx, rx) = mpsc::channel(outbound_capacity.max(1));
        if tx.try_send(ServerMessage::Color { color: self.color }).is_err() {
            warn!("Could not queue color for client {}", self.client_id);
        }

        let (read_half, write_half) = stream.into_split();
        tokio::spawn(async move {
            run_session(
                self.client_id,
                BufReader::new(read_half),
                write_half,
                rx,
                events,
                write_timeout,
            )
            .await;
            info!(
                "Session for client {} ({}, {}) ended",
                self.client_id, self.addr, self.color
            );
        });

        tx
    }
}

/// Drives one session until either direction of the connection ends
pub async fn run_session<R, W>(
    client_id: u32,
    reader: R,
    mut writer: W,
    mut outbound: mpsc::Receiver<ServerMessage>,
    events: mpsc::UnboundedSender<NetworkEvent>,
    write_timeout: Duration,
) where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = reader;
    let mut pending = Vec::new();

    loop {
        tokio::select! {
            line = read_line(&mut reader, &mut pending) => match line {
                Ok(Some(line)) => {
                    if !forward_line(client_id, &line, &events) {
                        break;
                    }
                }
                Ok(None) => {
                    info!("Client {} closed the connection", client_id);
                    break;
                }
                Err(e) => {
                    warn!("Read error from client {}: {}", client_id, e);
                    break;
                }
            },

            message = outbound.recv() => match message {
                Some(message) => {
                    if let Err(e) = write_message(&mut writer, &message, write_timeout).await {
                        error!("Failed to send to client {}: {}", client_id, e);
                        break;
                    }
                }
                None => {
                    debug!("Outbound queue for client {} closed", client_id);
                    break;
                }
            },
        }
    }

    let _ = timeout(write_timeout, writer.shutdown()).await;
    let _ = events.send(NetworkEvent::ClientDisconnected { client_id });
}

/// Reads the next newline-terminated line, refusing lines longer than
/// [`MAX_LINE_LENGTH`]
///
/// Partial input stays in `pending`, so the call can be dropped inside
/// `select!` and resumed later. A final line without a newline is returned
/// before end of stream is reported.
async fn read_line<R>(reader: &mut R, pending: &mut Vec<u8>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let limit = (MAX_LINE_LENGTH + 1).saturating_sub(pending.len()) as u64;
        let read = (&mut *reader).take(limit).read_until(b'\n', pending).await?;

        let complete = pending.last() == Some(&b'\n');
        if !complete && pending.len() > MAX_LINE_LENGTH {
            pending.clear();
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line longer than {} bytes", MAX_LINE_LENGTH),
            ));
        }
        if complete || (read == 0 && !pending.is_empty()) {
            let line = String::from_utf8_lossy(pending.as_slice())
                .trim_end_matches(['\r', '\n'])
                .to_string();
            pending.clear();
            return Ok(Some(line));
        }
        if read == 0 {
            return Ok(None);
        }
    }
}

/// Decodes one inbound line and hands it to the server loop
///
/// Returns false once the server loop has gone away.
fn forward_line(
    client_id: u32,
    line: &str,
    events: &mpsc::UnboundedSender<NetworkEvent>,
) -> bool {
    if line.trim().is_empty() {
        return true;
    }

    let message = match decode_line::<ClientMessage>(line) {
        Ok(message) => message,
        Err(e) => {
            warn!("Discarding malformed line from client {}: {}", client_id, e);
            return true;
        }
    };

    let event = match message.proposed_points() {
        Some((p1, p2)) => NetworkEvent::MoveProposed { client_id, p1, p2 },
        None => NetworkEvent::StartRequested { client_id },
    };

    events.send(event).is_ok()
}

/// Writes one message as a line, giving up after `write_timeout`
pub async fn write_message<W>(
    writer: &mut W,
    message: &ServerMessage,
    write_timeout: Duration,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let line = encode_line(message).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let write = async {
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await
    };

    match timeout(write_timeout, write).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out")),
    }
}
