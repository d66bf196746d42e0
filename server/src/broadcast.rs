//! Fan-out of server messages to live sessions
//!
//! Each session owns a bounded outbound queue drained by its connection
//! task. Delivery never waits: a queue that is full or closed means the
//! peer is too slow or gone, and that session is dropped from the set.

use log::warn;
use shared::ServerMessage;
use std::collections::BTreeMap;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Outbound queues of every live session, keyed by client id
///
/// Iteration follows client id order, so every peer sees broadcasts
/// queued in the same sequence.
#[derive(Default)]
pub struct Broadcaster {
    outbound: BTreeMap<u32, mpsc::Sender<ServerMessage>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session's outbound queue to the fan-out set
    ///
    /// Registering an id twice replaces the earlier queue.
    pub fn register(&mut self, client_id: u32, sender: mpsc::Sender<ServerMessage>) {
        self.outbound.insert(client_id, sender);
    }

    /// Returns true if the session was registered
    pub fn unregister(&mut self, client_id: u32) -> bool {
        self.outbound.remove(&client_id).is_some()
    }

    /// True while the session is still receiving broadcasts
    pub fn contains(&self, client_id: u32) -> bool {
        self.outbound.contains_key(&client_id)
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.outbound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outbound.is_empty()
    }

    /// Unicast. A failed delivery drops the session; returns whether it was queued.
    pub fn send_to(&mut self, client_id: u32, message: ServerMessage) -> bool {
        let Some(sender) = self.outbound.get(&client_id) else {
            return false;
        };

        if Self::try_deliver(client_id, sender, message) {
            true
        } else {
            self.outbound.remove(&client_id);
            false
        }
    }

    /// Queues `message` for every registered session
    ///
    /// Returns the ids of sessions that could not take it; they have
    /// already been removed.
    pub fn broadcast(&mut self, message: &ServerMessage) -> Vec<u32> {
        let failed: Vec<u32> = self
            .outbound
            .iter()
            .filter(|(id, sender)| !Self::try_deliver(**id, sender, message.clone()))
            .map(|(id, _)| *id)
            .collect();

        for id in &failed {
            self.outbound.remove(id);
        }
        failed
    }

    fn try_deliver(client_id: u32, sender: &mpsc::Sender<ServerMessage>, message: ServerMessage) -> bool {
        match sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Outbound queue for client {} is full, dropping session", client_id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Session {} already closed", client_id);
                false
            }
        }
    }
}
