//! Inbound packet queue shared by both channels.
//!
//! The binary transport and the capability-channel fallback both push
//! `InboundPacket`s here; `PacketPump` drains the queue into the packet
//! dispatch table.
//!
//! ## Graceful Shutdown
//!
//! The pump listens for a shutdown signal and dispatches whatever is
//! already queued before stopping.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::domain::messages::InboundPacket;

use super::dispatch::PacketDispatchTable;

/// Producer side of the inbound packet queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PacketQueue {
    tx: mpsc::UnboundedSender<InboundPacket>,
}

/// Consumer side of the inbound packet queue.
#[derive(Debug)]
pub struct PacketReceiver {
    rx: mpsc::UnboundedReceiver<InboundPacket>,
}

impl PacketQueue {
    /// Creates a connected queue/receiver pair.
    pub fn channel() -> (PacketQueue, PacketReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PacketQueue { tx }, PacketReceiver { rx })
    }

    /// Enqueues a packet. Returns false if the consumer is gone.
    pub fn push(&self, packet: InboundPacket) -> bool {
        self.tx.send(packet).is_ok()
    }
}

impl PacketReceiver {
    pub async fn recv(&mut self) -> Option<InboundPacket> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<InboundPacket> {
        self.rx.try_recv().ok()
    }
}

/// Background loop feeding queued packets to the dispatch table.
pub struct PacketPump {
    receiver: PacketReceiver,
    table: Arc<PacketDispatchTable>,
}

impl PacketPump {
    pub fn new(receiver: PacketReceiver, table: Arc<PacketDispatchTable>) -> Self {
        Self { receiver, table }
    }

    /// Runs until shutdown is signalled or every producer has gone away.
    ///
    /// Returns the number of packets dispatched.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> usize {
        let mut dispatched = 0;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        dispatched += self.drain();
                        tracing::debug!(dispatched, "Packet pump stopped");
                        return dispatched;
                    }
                }

                next = self.receiver.recv() => {
                    match next {
                        Some(packet) => {
                            self.table.raise_inbound(packet);
                            dispatched += 1;
                        }
                        None => {
                            tracing::debug!(dispatched, "Packet queue closed");
                            return dispatched;
                        }
                    }
                }
            }
        }
    }

    /// Dispatches everything currently queued without waiting.
    pub fn drain(&mut self) -> usize {
        let mut dispatched = 0;
        while let Some(packet) = self.receiver.try_recv() {
            self.table.raise_inbound(packet);
            dispatched += 1;
        }
        dispatched
    }
}
