// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event bus for daemon communication.
//!
//! The EventBus writes events to WAL before notifying the engine,
//! enabling crash recovery via snapshot + replay. Events are buffered
//! in memory and periodically flushed to disk (~10ms durability
//! window).

use pulse_core::Event;
use pulse_storage::{Wal, WalEntry, WalError};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Event bus backed by WAL.
///
/// Events are written to WAL (buffered) before notifying the engine.
/// This provides durability with group commit for performance.
#[derive(Clone)]
pub struct EventBus {
    wal: Arc<Mutex<Wal>>,
    wake_tx: mpsc::Sender<()>,
}

/// Reader for the event bus.
///
/// Used by the engine loop to process events from WAL.
pub struct EventReader {
    wal: Arc<Mutex<Wal>>,
    wake_rx: mpsc::Receiver<()>,
}

impl EventBus {
    /// Create a new event bus backed by the given WAL.
    ///
    /// Returns both the bus (for sending) and reader (for receiving).
    pub fn new(wal: Wal) -> (Self, EventReader) {
        let wal = Arc::new(Mutex::new(wal));
        let (wake_tx, wake_rx) = mpsc::channel(1);

        (
            Self {
                wal: Arc::clone(&wal),
                wake_tx,
            },
            EventReader { wal, wake_rx },
        )
    }

    /// Append event to WAL (buffered, not yet durable).
    ///
    /// Returns the assigned sequence number. Call `flush()` to make
    /// durable.
    pub fn send(&self, event: Event) -> Result<u64, WalError> {
        let seq = {
            let mut wal = self.wal.lock();
            wal.append(&event)?
        };
        // Non-blocking wake - if channel is full, engine is already awake
        let _ = self.wake_tx.try_send(());
        Ok(seq)
    }

    /// Flush WAL to disk with single fsync.
    pub fn flush(&self) -> Result<(), WalError> {
        let mut wal = self.wal.lock();
        wal.flush()
    }

    /// Check if WAL needs flushing (interval elapsed or buffer full).
    pub fn needs_flush(&self) -> bool {
        let wal = self.wal.lock();
        wal.needs_flush()
    }

    /// Return the last processed WAL sequence number.
    pub fn processed_seq(&self) -> u64 {
        let wal = self.wal.lock();
        wal.processed_seq()
    }

    /// Truncate WAL entries already covered by a snapshot.
    pub fn truncate_before(&self, seq: u64) -> Result<(), WalError> {
        let mut wal = self.wal.lock();
        wal.truncate_before(seq)
    }
}

impl EventReader {
    /// Wait for and return next unprocessed event.
    ///
    /// Returns `None` when the bus is closed (all senders dropped).
    pub async fn recv(&mut self) -> Result<Option<WalEntry>, WalError> {
        loop {
            {
                let mut wal = self.wal.lock();
                if let Some(entry) = wal.next_unprocessed()? {
                    return Ok(Some(entry));
                }
            }

            if self.wake_rx.recv().await.is_none() {
                return Ok(None);
            }
        }
    }

    /// Mark an entry as processed.
    ///
    /// Updates the in-memory processed_seq; persistence happens via
    /// snapshots.
    pub fn mark_processed(&self, seq: u64) {
        let mut wal = self.wal.lock();
        wal.mark_processed(seq);
    }
}

/// Spawn a task forwarding runtime events into the bus.
///
/// The engine emits through an mpsc channel; this task reads it and
/// appends to the WAL, flushing each drained batch so engine-produced
/// events survive a crash immediately.
pub fn spawn_event_forwarder(mut rx: mpsc::Receiver<Event>, event_bus: EventBus) {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if event_bus.send(event).is_err() {
                tracing::warn!("Failed to forward runtime event to WAL");
                continue;
            }

            // Drain any additional buffered events before flushing
            while let Ok(event) = rx.try_recv() {
                if event_bus.send(event).is_err() {
                    tracing::warn!("Failed to forward runtime event to WAL");
                }
            }

            if let Err(e) = event_bus.flush() {
                tracing::error!("Failed to flush runtime events: {}", e);
            }
        }
    });
}
