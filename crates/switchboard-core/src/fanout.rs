// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscriber fan-out for transport events.
//!
//! Transports publish events from their own tasks, possibly before the
//! session has subscribed. [`EventFanout`] buffers those early events and
//! replays them to the first subscriber.

use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::debug;

use crate::types::TransportEvent;

#[derive(Default)]
struct FanoutState {
    subscribers: Vec<mpsc::UnboundedSender<TransportEvent>>,
    backlog: Vec<TransportEvent>,
    subscribed_once: bool,
}

/// Multi-subscriber event sink with an initial backlog.
#[derive(Default)]
pub struct EventFanout {
    state: Mutex<FanoutState>,
}

impl EventFanout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a subscriber. The first subscriber receives the backlog.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<TransportEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.subscribed_once {
            state.subscribed_once = true;
            for event in state.backlog.drain(..) {
                let _ = tx.send(event);
            }
        }
        state.subscribers.push(tx);
        rx
    }

    /// Delivers `event` to every live subscriber, dropping closed ones.
    pub fn publish(&self, event: TransportEvent) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.subscribed_once {
            state.backlog.push(event);
            return;
        }
        state
            .subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
        if state.subscribers.is_empty() {
            debug!("transport event dropped, no live subscribers");
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConnectionUpdate;

    #[tokio::test]
    async fn backlog_is_replayed_to_first_subscriber() {
        let fanout = EventFanout::new();
        fanout.publish(TransportEvent::ConnectionUpdate(ConnectionUpdate::qr("abc")));

        let mut rx = fanout.subscribe();
        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            TransportEvent::ConnectionUpdate(ConnectionUpdate::qr("abc"))
        );
    }

    #[tokio::test]
    async fn dropped_subscribers_are_pruned() {
        let fanout = EventFanout::new();
        let rx1 = fanout.subscribe();
        let mut rx2 = fanout.subscribe();
        assert_eq!(fanout.subscriber_count(), 2);

        drop(rx1);
        fanout.publish(TransportEvent::ConnectionUpdate(ConnectionUpdate::open()));
        assert_eq!(fanout.subscriber_count(), 1);
        assert!(rx2.recv().await.is_some());
    }
}
