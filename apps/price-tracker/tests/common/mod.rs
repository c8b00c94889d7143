//! Shared test fixtures: an in-memory transport scripted over a channel.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use price_tracker::{FeedTransport, TransportEvent};
use tokio::sync::mpsc;

/// Transport whose events are pushed by the test through a channel.
///
/// `next_event` waits while the channel is empty, like a quiet socket.
pub struct ChannelTransport {
    rx: mpsc::UnboundedReceiver<TransportEvent>,
    open: bool,
    pub connects: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedSender<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            rx,
            open: false,
            connects: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
        };
        (transport, tx)
    }
}

#[async_trait]
impl FeedTransport for ChannelTransport {
    async fn connect(&mut self) {
        self.connects.fetch_add(1, Ordering::SeqCst);
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        let event = self.rx.recv().await?;
        match &event {
            TransportEvent::Open => self.open = true,
            TransportEvent::Error(_) | TransportEvent::Close { .. } => self.open = false,
            TransportEvent::Message(_) => {}
        }
        Some(event)
    }

    async fn close(&mut self) {
        self.open = false;
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

pub fn close_event() -> TransportEvent {
    TransportEvent::Close {
        code: Some(1000),
        reason: "normal".to_string(),
    }
}

pub fn message(json: &str) -> TransportEvent {
    TransportEvent::message(json)
}
