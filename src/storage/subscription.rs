//! Change fan-out for session documents.
//!
//! Each backend owns a `SubscriptionHub` and publishes the full document after
//! every successful write (or `None` after a delete). Subscribers hold a
//! `watch::Receiver`, so a late subscriber immediately sees the current value
//! and a slow one only ever observes the latest document.

use std::collections::HashMap;
use std::sync::Mutex;

use log::debug;
use tokio::sync::watch;

use crate::session_management::session::Session;

pub type SessionWatch = watch::Receiver<Option<Session>>;

#[derive(Default)]
pub struct SubscriptionHub {
    channels: Mutex<HashMap<String, watch::Sender<Option<Session>>>>,
}

impl SubscriptionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers interest in `code`, seeding the channel with `current` if it is new.
    pub fn subscribe(&self, code: &str, current: Option<Session>) -> SessionWatch {
        let mut channels = match self.channels.lock() {
            Ok(c) => c,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(tx) = channels.get(code) {
            return tx.subscribe();
        }
        let (tx, rx) = watch::channel(current);
        channels.insert(code.to_string(), tx);
        debug!("Opened subscription channel for session {}", code);
        rx
    }

    pub fn publish(&self, code: &str, document: Option<Session>) {
        let mut channels = match self.channels.lock() {
            Ok(c) => c,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(tx) = channels.get(code) else { return };
        if tx.receiver_count() == 0 {
            channels.remove(code);
            debug!("Dropped idle subscription channel for session {}", code);
            return;
        }
        let gone = document.is_none();
        tx.send_replace(document);
        if gone {
            channels.remove(code);
        }
    }
}
