//! Keyboard state
//!
//! `KeyboardState` is fed by the embedder (`press`/`release`) and serves
//! both sampling (`KEY ... INTO`) and edge events (`ONKEY`).

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;

use super::{KeyEvent, Keyboard};
use crate::interpreter::types::KeyPhase;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug)]
pub struct KeyboardState {
    down: Mutex<HashSet<String>>,
    events: broadcast::Sender<KeyEvent>,
}

impl Default for KeyboardState {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardState {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            down: Mutex::new(HashSet::new()),
            events,
        }
    }

    pub fn press(&self, key: &str) {
        let newly_down = self
            .down
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string());
        // Auto-repeat does not produce another edge
        if newly_down {
            self.emit(key, KeyPhase::Down);
        }
    }

    pub fn release(&self, key: &str) {
        let was_down = self
            .down
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        if was_down {
            self.emit(key, KeyPhase::Up);
        }
    }

    fn emit(&self, key: &str, phase: KeyPhase) {
        // No subscribers is fine
        let _ = self.events.send(KeyEvent {
            key: key.to_string(),
            phase,
        });
    }
}

impl Keyboard for KeyboardState {
    fn is_key_down(&self, key: &str) -> bool {
        self.down
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<KeyEvent>> {
        Some(self.events.subscribe())
    }
}
