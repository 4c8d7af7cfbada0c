/*
 * Copyright (C) 2026 Mark Wells Dev
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Language client state shared between the owner and the start task.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Readiness of a language client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientState {
    /// Start issued; process spawning or initialize handshake in flight.
    Starting,
    /// Handshake completed, server ready.
    Running,
    /// Stopped, or failed to start.
    Stopped,
}

impl ClientState {
    /// Create from atomic u8 value.
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Starting,
            1 => Self::Running,
            _ => Self::Stopped,
        }
    }

    /// Convert to atomic u8 value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Starting => 0,
            Self::Running => 1,
            Self::Stopped => 2,
        }
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Atomically updated [`ClientState`].
#[derive(Debug)]
pub struct SharedState(AtomicU8);

impl SharedState {
    /// Creates a cell holding `state`.
    #[must_use]
    pub const fn new(state: ClientState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    /// Current state.
    pub fn get(&self) -> ClientState {
        ClientState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Replaces the state.
    pub fn set(&self, state: ClientState) {
        self.0.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Moves `from` to `to`; returns `false` if the state was not `from`.
    pub fn transition(&self, from: ClientState, to: ClientState) -> bool {
        self.0
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u8_conversion() {
        for state in [ClientState::Starting, ClientState::Running, ClientState::Stopped] {
            assert_eq!(ClientState::from_u8(state.as_u8()), state);
        }
        assert_eq!(ClientState::from_u8(200), ClientState::Stopped);
    }

    #[test]
    fn test_transition_only_from_expected_state() {
        let state = SharedState::new(ClientState::Starting);
        assert!(state.transition(ClientState::Starting, ClientState::Running));
        assert_eq!(state.get(), ClientState::Running);

        // A stop that raced ahead of readiness must not be undone.
        state.set(ClientState::Stopped);
        assert!(!state.transition(ClientState::Starting, ClientState::Running));
        assert_eq!(state.get(), ClientState::Stopped);
    }
}
