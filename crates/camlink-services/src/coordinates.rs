//! Coordinate store: the 2D cursor moved by direction commands.
//!
//! All reads and writes go through one mutex whose critical section covers
//! the whole read-modify-write, so a concurrent move and sync never observe
//! each other half-applied.

use std::sync::{Arc, Mutex, MutexGuard};

use camlink_core::command::Command;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: i64,
    pub y: i64,
}

/// Result of applying a command to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Moved(Coordinates),
    Read(Coordinates),
    /// The command was not a direction; the store is unchanged.
    Unknown { token: String, current: Coordinates },
}

impl Applied {
    pub fn coordinates(&self) -> Coordinates {
        match self {
            Applied::Moved(c) | Applied::Read(c) => *c,
            Applied::Unknown { current, .. } => *current,
        }
    }
}

#[derive(Debug, Default)]
struct CoordinateState {
    position: Coordinates,
    command_count: u64,
}

#[derive(Clone, Default)]
pub struct CoordinateStore {
    state: Arc<Mutex<CoordinateState>>,
}

impl CoordinateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(position: Coordinates) -> Self {
        Self {
            state: Arc::new(Mutex::new(CoordinateState {
                position,
                command_count: 0,
            })),
        }
    }

    /// Apply a parsed command and return the post-command value.
    ///
    /// Every recognized command (moves and syncs) bumps the command counter.
    /// The store itself never fails.
    pub fn apply(&self, command: &Command) -> Applied {
        let mut state = self.lock();
        match command {
            Command::Unknown(token) => Applied::Unknown {
                token: token.clone(),
                current: state.position,
            },
            Command::SyncRequest => {
                state.command_count += 1;
                Applied::Read(state.position)
            }
            _ => {
                if let Some(direction) = command.direction() {
                    let (dx, dy) = direction.delta();
                    state.position.x += dx;
                    state.position.y += dy;
                }
                state.command_count += 1;
                Applied::Moved(state.position)
            }
        }
    }

    pub fn read(&self) -> Coordinates {
        self.lock().position
    }

    /// Overwrite the position. Used by viewers mirroring the producer's store.
    pub fn set(&self, position: Coordinates) {
        self.lock().position = position;
    }

    pub fn command_count(&self) -> u64 {
        self.lock().command_count
    }

    fn lock(&self) -> MutexGuard<'_, CoordinateState> {
        // Updates are single assignments; a poisoned lock still holds a consistent value.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
