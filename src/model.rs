//! Core data model shared across the engine.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Server-assigned identifier of a race participant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CarId(pub i64);

impl fmt::Display for CarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A race participant. Owned by the remote store; the engine only holds a
/// read-only cached copy for the current race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    pub id: CarId,
    pub name: String,
    pub color: String,
}

/// Computed duration/distance pair driving one animation run.
///
/// Ephemeral: recomputed on every start attempt, never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionDescriptor {
    pub car_id: CarId,
    /// Time to traverse the full distance at the reported velocity. Zero
    /// means instantaneous completion.
    pub duration_ms: f64,
    /// Pixel-space travel distance toward the finish marker.
    pub distance_px: f64,
}

/// Persisted win-count/best-time aggregate per car.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinnerRecord {
    pub car_id: CarId,
    pub wins: u32,
    pub best_time_sec: f64,
}

/// The elected winner of a race session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Winner {
    pub car_id: CarId,
    pub elapsed_ms: f64,
}

/// Bounded context of one race attempt over a fixed participant set.
///
/// `winner` transitions from `None` to `Some` exactly once; the session is
/// torn down on reset or replaced when a new race starts.
#[derive(Debug, Clone)]
pub struct RaceSession {
    pub race_id: Uuid,
    pub participants: HashSet<CarId>,
    /// Handle-generation watermark taken when the session opened. Finish
    /// reports at or below it come from runs that predate this session.
    pub generation_floor: u64,
    pub winner: Option<Winner>,
}

impl RaceSession {
    pub fn new(participants: impl IntoIterator<Item = CarId>, generation_floor: u64) -> Self {
        Self {
            race_id: Uuid::new_v4(),
            participants: participants.into_iter().collect(),
            generation_floor,
            winner: None,
        }
    }
}
