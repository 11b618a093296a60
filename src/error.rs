//! Error taxonomy for the race engine.
//!
//! Per-car failures are contained at the per-car boundary: nothing here
//! aborts a whole session, and nothing is process-fatal.

use thiserror::Error;

use crate::backends::BackendError;
use crate::model::CarId;

#[derive(Debug, Error)]
pub enum RaceError {
    /// Start-parameter fetch failed; the car is excluded from the current
    /// race attempt while the others proceed.
    #[error("engine unavailable for car {car}: {source}")]
    EngineUnavailable {
        car: CarId,
        #[source]
        source: BackendError,
    },

    /// Mid-run health signal; cancels only the affected car's animation.
    #[error("health check failed for car {car}")]
    HealthCheckFailed { car: CarId },

    /// The remote stop request failed. Local cancellation and position reset
    /// have already taken effect by the time this surfaces.
    #[error("stop request failed for car {car}: {source}")]
    StopRequestFailed {
        car: CarId,
        #[source]
        source: BackendError,
    },

    /// The race result was not persisted; the in-memory winner display is
    /// unaffected.
    #[error("winner sync failed for car {car}: {source}")]
    WinnerSyncFailed {
        car: CarId,
        #[source]
        source: BackendError,
    },

    /// A race over zero eligible cars is rejected before any remote call.
    #[error("race requires at least one participant")]
    NoParticipants,
}
