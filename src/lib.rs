//! Raceline - asynchronous race coordination and animation engine.
//!
//! Drives a multi-car race: per-car asynchronous engine starts, a
//! continuous cancellable animation clock per car, mid-run health polling
//! with per-car fault containment, first-to-finish winner arbitration and
//! idempotent winner-ledger synchronization. Rendering and persistence are
//! external collaborators reached only through the event bus and the
//! backend traits.

pub mod arbiter;
pub mod backends;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod kinematics;
pub mod ledger;
pub mod model;
pub mod supervisor;

pub use arbiter::{Election, FinishArbiter};
pub use backends::{
    BackendError, BackendResult, EngineBackend, FaultInjectingBackend, HealthStatus,
    MemoryBackend, StartParameters, WinnerBackend,
};
pub use clock::{AnimationClock, AnimationHandle, FinishReport};
pub use config::RaceConfig;
pub use error::RaceError;
pub use events::{event_channel, EventReceiver, EventSender, RaceEvent};
pub use kinematics::TrackGeometry;
pub use ledger::WinnerLedger;
pub use model::{Car, CarId, MotionDescriptor, RaceSession, Winner, WinnerRecord};
pub use supervisor::{RaceEntrant, RaceSupervisor};
