//! Backend traits for the external engine-control and winner-store
//! collaborators.
//!
//! The engine never talks to a concrete transport; everything behind these
//! traits is an opaque request/response API.

mod fault;
mod memory;

pub use fault::FaultInjectingBackend;
pub use memory::MemoryBackend;

use crate::model::{CarId, WinnerRecord};

/// The common backend error.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("{0}")]
    Message(String),
}

/// Utility type alias for backend results.
pub type BackendResult<T> = Result<T, BackendError>;

/// Engine-start parameters reported by the remote engine control.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StartParameters {
    pub velocity: f64,
    pub distance: f64,
}

/// Result of one engine health poll. Transport failures degrade to
/// `success = false`; the poll itself never errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthStatus {
    pub success: bool,
}

/// Remote engine-control operations for one car.
#[async_trait::async_trait]
pub trait EngineBackend: Send + Sync {
    async fn fetch_start_parameters(&self, car_id: CarId) -> BackendResult<StartParameters>;

    async fn fetch_stop_acknowledgement(&self, car_id: CarId) -> BackendResult<()>;

    async fn poll_health(&self, car_id: CarId) -> HealthStatus;
}

/// Remote winner-record store, keyed by car id.
#[async_trait::async_trait]
pub trait WinnerBackend: Send + Sync {
    async fn fetch_winner_record(&self, car_id: CarId) -> BackendResult<Option<WinnerRecord>>;

    async fn create_winner_record(&self, record: &WinnerRecord) -> BackendResult<()>;

    async fn update_winner_record(
        &self,
        car_id: CarId,
        wins: u32,
        best_time_sec: f64,
    ) -> BackendResult<()>;
}
