//! Fault-injecting backend wrapper for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use crate::model::{CarId, WinnerRecord};

use super::{
    BackendError, BackendResult, EngineBackend, HealthStatus, MemoryBackend, StartParameters,
    WinnerBackend,
};

/// Wraps a [`MemoryBackend`] with per-operation failure switches so tests can
/// exercise the degraded paths without a real transport.
#[derive(Clone)]
pub struct FaultInjectingBackend {
    inner: MemoryBackend,
    fail_start_parameters: Arc<AtomicBool>,
    fail_stop_requests: Arc<AtomicBool>,
    fail_winner_writes: Arc<AtomicBool>,
    winner_fetch_calls: Arc<AtomicUsize>,
}

impl FaultInjectingBackend {
    pub fn new(inner: MemoryBackend) -> Self {
        Self {
            inner,
            fail_start_parameters: Arc::new(AtomicBool::new(false)),
            fail_stop_requests: Arc::new(AtomicBool::new(false)),
            fail_winner_writes: Arc::new(AtomicBool::new(false)),
            winner_fetch_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn inner(&self) -> &MemoryBackend {
        &self.inner
    }

    pub fn set_fail_start_parameters(&self, fail: bool) {
        self.fail_start_parameters
            .store(fail, AtomicOrdering::SeqCst);
    }

    pub fn set_fail_stop_requests(&self, fail: bool) {
        self.fail_stop_requests.store(fail, AtomicOrdering::SeqCst);
    }

    pub fn set_fail_winner_writes(&self, fail: bool) {
        self.fail_winner_writes.store(fail, AtomicOrdering::SeqCst);
    }

    pub fn winner_fetch_calls(&self) -> usize {
        self.winner_fetch_calls.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait::async_trait]
impl EngineBackend for FaultInjectingBackend {
    async fn fetch_start_parameters(&self, car_id: CarId) -> BackendResult<StartParameters> {
        if self.fail_start_parameters.load(AtomicOrdering::SeqCst) {
            return Err(BackendError::Message("injected engine outage".to_string()));
        }
        self.inner.fetch_start_parameters(car_id).await
    }

    async fn fetch_stop_acknowledgement(&self, car_id: CarId) -> BackendResult<()> {
        if self.fail_stop_requests.load(AtomicOrdering::SeqCst) {
            return Err(BackendError::Message("injected stop failure".to_string()));
        }
        self.inner.fetch_stop_acknowledgement(car_id).await
    }

    async fn poll_health(&self, car_id: CarId) -> HealthStatus {
        self.inner.poll_health(car_id).await
    }
}

#[async_trait::async_trait]
impl WinnerBackend for FaultInjectingBackend {
    async fn fetch_winner_record(&self, car_id: CarId) -> BackendResult<Option<WinnerRecord>> {
        self.winner_fetch_calls.fetch_add(1, AtomicOrdering::SeqCst);
        if self.fail_winner_writes.load(AtomicOrdering::SeqCst) {
            return Err(BackendError::Message("injected store outage".to_string()));
        }
        self.inner.fetch_winner_record(car_id).await
    }

    async fn create_winner_record(&self, record: &WinnerRecord) -> BackendResult<()> {
        if self.fail_winner_writes.load(AtomicOrdering::SeqCst) {
            return Err(BackendError::Message("injected store outage".to_string()));
        }
        self.inner.create_winner_record(record).await
    }

    async fn update_winner_record(
        &self,
        car_id: CarId,
        wins: u32,
        best_time_sec: f64,
    ) -> BackendResult<()> {
        if self.fail_winner_writes.load(AtomicOrdering::SeqCst) {
            return Err(BackendError::Message("injected store outage".to_string()));
        }
        self.inner
            .update_winner_record(car_id, wins, best_time_sec)
            .await
    }
}
