//! In-memory backend used by tests and the smoke binary.
//!
//! Behavior is scriptable per car: start parameters, engine outages and
//! health-poll failure points are all plain map entries.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::model::{Car, CarId, WinnerRecord};

use super::{BackendError, BackendResult, HealthStatus, StartParameters};

#[derive(Clone, Default)]
pub struct MemoryBackend {
    cars: Arc<Mutex<HashMap<CarId, Car>>>,
    start_parameters: Arc<Mutex<HashMap<CarId, StartParameters>>>,
    engine_down: Arc<Mutex<HashSet<CarId>>>,
    /// Car id -> number of successful polls before `success = false`.
    health_failure_after: Arc<Mutex<HashMap<CarId, usize>>>,
    health_poll_counts: Arc<Mutex<HashMap<CarId, usize>>>,
    winners: Arc<Mutex<HashMap<CarId, WinnerRecord>>>,
    stop_requests: Arc<Mutex<Vec<CarId>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_car(&self, car: Car) {
        let mut cars = self.cars.lock().expect("cars poisoned");
        cars.insert(car.id, car);
    }

    pub fn car(&self, car_id: CarId) -> Option<Car> {
        self.cars.lock().expect("cars poisoned").get(&car_id).cloned()
    }

    pub fn set_start_parameters(&self, car_id: CarId, params: StartParameters) {
        let mut guard = self
            .start_parameters
            .lock()
            .expect("start parameters poisoned");
        guard.insert(car_id, params);
    }

    /// Make every engine-start fetch for this car fail until cleared.
    pub fn mark_engine_down(&self, car_id: CarId) {
        self.engine_down
            .lock()
            .expect("engine down poisoned")
            .insert(car_id);
    }

    /// Report `success = false` from the health poll once `polls` successful
    /// polls have been answered for this car.
    pub fn fail_health_after(&self, car_id: CarId, polls: usize) {
        let mut guard = self
            .health_failure_after
            .lock()
            .expect("health failures poisoned");
        guard.insert(car_id, polls);
    }

    pub fn health_poll_count(&self, car_id: CarId) -> usize {
        self.health_poll_counts
            .lock()
            .expect("health counts poisoned")
            .get(&car_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn winner_record(&self, car_id: CarId) -> Option<WinnerRecord> {
        self.winners
            .lock()
            .expect("winners poisoned")
            .get(&car_id)
            .cloned()
    }

    pub fn put_winner_record(&self, record: WinnerRecord) {
        let mut guard = self.winners.lock().expect("winners poisoned");
        guard.insert(record.car_id, record);
    }

    pub fn stop_requests(&self) -> Vec<CarId> {
        self.stop_requests
            .lock()
            .expect("stop requests poisoned")
            .clone()
    }
}

#[async_trait::async_trait]
impl super::EngineBackend for MemoryBackend {
    async fn fetch_start_parameters(&self, car_id: CarId) -> BackendResult<StartParameters> {
        if self
            .engine_down
            .lock()
            .expect("engine down poisoned")
            .contains(&car_id)
        {
            return Err(BackendError::Message(format!(
                "engine unavailable for car {car_id}"
            )));
        }
        self.start_parameters
            .lock()
            .expect("start parameters poisoned")
            .get(&car_id)
            .copied()
            .ok_or_else(|| BackendError::Message(format!("unknown car {car_id}")))
    }

    async fn fetch_stop_acknowledgement(&self, car_id: CarId) -> BackendResult<()> {
        self.stop_requests
            .lock()
            .expect("stop requests poisoned")
            .push(car_id);
        Ok(())
    }

    async fn poll_health(&self, car_id: CarId) -> HealthStatus {
        let polled = {
            let mut counts = self
                .health_poll_counts
                .lock()
                .expect("health counts poisoned");
            let entry = counts.entry(car_id).or_insert(0);
            *entry += 1;
            *entry
        };
        let threshold = self
            .health_failure_after
            .lock()
            .expect("health failures poisoned")
            .get(&car_id)
            .copied();
        let success = match threshold {
            Some(after) => polled <= after,
            None => true,
        };
        HealthStatus { success }
    }
}

#[async_trait::async_trait]
impl super::WinnerBackend for MemoryBackend {
    async fn fetch_winner_record(&self, car_id: CarId) -> BackendResult<Option<WinnerRecord>> {
        Ok(self
            .winners
            .lock()
            .expect("winners poisoned")
            .get(&car_id)
            .cloned())
    }

    async fn create_winner_record(&self, record: &WinnerRecord) -> BackendResult<()> {
        let mut guard = self.winners.lock().expect("winners poisoned");
        if guard.contains_key(&record.car_id) {
            return Err(BackendError::Message(format!(
                "winner record already exists for car {}",
                record.car_id
            )));
        }
        guard.insert(record.car_id, record.clone());
        Ok(())
    }

    async fn update_winner_record(
        &self,
        car_id: CarId,
        wins: u32,
        best_time_sec: f64,
    ) -> BackendResult<()> {
        let mut guard = self.winners.lock().expect("winners poisoned");
        let record = guard
            .get_mut(&car_id)
            .ok_or_else(|| BackendError::Message(format!("no winner record for car {car_id}")))?;
        record.wins = wins;
        record.best_time_sec = best_time_sec;
        Ok(())
    }
}
