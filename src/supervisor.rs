//! Run supervisor: orchestrates race starts, health polling and the finish
//! pipeline over a set of cars.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::arbiter::FinishArbiter;
use crate::backends::{EngineBackend, WinnerBackend};
use crate::clock::{AnimationClock, AnimationHandle, FinishReport};
use crate::config::RaceConfig;
use crate::error::RaceError;
use crate::events::{EventSender, RaceEvent};
use crate::kinematics::{self, TrackGeometry};
use crate::ledger::WinnerLedger;
use crate::model::{CarId, Winner};

/// One car entering a race, with the geometry the resolver needs.
#[derive(Debug, Clone, Copy)]
pub struct RaceEntrant {
    pub car_id: CarId,
    pub geometry: TrackGeometry,
}

/// Coordinates the per-car lifecycle: {cancel prior animation -> resolve
/// kinematics -> start clock -> poll health}, plus the background finish
/// pipeline feeding the arbiter and the winner ledger.
pub struct RaceSupervisor {
    engine: Arc<dyn EngineBackend>,
    clock: AnimationClock,
    arbiter: Arc<FinishArbiter>,
    events: EventSender,
    config: RaceConfig,
    finish_task: JoinHandle<()>,
}

impl RaceSupervisor {
    pub fn new(
        engine: Arc<dyn EngineBackend>,
        store: Arc<dyn WinnerBackend>,
        events: EventSender,
        config: RaceConfig,
    ) -> Self {
        let (finish_tx, finish_rx) = mpsc::channel(config.finish_buffer.max(1));
        let clock = AnimationClock::new(config.frame_interval, events.clone(), finish_tx);
        let arbiter = Arc::new(FinishArbiter::new());
        let ledger = Arc::new(WinnerLedger::new(store));
        let finish_task = tokio::spawn(finish_loop(
            finish_rx,
            Arc::clone(&arbiter),
            ledger,
            events.clone(),
        ));
        Self {
            engine,
            clock,
            arbiter,
            events,
            config,
            finish_task,
        }
    }

    /// Start a race over `entrants`. Preparation runs concurrently per car
    /// and is fault-tolerant: one car's engine failure excludes only that
    /// car, the others proceed.
    pub async fn start_all(&self, entrants: Vec<RaceEntrant>) -> Result<Uuid, RaceError> {
        if entrants.is_empty() {
            return Err(RaceError::NoParticipants);
        }
        let ids: Vec<CarId> = entrants.iter().map(|entrant| entrant.car_id).collect();
        // Watermark the session before any new handle is issued so a finish
        // still in flight from a replaced session can never elect here.
        let race_id = self
            .arbiter
            .open_session(ids.iter().copied(), self.clock.latest_generation());

        let results = join_all(entrants.into_iter().map(|entrant| self.prepare(entrant))).await;
        let mut started = 0usize;
        for (car_id, result) in ids.iter().zip(results) {
            match result {
                Ok(()) => started += 1,
                Err(err) => {
                    warn!(error = %err, "car excluded from race");
                    self.arbiter.remove_participant(*car_id);
                }
            }
        }
        if started == 0 {
            warn!(%race_id, "no car could start, race has no eligible finisher");
        }
        info!(%race_id, entrants = ids.len(), started, "race started");
        Ok(race_id)
    }

    /// Start a single car outside of race arbitration.
    pub async fn start_one(&self, entrant: RaceEntrant) -> Result<(), RaceError> {
        self.prepare(entrant).await
    }

    /// Stop one car: cancel its animation, reset its visual position and ask
    /// the engine to stop. Local state never depends on the remote
    /// acknowledgement; a failed stop request surfaces after the local
    /// effects have already been applied.
    pub async fn stop_one(&self, car_id: CarId) -> Result<(), RaceError> {
        if self.clock.cancel(car_id) {
            debug!(car = %car_id, "cancelled live animation");
        }
        let _ = self.events.send(RaceEvent::Progress {
            car_id,
            fraction: 0.0,
        });
        let _ = self.events.send(RaceEvent::ButtonState {
            car_id,
            running: false,
        });
        self.engine
            .fetch_stop_acknowledgement(car_id)
            .await
            .map_err(|source| RaceError::StopRequestFailed { car: car_id, source })
    }

    /// Stop every live car and clear the current session, re-enabling race
    /// initiation. Per-car stop failures are logged, not aggregated.
    pub async fn reset_all(&self) {
        for car_id in self.clock.live_cars() {
            if let Err(err) = self.stop_one(car_id).await {
                warn!(error = %err, "stop request failed during reset");
            }
        }
        self.arbiter.close_session();
    }

    pub fn live_cars(&self) -> Vec<CarId> {
        self.clock.live_cars()
    }

    pub fn winner(&self) -> Option<Winner> {
        self.arbiter.winner()
    }

    /// Abort the background tasks and cancel all animations.
    pub fn shutdown(&self) {
        self.clock.clear();
        self.finish_task.abort();
    }

    async fn prepare(&self, entrant: RaceEntrant) -> Result<(), RaceError> {
        self.clock.cancel(entrant.car_id);
        let descriptor =
            kinematics::resolve(self.engine.as_ref(), entrant.car_id, &entrant.geometry).await?;
        let handle = self.clock.start(descriptor);
        let _ = self.events.send(RaceEvent::ButtonState {
            car_id: entrant.car_id,
            running: true,
        });
        self.spawn_health_poll(handle);
        Ok(())
    }

    /// Independent mid-run health poll for one handle. A negative result
    /// cancels only this car's animation; the poll ends once the handle is
    /// no longer the live one.
    fn spawn_health_poll(&self, handle: AnimationHandle) {
        let engine = Arc::clone(&self.engine);
        let clock = self.clock.clone();
        let arbiter = Arc::clone(&self.arbiter);
        let events = self.events.clone();
        let poll_interval = self.config.health_poll_interval;

        tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let car_id = handle.car_id();
            loop {
                ticker.tick().await;
                if !clock.is_live(&handle) {
                    return;
                }
                let status = engine.poll_health(car_id).await;
                // Stale-response guard: the handle may have completed or
                // been superseded while the poll was in flight.
                if !clock.is_live(&handle) {
                    return;
                }
                if !status.success {
                    warn!(
                        error = %RaceError::HealthCheckFailed { car: car_id },
                        "mid-run engine failure, cancelling animation"
                    );
                    clock.cancel_handle(&handle);
                    arbiter.remove_participant(car_id);
                    let _ = events.send(RaceEvent::ButtonState {
                        car_id,
                        running: false,
                    });
                    return;
                }
            }
        });
    }
}

async fn finish_loop(
    mut finish_rx: mpsc::Receiver<FinishReport>,
    arbiter: Arc<FinishArbiter>,
    ledger: Arc<WinnerLedger>,
    events: EventSender,
) {
    while let Some(report) = finish_rx.recv().await {
        let election =
            match arbiter.report_finish(report.car_id, report.elapsed_ms, report.generation) {
                Some(election) => election,
                None => continue,
            };
        info!(
            car = %election.car_id,
            elapsed_sec = election.elapsed_sec,
            "race winner elected"
        );
        let _ = events.send(RaceEvent::RaceFinished {
            car_id: election.car_id,
            elapsed_sec: election.elapsed_sec,
        });
        // Persistence is decoupled from the in-memory result: a sync failure
        // is logged and never suppresses the winner display.
        let ledger = Arc::clone(&ledger);
        tokio::spawn(async move {
            if let Err(err) = ledger
                .record_win(election.race_id, election.car_id, election.elapsed_sec)
                .await
            {
                error!(error = %err, "race result not persisted");
            }
        });
    }
}
