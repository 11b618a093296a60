//! Animation clock: one continuous, cancellable frame loop per car.
//!
//! The live-handle registry is the only shared mutable structure in the
//! engine. Every entry carries a generation; any continuation that outlives a
//! frame re-validates its generation against the registry before acting, so a
//! superseded handle can never mutate current state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::events::{EventSender, RaceEvent};
use crate::model::{CarId, MotionDescriptor};

/// Emitted exactly once when a run reaches full progress.
///
/// Carries the handle's generation so the finish pipeline can discard a
/// report whose run predates the current race session.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishReport {
    pub car_id: CarId,
    pub elapsed_ms: f64,
    pub generation: u64,
}

/// Live-cancellable token for one in-progress animation.
#[derive(Debug, Clone)]
pub struct AnimationHandle {
    car_id: CarId,
    generation: u64,
    cancel: CancellationToken,
}

impl AnimationHandle {
    pub fn car_id(&self) -> CarId {
        self.car_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

struct HandleEntry {
    generation: u64,
    cancel: CancellationToken,
}

/// Drives per-car position animations and owns the live-handle registry.
#[derive(Clone)]
pub struct AnimationClock {
    registry: Arc<Mutex<HashMap<CarId, HandleEntry>>>,
    next_generation: Arc<AtomicU64>,
    frame_interval: Duration,
    events: EventSender,
    finish_tx: mpsc::Sender<FinishReport>,
}

impl AnimationClock {
    pub fn new(
        frame_interval: Duration,
        events: EventSender,
        finish_tx: mpsc::Sender<FinishReport>,
    ) -> Self {
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
            next_generation: Arc::new(AtomicU64::new(0)),
            frame_interval,
            events,
            finish_tx,
        }
    }

    /// Start animating `descriptor.car_id`. Any prior handle for the car is
    /// cancelled first: at most one live handle exists per car.
    pub fn start(&self, descriptor: MotionDescriptor) -> AnimationHandle {
        let generation = self.next_generation.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        {
            let mut registry = self.registry.lock().expect("registry poisoned");
            if let Some(prior) = registry.insert(
                descriptor.car_id,
                HandleEntry {
                    generation,
                    cancel: cancel.clone(),
                },
            ) {
                prior.cancel.cancel();
                debug!(car = %descriptor.car_id, "superseded prior animation handle");
            }
        }
        let handle = AnimationHandle {
            car_id: descriptor.car_id,
            generation,
            cancel,
        };

        let clock = self.clone();
        let frame_handle = handle.clone();
        tokio::spawn(async move {
            clock.run_frames(descriptor, frame_handle).await;
        });
        handle
    }

    /// Cancel whatever handle is live for `car_id`. Idempotent; returns
    /// whether a live handle was cancelled.
    pub fn cancel(&self, car_id: CarId) -> bool {
        let mut registry = self.registry.lock().expect("registry poisoned");
        match registry.remove(&car_id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel this specific handle, but only evict the registry entry if it
    /// is still the current one. Cancelling a completed or superseded handle
    /// is a no-op on the registry.
    pub fn cancel_handle(&self, handle: &AnimationHandle) -> bool {
        handle.cancel.cancel();
        let mut registry = self.registry.lock().expect("registry poisoned");
        match registry.get(&handle.car_id) {
            Some(entry) if entry.generation == handle.generation => {
                registry.remove(&handle.car_id);
                true
            }
            _ => false,
        }
    }

    /// Whether this handle is still the registered one for its car.
    pub fn is_live(&self, handle: &AnimationHandle) -> bool {
        let registry = self.registry.lock().expect("registry poisoned");
        registry
            .get(&handle.car_id)
            .map(|entry| entry.generation == handle.generation)
            .unwrap_or(false)
    }

    /// The most recently issued handle generation. A session opened now can
    /// use this as a watermark: any finish report at or below it belongs to
    /// a run started before the session existed.
    pub fn latest_generation(&self) -> u64 {
        self.next_generation.load(AtomicOrdering::SeqCst)
    }

    pub fn live_cars(&self) -> Vec<CarId> {
        let registry = self.registry.lock().expect("registry poisoned");
        registry.keys().copied().collect()
    }

    /// Cancel every live handle.
    pub fn clear(&self) {
        let mut registry = self.registry.lock().expect("registry poisoned");
        for (_, entry) in registry.drain() {
            entry.cancel.cancel();
        }
    }

    /// Remove the entry for this handle if it is still current. Used as the
    /// completion check-and-remove so a finish fires at most once.
    fn remove_if_live(&self, handle: &AnimationHandle) -> bool {
        let mut registry = self.registry.lock().expect("registry poisoned");
        match registry.get(&handle.car_id) {
            Some(entry) if entry.generation == handle.generation => {
                registry.remove(&handle.car_id);
                true
            }
            _ => false,
        }
    }

    async fn run_frames(&self, descriptor: MotionDescriptor, handle: AnimationHandle) {
        let mut ticker = interval(self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut started: Option<Instant> = None;

        loop {
            ticker.tick().await;

            // Cancellation is observed at the top of each frame, never
            // mid-frame.
            if handle.is_cancelled() || !self.is_live(&handle) {
                return;
            }

            let start = *started.get_or_insert_with(Instant::now);
            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
            // Uncapped before the completion check: momentarily exceeding 1.0
            // is the completion trigger. A zero duration completes on the
            // first frame without an intermediate progress value.
            let fraction = if descriptor.duration_ms > 0.0 {
                elapsed_ms / descriptor.duration_ms
            } else {
                f64::INFINITY
            };

            if fraction >= 1.0 {
                if self.remove_if_live(&handle) {
                    let report = FinishReport {
                        car_id: handle.car_id,
                        elapsed_ms,
                        generation: handle.generation,
                    };
                    if self.finish_tx.send(report).await.is_err() {
                        debug!(car = %handle.car_id, "finish channel closed, dropping report");
                    }
                }
                return;
            }

            let _ = self.events.send(RaceEvent::Progress {
                car_id: handle.car_id,
                fraction,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use super::*;
    use crate::events::event_channel;

    const FRAME: Duration = Duration::from_millis(5);

    fn test_clock() -> (
        AnimationClock,
        crate::events::EventReceiver,
        mpsc::Receiver<FinishReport>,
    ) {
        let (events, events_rx) = event_channel();
        let (finish_tx, finish_rx) = mpsc::channel(16);
        (AnimationClock::new(FRAME, events, finish_tx), events_rx, finish_rx)
    }

    fn descriptor(car: i64, duration_ms: f64) -> MotionDescriptor {
        MotionDescriptor {
            car_id: CarId(car),
            duration_ms,
            distance_px: 800.0,
        }
    }

    #[tokio::test]
    async fn zero_duration_completes_on_first_frame_without_progress() {
        let (clock, mut events_rx, mut finish_rx) = test_clock();
        clock.start(descriptor(1, 0.0));

        let report = timeout(Duration::from_secs(1), finish_rx.recv())
            .await
            .expect("finish in time")
            .expect("finish report");
        assert_eq!(report.car_id, CarId(1));
        assert!(report.elapsed_ms < 100.0, "elapsed {}", report.elapsed_ms);
        assert!(events_rx.try_recv().is_err(), "no intermediate progress");
        assert!(clock.live_cars().is_empty());
    }

    #[tokio::test]
    async fn restart_supersedes_prior_handle() {
        let (clock, _events_rx, mut finish_rx) = test_clock();
        let first = clock.start(descriptor(7, 80.0));
        let second = clock.start(descriptor(7, 300.0));

        assert!(first.is_cancelled());
        assert!(!clock.is_live(&first));
        assert!(clock.is_live(&second));
        assert_eq!(clock.live_cars(), vec![CarId(7)]);

        // Only the second run finishes: had the first survived it would have
        // reported around 80ms.
        let report = timeout(Duration::from_secs(2), finish_rx.recv())
            .await
            .expect("finish in time")
            .expect("finish report");
        assert!(report.elapsed_ms >= 250.0, "elapsed {}", report.elapsed_ms);
        assert_eq!(report.generation, 2);
        assert!(finish_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn cancel_stops_progress_and_is_idempotent() {
        let (clock, mut events_rx, mut finish_rx) = test_clock();
        clock.start(descriptor(3, 500.0));
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(clock.cancel(CarId(3)));
        assert!(!clock.cancel(CarId(3)));
        assert!(!clock.cancel(CarId(99)));

        // One in-flight frame may still land; after it, silence.
        tokio::time::sleep(Duration::from_millis(20)).await;
        while events_rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(events_rx.try_recv().is_err());
        assert!(finish_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn cancelling_completed_handle_is_noop() {
        let (clock, _events_rx, mut finish_rx) = test_clock();
        let handle = clock.start(descriptor(4, 0.0));
        finish_rx.recv().await.expect("finish report");

        assert!(!clock.cancel_handle(&handle));
        assert!(finish_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn progress_fractions_are_monotonic_and_below_one() {
        let (clock, mut events_rx, mut finish_rx) = test_clock();
        clock.start(descriptor(5, 120.0));
        finish_rx.recv().await.expect("finish report");

        let mut last = -1.0f64;
        while let Ok(event) = events_rx.try_recv() {
            let RaceEvent::Progress { car_id, fraction } = event else {
                panic!("unexpected event {event:?}");
            };
            assert_eq!(car_id, CarId(5));
            assert!(fraction < 1.0, "fraction {fraction}");
            assert!(fraction >= last, "fraction regressed: {last} -> {fraction}");
            last = fraction;
        }
        assert!(last >= 0.0, "at least one progress frame");
    }
}
