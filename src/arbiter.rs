//! Finish arbiter: serializes completion reports and elects the winner.

use std::sync::Mutex;

use tracing::debug;
use uuid::Uuid;

use crate::model::{CarId, RaceSession, Winner};

/// Outcome of a winning [`FinishArbiter::report_finish`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct Election {
    pub race_id: Uuid,
    pub car_id: CarId,
    pub elapsed_ms: f64,
    /// Elapsed time in seconds, rounded to two decimals for display and the
    /// winner ledger.
    pub elapsed_sec: f64,
}

/// Holds the current race session and performs the first-finish
/// check-and-set. The check and the set happen under one lock guard with no
/// await point between them.
#[derive(Default)]
pub struct FinishArbiter {
    session: Mutex<Option<RaceSession>>,
}

impl FinishArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a fresh session over `participants`, replacing any prior one.
    /// `generation_floor` is the clock's latest handle generation at this
    /// moment; finish reports at or below it are stale for this session.
    pub fn open_session(
        &self,
        participants: impl IntoIterator<Item = CarId>,
        generation_floor: u64,
    ) -> Uuid {
        let session = RaceSession::new(participants, generation_floor);
        let race_id = session.race_id;
        let mut guard = self.session.lock().expect("session poisoned");
        *guard = Some(session);
        race_id
    }

    pub fn close_session(&self) {
        let mut guard = self.session.lock().expect("session poisoned");
        *guard = None;
    }

    pub fn has_session(&self) -> bool {
        self.session.lock().expect("session poisoned").is_some()
    }

    /// Drop a car from winner eligibility in the current session. The
    /// session's winner state and the other cars are untouched.
    pub fn remove_participant(&self, car_id: CarId) -> bool {
        let mut guard = self.session.lock().expect("session poisoned");
        match guard.as_mut() {
            Some(session) => session.participants.remove(&car_id),
            None => false,
        }
    }

    /// Report a completed run. The first eligible finisher is elected and
    /// returned; every later call returns `None` and leaves the recorded
    /// winner untouched. A report whose handle generation is at or below
    /// the session's watermark belongs to a replaced session and is
    /// discarded.
    pub fn report_finish(&self, car_id: CarId, elapsed_ms: f64, generation: u64) -> Option<Election> {
        let mut guard = self.session.lock().expect("session poisoned");
        let session = guard.as_mut()?;
        if generation <= session.generation_floor {
            debug!(car = %car_id, generation, "discarding finish report from a replaced session");
            return None;
        }
        if session.winner.is_some() || !session.participants.contains(&car_id) {
            debug!(car = %car_id, "finish report did not elect a winner");
            return None;
        }
        session.winner = Some(Winner { car_id, elapsed_ms });
        Some(Election {
            race_id: session.race_id,
            car_id,
            elapsed_ms,
            elapsed_sec: round_sec(elapsed_ms),
        })
    }

    pub fn winner(&self) -> Option<Winner> {
        self.session
            .lock()
            .expect("session poisoned")
            .as_ref()
            .and_then(|session| session.winner)
    }
}

fn round_sec(elapsed_ms: f64) -> f64 {
    (elapsed_ms / 1000.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_finish_in_wall_clock_order_wins() {
        let arbiter = FinishArbiter::new();
        arbiter.open_session([CarId(1), CarId(2), CarId(3)], 0);

        // Completion order, not call-site order, decides: the 500ms car
        // reports first.
        let election = arbiter.report_finish(CarId(2), 500.0, 2).expect("elected");
        assert_eq!(election.car_id, CarId(2));
        assert_eq!(election.elapsed_sec, 0.5);

        assert!(arbiter.report_finish(CarId(1), 900.0, 1).is_none());
        assert!(arbiter.report_finish(CarId(3), 1300.0, 3).is_none());
        assert_eq!(arbiter.winner().expect("winner").car_id, CarId(2));
    }

    #[test]
    fn repeated_reports_do_not_mutate_the_winner() {
        let arbiter = FinishArbiter::new();
        arbiter.open_session([CarId(1), CarId(2)], 0);

        arbiter.report_finish(CarId(1), 800.0, 1).expect("elected");
        assert!(arbiter.report_finish(CarId(1), 700.0, 1).is_none());
        assert!(arbiter.report_finish(CarId(2), 600.0, 2).is_none());

        let winner = arbiter.winner().expect("winner");
        assert_eq!(winner.car_id, CarId(1));
        assert_eq!(winner.elapsed_ms, 800.0);
    }

    #[test]
    fn removed_participant_is_not_eligible() {
        let arbiter = FinishArbiter::new();
        arbiter.open_session([CarId(1), CarId(2)], 0);

        assert!(arbiter.remove_participant(CarId(1)));
        assert!(arbiter.report_finish(CarId(1), 400.0, 1).is_none());

        let election = arbiter.report_finish(CarId(2), 900.0, 2).expect("elected");
        assert_eq!(election.car_id, CarId(2));
    }

    #[test]
    fn no_session_accepts_no_finishes() {
        let arbiter = FinishArbiter::new();
        assert!(arbiter.report_finish(CarId(1), 100.0, 1).is_none());

        arbiter.open_session([CarId(1)], 0);
        arbiter.close_session();
        assert!(arbiter.report_finish(CarId(1), 100.0, 1).is_none());
        assert!(!arbiter.has_session());
    }

    #[test]
    fn reports_from_before_the_session_are_stale() {
        let arbiter = FinishArbiter::new();
        // Four handles were issued before this session opened; car 1 raced
        // in the replaced session too.
        arbiter.open_session([CarId(1), CarId(2)], 4);

        assert!(arbiter.report_finish(CarId(1), 80.0, 3).is_none());
        assert!(arbiter.winner().is_none());

        let election = arbiter.report_finish(CarId(1), 300.0, 5).expect("elected");
        assert_eq!(election.car_id, CarId(1));
        assert_eq!(election.elapsed_ms, 300.0);
    }

    #[test]
    fn elapsed_seconds_round_to_two_decimals() {
        let arbiter = FinishArbiter::new();
        arbiter.open_session([CarId(1)], 0);
        let election = arbiter
            .report_finish(CarId(1), 12_345.6, 1)
            .expect("elected");
        assert_eq!(election.elapsed_sec, 12.35);
    }
}
