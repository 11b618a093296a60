//! Winner ledger synchronizer: merges a race result into the remote store.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};
use uuid::Uuid;

use crate::backends::WinnerBackend;
use crate::error::RaceError;
use crate::model::{CarId, WinnerRecord};

/// Reconciles race results against the winner store: create-if-absent, else
/// increment the win count and keep the minimum best time.
///
/// The fetch/create-or-update sequence is three sequential remote calls with
/// no transactional guarantee; instead of retrying on conflict, each
/// application is keyed by its race id and replayed ids are skipped, so the
/// same result can never double-count.
pub struct WinnerLedger {
    store: Arc<dyn WinnerBackend>,
    applied_races: Mutex<HashSet<Uuid>>,
}

impl WinnerLedger {
    pub fn new(store: Arc<dyn WinnerBackend>) -> Self {
        Self {
            store,
            applied_races: Mutex::new(HashSet::new()),
        }
    }

    pub async fn record_win(
        &self,
        race_id: Uuid,
        car_id: CarId,
        time_sec: f64,
    ) -> Result<(), RaceError> {
        {
            let applied = self.applied_races.lock().expect("applied races poisoned");
            if applied.contains(&race_id) {
                debug!(%race_id, car = %car_id, "race result already applied, skipping");
                return Ok(());
            }
        }

        let existing = self
            .store
            .fetch_winner_record(car_id)
            .await
            .map_err(|source| RaceError::WinnerSyncFailed { car: car_id, source })?;

        let merged = match existing {
            None => WinnerRecord {
                car_id,
                wins: 1,
                best_time_sec: time_sec,
            },
            Some(record) => WinnerRecord {
                car_id,
                wins: record.wins + 1,
                best_time_sec: record.best_time_sec.min(time_sec),
            },
        };

        let write = match merged.wins {
            1 => self.store.create_winner_record(&merged).await,
            _ => {
                self.store
                    .update_winner_record(car_id, merged.wins, merged.best_time_sec)
                    .await
            }
        };
        write.map_err(|source| RaceError::WinnerSyncFailed { car: car_id, source })?;

        let mut applied = self.applied_races.lock().expect("applied races poisoned");
        applied.insert(race_id);
        info!(
            car = %car_id,
            wins = merged.wins,
            best_time_sec = merged.best_time_sec,
            "synchronized winner record"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{FaultInjectingBackend, MemoryBackend};

    fn ledger_over(backend: MemoryBackend) -> WinnerLedger {
        WinnerLedger::new(Arc::new(backend))
    }

    #[tokio::test]
    async fn absent_record_is_created_with_one_win() {
        let backend = MemoryBackend::new();
        let ledger = ledger_over(backend.clone());

        ledger
            .record_win(Uuid::new_v4(), CarId(1), 9.5)
            .await
            .expect("record win");

        let record = backend.winner_record(CarId(1)).expect("record");
        assert_eq!(record.wins, 1);
        assert_eq!(record.best_time_sec, 9.5);
    }

    #[tokio::test]
    async fn faster_result_updates_the_best_time() {
        let backend = MemoryBackend::new();
        backend.put_winner_record(WinnerRecord {
            car_id: CarId(2),
            wins: 2,
            best_time_sec: 12.40,
        });
        let ledger = ledger_over(backend.clone());

        ledger
            .record_win(Uuid::new_v4(), CarId(2), 11.90)
            .await
            .expect("record win");

        let record = backend.winner_record(CarId(2)).expect("record");
        assert_eq!(record.wins, 3);
        assert_eq!(record.best_time_sec, 11.90);
    }

    #[tokio::test]
    async fn slower_result_keeps_the_best_time() {
        let backend = MemoryBackend::new();
        backend.put_winner_record(WinnerRecord {
            car_id: CarId(2),
            wins: 2,
            best_time_sec: 12.40,
        });
        let ledger = ledger_over(backend.clone());

        ledger
            .record_win(Uuid::new_v4(), CarId(2), 13.00)
            .await
            .expect("record win");

        let record = backend.winner_record(CarId(2)).expect("record");
        assert_eq!(record.wins, 3);
        assert_eq!(record.best_time_sec, 12.40);
    }

    #[tokio::test]
    async fn replaying_the_same_race_does_not_double_count() {
        let backend = MemoryBackend::new();
        let ledger = ledger_over(backend.clone());
        let race_id = Uuid::new_v4();

        ledger
            .record_win(race_id, CarId(3), 8.0)
            .await
            .expect("first application");
        ledger
            .record_win(race_id, CarId(3), 8.0)
            .await
            .expect("replay is a no-op");

        assert_eq!(backend.winner_record(CarId(3)).expect("record").wins, 1);
    }

    #[tokio::test]
    async fn store_outage_surfaces_as_winner_sync_failed_and_allows_retry() {
        let backend = FaultInjectingBackend::new(MemoryBackend::new());
        backend.set_fail_winner_writes(true);
        let ledger = WinnerLedger::new(Arc::new(backend.clone()));
        let race_id = Uuid::new_v4();

        let err = ledger
            .record_win(race_id, CarId(4), 7.0)
            .await
            .expect_err("store is down");
        assert!(matches!(
            err,
            RaceError::WinnerSyncFailed { car: CarId(4), .. }
        ));

        // A failed application is not marked as applied: the second attempt
        // goes back to the store instead of being deduplicated.
        backend.set_fail_winner_writes(false);
        ledger
            .record_win(race_id, CarId(4), 7.0)
            .await
            .expect("second attempt succeeds");
        assert_eq!(backend.winner_fetch_calls(), 2);
        assert_eq!(
            backend.inner().winner_record(CarId(4)).expect("record").wins,
            1
        );
    }
}
