//! CLI smoke check: run one full race end to end on the memory backend.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::time::timeout;
use tracing_subscriber::EnvFilter;

use raceline::{
    event_channel, Car, CarId, MemoryBackend, RaceConfig, RaceEntrant, RaceEvent, RaceSupervisor,
    StartParameters, TrackGeometry, WinnerBackend,
};

#[derive(Parser, Debug)]
#[command(name = "raceline-smoke", about = "Run a race against the memory backend.")]
struct SmokeArgs {
    /// Number of cars on the grid (max 6).
    #[arg(long, default_value_t = 4)]
    cars: usize,

    /// Seconds to wait for a winner before giving up.
    #[arg(long, default_value_t = 30)]
    wait_secs: u64,
}

const GRID: &[(&str, &str, f64)] = &[
    ("Tesla", "#3b8070", 92.0),
    ("BMW", "#17517e", 85.0),
    ("Mercedes", "#7f8c8d", 78.0),
    ("Ford", "#c0392b", 88.0),
    ("Aston Martin", "#1b4332", 74.0),
    ("Porsche", "#b8860b", 90.0),
];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = SmokeArgs::parse();
    let car_count = args.cars.clamp(1, GRID.len());

    let backend = MemoryBackend::new();
    let mut entrants = Vec::with_capacity(car_count);
    for (index, (name, color, velocity)) in GRID.iter().take(car_count).enumerate() {
        let car_id = CarId(index as i64 + 1);
        backend.insert_car(Car {
            id: car_id,
            name: (*name).to_string(),
            color: (*color).to_string(),
        });
        backend.set_start_parameters(
            car_id,
            StartParameters {
                velocity: *velocity,
                distance: 500_000.0,
            },
        );
        entrants.push(RaceEntrant {
            car_id,
            geometry: TrackGeometry {
                car_left_px: 80.0,
                finish_left_px: 880.0,
            },
        });
    }

    let (events, mut events_rx) = event_channel();
    let supervisor = RaceSupervisor::new(
        Arc::new(backend.clone()),
        Arc::new(backend.clone()),
        events,
        RaceConfig::from_env()?,
    );

    let race_id = supervisor.start_all(entrants).await?;
    println!("race {race_id} started with {car_count} cars");

    let winner = timeout(Duration::from_secs(args.wait_secs), async {
        loop {
            match events_rx.recv().await {
                Some(RaceEvent::RaceFinished { car_id, elapsed_sec }) => {
                    return (car_id, elapsed_sec);
                }
                Some(_) => continue,
                None => unreachable!("supervisor holds the sender"),
            }
        }
    })
    .await
    .context("no winner within the wait window")?;

    let (car_id, elapsed_sec) = winner;
    let name = backend
        .car(car_id)
        .map(|car| car.name)
        .unwrap_or_else(|| format!("car {car_id}"));
    println!("{name} wins in {elapsed_sec}s");

    // Give the ledger task a moment to flush, then print the store's view.
    tokio::time::sleep(Duration::from_millis(100)).await;
    if let Some(record) = backend.fetch_winner_record(car_id).await.ok().flatten() {
        println!("ledger: {}", serde_json::to_string_pretty(&record)?);
    }

    supervisor.reset_all().await;
    supervisor.shutdown();
    Ok(())
}
