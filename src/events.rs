//! Outward event interface toward the rendering/UI collaborator.
//!
//! The engine never holds rendering objects; everything the UI needs crosses
//! this channel as plain values.

use tokio::sync::mpsc;

use crate::model::CarId;

#[derive(Debug, Clone, PartialEq)]
pub enum RaceEvent {
    /// Reposition the car's visual element at `fraction * distance`.
    Progress { car_id: CarId, fraction: f64 },
    /// Display the race result.
    RaceFinished { car_id: CarId, elapsed_sec: f64 },
    /// Enable/disable the car's start/stop controls.
    ButtonState { car_id: CarId, running: bool },
}

pub type EventSender = mpsc::UnboundedSender<RaceEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<RaceEvent>;

/// Create the event channel the UI consumer drains. Unbounded so a slow
/// consumer can never stall an animation frame.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
