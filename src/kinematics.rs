//! Kinematics resolver: engine-start parameters to a motion descriptor.

use tracing::debug;

use crate::backends::{BackendError, EngineBackend};
use crate::error::RaceError;
use crate::model::{CarId, MotionDescriptor};

/// Horizontal positions of the car's rendered element and the finish marker,
/// supplied by the rendering collaborator. The resolver only subtracts them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackGeometry {
    pub car_left_px: f64,
    pub finish_left_px: f64,
}

impl TrackGeometry {
    pub fn travel_distance_px(&self) -> f64 {
        (self.finish_left_px - self.car_left_px).max(0.0)
    }
}

/// Request start parameters for `car_id` and convert them into a
/// [`MotionDescriptor`]. On failure no animation handle may be created.
pub async fn resolve(
    engine: &dyn EngineBackend,
    car_id: CarId,
    geometry: &TrackGeometry,
) -> Result<MotionDescriptor, RaceError> {
    let params = engine
        .fetch_start_parameters(car_id)
        .await
        .map_err(|source| RaceError::EngineUnavailable { car: car_id, source })?;

    if params.velocity <= 0.0 {
        return Err(RaceError::EngineUnavailable {
            car: car_id,
            source: BackendError::Message(format!(
                "non-positive velocity {} for car {car_id}",
                params.velocity
            )),
        });
    }

    // Time to traverse the full reported distance at constant velocity.
    // Zero distance yields a zero duration, completed on the first frame.
    let duration_ms = params.distance / params.velocity;
    let descriptor = MotionDescriptor {
        car_id,
        duration_ms,
        distance_px: geometry.travel_distance_px(),
    };
    debug!(
        car = %car_id,
        duration_ms = descriptor.duration_ms,
        distance_px = descriptor.distance_px,
        "resolved motion descriptor"
    );
    Ok(descriptor)
}
