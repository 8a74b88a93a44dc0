//! Sensor collaborators: the ultrasound range decoder and the road detector.

use crate::state::{Obstacle, RoadHazard, SENSOR_COUNT};

/// Turns the raw ultrasound bytes of one bus frame into per-sensor obstacles.
pub trait ObstacleDetector {
    fn detect(&self, raw: &[u8; SENSOR_COUNT]) -> [Obstacle; SENSOR_COUNT];
}

impl<T: ObstacleDetector + ?Sized> ObstacleDetector for Box<T> {
    fn detect(&self, raw: &[u8; SENSOR_COUNT]) -> [Obstacle; SENSOR_COUNT] {
        (**self).detect(raw)
    }
}

/// Treats each raw byte as a distance in centimetres.
///
/// A zero byte means no echo. Echoes beyond `max_range_cm` are kept as a
/// distance but not flagged as detected.
#[derive(Debug, Clone, Copy)]
pub struct RangeObstacleDetector {
    max_range_cm: u16,
}

impl RangeObstacleDetector {
    pub fn new(max_range_cm: u16) -> Self {
        Self { max_range_cm }
    }
}

impl Default for RangeObstacleDetector {
    fn default() -> Self {
        Self::new(200)
    }
}

impl ObstacleDetector for RangeObstacleDetector {
    fn detect(&self, raw: &[u8; SENSOR_COUNT]) -> [Obstacle; SENSOR_COUNT] {
        raw.map(|range| {
            let distance_cm = u16::from(range);
            Obstacle {
                detected: range != 0 && distance_cm <= self.max_range_cm,
                distance_cm,
            }
        })
    }
}

/// Source of the latest road classification from the camera.
pub trait RoadDetector {
    fn detect(&mut self) -> RoadHazard;
}

/// Reports a fixed classification. Used when no camera is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticRoadDetector {
    hazard: RoadHazard,
}

impl StaticRoadDetector {
    pub fn new(hazard: RoadHazard) -> Self {
        Self { hazard }
    }
}

impl RoadDetector for StaticRoadDetector {
    fn detect(&mut self) -> RoadHazard {
        self.hazard
    }
}

impl<F> RoadDetector for F
where
    F: FnMut() -> RoadHazard,
{
    fn detect(&mut self) -> RoadHazard {
        self()
    }
}
