//! Viewpoint-distance interest ranking.

use std::sync::Mutex;

use glam::Vec3;

use crate::core::config::SchedulerConfig;

/// Converts entity positions into scheduling priorities.
///
/// Priority is the distance from the last known viewpoint, clamped to a
/// configured maximum; smaller = more urgent. Before any viewpoint has
/// been observed, a neutral default is used. The rank is recomputed at
/// every call — it is only a sort key, so two enqueues of the same
/// entity may legitimately rank differently.
pub struct Interest {
    default_priority: u32,
    max_distance: f32,
    viewpoint: Mutex<Option<Vec3>>,
}

impl Interest {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            default_priority: config.default_interest,
            max_distance: config.max_interest_distance,
            viewpoint: Mutex::new(None),
        }
    }

    /// Remember the latest camera position. Called by the render host
    /// whenever the camera moves.
    pub fn note_viewpoint(&self, position: Vec3) {
        *self.viewpoint.lock().unwrap() = Some(position);
    }

    /// Rank a world position for scheduling.
    pub fn rank(&self, position: Vec3) -> u32 {
        match *self.viewpoint.lock().unwrap() {
            Some(viewpoint) => {
                let distance = position.distance(viewpoint);
                distance.clamp(0.0, self.max_distance) as u32
            }
            None => self.default_priority,
        }
    }
}
