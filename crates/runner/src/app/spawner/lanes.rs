use engine::{Transform, Vec3};
use serde::{Deserialize, Serialize};

/// One parallel path obstacles travel along.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(crate) struct Lane {
    pub position: Vec3,
    #[serde(default)]
    pub yaw_radians: f32,
}

impl Lane {
    pub(crate) fn new(position: Vec3, yaw_radians: f32) -> Self {
        Self {
            position,
            yaw_radians,
        }
    }

    pub(crate) fn anchor(&self) -> Transform {
        Transform {
            position: self.position,
            yaw_radians: self.yaw_radians,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct LaneRegistry {
    lanes: Vec<Lane>,
}

impl LaneRegistry {
    pub(crate) fn new(lanes: Vec<Lane>) -> Self {
        Self { lanes }
    }

    /// Lanes centered on x = 0, left to right, `spacing` apart.
    pub(crate) fn evenly_spaced(count: usize, spacing: f32, z: f32, yaw_radians: f32) -> Self {
        let center = count.saturating_sub(1) as f32 * 0.5;
        let lanes = (0..count)
            .map(|index| {
                let x = (index as f32 - center) * spacing;
                Lane::new(Vec3::new(x, 0.0, z), yaw_radians)
            })
            .collect();
        Self { lanes }
    }

    pub(crate) fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub(crate) fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    pub(crate) fn get(&self, index: usize) -> Option<&Lane> {
        self.lanes.get(index)
    }

    /// Panics when `index` is outside `0..lane_count()`.
    pub(crate) fn lane_at(&self, index: usize) -> &Lane {
        match self.lanes.get(index) {
            Some(lane) => lane,
            None => panic!(
                "lane index {index} out of range for registry of {} lanes",
                self.lanes.len()
            ),
        }
    }
}
