use engine::{SceneWorld, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::obstacle::ActiveObstacle;
use super::pool::ObstaclePool;

pub(crate) const DEFAULT_DESPAWN_RADIUS: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub(crate) fn component(self, value: Vec3) -> f32 {
        match self {
            Self::X => value.x,
            Self::Y => value.y,
            Self::Z => value.z,
        }
    }
}

/// When an active obstacle stops being relevant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum StalenessPolicy {
    /// Further than `radius` from `origin`.
    Distance {
        #[serde(default)]
        origin: Vec3,
        radius: f32,
    },
    /// Outside `[min, max]` along `axis`.
    AxisBound { axis: Axis, min: f32, max: f32 },
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self::Distance {
            origin: Vec3::ZERO,
            radius: DEFAULT_DESPAWN_RADIUS,
        }
    }
}

impl StalenessPolicy {
    pub(crate) fn is_stale(&self, position: Vec3) -> bool {
        match *self {
            Self::Distance { origin, radius } => position.distance(origin) > radius,
            Self::AxisBound { axis, min, max } => {
                let coordinate = axis.component(position);
                coordinate < min || coordinate > max
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SweepReport {
    pub recycled: usize,
    pub pruned: usize,
}

impl SweepReport {
    pub(crate) fn total(&self) -> usize {
        self.recycled + self.pruned
    }
}

/// Releases every stale or orphaned entry in `active`.
pub(crate) fn sweep(
    active: &mut Vec<ActiveObstacle>,
    policy: &StalenessPolicy,
    pool: &mut ObstaclePool,
    world: &mut SceneWorld,
) -> SweepReport {
    let mut report = SweepReport::default();
    let mut index = active.len();
    while index > 0 {
        index -= 1;
        let stale = match active[index].primary_position(world) {
            Some(position) => policy.is_stale(position),
            None => true,
        };
        if stale {
            let entry = active.swap_remove(index);
            record(&mut report, retire(entry, pool, world));
        }
    }
    report
}

/// Releases every active entry regardless of position.
pub(crate) fn despawn_all(
    active: &mut Vec<ActiveObstacle>,
    pool: &mut ObstaclePool,
    world: &mut SceneWorld,
) -> SweepReport {
    let mut report = SweepReport::default();
    for entry in active.drain(..) {
        record(&mut report, retire(entry, pool, world));
    }
    report
}

fn record(report: &mut SweepReport, outcome: RetireOutcome) {
    match outcome {
        RetireOutcome::Recycled => report.recycled += 1,
        RetireOutcome::Pruned => report.pruned += 1,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetireOutcome {
    Recycled,
    Pruned,
}

/// Removes the extra segments from the world and hands the primary back to
/// the pool.
fn retire(entry: ActiveObstacle, pool: &mut ObstaclePool, world: &mut SceneWorld) -> RetireOutcome {
    for segment in &entry.segments {
        world.despawn(segment.id);
    }

    match pool.release(entry.primary, world) {
        Ok(()) => {
            info!(
                primary = entry.primary.0,
                lane = entry.lane,
                segments = entry.segments.len(),
                pool_count = pool.len(),
                "obstacle_recycled"
            );
            RetireOutcome::Recycled
        }
        // Primary removed from the world externally; segments are gone
        // already, so the entry is just forgotten.
        Err(error) => {
            debug!(primary = entry.primary.0, %error, "obstacle_pruned");
            RetireOutcome::Pruned
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_policy_uses_strict_radius() {
        let policy = StalenessPolicy::Distance {
            origin: Vec3::ZERO,
            radius: 100.0,
        };
        assert!(!policy.is_stale(Vec3::new(0.0, 0.0, 100.0)));
        assert!(policy.is_stale(Vec3::new(0.0, 0.0, 100.5)));
        assert!(policy.is_stale(Vec3::new(-101.0, 0.0, 0.0)));
    }

    #[test]
    fn axis_policy_checks_both_bounds() {
        let policy = StalenessPolicy::AxisBound {
            axis: Axis::Z,
            min: -10.0,
            max: 50.0,
        };
        assert!(!policy.is_stale(Vec3::new(500.0, 0.0, 20.0)));
        assert!(policy.is_stale(Vec3::new(0.0, 0.0, 50.1)));
        assert!(policy.is_stale(Vec3::new(0.0, 0.0, -10.1)));
    }

    #[test]
    fn default_policy_is_distance_of_one_hundred() {
        assert_eq!(
            StalenessPolicy::default(),
            StalenessPolicy::Distance {
                origin: Vec3::ZERO,
                radius: DEFAULT_DESPAWN_RADIUS,
            }
        );
    }

    #[test]
    fn policy_deserializes_from_tagged_json() {
        let policy: StalenessPolicy = serde_json::from_value(serde_json::json!({
            "kind": "axis_bound",
            "axis": "z",
            "min": -5.0,
            "max": 80.0
        }))
        .expect("policy");

        assert_eq!(
            policy,
            StalenessPolicy::AxisBound {
                axis: Axis::Z,
                min: -5.0,
                max: 80.0,
            }
        );

        let distance: StalenessPolicy = serde_json::from_value(serde_json::json!({
            "kind": "distance",
            "radius": 40.0
        }))
        .expect("distance policy");
        assert!(distance.is_stale(Vec3::new(0.0, 0.0, 41.0)));
    }
}
