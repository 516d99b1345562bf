use std::collections::HashSet;
use std::fmt;

use engine::{EntityId, SceneWorld, TickContext, Transform};
use serde::Serialize;
use tracing::{debug, info, warn};

mod config;
mod lanes;
mod obstacle;
mod pool;
mod scheduler;
mod sweeper;

pub(crate) use config::{
    load_spawner_config, ConfigError, SpawnerConfig, SPAWNER_CONFIG_ENV_VAR, SPAWNER_CONFIG_FILE,
};
pub(crate) use obstacle::ObstacleState;

use lanes::LaneRegistry;
use obstacle::{ActiveObstacle, ObstacleMotion, SegmentSlot};
use pool::ObstaclePool;
use scheduler::{ScheduleDecision, SpawnScheduler};

const SEGMENT_DEBUG_NAME: &str = "obstacle_segment";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum SkipReason {
    MissingTemplate,
    NoLanes,
}

impl SkipReason {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::MissingTemplate => "missing_template",
            Self::NoLanes => "no_lanes",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTemplate => f.write_str("no obstacle template configured"),
            Self::NoLanes => f.write_str("no lanes configured"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SpawnOutcome {
    Spawned(EntityId),
    AtCapacity,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub(crate) struct SpawnerSnapshot {
    pub active_count: usize,
    pub pool_count: usize,
    pub spawned_total: u64,
    pub recycled_total: u64,
    pub skipped_spawns: u64,
    pub capacity_blocked: u64,
    pub last_lane: Option<usize>,
}

/// Placement of one live obstacle entity, for renderers and collision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ObstacleView {
    pub id: EntityId,
    pub primary: EntityId,
    /// 0 for the primary, then 1.. for extra segments.
    pub segment_index: usize,
    pub transform: Transform,
    pub state: ObstacleState,
}

#[derive(Debug, Default)]
struct SpawnerStats {
    spawned_total: u64,
    recycled_total: u64,
    skipped_spawns: u64,
    capacity_blocked: u64,
}

/// Pooled obstacle spawning for a lane runner.
///
/// Each tick runs obstacle motion first, then the spawn schedule, then the
/// staleness sweep. Spawning stops for good once gameplay is inactive; the
/// sweep keeps running so stale entries are still reclaimed.
#[derive(Debug)]
pub(crate) struct ObstacleSpawner {
    config: SpawnerConfig,
    lanes: LaneRegistry,
    pool: Option<ObstaclePool>,
    scheduler: SpawnScheduler,
    active: Vec<ActiveObstacle>,
    stats: SpawnerStats,
    warned_skips: HashSet<SkipReason>,
}

impl ObstacleSpawner {
    pub(crate) fn new(config: SpawnerConfig) -> Self {
        let lanes = config.lane_registry();
        let pool = config.obstacle_template.clone().map(ObstaclePool::new);
        let scheduler = SpawnScheduler::new(config.min_delay, config.max_delay, config.rng_seed);
        if config.segments_per_obstacle > 1 && config.segment_template.is_none() {
            warn!(
                segments_per_obstacle = config.segments_per_obstacle,
                "spawner_segment_template_missing_single_segment_only"
            );
        }
        Self {
            config,
            lanes,
            pool,
            scheduler,
            active: Vec::new(),
            stats: SpawnerStats::default(),
            warned_skips: HashSet::new(),
        }
    }

    pub(crate) fn config(&self) -> &SpawnerConfig {
        &self.config
    }

    /// Prewarms the pool to the configured size.
    pub(crate) fn start(&mut self, world: &mut SceneWorld) {
        if let Some(pool) = self.pool.as_mut() {
            pool.prewarm(self.config.pool_size, world);
        }
        info!(
            lanes = self.lanes.lane_count(),
            template = self.pool.as_ref().map(|pool| pool.template().as_str()),
            pool_count = self.pool_count(),
            max_active = self.config.max_active,
            seed = self.scheduler.seed(),
            "spawner_ready"
        );
    }

    pub(crate) fn tick(&mut self, ctx: &TickContext, world: &mut SceneWorld) {
        let dt = ctx.fixed_dt_seconds;
        for entry in &mut self.active {
            entry.advance(dt, ctx.gameplay_active, world);
        }

        if ctx.gameplay_active {
            match self
                .scheduler
                .tick(dt, self.active.len(), self.config.max_active)
            {
                ScheduleDecision::Waiting => {}
                ScheduleDecision::CapacityBlocked => {
                    self.stats.capacity_blocked = self.stats.capacity_blocked.saturating_add(1);
                }
                ScheduleDecision::Due => {
                    self.try_spawn(world);
                    self.scheduler.restart();
                }
            }
        }

        self.sweep(world);
    }

    /// Spawns immediately, ignoring the timer but not capacity.
    pub(crate) fn spawn_now(&mut self, world: &mut SceneWorld) -> SpawnOutcome {
        self.try_spawn(world)
    }

    /// Releases every active obstacle as if it had gone stale. Returns how
    /// many entries were removed.
    pub(crate) fn despawn_all(&mut self, world: &mut SceneWorld) -> usize {
        let Some(pool) = self.pool.as_mut() else {
            return 0;
        };
        let report = sweeper::despawn_all(&mut self.active, pool, world);
        self.stats.recycled_total = self
            .stats
            .recycled_total
            .saturating_add(report.recycled as u64);
        report.total()
    }

    /// Tops the pool up to `target` inactive instances.
    pub(crate) fn prewarm_to(
        &mut self,
        target: usize,
        world: &mut SceneWorld,
    ) -> Result<usize, SkipReason> {
        match self.pool.as_mut() {
            Some(pool) => Ok(pool.prewarm_to(target, world)),
            None => Err(SkipReason::MissingTemplate),
        }
    }

    pub(crate) fn active_count(&self) -> usize {
        self.active.len()
    }

    pub(crate) fn pool_count(&self) -> usize {
        self.pool.as_ref().map_or(0, ObstaclePool::len)
    }

    pub(crate) fn snapshot(&self) -> SpawnerSnapshot {
        SpawnerSnapshot {
            active_count: self.active.len(),
            pool_count: self.pool_count(),
            spawned_total: self.stats.spawned_total,
            recycled_total: self.stats.recycled_total,
            skipped_spawns: self.stats.skipped_spawns,
            capacity_blocked: self.stats.capacity_blocked,
            last_lane: self.scheduler.last_lane(),
        }
    }

    pub(crate) fn active_obstacles(&self, world: &SceneWorld) -> Vec<ObstacleView> {
        let mut views = Vec::new();
        for entry in &self.active {
            let Some(primary) = world.find_entity(entry.primary) else {
                continue;
            };
            views.push(ObstacleView {
                id: entry.primary,
                primary: entry.primary,
                segment_index: 0,
                transform: primary.transform,
                state: entry.motion.state(),
            });
            for (index, segment) in entry.segments.iter().enumerate() {
                if let Some(entity) = world.find_entity(segment.id) {
                    views.push(ObstacleView {
                        id: segment.id,
                        primary: entry.primary,
                        segment_index: index + 1,
                        transform: entity.transform,
                        state: entry.motion.state(),
                    });
                }
            }
        }
        views
    }

    fn try_spawn(&mut self, world: &mut SceneWorld) -> SpawnOutcome {
        if self.active.len() >= self.config.max_active {
            return SpawnOutcome::AtCapacity;
        }
        if self.lanes.is_empty() {
            return self.skip(SkipReason::NoLanes);
        }
        let primary = match self.pool.as_mut() {
            Some(pool) => pool.acquire(world),
            None => return self.skip(SkipReason::MissingTemplate),
        };

        let lane = self
            .scheduler
            .pick_lane(self.lanes.lane_count(), !self.active.is_empty());
        let anchor = self.lanes.lane_at(lane).anchor();
        if let Some(entity) = world.find_entity_mut(primary) {
            entity.transform = anchor;
            entity.active = true;
        }
        let segments = self.spawn_segments(anchor, world);

        let sitting = self.scheduler.roll_sitting(self.config.sitting_probability);
        let idle_duration = self
            .scheduler
            .roll_idle_duration(self.config.min_sit, self.config.max_sit);
        let mut motion = ObstacleMotion::default();
        motion.initialize(
            sitting,
            idle_duration,
            self.config.move_speed,
            self.config.move_direction,
        );

        info!(
            primary = primary.0,
            lane,
            sitting,
            idle_seconds = idle_duration,
            segments = segments.len() + 1,
            active_count = self.active.len() + 1,
            pool_count = self.pool_count(),
            "obstacle_spawned"
        );
        self.active.push(ActiveObstacle {
            primary,
            lane,
            anchor,
            segments,
            motion,
        });
        self.stats.spawned_total = self.stats.spawned_total.saturating_add(1);
        SpawnOutcome::Spawned(primary)
    }

    fn spawn_segments(&self, anchor: Transform, world: &mut SceneWorld) -> Vec<SegmentSlot> {
        let Some(template) = self.config.segment_template.as_ref() else {
            return Vec::new();
        };
        (1..self.config.segments_per_obstacle)
            .map(|index| {
                let local_offset = self.config.segment_offset * index as f32;
                let transform = Transform {
                    position: anchor.local_to_world(local_offset),
                    yaw_radians: anchor.yaw_radians,
                };
                let id = world.spawn(transform, template.clone(), SEGMENT_DEBUG_NAME);
                SegmentSlot { id, local_offset }
            })
            .collect()
    }

    fn sweep(&mut self, world: &mut SceneWorld) {
        let Some(pool) = self.pool.as_mut() else {
            return;
        };
        let report = sweeper::sweep(&mut self.active, &self.config.staleness, pool, world);
        if report.pruned > 0 {
            debug!(pruned = report.pruned, "obstacle_entries_pruned");
        }
        self.stats.recycled_total = self
            .stats
            .recycled_total
            .saturating_add(report.recycled as u64);
    }

    fn skip(&mut self, reason: SkipReason) -> SpawnOutcome {
        self.stats.skipped_spawns = self.stats.skipped_spawns.saturating_add(1);
        if self.warned_skips.insert(reason) {
            warn!(reason = reason.as_str(), "spawn_skipped");
        } else {
            debug!(reason = reason.as_str(), "spawn_skipped");
        }
        SpawnOutcome::Skipped(reason)
    }
}
