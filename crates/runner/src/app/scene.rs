use std::collections::BTreeMap;

use engine::{
    DebugInfoSnapshot, Scene, SceneCommand, SceneDebugCommand, SceneDebugCommandResult,
    SceneWorld, TickContext,
};
use tracing::info;

use super::spawner::{ObstacleSpawner, SpawnOutcome};

const SCENE_NAME: &str = "lane_runner";

/// Hosts the obstacle spawner inside the engine loop.
pub(crate) struct RunnerScene {
    spawner: ObstacleSpawner,
    gameplay_active: bool,
}

impl RunnerScene {
    pub(crate) fn new(spawner: ObstacleSpawner) -> Self {
        Self {
            spawner,
            gameplay_active: true,
        }
    }
}

impl Scene for RunnerScene {
    fn load(&mut self, world: &mut SceneWorld) {
        self.spawner.start(world);
    }

    fn update(&mut self, ctx: &TickContext, world: &mut SceneWorld) -> SceneCommand {
        self.gameplay_active = ctx.gameplay_active;
        self.spawner.tick(ctx, world);
        SceneCommand::None
    }

    fn unload(&mut self, world: &mut SceneWorld) {
        let released = self.spawner.despawn_all(world);
        let snapshot = self.spawner.snapshot();
        info!(
            released,
            spawned_total = snapshot.spawned_total,
            recycled_total = snapshot.recycled_total,
            skipped_spawns = snapshot.skipped_spawns,
            "spawner_unloaded"
        );
    }

    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        let snapshot = self.spawner.snapshot();
        Some(format!(
            "{SCENE_NAME} | active {} | pool {}",
            snapshot.active_count, snapshot.pool_count
        ))
    }

    fn debug_info_snapshot(&self, world: &SceneWorld) -> Option<DebugInfoSnapshot> {
        let snapshot = self.spawner.snapshot();
        let mut counters = BTreeMap::new();
        counters.insert("active_count", snapshot.active_count as u64);
        counters.insert("pool_count", snapshot.pool_count as u64);
        counters.insert("spawned_total", snapshot.spawned_total);
        counters.insert("recycled_total", snapshot.recycled_total);
        counters.insert("skipped_spawns", snapshot.skipped_spawns);
        counters.insert("capacity_blocked", snapshot.capacity_blocked);
        counters.insert(
            "live_obstacle_entities",
            self.spawner.active_obstacles(world).len() as u64,
        );
        if let Some(lane) = snapshot.last_lane {
            counters.insert("last_lane", lane as u64);
        }

        Some(DebugInfoSnapshot {
            scene: SCENE_NAME.to_string(),
            entity_count: world.entity_count(),
            active_entity_count: world.active_entity_count(),
            gameplay_active: self.gameplay_active,
            counters,
        })
    }

    fn execute_debug_command(
        &mut self,
        command: SceneDebugCommand,
        world: &mut SceneWorld,
    ) -> SceneDebugCommandResult {
        match command {
            SceneDebugCommand::SpawnNow => match self.spawner.spawn_now(world) {
                SpawnOutcome::Spawned(id) => {
                    SceneDebugCommandResult::Success(format!("spawned obstacle {}", id.0))
                }
                SpawnOutcome::AtCapacity => SceneDebugCommandResult::Error(format!(
                    "at capacity ({} active)",
                    self.spawner.active_count()
                )),
                SpawnOutcome::Skipped(reason) => {
                    SceneDebugCommandResult::Error(format!("spawn skipped: {reason}"))
                }
            },
            SceneDebugCommand::DespawnAll => {
                let released = self.spawner.despawn_all(world);
                SceneDebugCommandResult::Success(format!("despawned {released} obstacles"))
            }
            SceneDebugCommand::Prewarm { target } => {
                let target = target.unwrap_or(self.spawner.config().pool_size);
                match self.spawner.prewarm_to(target, world) {
                    Ok(created) => SceneDebugCommandResult::Success(format!(
                        "prewarmed {created} instances (pool {})",
                        self.spawner.pool_count()
                    )),
                    Err(reason) => {
                        SceneDebugCommandResult::Error(format!("prewarm skipped: {reason}"))
                    }
                }
            }
        }
    }
}
