use std::collections::BTreeMap;

use serde::Serialize;

use super::transform::Transform;
use crate::template_keys::TemplateKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Quit,
}

/// Per-tick inputs handed to [`Scene::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    pub fixed_dt_seconds: f32,
    pub gameplay_active: bool,
}

impl TickContext {
    pub fn new(fixed_dt_seconds: f32, gameplay_active: bool) -> Self {
        Self {
            fixed_dt_seconds,
            gameplay_active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneDebugCommand {
    SpawnNow,
    DespawnAll,
    Prewarm { target: Option<usize> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneDebugCommandResult {
    Unsupported,
    Success(String),
    Error(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DebugInfoSnapshot {
    pub scene: String,
    pub entity_count: usize,
    pub active_entity_count: usize,
    pub gameplay_active: bool,
    pub counters: BTreeMap<&'static str, u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub transform: Transform,
    pub template: TemplateKey,
    pub debug_name: &'static str,
    /// Inactive entities stay in the arena but are hidden from renderers and
    /// physics.
    pub active: bool,
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Arena of live entities keyed by stable ids. Ids are never reused, so a
/// stale handle can only miss, never alias a newer entity.
#[derive(Debug, Default)]
pub struct SceneWorld {
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
}

impl SceneWorld {
    pub fn spawn(
        &mut self,
        transform: Transform,
        template: TemplateKey,
        debug_name: &'static str,
    ) -> EntityId {
        self.spawn_internal(transform, template, debug_name, true)
    }

    pub fn spawn_inactive(
        &mut self,
        transform: Transform,
        template: TemplateKey,
        debug_name: &'static str,
    ) -> EntityId {
        self.spawn_internal(transform, template, debug_name, false)
    }

    fn spawn_internal(
        &mut self,
        transform: Transform,
        template: TemplateKey,
        debug_name: &'static str,
        active: bool,
    ) -> EntityId {
        let id = self.allocator.allocate();
        self.entities.push(Entity {
            id,
            transform,
            template,
            debug_name,
            active,
        });
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        match self.index_of(id) {
            Some(index) => {
                self.entities.swap_remove(index);
                true
            }
            None => false,
        }
    }

    pub fn set_active(&mut self, id: EntityId, active: bool) -> bool {
        match self.find_entity_mut(id) {
            Some(entity) => {
                entity.active = active;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn active_entity_count(&self) -> usize {
        self.entities.iter().filter(|entity| entity.active).count()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut [Entity] {
        &mut self.entities
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    fn index_of(&self, id: EntityId) -> Option<usize> {
        self.entities.iter().position(|entity| entity.id == id)
    }
}

pub trait Scene {
    fn load(&mut self, world: &mut SceneWorld);
    fn update(&mut self, ctx: &TickContext, world: &mut SceneWorld) -> SceneCommand;
    fn unload(&mut self, world: &mut SceneWorld);
    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        None
    }
    fn debug_info_snapshot(&self, _world: &SceneWorld) -> Option<DebugInfoSnapshot> {
        None
    }
    fn execute_debug_command(
        &mut self,
        _command: SceneDebugCommand,
        _world: &mut SceneWorld,
    ) -> SceneDebugCommandResult {
        SceneDebugCommandResult::Unsupported
    }
}

pub(crate) struct SceneHost {
    scene: Box<dyn Scene>,
    world: SceneWorld,
    is_loaded: bool,
}

impl SceneHost {
    pub(crate) fn new(scene: Box<dyn Scene>) -> Self {
        Self {
            scene,
            world: SceneWorld::default(),
            is_loaded: false,
        }
    }

    pub(crate) fn load(&mut self) {
        if self.is_loaded {
            return;
        }
        self.scene.load(&mut self.world);
        self.is_loaded = true;
    }

    pub(crate) fn update(&mut self, ctx: &TickContext) -> SceneCommand {
        self.scene.update(ctx, &mut self.world)
    }

    pub(crate) fn world(&self) -> &SceneWorld {
        &self.world
    }

    pub(crate) fn debug_title(&self) -> Option<String> {
        self.scene.debug_title(&self.world)
    }

    pub(crate) fn debug_info_snapshot(&self) -> Option<DebugInfoSnapshot> {
        self.scene.debug_info_snapshot(&self.world)
    }

    pub(crate) fn execute_debug_command(
        &mut self,
        command: SceneDebugCommand,
    ) -> SceneDebugCommandResult {
        self.scene.execute_debug_command(command, &mut self.world)
    }

    pub(crate) fn shutdown(&mut self) {
        if !self.is_loaded {
            return;
        }
        self.scene.unload(&mut self.world);
        self.world.clear();
        self.is_loaded = false;
    }
}
