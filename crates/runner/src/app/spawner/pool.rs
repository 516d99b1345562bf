use std::collections::{HashSet, VecDeque};

use engine::{EntityId, SceneWorld, TemplateKey, Transform};
use thiserror::Error;

const PRIMARY_DEBUG_NAME: &str = "obstacle";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub(crate) enum PoolError {
    #[error("entity {0:?} is already pooled")]
    AlreadyPooled(EntityId),
    #[error("entity {0:?} was not created by this pool")]
    Foreign(EntityId),
    #[error("entity {0:?} no longer exists in the world")]
    Destroyed(EntityId),
}

/// Free list of inactive primary obstacle entities.
///
/// Pooled entities stay in the world with `active = false`; acquiring one
/// hands back its id still inactive so the caller can place it first.
#[derive(Debug)]
pub(crate) struct ObstaclePool {
    template: TemplateKey,
    queue: VecDeque<EntityId>,
    queued: HashSet<EntityId>,
    owned: HashSet<EntityId>,
}

impl ObstaclePool {
    pub(crate) fn new(template: TemplateKey) -> Self {
        Self {
            template,
            queue: VecDeque::new(),
            queued: HashSet::new(),
            owned: HashSet::new(),
        }
    }

    pub(crate) fn template(&self) -> &TemplateKey {
        &self.template
    }

    pub(crate) fn prewarm(&mut self, count: usize, world: &mut SceneWorld) {
        for _ in 0..count {
            let id = self.create(world);
            self.enqueue(id);
        }
    }

    /// Tops the queue up to `target` entries and returns how many were created.
    pub(crate) fn prewarm_to(&mut self, target: usize, world: &mut SceneWorld) -> usize {
        let missing = target.saturating_sub(self.queue.len());
        self.prewarm(missing, world);
        missing
    }

    pub(crate) fn acquire(&mut self, world: &mut SceneWorld) -> EntityId {
        while let Some(id) = self.queue.pop_front() {
            self.queued.remove(&id);
            if world.contains(id) {
                return id;
            }
            // Removed from the world behind our back; forget it.
            self.owned.remove(&id);
        }
        self.create(world)
    }

    pub(crate) fn release(
        &mut self,
        id: EntityId,
        world: &mut SceneWorld,
    ) -> Result<(), PoolError> {
        if !self.owned.contains(&id) {
            return Err(PoolError::Foreign(id));
        }
        if self.queued.contains(&id) {
            return Err(PoolError::AlreadyPooled(id));
        }
        if !world.set_active(id, false) {
            self.owned.remove(&id);
            return Err(PoolError::Destroyed(id));
        }
        self.enqueue(id);
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub(crate) fn is_pooled(&self, id: EntityId) -> bool {
        self.queued.contains(&id)
    }

    fn create(&mut self, world: &mut SceneWorld) -> EntityId {
        let id = world.spawn_inactive(
            Transform::default(),
            self.template.clone(),
            PRIMARY_DEBUG_NAME,
        );
        self.owned.insert(id);
        id
    }

    fn enqueue(&mut self, id: EntityId) {
        self.queued.insert(id);
        self.queue.push_back(id);
    }
}
