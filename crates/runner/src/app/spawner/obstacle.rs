use engine::{EntityId, SceneWorld, Transform, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ObstacleState {
    Idle,
    Moving,
}

/// Sit-then-move behavior of one obstacle activation.
///
/// An idle obstacle accumulates time until its idle duration elapses, then
/// switches to `Moving` for the rest of the activation. Nothing advances while
/// gameplay is inactive.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ObstacleMotion {
    state: ObstacleState,
    idle_timer: f32,
    idle_duration: f32,
    speed: f32,
    direction: Vec3,
}

impl Default for ObstacleMotion {
    fn default() -> Self {
        Self {
            state: ObstacleState::Moving,
            idle_timer: 0.0,
            idle_duration: 0.0,
            speed: 0.0,
            direction: Vec3::FORWARD,
        }
    }
}

impl ObstacleMotion {
    pub(crate) fn initialize(
        &mut self,
        sitting: bool,
        idle_duration: f32,
        speed: f32,
        direction: Vec3,
    ) {
        self.state = if sitting {
            ObstacleState::Idle
        } else {
            ObstacleState::Moving
        };
        self.idle_timer = 0.0;
        self.idle_duration = idle_duration.max(0.0);
        self.speed = speed;
        self.direction = direction;
    }

    pub(crate) fn state(&self) -> ObstacleState {
        self.state
    }

    pub(crate) fn idle_timer(&self) -> f32 {
        self.idle_timer
    }

    pub(crate) fn idle_duration(&self) -> f32 {
        self.idle_duration
    }

    /// Advances one tick and returns the world-space displacement to apply.
    pub(crate) fn tick(&mut self, dt_seconds: f32, gameplay_active: bool) -> Vec3 {
        if !gameplay_active {
            return Vec3::ZERO;
        }

        match self.state {
            ObstacleState::Idle => {
                self.idle_timer += dt_seconds;
                if self.idle_timer < self.idle_duration {
                    return Vec3::ZERO;
                }
                self.state = ObstacleState::Moving;
                let leftover = self.idle_timer - self.idle_duration;
                self.velocity() * leftover
            }
            ObstacleState::Moving => self.velocity() * dt_seconds,
        }
    }

    fn velocity(&self) -> Vec3 {
        self.direction.normalize_or_zero() * self.speed
    }
}

/// Extra, non-pooled segment of a composite obstacle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SegmentSlot {
    pub id: EntityId,
    /// Offset from the primary in the anchor's local frame.
    pub local_offset: Vec3,
}

/// An obstacle currently out on a lane: the pooled primary, its extra
/// segments, and the motion driving them.
#[derive(Debug, Clone)]
pub(crate) struct ActiveObstacle {
    pub primary: EntityId,
    pub lane: usize,
    pub anchor: Transform,
    pub segments: Vec<SegmentSlot>,
    pub motion: ObstacleMotion,
}

impl ActiveObstacle {
    /// Applies one motion tick to the primary and drags the segments along.
    /// Returns false when the primary no longer exists in the world.
    pub(crate) fn advance(
        &mut self,
        dt_seconds: f32,
        gameplay_active: bool,
        world: &mut SceneWorld,
    ) -> bool {
        let displacement = self.motion.tick(dt_seconds, gameplay_active);
        let Some(primary) = world.find_entity_mut(self.primary) else {
            return false;
        };
        if displacement == Vec3::ZERO {
            return true;
        }
        primary.transform.position += displacement;
        let primary_position = primary.transform.position;
        self.place_segments(primary_position, world);
        true
    }

    pub(crate) fn place_segments(&self, primary_position: Vec3, world: &mut SceneWorld) {
        for segment in &self.segments {
            if let Some(entity) = world.find_entity_mut(segment.id) {
                entity.transform.position =
                    primary_position + segment.local_offset.rotate_yaw(self.anchor.yaw_radians);
                entity.transform.yaw_radians = self.anchor.yaw_radians;
            }
        }
    }

    pub(crate) fn primary_position(&self, world: &SceneWorld) -> Option<Vec3> {
        world
            .find_entity(self.primary)
            .map(|entity| entity.transform.position)
    }
}
