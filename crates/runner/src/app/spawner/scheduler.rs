use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScheduleDecision {
    Waiting,
    CapacityBlocked,
    Due,
}

/// Timing and lane choice for new obstacles.
///
/// Elapsed time keeps accumulating while the active set is full, so the
/// first freed slot is filled on the very next tick.
#[derive(Debug)]
pub(crate) struct SpawnScheduler {
    rng: ChaCha8Rng,
    seed: u64,
    min_delay: f32,
    max_delay: f32,
    elapsed: f32,
    next_delay: f32,
    last_lane: Option<usize>,
}

impl SpawnScheduler {
    pub(crate) fn new(min_delay: f32, max_delay: f32, seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(rand::random::<u64>);
        let mut scheduler = Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            min_delay,
            max_delay,
            elapsed: 0.0,
            next_delay: 0.0,
            last_lane: None,
        };
        scheduler.next_delay = scheduler.draw_delay();
        scheduler
    }

    pub(crate) fn seed(&self) -> u64 {
        self.seed
    }

    pub(crate) fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub(crate) fn next_delay(&self) -> f32 {
        self.next_delay
    }

    pub(crate) fn last_lane(&self) -> Option<usize> {
        self.last_lane
    }

    pub(crate) fn tick(
        &mut self,
        dt_seconds: f32,
        active_count: usize,
        max_active: usize,
    ) -> ScheduleDecision {
        self.elapsed += dt_seconds;
        if self.elapsed < self.next_delay {
            ScheduleDecision::Waiting
        } else if active_count >= max_active {
            ScheduleDecision::CapacityBlocked
        } else {
            ScheduleDecision::Due
        }
    }

    /// Resets the timer and draws the next delay. Called after every spawn
    /// attempt that was due, successful or skipped.
    pub(crate) fn restart(&mut self) {
        self.elapsed = 0.0;
        self.next_delay = self.draw_delay();
    }

    /// Uniform lane draw that refuses to repeat the previous lane while other
    /// obstacles are still out.
    pub(crate) fn pick_lane(&mut self, lane_count: usize, avoid_repeat: bool) -> usize {
        let mut lane = self.rng.random_range(0..lane_count);
        if avoid_repeat && lane_count > 1 {
            while Some(lane) == self.last_lane {
                lane = self.rng.random_range(0..lane_count);
            }
        }
        self.last_lane = Some(lane);
        lane
    }

    pub(crate) fn roll_sitting(&mut self, probability: f32) -> bool {
        self.rng.random_bool(f64::from(probability.clamp(0.0, 1.0)))
    }

    pub(crate) fn roll_idle_duration(&mut self, min_sit: f32, max_sit: f32) -> f32 {
        self.uniform(min_sit, max_sit)
    }

    fn draw_delay(&mut self) -> f32 {
        self.uniform(self.min_delay, self.max_delay)
    }

    fn uniform(&mut self, min: f32, max: f32) -> f32 {
        if max <= min {
            return min;
        }
        self.rng.random_range(min..=max)
    }
}
