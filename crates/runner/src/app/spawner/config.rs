use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine::{TemplateKey, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::lanes::{Lane, LaneRegistry};
use super::sweeper::StalenessPolicy;

pub(crate) const SPAWNER_CONFIG_ENV_VAR: &str = "RUNNER_SPAWNER_CONFIG";
pub(crate) const SPAWNER_CONFIG_FILE: &str = "spawner.json";

const DEFAULT_LANE_COUNT: usize = 3;
const DEFAULT_LANE_SPACING: f32 = 3.0;

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read spawner config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse spawner config at {at}: {source}")]
    Parse {
        at: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid spawner config field {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct SpawnerConfig {
    pub lanes: Vec<Lane>,
    pub obstacle_template: Option<TemplateKey>,
    pub segment_template: Option<TemplateKey>,
    pub min_delay: f32,
    pub max_delay: f32,
    pub max_active: usize,
    pub pool_size: usize,
    pub sitting_probability: f32,
    pub min_sit: f32,
    pub max_sit: f32,
    pub move_speed: f32,
    pub move_direction: Vec3,
    /// Segments per obstacle including the pooled primary.
    pub segments_per_obstacle: u32,
    pub segment_offset: Vec3,
    pub staleness: StalenessPolicy,
    pub rng_seed: Option<u64>,
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        let lanes = LaneRegistry::evenly_spaced(DEFAULT_LANE_COUNT, DEFAULT_LANE_SPACING, 0.0, 0.0);
        Self {
            lanes: lanes.lanes().to_vec(),
            obstacle_template: None,
            segment_template: None,
            min_delay: 2.0,
            max_delay: 2.0,
            max_active: 10,
            pool_size: 5,
            sitting_probability: 0.4,
            min_sit: 2.0,
            max_sit: 6.0,
            move_speed: 6.0,
            move_direction: Vec3::FORWARD,
            segments_per_obstacle: 1,
            segment_offset: Vec3::new(-1.5, 0.0, 0.0),
            staleness: StalenessPolicy::default(),
            rng_seed: None,
        }
    }
}

impl SpawnerConfig {
    pub(crate) fn lane_registry(&self) -> LaneRegistry {
        LaneRegistry::new(self.lanes.clone())
    }

    /// Rejects values that cannot be repaired and repairs the rest in place,
    /// logging each repair.
    pub(crate) fn validated(mut self) -> Result<Self, ConfigError> {
        require_finite("min_delay", self.min_delay)?;
        require_finite("max_delay", self.max_delay)?;
        require_finite("sitting_probability", self.sitting_probability)?;
        require_finite("min_sit", self.min_sit)?;
        require_finite("max_sit", self.max_sit)?;
        require_finite("move_speed", self.move_speed)?;
        require_finite_vec("move_direction", self.move_direction)?;
        require_finite_vec("segment_offset", self.segment_offset)?;
        for lane in &self.lanes {
            require_finite_vec("lanes.position", lane.position)?;
            require_finite("lanes.yaw_radians", lane.yaw_radians)?;
        }

        if self.min_delay < 0.0 {
            warn!(value = self.min_delay, "spawner_config_min_delay_negative_clamped");
            self.min_delay = 0.0;
        }
        if self.max_delay < self.min_delay {
            warn!(
                min_delay = self.min_delay,
                max_delay = self.max_delay,
                "spawner_config_delay_range_swapped"
            );
            std::mem::swap(&mut self.min_delay, &mut self.max_delay);
            self.min_delay = self.min_delay.max(0.0);
        }

        if self.min_sit < 0.0 {
            warn!(value = self.min_sit, "spawner_config_min_sit_negative_clamped");
            self.min_sit = 0.0;
        }
        if self.max_sit < self.min_sit {
            warn!(
                min_sit = self.min_sit,
                max_sit = self.max_sit,
                "spawner_config_sit_range_swapped"
            );
            std::mem::swap(&mut self.min_sit, &mut self.max_sit);
            self.min_sit = self.min_sit.max(0.0);
        }

        if !(0.0..=1.0).contains(&self.sitting_probability) {
            let clamped = self.sitting_probability.clamp(0.0, 1.0);
            warn!(
                value = self.sitting_probability,
                clamped, "spawner_config_sitting_probability_clamped"
            );
            self.sitting_probability = clamped;
        }

        if self.segments_per_obstacle == 0 {
            warn!("spawner_config_segments_per_obstacle_zero_using_one");
            self.segments_per_obstacle = 1;
        }

        match &mut self.staleness {
            StalenessPolicy::Distance { origin, radius } => {
                require_finite_vec("staleness.origin", *origin)?;
                require_finite("staleness.radius", *radius)?;
                if *radius <= 0.0 {
                    return Err(ConfigError::Invalid {
                        field: "staleness.radius",
                        message: format!("expected a positive radius, got {radius}"),
                    });
                }
            }
            StalenessPolicy::AxisBound { min, max, .. } => {
                require_finite("staleness.min", *min)?;
                require_finite("staleness.max", *max)?;
                if *max < *min {
                    warn!(min = *min, max = *max, "spawner_config_axis_bounds_swapped");
                    std::mem::swap(min, max);
                }
            }
        }

        Ok(self)
    }
}

fn require_finite(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            message: format!("expected a finite number, got {value}"),
        })
    }
}

fn require_finite_vec(field: &'static str, value: Vec3) -> Result<(), ConfigError> {
    require_finite(field, value.x)?;
    require_finite(field, value.y)?;
    require_finite(field, value.z)
}

pub(crate) fn parse_spawner_config(raw: &str) -> Result<SpawnerConfig, ConfigError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let config = serde_path_to_error::deserialize::<_, SpawnerConfig>(&mut deserializer).map_err(
        |error| {
            let path = error.path().to_string();
            let at = if path.is_empty() || path == "." {
                "<root>".to_string()
            } else {
                path
            };
            ConfigError::Parse {
                at,
                source: error.into_inner(),
            }
        },
    )?;
    config.validated()
}

pub(crate) fn load_spawner_config(path: &Path) -> Result<SpawnerConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_spawner_config(&raw)
}
