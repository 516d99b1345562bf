use std::env;
use std::path::PathBuf;
use std::time::Duration;

use engine::{
    gameplay_signal, resolve_app_paths, ConsoleMode, GameplaySignalWriter, LoopConfig, Scene,
    StartupError,
};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::scene::RunnerScene;
use super::spawner::{
    load_spawner_config, ConfigError, ObstacleSpawner, SPAWNER_CONFIG_ENV_VAR, SPAWNER_CONFIG_FILE,
};

const RUN_SECONDS_ENV_VAR: &str = "RUNNER_RUN_SECONDS";

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid RUNNER_RUN_SECONDS value '{value}': expected a positive number of seconds")]
    RunSeconds { value: String },
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene: Box<dyn Scene>,
    pub(crate) signal_writer: GameplaySignalWriter,
    pub(crate) console_mode: ConsoleMode,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Lane Runner Startup ===");

    let config_path = resolve_spawner_config_path()?;
    let spawner_config = load_spawner_config(&config_path)?;
    info!(path = %config_path.display(), "spawner_config_loaded");

    let max_run_duration = parse_run_seconds(env::var(RUN_SECONDS_ENV_VAR).ok().as_deref())?;
    let config = LoopConfig {
        max_run_duration,
        ..LoopConfig::default()
    };
    let (signal_writer, _) = gameplay_signal();
    let scene = RunnerScene::new(ObstacleSpawner::new(spawner_config));

    Ok(AppWiring {
        config,
        scene: Box::new(scene),
        signal_writer,
        console_mode: ConsoleMode::Stdin,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn resolve_spawner_config_path() -> Result<PathBuf, BootstrapError> {
    if let Some(raw) = env::var_os(SPAWNER_CONFIG_ENV_VAR) {
        return Ok(PathBuf::from(raw));
    }
    let paths = resolve_app_paths()?;
    Ok(paths.assets_dir.join(SPAWNER_CONFIG_FILE))
}

fn parse_run_seconds(raw: Option<&str>) -> Result<Option<Duration>, BootstrapError> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    match raw.parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds > 0.0 => {
            Ok(Some(Duration::from_secs_f64(seconds)))
        }
        _ => Err(BootstrapError::RunSeconds {
            value: raw.to_string(),
        }),
    }
}
