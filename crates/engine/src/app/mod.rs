mod loop_runner;
mod metrics;
mod scene;
mod signal;
mod tools;
mod transform;

pub use loop_runner::{
    run_app, run_app_with_metrics, AppError, ConsoleMode, LoopConfig, RunSummary,
    SLOW_FRAME_ENV_VAR,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use scene::{
    DebugInfoSnapshot, Entity, EntityId, EntityIdAllocator, Scene, SceneCommand,
    SceneDebugCommand, SceneDebugCommandResult, SceneWorld, TickContext,
};
pub use signal::{gameplay_signal, GameplaySignal, GameplaySignalWriter};
pub use tools::{ConsoleLineSource, NoConsole, StdinConsolePump};
pub use transform::{Transform, Vec3};
