use std::env;
use std::io::{self, Write};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::metrics::MetricsAccumulator;
use super::scene::SceneHost;
use super::tools::{
    ConsoleCommandProcessor, ConsoleLineSource, DebugCommand, NoConsole, StdinConsolePump,
};
use super::{
    DebugInfoSnapshot, GameplaySignal, GameplaySignalWriter, MetricsHandle, Scene, SceneCommand,
    SceneDebugCommand, SceneDebugCommandResult, TickContext,
};

pub const SLOW_FRAME_ENV_VAR: &str = "RUNNER_SLOW_FRAME_MS";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub simulated_slow_frame_ms: u64,
    pub max_run_duration: Option<Duration>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            simulated_slow_frame_ms: 0,
            max_run_duration: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleMode {
    Disabled,
    Stdin,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to start stdin console reader: {0}")]
    ConsoleSpawn(#[source] io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub gameplay_active: bool,
    pub final_snapshot: Option<DebugInfoSnapshot>,
}

pub fn run_app(
    config: LoopConfig,
    scene: Box<dyn Scene>,
    signal_writer: GameplaySignalWriter,
    console_mode: ConsoleMode,
) -> Result<RunSummary, AppError> {
    let metrics_handle = MetricsHandle::default();
    run_app_with_metrics(config, scene, signal_writer, console_mode, metrics_handle)
}

pub fn run_app_with_metrics(
    config: LoopConfig,
    scene: Box<dyn Scene>,
    signal_writer: GameplaySignalWriter,
    console_mode: ConsoleMode,
    metrics_handle: MetricsHandle,
) -> Result<RunSummary, AppError> {
    let console: Box<dyn ConsoleLineSource> = match console_mode {
        ConsoleMode::Disabled => Box::new(NoConsole),
        ConsoleMode::Stdin => {
            Box::new(StdinConsolePump::spawn().map_err(AppError::ConsoleSpawn)?)
        }
    };

    let started = Instant::now();
    let mut runner = LoopRunner::new(
        &config,
        scene,
        signal_writer,
        console,
        metrics_handle,
        started,
    );
    let slow_frame_delay = resolve_slow_frame_delay(config.simulated_slow_frame_ms);
    info!(
        target_tps = runner.target_tps,
        max_frame_delta_ms = runner.max_frame_delta.as_millis() as u64,
        max_ticks_per_frame = runner.max_ticks_per_frame,
        slow_frame_delay_ms = slow_frame_delay.as_millis() as u64,
        max_run_seconds = config.max_run_duration.map(|value| value.as_secs_f32()),
        ?console_mode,
        "loop_config"
    );

    runner.load();
    let mut last_frame_instant = started;
    loop {
        if slow_frame_delay > Duration::ZERO {
            // Explicit debug perturbation only; exercises the backlog clamp.
            thread::sleep(slow_frame_delay);
        }

        let now = Instant::now();
        let frame_dt = now.saturating_duration_since(last_frame_instant);
        last_frame_instant = now;

        let outcome = runner.frame(frame_dt, now);
        print_console_lines(&runner.take_console_output());
        if outcome == FrameOutcome::Quit {
            break;
        }

        if let Some(max_run_duration) = config.max_run_duration {
            if now.saturating_duration_since(started) >= max_run_duration {
                info!(reason = "max_run_duration", "shutdown_requested");
                break;
            }
        }

        let frame_cost = Instant::now().saturating_duration_since(now);
        let idle = compute_idle_sleep(frame_cost, runner.fixed_dt);
        if idle > Duration::ZERO {
            thread::sleep(idle);
        }
    }

    let summary = runner.shutdown();
    info!(ticks = summary.ticks, gameplay_active = summary.gameplay_active, "shutdown");
    Ok(summary)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameOutcome {
    Continue,
    Quit,
}

/// One frame of the headless loop: console input, then as many fixed ticks
/// as the accumulated time allows, then metrics.
pub(crate) struct LoopRunner {
    host: SceneHost,
    signal_writer: GameplaySignalWriter,
    signal: GameplaySignal,
    console: Box<dyn ConsoleLineSource>,
    processor: ConsoleCommandProcessor,
    metrics_handle: MetricsHandle,
    metrics_accumulator: MetricsAccumulator,
    target_tps: u32,
    fixed_dt: Duration,
    fixed_dt_seconds: f32,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    accumulator: Duration,
    ticks: u64,
    gameplay_end_logged: bool,
    pending_lines: Vec<String>,
    pending_commands: Vec<DebugCommand>,
    console_output: Vec<String>,
}

impl LoopRunner {
    pub(crate) fn new(
        config: &LoopConfig,
        scene: Box<dyn Scene>,
        signal_writer: GameplaySignalWriter,
        console: Box<dyn ConsoleLineSource>,
        metrics_handle: MetricsHandle,
        now: Instant,
    ) -> Self {
        let target_tps = config.target_tps.max(1);
        let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
        let metrics_log_interval =
            normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
        let signal = signal_writer.reader();
        Self {
            host: SceneHost::new(scene),
            signal_writer,
            signal,
            console,
            processor: ConsoleCommandProcessor::new(),
            metrics_handle,
            metrics_accumulator: MetricsAccumulator::new(metrics_log_interval, now),
            target_tps,
            fixed_dt,
            fixed_dt_seconds: fixed_dt.as_secs_f32(),
            max_frame_delta: normalize_non_zero_duration(
                config.max_frame_delta,
                Duration::from_millis(250),
            ),
            max_ticks_per_frame: config.max_ticks_per_frame.max(1),
            accumulator: Duration::ZERO,
            ticks: 0,
            gameplay_end_logged: false,
            pending_lines: Vec::new(),
            pending_commands: Vec::new(),
            console_output: Vec::new(),
        }
    }

    pub(crate) fn load(&mut self) {
        self.host.load();
        info!(
            entity_count = self.host.world().entity_count(),
            "scene_loaded"
        );
    }

    pub(crate) fn frame(&mut self, frame_dt: Duration, now: Instant) -> FrameOutcome {
        let mut quit_requested = self.process_console();

        let clamped_frame_dt = clamp_frame_delta(frame_dt, self.max_frame_delta);
        self.accumulator = self.accumulator.saturating_add(clamped_frame_dt);
        let step_plan = plan_sim_steps(self.accumulator, self.fixed_dt, self.max_ticks_per_frame);
        self.accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            self.metrics_accumulator
                .record_dropped_backlog(step_plan.dropped_backlog);
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame = self.max_ticks_per_frame,
                "sim_clamp_triggered"
            );
        }

        for _ in 0..step_plan.ticks_to_run {
            let tick_started = Instant::now();
            let ctx = TickContext::new(self.fixed_dt_seconds, self.signal.is_active());
            let command = self.host.update(&ctx);
            self.ticks = self.ticks.saturating_add(1);
            self.metrics_accumulator
                .record_tick(Instant::now().saturating_duration_since(tick_started));
            if command == SceneCommand::Quit {
                info!(reason = "scene_quit", "shutdown_requested");
                quit_requested = true;
                break;
            }
        }

        if !self.signal.is_active() && !self.gameplay_end_logged {
            self.gameplay_end_logged = true;
            info!(tick = self.ticks, "gameplay_ended");
        }

        if let Some(snapshot) = self.metrics_accumulator.maybe_snapshot(now) {
            self.metrics_handle.publish(snapshot);
            info!(
                tps = snapshot.tps,
                tick_time_ms = snapshot.tick_time_ms,
                worst_tick_ms = snapshot.worst_tick_ms,
                dropped_backlog_ms = snapshot.dropped_backlog_ms,
                entity_count = self.host.world().entity_count(),
                title = self.host.debug_title().as_deref().unwrap_or("-"),
                "loop_metrics"
            );
        }

        if quit_requested {
            FrameOutcome::Quit
        } else {
            FrameOutcome::Continue
        }
    }

    pub(crate) fn take_console_output(&mut self) -> Vec<String> {
        self.processor.drain_output_lines_into(&mut self.console_output);
        std::mem::take(&mut self.console_output)
    }

    pub(crate) fn shutdown(mut self) -> RunSummary {
        let final_snapshot = self.status_snapshot();
        self.host.shutdown();
        RunSummary {
            ticks: self.ticks,
            gameplay_active: self.signal.is_active(),
            final_snapshot,
        }
    }

    fn process_console(&mut self) -> bool {
        self.pending_lines.clear();
        self.console.drain_pending_lines(&mut self.pending_lines);
        if !self.pending_lines.is_empty() {
            self.processor.process_lines(&self.pending_lines);
        }

        self.pending_commands.clear();
        self.processor
            .drain_pending_debug_commands_into(&mut self.pending_commands);

        let mut quit_requested = false;
        let commands = std::mem::take(&mut self.pending_commands);
        for command in &commands {
            debug!(?command, "debug_command");
            match command {
                DebugCommand::SpawnNow => self.forward_to_scene(SceneDebugCommand::SpawnNow),
                DebugCommand::DespawnAll => self.forward_to_scene(SceneDebugCommand::DespawnAll),
                DebugCommand::Prewarm { target } => {
                    self.forward_to_scene(SceneDebugCommand::Prewarm { target: *target })
                }
                DebugCommand::Status => self.report_status(),
                DebugCommand::GameOver => {
                    let line = if self.signal_writer.end_gameplay() {
                        "gameplay ended"
                    } else {
                        "gameplay already ended"
                    };
                    self.processor.append_output_line(line);
                }
                DebugCommand::Quit => {
                    info!(reason = "console_quit", "shutdown_requested");
                    quit_requested = true;
                }
            }
        }
        self.pending_commands = commands;
        quit_requested
    }

    fn forward_to_scene(&mut self, command: SceneDebugCommand) {
        let line = match self.host.execute_debug_command(command) {
            SceneDebugCommandResult::Success(message) => message,
            SceneDebugCommandResult::Error(message) => format!("error: {message}"),
            SceneDebugCommandResult::Unsupported => {
                "error: command not supported by active scene".to_string()
            }
        };
        self.processor.append_output_line(line);
    }

    fn report_status(&mut self) {
        let line = match self.status_snapshot() {
            Some(snapshot) => match serde_json::to_string(&snapshot) {
                Ok(json) => json,
                Err(error) => format!("error: failed to encode status: {error}"),
            },
            None => "error: active scene exposes no status".to_string(),
        };
        self.processor.append_output_line(line);
    }

    fn status_snapshot(&self) -> Option<DebugInfoSnapshot> {
        let mut snapshot = self.host.debug_info_snapshot()?;
        snapshot.gameplay_active = self.signal.is_active();
        Some(snapshot)
    }
}

fn print_console_lines(lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in lines {
        if let Err(error) = writeln!(out, "{line}") {
            warn!(error = %error, "console_output_failed");
            return;
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::replace(&mut accumulator, Duration::ZERO)
    } else {
        Duration::ZERO
    };

    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn compute_idle_sleep(frame_cost: Duration, fixed_dt: Duration) -> Duration {
    fixed_dt.saturating_sub(frame_cost)
}

fn resolve_slow_frame_delay(config_slow_frame_ms: u64) -> Duration {
    match env::var(SLOW_FRAME_ENV_VAR) {
        Ok(value) => match value.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                warn!(
                    env_var = SLOW_FRAME_ENV_VAR,
                    value = value.as_str(),
                    "invalid slow-frame env var value; falling back to config"
                );
                Duration::from_millis(config_slow_frame_ms)
            }
        },
        Err(env::VarError::NotPresent) => Duration::from_millis(config_slow_frame_ms),
        Err(err) => {
            warn!(
                env_var = SLOW_FRAME_ENV_VAR,
                error = %err,
                "unable to read slow-frame env var; falling back to config"
            );
            Duration::from_millis(config_slow_frame_ms)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::{BTreeMap, VecDeque};
    use std::rc::Rc;

    use super::*;
    use crate::app::{gameplay_signal, SceneWorld};

    #[derive(Debug, Default)]
    struct Probe {
        contexts: Vec<TickContext>,
        debug_commands: Vec<SceneDebugCommand>,
        unloaded: bool,
    }

    struct ProbeScene {
        probe: Rc<RefCell<Probe>>,
        quit_after_ticks: Option<usize>,
    }

    impl Scene for ProbeScene {
        fn load(&mut self, _world: &mut SceneWorld) {}

        fn update(&mut self, ctx: &TickContext, _world: &mut SceneWorld) -> SceneCommand {
            let mut probe = self.probe.borrow_mut();
            probe.contexts.push(*ctx);
            match self.quit_after_ticks {
                Some(limit) if probe.contexts.len() >= limit => SceneCommand::Quit,
                _ => SceneCommand::None,
            }
        }

        fn unload(&mut self, _world: &mut SceneWorld) {
            self.probe.borrow_mut().unloaded = true;
        }

        fn debug_info_snapshot(&self, world: &SceneWorld) -> Option<DebugInfoSnapshot> {
            let mut counters = BTreeMap::new();
            counters.insert("ticks_seen", self.probe.borrow().contexts.len() as u64);
            Some(DebugInfoSnapshot {
                scene: "probe".to_string(),
                entity_count: world.entity_count(),
                active_entity_count: world.active_entity_count(),
                gameplay_active: true,
                counters,
            })
        }

        fn execute_debug_command(
            &mut self,
            command: SceneDebugCommand,
            _world: &mut SceneWorld,
        ) -> SceneDebugCommandResult {
            self.probe.borrow_mut().debug_commands.push(command.clone());
            match command {
                SceneDebugCommand::SpawnNow => SceneDebugCommandResult::Success("spawned".to_string()),
                SceneDebugCommand::DespawnAll => SceneDebugCommandResult::Error("empty".to_string()),
                SceneDebugCommand::Prewarm { .. } => SceneDebugCommandResult::Unsupported,
            }
        }
    }

    struct ScriptedConsole {
        frames: VecDeque<Vec<String>>,
    }

    impl ConsoleLineSource for ScriptedConsole {
        fn drain_pending_lines(&mut self, out: &mut Vec<String>) {
            if let Some(lines) = self.frames.pop_front() {
                out.extend(lines);
            }
        }
    }

    fn scripted(frames: &[&[&str]]) -> Box<dyn ConsoleLineSource> {
        Box::new(ScriptedConsole {
            frames: frames
                .iter()
                .map(|lines| lines.iter().map(ToString::to_string).collect())
                .collect(),
        })
    }

    fn make_runner(
        quit_after_ticks: Option<usize>,
        console: Box<dyn ConsoleLineSource>,
    ) -> (LoopRunner, Rc<RefCell<Probe>>) {
        let probe = Rc::new(RefCell::new(Probe::default()));
        let (writer, _signal) = gameplay_signal();
        let config = LoopConfig {
            target_tps: 50,
            max_ticks_per_frame: 4,
            ..LoopConfig::default()
        };
        let mut runner = LoopRunner::new(
            &config,
            Box::new(ProbeScene {
                probe: Rc::clone(&probe),
                quit_after_ticks,
            }),
            writer,
            console,
            MetricsHandle::default(),
            Instant::now(),
        );
        runner.load();
        (runner, probe)
    }

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(250);
        let raw_frame_dt = Duration::from_millis(600);

        assert_eq!(
            clamp_frame_delta(raw_frame_dt, max_frame_delta),
            max_frame_delta
        );
    }

    #[test]
    fn plan_sim_steps_runs_expected_ticks_without_drop() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(50), fixed_dt, 5);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::from_millis(2));
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(120), fixed_dt, 3);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(72));
    }

    #[test]
    fn idle_sleep_never_underflows() {
        let fixed_dt = Duration::from_millis(20);
        assert_eq!(
            compute_idle_sleep(Duration::from_millis(5), fixed_dt),
            Duration::from_millis(15)
        );
        assert_eq!(
            compute_idle_sleep(Duration::from_millis(30), fixed_dt),
            Duration::ZERO
        );
    }

    #[test]
    fn frame_runs_fixed_ticks_with_fixed_dt() {
        let (mut runner, probe) = make_runner(None, Box::new(NoConsole));

        let outcome = runner.frame(Duration::from_millis(60), Instant::now());

        assert_eq!(outcome, FrameOutcome::Continue);
        let probe = probe.borrow();
        assert_eq!(probe.contexts.len(), 3);
        for ctx in &probe.contexts {
            assert!((ctx.fixed_dt_seconds - 0.02).abs() < 1e-6);
            assert!(ctx.gameplay_active);
        }
    }

    #[test]
    fn game_over_command_freezes_following_ticks() {
        let (mut runner, probe) = make_runner(
            None,
            scripted(&[&[], &["game_over"], &["game_over"]]),
        );

        runner.frame(Duration::from_millis(20), Instant::now());
        runner.frame(Duration::from_millis(20), Instant::now());
        assert_eq!(runner.take_console_output(), vec!["gameplay ended"]);
        runner.frame(Duration::from_millis(20), Instant::now());
        assert_eq!(runner.take_console_output(), vec!["gameplay already ended"]);

        let gameplay_flags = probe
            .borrow()
            .contexts
            .iter()
            .map(|ctx| ctx.gameplay_active)
            .collect::<Vec<_>>();
        assert_eq!(gameplay_flags, vec![true, false, false]);
    }

    #[test]
    fn scene_debug_results_are_reported_on_console() {
        let (mut runner, probe) = make_runner(
            None,
            scripted(&[&["spawn_now", "despawn_all", "prewarm 3"]]),
        );

        runner.frame(Duration::ZERO, Instant::now());

        assert_eq!(
            runner.take_console_output(),
            vec![
                "spawned",
                "error: empty",
                "error: command not supported by active scene",
            ]
        );
        assert_eq!(
            probe.borrow().debug_commands,
            vec![
                SceneDebugCommand::SpawnNow,
                SceneDebugCommand::DespawnAll,
                SceneDebugCommand::Prewarm { target: Some(3) },
            ]
        );
    }

    #[test]
    fn status_reports_json_snapshot_with_live_signal() {
        let (mut runner, _probe) = make_runner(None, scripted(&[&["game_over", "status"]]));

        runner.frame(Duration::ZERO, Instant::now());
        let output = runner.take_console_output();

        assert_eq!(output.len(), 2);
        let status: serde_json::Value = serde_json::from_str(&output[1]).expect("status json");
        assert_eq!(status["scene"], "probe");
        assert_eq!(status["gameplay_active"], false);
        assert_eq!(status["counters"]["ticks_seen"], 0);
    }

    #[test]
    fn quit_from_console_or_scene_stops_loop() {
        let (mut runner, _probe) = make_runner(None, scripted(&[&["quit"]]));
        assert_eq!(
            runner.frame(Duration::ZERO, Instant::now()),
            FrameOutcome::Quit
        );

        let (mut runner, probe) = make_runner(Some(2), Box::new(NoConsole));
        assert_eq!(
            runner.frame(Duration::from_millis(80), Instant::now()),
            FrameOutcome::Quit
        );
        assert_eq!(probe.borrow().contexts.len(), 2);
    }

    #[test]
    fn shutdown_unloads_scene_and_reports_ticks() {
        let (mut runner, probe) = make_runner(None, Box::new(NoConsole));
        runner.frame(Duration::from_millis(40), Instant::now());

        let summary = runner.shutdown();

        assert_eq!(summary.ticks, 2);
        assert!(summary.gameplay_active);
        assert!(summary.final_snapshot.is_some());
        assert!(probe.borrow().unloaded);
    }
}
