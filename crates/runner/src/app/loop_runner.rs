use std::process::ExitCode;

use engine::run_app;
use tracing::{error, info};

use super::bootstrap::AppWiring;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    match run_app(app.config, app.scene, app.signal_writer, app.console_mode) {
        Ok(summary) => {
            if let Some(snapshot) = summary.final_snapshot {
                info!(
                    ticks = summary.ticks,
                    gameplay_active = summary.gameplay_active,
                    counters = ?snapshot.counters,
                    "final_status"
                );
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "startup_failed");
            ExitCode::FAILURE
        }
    }
}
