use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use tracing::{debug, warn};

pub(crate) const MAX_PENDING_LINES: usize = 64;

/// Feeds raw console lines into the loop once per frame.
pub trait ConsoleLineSource {
    fn drain_pending_lines(&mut self, out: &mut Vec<String>);
}

/// Source that never produces input.
#[derive(Debug, Default)]
pub struct NoConsole;

impl ConsoleLineSource for NoConsole {
    fn drain_pending_lines(&mut self, _out: &mut Vec<String>) {}
}

/// Reads stdin on a background thread and hands complete lines to the loop
/// without blocking it.
#[derive(Debug)]
pub struct StdinConsolePump {
    receiver: Receiver<String>,
    disconnected: bool,
}

impl StdinConsolePump {
    pub fn spawn() -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel();
        thread::Builder::new()
            .name("stdin-console".to_string())
            .spawn(move || {
                let stdin = io::stdin();
                for line in stdin.lock().lines() {
                    match line {
                        Ok(line) => {
                            if sender.send(line).is_err() {
                                break;
                            }
                        }
                        Err(error) => {
                            warn!(error = %error, "stdin_console_read_failed");
                            break;
                        }
                    }
                }
                debug!("stdin_console_closed");
            })?;
        Ok(Self::from_receiver(receiver))
    }

    pub(crate) fn from_receiver(receiver: Receiver<String>) -> Self {
        Self {
            receiver,
            disconnected: false,
        }
    }
}

impl ConsoleLineSource for StdinConsolePump {
    fn drain_pending_lines(&mut self, out: &mut Vec<String>) {
        if self.disconnected {
            return;
        }
        for _ in 0..MAX_PENDING_LINES {
            match self.receiver.try_recv() {
                Ok(line) => out.push(line),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    break;
                }
            }
        }
    }
}
