mod console;
pub(crate) mod console_commands;

pub use console::{ConsoleLineSource, NoConsole, StdinConsolePump};
pub(crate) use console_commands::{ConsoleCommandProcessor, DebugCommand};
