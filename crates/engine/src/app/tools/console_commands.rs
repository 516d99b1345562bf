use std::collections::{HashMap, VecDeque};

const MAX_PENDING_DEBUG_COMMANDS: usize = 128;
const MAX_OUTPUT_LINES: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DebugCommand {
    SpawnNow,
    DespawnAll,
    Prewarm { target: Option<usize> },
    Status,
    GameOver,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LocalAction {
    Help,
    Echo { text: String },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ParsedCommand {
    Local(LocalAction),
    Queueable(DebugCommand),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CommandParseError {
    reason: String,
    usage: String,
}

type ParseFn = dyn Fn(&[String]) -> Result<ParsedCommand, CommandParseError> + Send + Sync;
type BuiltinParseFn = fn(&[String]) -> Result<ParsedCommand, CommandParseError>;

pub(crate) struct CommandSpec {
    name: String,
    help: String,
    arg_schema: String,
    parse: Box<ParseFn>,
}

pub(crate) struct ConsoleCommandRegistry {
    specs: Vec<CommandSpec>,
    lookup_by_lower_name: HashMap<String, usize>,
}

impl ConsoleCommandRegistry {
    pub(crate) fn new() -> Self {
        Self {
            specs: Vec::new(),
            lookup_by_lower_name: HashMap::new(),
        }
    }

    pub(crate) fn with_engine_builtins() -> Self {
        let builtins: [(&str, &str, &str, BuiltinParseFn); 8] = [
            ("help", "List commands", "", parse_help_command),
            ("echo", "Print text to console", "<text...>", parse_echo_command),
            ("spawn_now", "Spawn one obstacle immediately", "", parse_spawn_now_command),
            ("despawn_all", "Recycle every active obstacle", "", parse_despawn_all_command),
            (
                "prewarm",
                "Fill the obstacle pool up to a target size",
                "[target:usize]",
                parse_prewarm_command,
            ),
            ("status", "Print active and pooled counts", "", parse_status_command),
            ("game_over", "End gameplay and freeze obstacles", "", parse_game_over_command),
            ("quit", "Quit app", "", parse_quit_command),
        ];

        let mut registry = Self::new();
        for (name, help, arg_schema, parse) in builtins {
            registry
                .register(name, help, arg_schema, parse)
                .expect("built-in command registration should not fail");
        }
        registry
    }

    pub(crate) fn register<F>(
        &mut self,
        name: impl Into<String>,
        help: impl Into<String>,
        arg_schema: impl Into<String>,
        parse: F,
    ) -> Result<(), String>
    where
        F: Fn(&[String]) -> Result<ParsedCommand, CommandParseError> + Send + Sync + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("command name cannot be empty".to_string());
        }
        let lower = name.to_ascii_lowercase();
        if self.lookup_by_lower_name.contains_key(&lower) {
            return Err(format!("duplicate command registration: {name}"));
        }

        self.specs.push(CommandSpec {
            name,
            help: help.into(),
            arg_schema: arg_schema.into(),
            parse: Box::new(parse),
        });
        self.lookup_by_lower_name
            .insert(lower, self.specs.len() - 1);
        Ok(())
    }

    pub(crate) fn lookup(&self, input_name: &str) -> Option<&CommandSpec> {
        let lower = input_name.to_ascii_lowercase();
        let index = self.lookup_by_lower_name.get(&lower)?;
        self.specs.get(*index)
    }

    pub(crate) fn iter_specs_in_order(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.specs.iter().map(|spec| {
            (
                spec.name.as_str(),
                spec.help.as_str(),
                spec.arg_schema.as_str(),
            )
        })
    }
}

pub(crate) struct ConsoleCommandProcessor {
    registry: ConsoleCommandRegistry,
    pending_debug_commands: VecDeque<DebugCommand>,
    output_lines: VecDeque<String>,
}

impl Default for ConsoleCommandProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleCommandProcessor {
    pub(crate) fn new() -> Self {
        Self {
            registry: ConsoleCommandRegistry::with_engine_builtins(),
            pending_debug_commands: VecDeque::new(),
            output_lines: VecDeque::new(),
        }
    }

    pub(crate) fn process_lines(&mut self, lines: &[String]) {
        for raw_line in lines {
            self.process_line(raw_line);
        }
    }

    pub(crate) fn drain_pending_debug_commands_into(&mut self, out: &mut Vec<DebugCommand>) {
        out.extend(self.pending_debug_commands.drain(..));
    }

    pub(crate) fn drain_output_lines_into(&mut self, out: &mut Vec<String>) {
        out.extend(self.output_lines.drain(..));
    }

    pub(crate) fn append_output_line(&mut self, line: impl Into<String>) {
        if self.output_lines.len() == MAX_OUTPUT_LINES {
            self.output_lines.pop_front();
        }
        self.output_lines.push_back(line.into());
    }

    fn process_line(&mut self, raw_line: &str) {
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            return;
        }

        let tokens = match tokenize_line(trimmed) {
            Ok(tokens) => tokens,
            Err(reason) => {
                self.append_output_line(format!("error: {reason}. usage: help"));
                return;
            }
        };
        if tokens.is_empty() {
            return;
        }

        let command_name = &tokens[0];
        let args = &tokens[1..];
        let parsed = match self.registry.lookup(command_name) {
            Some(spec) => (spec.parse)(args),
            None => {
                self.append_output_line(format!(
                    "error: unknown command '{}'. try: help",
                    command_name
                ));
                return;
            }
        };

        match parsed {
            Ok(ParsedCommand::Local(action)) => self.apply_local_action(action),
            Ok(ParsedCommand::Queueable(command)) => self.push_queueable(command),
            Err(error) => {
                self.append_output_line(format!(
                    "error: {}. usage: {}",
                    error.reason, error.usage
                ));
            }
        }
    }

    fn apply_local_action(&mut self, action: LocalAction) {
        match action {
            LocalAction::Help => {
                let lines = self
                    .registry
                    .iter_specs_in_order()
                    .map(|(name, help, arg_schema)| {
                        if arg_schema.is_empty() {
                            format!("{name} - {help}")
                        } else {
                            format!("{name} {arg_schema} - {help}")
                        }
                    })
                    .collect::<Vec<_>>();
                for line in lines {
                    self.append_output_line(line);
                }
            }
            LocalAction::Echo { text } => {
                self.append_output_line(text);
            }
        }
    }

    fn push_queueable(&mut self, command: DebugCommand) {
        if self.pending_debug_commands.len() == MAX_PENDING_DEBUG_COMMANDS {
            self.pending_debug_commands.pop_front();
        }
        self.pending_debug_commands.push_back(command);
    }
}

fn tokenize_line(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut seen_token_content = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                seen_token_content = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if seen_token_content {
                    tokens.push(std::mem::take(&mut current));
                    seen_token_content = false;
                }
            }
            _ => {
                current.push(ch);
                seen_token_content = true;
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted string".to_string());
    }

    if seen_token_content {
        tokens.push(current);
    }

    Ok(tokens)
}

fn parse_help_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "help")?;
    Ok(ParsedCommand::Local(LocalAction::Help))
}

fn parse_echo_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    if args.is_empty() {
        return Err(CommandParseError {
            reason: "missing required argument <text...>".to_string(),
            usage: "echo <text...>".to_string(),
        });
    }
    Ok(ParsedCommand::Local(LocalAction::Echo {
        text: args.join(" "),
    }))
}

fn parse_spawn_now_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "spawn_now")?;
    Ok(ParsedCommand::Queueable(DebugCommand::SpawnNow))
}

fn parse_despawn_all_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "despawn_all")?;
    Ok(ParsedCommand::Queueable(DebugCommand::DespawnAll))
}

fn parse_prewarm_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    let target = match args {
        [] => None,
        [raw] => Some(raw.parse::<usize>().map_err(|_| CommandParseError {
            reason: format!("invalid target '{raw}' (expected usize)"),
            usage: "prewarm [target]".to_string(),
        })?),
        _ => {
            return Err(CommandParseError {
                reason: "expected at most one argument [target]".to_string(),
                usage: "prewarm [target]".to_string(),
            });
        }
    };
    Ok(ParsedCommand::Queueable(DebugCommand::Prewarm { target }))
}

fn parse_status_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "status")?;
    Ok(ParsedCommand::Queueable(DebugCommand::Status))
}

fn parse_game_over_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "game_over")?;
    Ok(ParsedCommand::Queueable(DebugCommand::GameOver))
}

fn parse_quit_command(args: &[String]) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(args, "quit")?;
    Ok(ParsedCommand::Queueable(DebugCommand::Quit))
}

fn require_no_args(args: &[String], usage: &str) -> Result<(), CommandParseError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CommandParseError {
            reason: "unexpected extra arguments".to_string(),
            usage: usage.to_string(),
        })
    }
}
