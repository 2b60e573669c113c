//! Block redirection
//!
//! While a block is open, the shell hands every typed line to the active
//! [`Redirection`] before anything else. The redirection either consumes
//! the line as one of its own keywords, or buffers it. Blocks typed inside
//! the buffer are tracked by the [`ControlFlowStack`] so their keywords are
//! buffered too. When the block's own terminator arrives the shell takes
//! the redirection out of its slot and runs it.

use crate::condition::Condition;
use crate::control::{BlockPhase, ControlFlowStack, Transition, TryPhase, CATCH, FINALLY, STOP_RECORD};
use crate::error::CliError;
use crate::lexer::{command_name, CommandLine};
use crate::macros::export_lines;
use crate::parser::parse_request;
use crate::shell::Shell;
use crate::value::{ModelValue, ValuePath};
use std::path::PathBuf;
use tracing::debug;

/// What happened to a line offered to the redirection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Appended to the current buffer
    Buffered,
    /// A keyword belonging to the block or to a nested block
    StructuralHandled,
    /// The block's terminator: the block is complete and must run
    Terminated,
    /// Not for the block; execute as a normal command
    PassThrough,
}

/// Where an `if` condition gets its value from
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// `of <request>`: executed when the block runs
    Request(String),
    /// `of $name`: the variable's value
    Variable(ValuePath),
    /// No `of` clause: the condition only reads variables
    None,
}

#[derive(Debug, Clone)]
pub struct IfElseBlock {
    pub condition: Condition,
    pub target: Target,
    pub if_lines: Vec<String>,
    pub else_lines: Option<Vec<String>>,
    phase: BlockPhase,
}

impl IfElseBlock {
    pub fn new(condition: Condition, target: Target) -> Self {
        IfElseBlock {
            condition,
            target,
            if_lines: Vec::new(),
            else_lines: None,
            phase: BlockPhase::If { in_else: false },
        }
    }

    pub fn is_in_if(&self) -> bool {
        self.phase == BlockPhase::If { in_else: false }
    }
}

#[derive(Debug, Clone)]
pub struct TryBlock {
    pub try_lines: Vec<String>,
    pub catch_lines: Option<Vec<String>>,
    pub finally_lines: Option<Vec<String>>,
    phase: BlockPhase,
}

impl Default for TryBlock {
    fn default() -> Self {
        TryBlock {
            try_lines: Vec::new(),
            catch_lines: None,
            finally_lines: None,
            phase: BlockPhase::Try(TryPhase::InTry),
        }
    }
}

impl TryBlock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone)]
pub struct ForBlock {
    pub var_name: String,
    pub items: Vec<ModelValue>,
    pub body: Vec<String>,
    /// Set by `end-for --discard`: close without iterating
    pub discard: bool,
}

impl ForBlock {
    pub fn new(var_name: &str, items: Vec<ModelValue>) -> Self {
        ForBlock {
            var_name: var_name.to_string(),
            items,
            body: Vec::new(),
            discard: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Recorder {
    pub name: Option<String>,
    pub export: Option<PathBuf>,
    pub discard: bool,
    pub lines: Vec<String>,
    stop: Option<CommandLine>,
}

impl Recorder {
    /// Build from a `record [name] [--export file] [--discard]` line
    pub fn from_command(cmd: &CommandLine) -> Self {
        Recorder {
            name: cmd.positionals(&["--export"]).first().map(|s| s.to_string()),
            export: cmd.option("--export").map(PathBuf::from),
            discard: cmd.flag("--discard"),
            lines: Vec::new(),
            stop: None,
        }
    }

    /// Settings in effect once stopped: the terminator's options win
    fn resolved(&self) -> (Option<String>, Option<PathBuf>, bool) {
        match &self.stop {
            Some(stop) => (
                stop.positionals(&["--export"])
                    .first()
                    .map(|s| s.to_string())
                    .or_else(|| self.name.clone()),
                stop.option("--export").map(PathBuf::from).or_else(|| self.export.clone()),
                self.discard || stop.flag("--discard"),
            ),
            None => (self.name.clone(), self.export.clone(), self.discard),
        }
    }
}

/// The single active block interceptor
#[derive(Debug, Clone)]
pub enum Redirection {
    IfElse(IfElseBlock),
    TryCatchFinally(TryBlock),
    ForLoop(ForBlock),
    Recorder(Recorder),
}

fn wants_help(line: &str) -> bool {
    line.split_whitespace().skip(1).any(|w| w == "--help")
}

impl Redirection {
    /// Keyword that opened the block
    pub fn kind(&self) -> &'static str {
        match self {
            Redirection::IfElse(_) => "if",
            Redirection::TryCatchFinally(_) => "try",
            Redirection::ForLoop(_) => "for",
            Redirection::Recorder(_) => "record",
        }
    }

    /// Loop variable owned by the block, if any
    pub fn loop_variable(&self) -> Option<&str> {
        match self {
            Redirection::ForLoop(block) => Some(&block.var_name),
            _ => None,
        }
    }

    fn buffer(&mut self) -> &mut Vec<String> {
        match self {
            Redirection::IfElse(block) => match &mut block.else_lines {
                Some(lines) => lines,
                None => &mut block.if_lines,
            },
            Redirection::TryCatchFinally(block) => match block.phase {
                BlockPhase::Try(TryPhase::InFinally) => block.finally_lines.get_or_insert_with(Vec::new),
                BlockPhase::Try(TryPhase::InCatch) => block.catch_lines.get_or_insert_with(Vec::new),
                _ => &mut block.try_lines,
            },
            Redirection::ForLoop(block) => &mut block.body,
            Redirection::Recorder(rec) => &mut rec.lines,
        }
    }

    fn push_line(&mut self, line: &str) {
        self.buffer().push(line.to_string());
    }

    /// Apply one of the block's own keywords
    fn own_keyword(&mut self, name: &str, line: &str) -> Result<LineOutcome, CliError> {
        match self {
            Redirection::IfElse(block) => match block.phase.transition(name)? {
                Transition::Continue => {
                    block.else_lines = Some(Vec::new());
                    Ok(LineOutcome::StructuralHandled)
                }
                Transition::Close => Ok(LineOutcome::Terminated),
            },
            Redirection::TryCatchFinally(block) => {
                let leaving_try = block.phase == BlockPhase::Try(TryPhase::InTry) && matches!(name, CATCH | FINALLY);
                if leaving_try && block.try_lines.is_empty() {
                    return Err(CliError::EmptyTryBlock);
                }
                match block.phase.transition(name)? {
                    Transition::Continue => {
                        match block.phase {
                            BlockPhase::Try(TryPhase::InCatch) => block.catch_lines = Some(Vec::new()),
                            _ => block.finally_lines = Some(Vec::new()),
                        }
                        Ok(LineOutcome::StructuralHandled)
                    }
                    Transition::Close => Ok(LineOutcome::Terminated),
                }
            }
            Redirection::ForLoop(block) => {
                let mut phase = BlockPhase::For;
                phase.transition(name)?;
                block.discard = CommandLine::parse(line)?.flag("--discard");
                Ok(LineOutcome::Terminated)
            }
            Redirection::Recorder(_) => Ok(LineOutcome::Buffered),
        }
    }

    /// Offer a typed line to the block
    pub fn on_line(
        &mut self,
        line: &str,
        control: &mut ControlFlowStack,
        batch_active: bool,
    ) -> Result<LineOutcome, CliError> {
        let name = command_name(line);

        if let Redirection::Recorder(rec) = self {
            if name != STOP_RECORD {
                rec.lines.push(line.to_string());
                return Ok(LineOutcome::Buffered);
            }
            if wants_help(line) {
                return Ok(LineOutcome::PassThrough);
            }
            rec.stop = Some(CommandLine::parse(line)?);
            return Ok(LineOutcome::Terminated);
        }

        let is_keyword = BlockPhase::opened_by(name).is_some() || BlockPhase::is_structural(name);
        if is_keyword && wants_help(line) {
            return Ok(LineOutcome::PassThrough);
        }

        if control.build_and_push(name, batch_active)? {
            self.push_line(line);
            return Ok(LineOutcome::Buffered);
        }

        if BlockPhase::is_structural(name) {
            if !control.is_empty() {
                // belongs to a nested block: track it, keep the line
                control.dispatch(name)?;
                self.push_line(line);
                return Ok(LineOutcome::StructuralHandled);
            }
            return self.own_keyword(name, line);
        }

        control.track_batch(name);
        self.push_line(line);
        Ok(LineOutcome::Buffered)
    }

    /// Execute the completed block. The caller has already removed it
    /// from the shell's slot.
    pub fn run(self, shell: &mut Shell) -> Result<(), CliError> {
        debug!(block = self.kind(), "running block");
        match self {
            Redirection::IfElse(block) => run_if(block, shell),
            Redirection::TryCatchFinally(block) => run_try(block, shell),
            Redirection::ForLoop(block) => run_for(block, shell),
            Redirection::Recorder(rec) => run_recorder(rec, shell),
        }
    }
}

fn run_if(block: IfElseBlock, shell: &mut Shell) -> Result<(), CliError> {
    let target = match &block.target {
        Target::Request(text) => {
            let text = shell.vars.substitute(text)?;
            let request = parse_request(&text)?;
            shell.session.execute(&request.to_model())?
        }
        Target::Variable(path) => match path.root() {
            Some(root) if shell.vars.contains(root) => shell.vars.resolve(path)?,
            _ => return Err(CliError::NullCondition(format!("variable '${}' is not bound", path))),
        },
        Target::None => ModelValue::Undefined,
    };

    let satisfied = block.condition.is_satisfied(&target, &shell.vars)?;
    debug!(condition = %block.condition, satisfied, "if condition evaluated");
    if satisfied {
        shell.run_block(&block.if_lines)
    } else if let Some(else_lines) = &block.else_lines {
        shell.run_block(else_lines)
    } else {
        Ok(())
    }
}

fn run_try(block: TryBlock, shell: &mut Shell) -> Result<(), CliError> {
    if block.try_lines.is_empty() {
        return Err(CliError::EmptyTryBlock);
    }

    let mut result = shell.run_block(&block.try_lines);
    if let Some(catch_lines) = &block.catch_lines {
        if let Err(e) = &result {
            debug!(error = %e, "try failed, running catch");
            result = shell.run_block(catch_lines);
        }
    }
    if let Some(finally_lines) = &block.finally_lines {
        shell.run_block(finally_lines)?;
    }
    result
}

fn run_for(block: ForBlock, shell: &mut Shell) -> Result<(), CliError> {
    let ForBlock {
        var_name,
        items,
        body,
        discard,
    } = block;

    let result = if discard {
        debug!(var = %var_name, "for loop discarded");
        Ok(())
    } else {
        iterate(shell, &var_name, items, &body)
    };
    shell.vars.unbind(&var_name);
    result
}

fn iterate(shell: &mut Shell, var_name: &str, items: Vec<ModelValue>, body: &[String]) -> Result<(), CliError> {
    for item in items {
        let value = match item {
            ModelValue::List(_) | ModelValue::Object(_) => item,
            scalar => ModelValue::String(scalar.as_string()),
        };
        shell.vars.set(var_name, value)?;
        shell.run_block(body)?;
    }
    Ok(())
}

fn run_recorder(rec: Recorder, shell: &mut Shell) -> Result<(), CliError> {
    let (name, export, discard) = rec.resolved();
    if discard {
        debug!(lines = rec.lines.len(), "recording discarded");
        return Ok(());
    }

    if let Some(path) = &export {
        export_lines(path, &rec.lines)?;
        shell.emit(format!("Exported {} lines to {}", rec.lines.len(), path.display()));
    }
    if let Some(name) = &name {
        shell.register_macro(name, rec.lines.clone())?;
        shell.emit(format!("Recorded macro '{}' ({} lines)", name, rec.lines.len()));
    }
    if export.is_none() && name.is_none() {
        for line in rec.lines {
            shell.emit(line);
        }
    }
    Ok(())
}
