//! The interpreter context and line dispatcher
//!
//! `Shell` owns everything a line can touch: the management session, the
//! variable table, the block machinery (the single redirection slot and
//! the nested control-flow stack), recorded macros and the output buffer.
//!
//! # Dispatch
//!
//! Every line goes through [`Shell::dispatch`]:
//!
//! 1. Blank lines and `#` comments are ignored, except that an open
//!    `record` keeps its comments.
//! 2. If a block is open, the line is offered to it first. The block may
//!    buffer it, consume it as a keyword, or finish (and run).
//! 3. Otherwise the line is executed: block openers (`if`, `try`, `for`,
//!    `record`), `set`, then `$var` substitution followed by operation
//!    requests, macros and builtins.
//!
//! Block bodies are replayed through `dispatch` again by [`Shell::run_block`],
//! so a nested block in a body behaves exactly as if it had been typed.
//!
//! Errors are returned to the caller once and never printed here.

mod blocks;
mod commands;

pub use commands::{BUILTINS, is_reserved};

use crate::config::Config;
use crate::control::{BlockPhase, ControlFlowStack, FOR, IF, RECORD, STOP_RECORD, TRY};
use crate::display;
use crate::error::CliError;
use crate::lexer::{command_name, rest_of_line};
use crate::macros::MacroStore;
use crate::parser::{is_operation, parse_request};
use crate::redirection::{LineOutcome, Redirection};
use crate::session::{check_outcome, ModelController, Session};
use crate::variables::VariableTable;
use tracing::{debug, trace, warn};

pub struct Shell {
    pub(crate) session: Session,
    pub(crate) vars: VariableTable,
    pub(crate) control: ControlFlowStack,
    pub(crate) redirection: Option<Redirection>,
    pub(crate) macros: MacroStore,
    pub(crate) config: Config,
    output: Vec<String>,
    /// Current block replay depth
    depth: usize,
    /// Width used to lay out responses
    width: usize,
}

impl Shell {
    pub fn new(controller: Box<dyn ModelController>) -> Self {
        Self::with_config(controller, Config::default())
    }

    pub fn with_config(controller: Box<dyn ModelController>, config: Config) -> Self {
        let macros = match &config.macro_dir {
            Some(dir) => MacroStore::with_dir(dir.clone()),
            None => MacroStore::new(),
        };
        Shell {
            session: Session::new(controller),
            vars: VariableTable::new(),
            control: ControlFlowStack::new(),
            redirection: None,
            macros,
            config,
            output: Vec::new(),
            depth: 0,
            width: 80,
        }
    }

    pub fn set_width(&mut self, width: usize) {
        self.width = width.max(20);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn vars(&self) -> &VariableTable {
        &self.vars
    }

    pub fn vars_mut(&mut self) -> &mut VariableTable {
        &mut self.vars
    }

    pub fn macros(&self) -> &MacroStore {
        &self.macros
    }

    pub fn macros_mut(&mut self) -> &mut MacroStore {
        &mut self.macros
    }

    /// Drain the output produced so far
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    pub(crate) fn emit(&mut self, line: impl Into<String>) {
        self.output.push(line.into());
    }

    pub fn is_block_open(&self) -> bool {
        self.redirection.is_some()
    }

    /// Keyword of the outermost open block
    pub fn active_block(&self) -> Option<&'static str> {
        self.redirection.as_ref().map(|r| r.kind())
    }

    /// Open blocks: the active one plus those nested inside its buffer
    pub fn block_depth(&self) -> usize {
        match &self.redirection {
            Some(_) => 1 + self.control.depth(),
            None => 0,
        }
    }

    /// Prompt decoration while a block is open: the innermost block's
    /// keyword, indented by nesting depth (`for ...`, `  if ...`)
    pub fn prompt_suffix(&self) -> Option<String> {
        self.redirection.as_ref().map(|r| {
            let kind = match self.control.peek() {
                Some(state) => state.phase.kind(),
                None => r.kind(),
            };
            format!("{}{} ...", "  ".repeat(self.block_depth() - 1), kind)
        })
    }

    /// Drop the open block without running it (Ctrl-C in the REPL)
    pub fn abandon_block(&mut self) -> bool {
        match self.redirection.take() {
            Some(open) => {
                self.abandon(open);
                true
            }
            None => false,
        }
    }

    fn abandon(&mut self, open: Redirection) {
        debug!(block = open.kind(), "abandoning open block");
        if let Some(var) = open.loop_variable() {
            self.vars.unbind(var);
        }
        self.control.clear();
    }

    /// Route one line
    pub fn dispatch(&mut self, line: &str) -> Result<(), CliError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            // a recording keeps its comments
            if let Some(Redirection::Recorder(rec)) = &mut self.redirection {
                if !line.is_empty() {
                    rec.lines.push(line.to_string());
                }
            }
            return Ok(());
        }

        if let Some(mut active) = self.redirection.take() {
            let batch_active = self.session.batch_active();
            match active.on_line(line, &mut self.control, batch_active) {
                Ok(LineOutcome::Terminated) => {
                    self.control.clear();
                    return active.run(self);
                }
                Ok(LineOutcome::PassThrough) => {
                    self.redirection = Some(active);
                }
                Ok(_) => {
                    self.redirection = Some(active);
                    return Ok(());
                }
                Err(e) => {
                    self.redirection = Some(active);
                    return Err(e);
                }
            }
        }

        self.execute_line(line)
    }

    fn execute_line(&mut self, line: &str) -> Result<(), CliError> {
        let name = command_name(line);
        if line.split_whitespace().skip(1).any(|w| w == "--help") {
            if let Some(text) = commands::help_text(name) {
                self.emit(text);
                return Ok(());
            }
        }

        match name {
            IF | TRY | FOR | RECORD => return self.open_block(name, line),
            n if BlockPhase::is_structural(n) || n == STOP_RECORD => {
                return Err(CliError::misplaced(n, "no matching block is open"));
            }
            "set" => return self.builtin_set(rest_of_line(line)),
            _ => {}
        }

        let line = self.vars.substitute(line)?;
        if is_operation(&line) {
            return self.execute_operation(&line);
        }
        let name = command_name(&line);
        if let Some(lines) = self.macros.get(name).map(|l| l.to_vec()) {
            debug!(macro_name = name, lines = lines.len(), "replaying macro");
            return self.run_block(&lines);
        }
        self.builtin(&line)
    }

    fn execute_operation(&mut self, line: &str) -> Result<(), CliError> {
        let request = parse_request(line)?.to_model();
        if self.session.batch_active() {
            self.session.add_to_batch(line, request)?;
            return Ok(());
        }
        let response = check_outcome(self.session.execute(&request)?)?;
        let text = display::format_value(&response, self.width);
        self.emit(text);
        Ok(())
    }

    /// Replay buffered lines in order, stopping at the first failure.
    ///
    /// A block never leaks interpreter state: a block left open by the
    /// lines is abandoned, and a batch started here but not committed is
    /// discarded, whatever the outcome.
    pub fn run_block(&mut self, lines: &[String]) -> Result<(), CliError> {
        if self.depth >= self.config.max_nesting {
            return Err(CliError::NestingTooDeep(self.config.max_nesting));
        }
        self.depth += 1;
        let batch_before = self.session.batch_active();

        let mut result = Ok(());
        for line in lines {
            trace!(depth = self.depth, line = %line, "replay");
            if let Err(e) = self.dispatch(line) {
                result = Err(e);
                break;
            }
        }

        if let Some(open) = self.redirection.take() {
            let kind = open.kind();
            self.abandon(open);
            if result.is_ok() {
                result = Err(CliError::InvalidNesting(format!("'{}' block was not closed", kind)));
            }
        }
        if !batch_before && self.session.batch_active() {
            warn!(lines = self.session.batch_lines().len(), "discarding batch left open by block");
            self.session.discard_active_batch();
        }

        self.depth -= 1;
        result
    }
}
