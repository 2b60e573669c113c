//! Nested block tracking
//!
//! While a block is being buffered, any block typed inside it is only
//! tracked here, never executed. The stack answers one question for the
//! active redirection: does this `end-if` (or `else`, `catch`, ...) belong
//! to a nested block, or to me?

use crate::error::CliError;
use tracing::trace;

pub const IF: &str = "if";
pub const ELSE: &str = "else";
pub const END_IF: &str = "end-if";
pub const TRY: &str = "try";
pub const CATCH: &str = "catch";
pub const FINALLY: &str = "finally";
pub const END_TRY: &str = "end-try";
pub const FOR: &str = "for";
pub const END_FOR: &str = "end-for";
pub const RECORD: &str = "record";
pub const STOP_RECORD: &str = "stop-record";

pub const BATCH: &str = "batch";
pub const RUN_BATCH: &str = "run-batch";
pub const DISCARD_BATCH: &str = "discard-batch";

/// Every keyword owned by the block engine
pub const KEYWORDS: &[&str] = &[
    IF, ELSE, END_IF, TRY, CATCH, FINALLY, END_TRY, FOR, END_FOR, RECORD, STOP_RECORD,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryPhase {
    InTry,
    InCatch,
    InFinally,
}

/// Where a block currently is in its syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockPhase {
    If { in_else: bool },
    Try(TryPhase),
    For,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Keyword accepted, block stays open
    Continue,
    /// Keyword closed the block
    Close,
}

impl BlockPhase {
    /// The initial phase of the block `name` opens, if it opens one
    pub fn opened_by(name: &str) -> Option<BlockPhase> {
        match name {
            IF => Some(BlockPhase::If { in_else: false }),
            TRY => Some(BlockPhase::Try(TryPhase::InTry)),
            FOR => Some(BlockPhase::For),
            _ => None,
        }
    }

    /// Keywords that move a block between phases or close it
    pub fn is_structural(name: &str) -> bool {
        matches!(name, ELSE | END_IF | CATCH | FINALLY | END_TRY | END_FOR)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BlockPhase::If { .. } => IF,
            BlockPhase::Try(_) => TRY,
            BlockPhase::For => FOR,
        }
    }

    pub fn terminator(&self) -> &'static str {
        match self {
            BlockPhase::If { .. } => END_IF,
            BlockPhase::Try(_) => END_TRY,
            BlockPhase::For => END_FOR,
        }
    }

    /// Apply a structural keyword. Phases only move forward.
    pub fn transition(&mut self, keyword: &str) -> Result<Transition, CliError> {
        match (*self, keyword) {
            (BlockPhase::If { in_else: false }, ELSE) => {
                *self = BlockPhase::If { in_else: true };
                Ok(Transition::Continue)
            }
            (BlockPhase::If { in_else: true }, ELSE) => {
                Err(CliError::misplaced(keyword, "else may appear only once per if"))
            }
            (BlockPhase::If { .. }, END_IF) => Ok(Transition::Close),

            (BlockPhase::Try(TryPhase::InTry), CATCH) => {
                *self = BlockPhase::Try(TryPhase::InCatch);
                Ok(Transition::Continue)
            }
            (BlockPhase::Try(TryPhase::InCatch), CATCH) => {
                Err(CliError::misplaced(keyword, "catch may appear only once per try"))
            }
            (BlockPhase::Try(TryPhase::InFinally), CATCH) => {
                Err(CliError::misplaced(keyword, "catch must come before finally"))
            }
            (BlockPhase::Try(TryPhase::InTry | TryPhase::InCatch), FINALLY) => {
                *self = BlockPhase::Try(TryPhase::InFinally);
                Ok(Transition::Continue)
            }
            (BlockPhase::Try(TryPhase::InFinally), FINALLY) => {
                Err(CliError::misplaced(keyword, "finally may appear only once per try"))
            }
            (BlockPhase::Try(TryPhase::InTry), END_TRY) => {
                Err(CliError::misplaced(keyword, "try needs a catch or finally block before end-try"))
            }
            (BlockPhase::Try(_), END_TRY) => Ok(Transition::Close),

            (BlockPhase::For, END_FOR) => Ok(Transition::Close),

            (phase, _) => Err(CliError::misplaced(
                keyword,
                format!("the innermost open block is '{}', closed by '{}'", phase.kind(), phase.terminator()),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlState {
    pub id: usize,
    pub phase: BlockPhase,
}

/// Stack of blocks opened inside the active redirection's buffer, plus
/// whether a batch has been opened there.
#[derive(Debug, Default)]
pub struct ControlFlowStack {
    states: Vec<ControlState>,
    next_id: usize,
    batch_mode: bool,
}

impl ControlFlowStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a state if `name` opens a block. Returns whether one was pushed.
    ///
    /// `record` has no nested phase to track, but like every opener it is
    /// refused while a batch is open.
    pub fn build_and_push(&mut self, name: &str, batch_active: bool) -> Result<bool, CliError> {
        let opened = BlockPhase::opened_by(name);
        if (opened.is_some() || name == RECORD) && (self.batch_mode || batch_active) {
            return Err(CliError::InvalidNesting(format!(
                "'{}' cannot be used while a batch is active",
                name
            )));
        }
        let phase = match opened {
            Some(phase) => phase,
            None => return Ok(false),
        };
        let id = self.next_id;
        self.next_id += 1;
        self.states.push(ControlState { id, phase });
        trace!(keyword = name, depth = self.states.len(), "nested block opened");
        Ok(true)
    }

    /// Forward a structural keyword to the innermost nested block
    pub fn dispatch(&mut self, keyword: &str) -> Result<Transition, CliError> {
        let top = match self.states.last_mut() {
            Some(top) => top,
            None => return Err(CliError::misplaced(keyword, "no nested block is open")),
        };
        let transition = top.phase.transition(keyword)?;
        if transition == Transition::Close {
            let id = top.id;
            self.pop(id)?;
            trace!(keyword, depth = self.states.len(), "nested block closed");
        }
        Ok(transition)
    }

    /// Remove the top state, which must be `id`
    pub fn pop(&mut self, id: usize) -> Result<ControlState, CliError> {
        match self.states.last() {
            Some(top) if top.id != id => {
                return Err(CliError::StateMismatch(format!(
                    "expected state {} on top, found {} ({})",
                    id,
                    top.id,
                    top.phase.kind()
                )))
            }
            _ => {}
        }
        self.states
            .pop()
            .ok_or_else(|| CliError::StateMismatch(format!("expected state {}, stack is empty", id)))
    }

    pub fn peek(&self) -> Option<&ControlState> {
        self.states.last()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.states.len()
    }

    pub fn batch_mode(&self) -> bool {
        self.batch_mode
    }

    /// Follow batch keywords typed into a buffer so that a block opened
    /// after `batch` is rejected at type time
    pub fn track_batch(&mut self, name: &str) {
        match name {
            BATCH => self.batch_mode = true,
            RUN_BATCH | DISCARD_BATCH => self.batch_mode = false,
            _ => {}
        }
    }

    pub fn clear(&mut self) {
        self.states.clear();
        self.batch_mode = false;
    }
}
