//! mgsh - a management shell
//!
//! # Overview
//!
//! mgsh drives a management endpoint with operation requests, one line at
//! a time, and layers small block constructs on top of flat line dispatch:
//!
//! ```text
//! # Operation requests
//! /subsystem=logging/logger=app:write-attribute(name=level,value=DEBUG)
//!
//! # Conditionals on a response
//! if result == true of /deployment=app.war:read-attribute(name=enabled)
//!     echo enabled
//! else
//!     /deployment=app.war:deploy
//! end-if
//!
//! # Error handling
//! try
//!     /deployment=old.war:remove
//! catch
//!     echo nothing to remove
//! end-try
//!
//! # Iteration
//! for name in :read-children-names(child-type=deployment)
//!     /deployment=$name:read-attribute(name=enabled)
//! end-for
//!
//! # Recording
//! record check-all
//! :read-resource
//! stop-record
//! ```
//!
//! Blocks nest freely. Lines of an open block are buffered and only run
//! when its terminator is typed.
//!
//! # Example
//!
//! ```rust
//! use mgsh::{MemoryController, Shell};
//!
//! let mut shell = Shell::new(Box::new(MemoryController::new()));
//! for line in ["for x in (1,2)", "echo item $x", "end-for"] {
//!     shell.dispatch(line).unwrap();
//! }
//! assert_eq!(shell.take_output(), vec!["item 1", "item 2"]);
//! ```

pub mod condition;
pub mod config;
pub mod control;
pub mod controller;
pub mod display;
pub mod error;
pub mod lexer;
pub mod macros;
pub mod parser;
pub mod redirection;
pub mod session;
pub mod shell;
pub mod value;
pub mod variables;

// Re-export commonly used items
pub use condition::{Condition, Operator};
pub use config::Config;
pub use control::{BlockPhase, ControlFlowStack};
pub use controller::{DisconnectedController, HttpController, MemoryController, Resource};
pub use error::CliError;
pub use lexer::{lex, CommandLine, LexError};
pub use macros::MacroStore;
pub use parser::{parse_literal, parse_request, OperationRequest};
pub use redirection::{LineOutcome, Redirection};
pub use session::{ModelController, Session};
pub use shell::Shell;
pub use value::{ModelValue, ValuePath};
pub use variables::VariableTable;

/// Run `lines` through a fresh offline shell and collect its output
pub fn run_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Result<Vec<String>, CliError> {
    let mut shell = Shell::new(Box::new(MemoryController::new()));
    for line in lines {
        shell.dispatch(line)?;
    }
    Ok(shell.take_output())
}
