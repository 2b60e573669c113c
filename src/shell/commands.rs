//! Builtin commands and their help texts

use super::Shell;
use crate::control::{BATCH, DISCARD_BATCH, KEYWORDS, RUN_BATCH};
use crate::display;
use crate::error::CliError;
use crate::lexer::{command_name, rest_of_line, split_assignment, CommandLine};
use crate::parser::{parse_literal, parse_request};
use crate::session::check_outcome;
use crate::value::ValuePath;

/// Names handled by [`Shell::builtin`], plus the front end's `exit`/`quit`
pub const BUILTINS: &[&str] = &[
    "echo",
    "set",
    "unset",
    "vars",
    "echo-dmr",
    BATCH,
    RUN_BATCH,
    DISCARD_BATCH,
    "list-batch",
    "macros",
    "help",
    "exit",
    "quit",
];

/// Names a macro may not take
pub fn is_reserved(name: &str) -> bool {
    BUILTINS.contains(&name) || KEYWORDS.contains(&name)
}

pub(crate) fn help_text(name: &str) -> Option<&'static str> {
    let text = match name {
        "if" | "else" | "end-if" => {
            "if <condition> of <request>\n\
             \x20   Run the following lines if the condition holds for the request's response.\n\
             \x20   'else' starts the alternative branch, 'end-if' closes the block.\n\
             \x20   Conditions: <path> <op> <value> with ==, !=, >, <, >=, <=, ~= (regex),\n\
             \x20   *= (list contains), #= (list size); combine with && and ||.\n\
             \x20   'of $var' tests a variable's value; without 'of' only $vars may be used."
        }
        "try" | "catch" | "finally" | "end-try" => {
            "try\n\
             \x20   Run the following lines; if one fails, run the 'catch' lines instead of\n\
             \x20   failing. The 'finally' lines always run. 'end-try' closes the block."
        }
        "for" | "end-for" => {
            "for <var> in <request|$var|(a,b,...)>\n\
             \x20   Run the following lines once per element of the list, with $var bound\n\
             \x20   to the element. 'end-for' closes the block, 'end-for --discard' closes\n\
             \x20   it without running."
        }
        "record" | "stop-record" => {
            "record [name] [--export <file>] [--discard]\n\
             \x20   Capture the following lines until 'stop-record [name] [--export <file>]\n\
             \x20   [--discard]'. A name registers a macro invoked by that name; --export\n\
             \x20   writes the lines to a file; --discard drops them."
        }
        "set" => "set <name>=<value> | set <name>=`<request>`\n    Bind a variable to a literal or to a request's result.",
        "unset" => "unset <name>\n    Remove a variable.",
        "vars" => "vars\n    List variables.",
        "echo" => "echo <text>\n    Print text after variable substitution.",
        "echo-dmr" => "echo-dmr <request>\n    Print the request model without executing it.",
        "batch" => "batch\n    Start collecting requests instead of executing them.",
        "run-batch" => "run-batch\n    Execute the collected requests as one composite operation.",
        "discard-batch" => "discard-batch\n    Drop the collected requests.",
        "list-batch" => "list-batch\n    Show the collected requests.",
        "macros" => "macros [--remove <name>]\n    List recorded macros, or delete one.",
        "help" => "help [command]\n    Show help.",
        _ => return None,
    };
    Some(text)
}

impl Shell {
    pub(crate) fn builtin(&mut self, line: &str) -> Result<(), CliError> {
        let name = command_name(line);
        let args = rest_of_line(line);
        match name {
            "echo" => {
                self.emit(args);
                Ok(())
            }
            "unset" => {
                for var in args.split_whitespace() {
                    self.vars.unbind(var);
                }
                Ok(())
            }
            "vars" => {
                let listing: Vec<String> = self
                    .vars
                    .iter()
                    .map(|(name, value)| format!("{}={}", name, display::format_value_hint(value)))
                    .collect();
                for entry in listing {
                    self.emit(entry);
                }
                Ok(())
            }
            "echo-dmr" => {
                let model = parse_request(args)?.to_model();
                self.emit(display::format_value(&model, self.width));
                Ok(())
            }
            BATCH => self.session.start_batch(),
            RUN_BATCH => {
                let response = self.session.run_batch()?;
                self.emit("The batch executed successfully");
                if let Some(result) = response.get("result").filter(|r| r.is_defined()) {
                    self.emit(display::format_value(result, self.width));
                }
                Ok(())
            }
            DISCARD_BATCH => {
                if self.session.discard_active_batch() {
                    Ok(())
                } else {
                    Err(CliError::NoActiveBatch)
                }
            }
            "list-batch" => {
                let lines = match self.session.batch() {
                    Some(batch) => batch.lines().to_vec(),
                    None => return Err(CliError::NoActiveBatch),
                };
                for (i, line) in lines.iter().enumerate() {
                    self.emit(format!("#{} {}", i + 1, line));
                }
                Ok(())
            }
            "macros" => self.builtin_macros(line),
            "help" => {
                if let Some(text) = help_text(args) {
                    self.emit(text);
                    return Ok(());
                }
                let mut names: Vec<&str> = BUILTINS.iter().chain(KEYWORDS.iter()).copied().collect();
                names.sort_unstable();
                self.emit(format!("Commands: {}", names.join(", ")));
                self.emit("Operation requests: [/type=name...]:operation[(param=value,...)]");
                let macros = self.macros.names().join(", ");
                if !macros.is_empty() {
                    self.emit(format!("Macros: {}", macros));
                }
                Ok(())
            }
            "" => Ok(()),
            other => Err(CliError::UnknownCommand(other.to_string())),
        }
    }

    fn builtin_macros(&mut self, line: &str) -> Result<(), CliError> {
        let cmd = CommandLine::parse(line)?;
        if let Some(name) = cmd.option("--remove") {
            if !self.macros.remove(name) {
                return Err(CliError::UnknownCommand(format!("no macro named '{}'", name)));
            }
            return Ok(());
        }
        let listing: Vec<String> = self
            .macros
            .names()
            .iter()
            .map(|name| {
                let count = self.macros.get(name).map(|l| l.len()).unwrap_or(0);
                format!("{} ({} lines)", name, count)
            })
            .collect();
        for entry in listing {
            self.emit(entry);
        }
        Ok(())
    }

    /// `set name=value`: a literal, a `$reference`, or a backquoted request
    /// whose `result` is bound
    pub(crate) fn builtin_set(&mut self, args: &str) -> Result<(), CliError> {
        let (name, value_text) = split_assignment(args)
            .ok_or_else(|| CliError::Parse("usage: set <name>=<value>".into()))?;

        let value = if let Some(request) = value_text
            .strip_prefix('`')
            .and_then(|rest| rest.strip_suffix('`'))
        {
            let request = parse_request(&self.vars.substitute(request)?)?;
            let response = check_outcome(self.session.execute(&request.to_model())?)?;
            response.get("result").cloned().unwrap_or_default()
        } else if let Some(reference) = value_text.strip_prefix('$').filter(|r| ValuePath::parse(r).is_ok()) {
            self.vars.resolve(&ValuePath::parse(reference)?)?
        } else {
            parse_literal(&self.vars.substitute(value_text)?)
        };

        self.vars.set(name, value)
    }
}
