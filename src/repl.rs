use mgsh::control::KEYWORDS;
use mgsh::shell::BUILTINS;
use mgsh::Shell;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Editor, Helper, Result as RlResult};
use std::borrow::Cow;
use std::collections::BTreeSet;

use crate::cli::VERSION;
use crate::rcfile::load_mgshrc;
use crate::terminal::{execute_line, terminal_width};
use mgsh::config::dirs_home;

/// Helper struct for rustyline: completes the first word of a line
struct MgshHelper {
    commands: BTreeSet<String>,
}

impl MgshHelper {
    fn new() -> Self {
        MgshHelper {
            commands: BUILTINS.iter().chain(KEYWORDS.iter()).map(|s| s.to_string()).collect(),
        }
    }

    fn add_macros<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            if !self.commands.contains(name) {
                self.commands.insert(name.to_string());
            }
        }
    }
}

impl Helper for MgshHelper {}

impl Completer for MgshHelper {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = line[..pos].rfind(char::is_whitespace).map(|i| i + 1).unwrap_or(0);
        // Only the command word is completed; arguments are free-form
        if line[..start].trim().is_empty() {
            let prefix = &line[start..pos];
            let pairs = self
                .commands
                .iter()
                .filter(|c| c.starts_with(prefix))
                .map(|c| Pair {
                    display: c.clone(),
                    replacement: c.clone(),
                })
                .collect();
            return Ok((start, pairs));
        }
        Ok((start, Vec::new()))
    }
}

impl Hinter for MgshHelper {
    type Hint = String;
}

impl Highlighter for MgshHelper {
    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(&'s self, prompt: &'p str, _default: bool) -> Cow<'b, str> {
        // Dim the continuation part of the prompt
        match prompt.find("] ") {
            Some(i) if prompt.len() > i + 2 => {
                Cow::Owned(format!("{}\x1b[90m{}\x1b[0m", &prompt[..i + 2], &prompt[i + 2..]))
            }
            _ => Cow::Borrowed(prompt),
        }
    }
}

impl Validator for MgshHelper {}

fn prompt(shell: &Shell) -> String {
    let endpoint = shell.session().endpoint();
    match shell.prompt_suffix() {
        Some(suffix) => format!("[{} /] {} ", endpoint, suffix),
        None => format!("[{} /] ", endpoint),
    }
}

/// Run the interactive loop until `exit`, `quit` or Ctrl-D
pub(crate) fn run_repl(shell: &mut Shell) -> RlResult<()> {
    let mut rl: Editor<MgshHelper, DefaultHistory> = Editor::new()?;
    rl.set_helper(Some(MgshHelper::new()));

    load_mgshrc(shell);

    let history_path = dirs_home().map(|h| h.join(".mgsh_history"));
    if let Some(ref path) = history_path {
        let _ = rl.load_history(path);
    }

    if shell.config().banner {
        println!("mgsh {} - management shell", VERSION);
        println!("  Connected to {}. Type 'help' for usage, 'exit' or Ctrl-D to quit", shell.session().endpoint());
    }

    loop {
        if let Some(helper) = rl.helper_mut() {
            helper.add_macros(shell.macros().names());
        }
        shell.set_width(terminal_width());

        match rl.readline(&prompt(shell)) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);

                if !shell.is_block_open() && (trimmed == "exit" || trimmed == "quit") {
                    break;
                }
                if let Err(e) = execute_line(shell, trimmed) {
                    eprintln!("Error: {}", e);
                    if e.is_structural() && shell.is_block_open() {
                        eprintln!("  (the line was ignored; the block is still open)");
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C - drop the line and any block being typed
                if let Some(kind) = shell.active_block() {
                    shell.abandon_block();
                    eprintln!("'{}' block discarded", kind);
                }
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D - exit
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(ref path) = history_path {
        let _ = rl.save_history(path);
    }

    Ok(())
}
