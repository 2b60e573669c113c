use crate::terminal::execute_line;
use mgsh::config::dirs_home;
use mgsh::Shell;
use std::fs;

/// Load and execute ~/.mgshrc if it exists
pub(crate) fn load_mgshrc(shell: &mut Shell) {
    let rc_path = match dirs_home() {
        Some(home) => home.join(".mgshrc"),
        None => return,
    };

    let content = match fs::read_to_string(&rc_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for warning in load_rc_content(shell, &content, "~/.mgshrc") {
        eprintln!("{}", warning);
    }
}

/// Dispatch rc content line by line. A failing line does not stop the rest;
/// each failure becomes a warning naming the line.
pub(crate) fn load_rc_content(shell: &mut Shell, content: &str, source: &str) -> Vec<String> {
    let mut warnings = Vec::new();
    for (line_num, line) in content.lines().enumerate() {
        if let Err(e) = execute_line(shell, line) {
            warnings.push(format!("Warning: {} line {}: {}", source, line_num + 1, e));
        }
    }
    if let Some(kind) = shell.active_block() {
        shell.abandon_block();
        warnings.push(format!("Warning: {}: '{}' block was not closed", source, kind));
    }
    warnings
}
