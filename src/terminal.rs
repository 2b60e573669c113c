use mgsh::{CliError, Shell};

/// Dispatch one line and print whatever it produced. Output emitted before
/// a failure is still printed; the error itself is left to the caller.
pub(crate) fn execute_line(shell: &mut Shell, line: &str) -> Result<(), CliError> {
    let result = shell.dispatch(line);
    for out in shell.take_output() {
        println!("{}", out);
    }
    result
}

/// Get terminal width, defaulting to 80
pub(crate) fn terminal_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(80)
}
