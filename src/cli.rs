use crate::terminal::{execute_line, terminal_width};
use mgsh::{CliError, Config, HttpController, MemoryController, ModelController, Shell};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, warn};

pub(crate) const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parsed command-line arguments
#[derive(Debug, Default)]
pub(crate) struct CliArgs {
    pub(crate) command: Option<String>,
    pub(crate) script: Option<String>,
    pub(crate) controller: Option<String>,
    pub(crate) model: Option<String>,
    pub(crate) help: bool,
    pub(crate) version: bool,
    /// First argument that could not be understood
    pub(crate) error: Option<String>,
}

/// Parse command-line arguments
pub(crate) fn parse_args(args: &[String]) -> CliArgs {
    let mut cli = CliArgs::default();

    let mut i = 1; // Skip program name
    while i < args.len() {
        match args[i].as_str() {
            "-c" => {
                // Everything after -c is the line
                if i + 1 < args.len() {
                    cli.command = Some(args[i + 1..].join(" "));
                } else {
                    cli.error = Some("-c requires a command".into());
                }
                break;
            }
            "--controller" | "--model" => {
                let flag = args[i].as_str();
                match args.get(i + 1) {
                    Some(value) => {
                        if flag == "--controller" {
                            cli.controller = Some(value.clone());
                        } else {
                            cli.model = Some(value.clone());
                        }
                        i += 1;
                    }
                    None => {
                        cli.error.get_or_insert_with(|| format!("{} requires a value", flag));
                    }
                }
            }
            "--help" | "-h" => {
                cli.help = true;
            }
            "--version" | "-V" => {
                cli.version = true;
            }
            arg => {
                if let Some(url) = arg.strip_prefix("--controller=") {
                    cli.controller = Some(url.to_string());
                } else if let Some(path) = arg.strip_prefix("--model=") {
                    cli.model = Some(path.to_string());
                } else if arg.starts_with('-') {
                    cli.error.get_or_insert_with(|| format!("unknown option '{}'", arg));
                } else if cli.script.is_none() {
                    cli.script = Some(arg.to_string());
                }
            }
        }
        i += 1;
    }

    cli
}

pub(crate) fn print_help() {
    println!(
        r#"mgsh {} - a management shell

USAGE:
    mgsh                        Start interactive REPL
    mgsh -c <line>              Execute a single line
    mgsh <script>               Execute a script file, stopping at the first failure
    mgsh --controller <url>     Talk to a management endpoint over HTTP
    mgsh --model <file.json>    Work offline against a JSON resource model
    mgsh --help                 Show this help message
    mgsh --version              Show version

STARTUP:
    ~/.mgshrc                   Executed on REPL startup (if exists)
    MGSH_CONTROLLER             Endpoint URL (same as --controller)
    MGSH_MODEL                  Model file (same as --model)
    MGSH_MAX_NESTING            Bound on block replay depth (default 64)
    MGSH_MACRO_DIR              Recorded macros directory (default ~/.mgsh/macros)
    MGSH_BANNER=1               Show startup banner
    MGSH_LOG                    Log filter, e.g. debug or mgsh=trace

OPERATION REQUESTS:
    /type=name/...:operation(param=value,...)
    :read-resource(recursive=true)
    /deployment=app.war:read-attribute(name=enabled)

BLOCKS:
    if <condition> of <request>     Conditional on the response
    else / end-if
    try / catch / finally / end-try Error handling
    for <var> in <request>          Iterate over a list result
    end-for [--discard]
    record [name] [--export <file>] Capture lines as a macro or file
    stop-record [--discard]

CONDITIONS:
    result == 5                     == != > < >= <=
    result ~= "app-.*"              Regex match (whole value)
    result *= app.war               List contains
    result #= 3                     List size
    a && b, a || b, ( ... )         Combine
    $var.field                      Variable reference

BUILTINS:
    echo, set, unset, vars, echo-dmr, batch, run-batch, discard-batch,
    list-batch, macros, help [command], exit, quit

KEYBOARD:
    Ctrl-C                          Clear the line, abandon an open block
    Ctrl-D                          Exit
"#,
        VERSION
    );
}

/// Assemble the shell: configuration from the environment with command-line
/// overrides, the controller, and persisted macros.
pub(crate) fn build_shell(args: &CliArgs) -> Result<Shell, CliError> {
    let mut config = Config::from_env();
    if let Some(url) = &args.controller {
        config.controller = Some(url.clone());
    }
    if let Some(model) = &args.model {
        config.model = Some(PathBuf::from(model));
    }

    let controller: Box<dyn ModelController> = match (&config.controller, &config.model) {
        (Some(url), _) => Box::new(HttpController::new(url)),
        (None, Some(path)) => Box::new(MemoryController::load(path)?),
        (None, None) => Box::new(MemoryController::new()),
    };
    debug!(endpoint = %controller.endpoint(), "controller ready");

    let mut shell = Shell::with_config(controller, config);
    shell.set_width(terminal_width());
    if let Err(e) = shell.macros_mut().load_dir() {
        warn!(error = %e, "could not load recorded macros");
    }
    Ok(shell)
}

/// `mgsh -c <line>`
pub(crate) fn run_command(shell: &mut Shell, line: &str) -> ExitCode {
    if let Err(e) = execute_line(shell, line) {
        eprintln!("Error: {}", e);
        return ExitCode::from(1);
    }
    if let Some(kind) = open_block_kind(shell) {
        eprintln!("Error: '{}' block was not closed", kind);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

/// `mgsh <script>`: every line is dispatched in order; the first failure
/// stops the script.
pub(crate) fn run_script(shell: &mut Shell, path: &str) -> ExitCode {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: cannot read {}: {}", path, e);
            return ExitCode::from(1);
        }
    };

    for (line_num, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if !shell.is_block_open() && (trimmed == "exit" || trimmed == "quit") {
            break;
        }
        if let Err(e) = execute_line(shell, trimmed) {
            eprintln!("Error: {} line {}: {}", path, line_num + 1, e);
            return ExitCode::from(1);
        }
    }

    if let Some(kind) = open_block_kind(shell) {
        eprintln!("Error: {}: '{}' block was not closed", path, kind);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

/// Abandon a block left open at end of input, naming it
fn open_block_kind(shell: &mut Shell) -> Option<&'static str> {
    let kind = shell.active_block()?;
    shell.abandon_block();
    Some(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("mgsh").chain(list.iter().copied()).map(String::from).collect()
    }

    #[test]
    fn test_parse_command() {
        let cli = parse_args(&args(&["-c", "echo", "hi", "there"]));
        assert_eq!(cli.command.as_deref(), Some("echo hi there"));
        assert!(cli.error.is_none());
    }

    #[test]
    fn test_parse_script_and_flags() {
        let cli = parse_args(&args(&["--model", "model.json", "run.mgsh"]));
        assert_eq!(cli.model.as_deref(), Some("model.json"));
        assert_eq!(cli.script.as_deref(), Some("run.mgsh"));

        let cli = parse_args(&args(&["--controller=http://localhost:9990/management"]));
        assert_eq!(cli.controller.as_deref(), Some("http://localhost:9990/management"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(&args(&["--bogus"])).error.is_some());
        assert!(parse_args(&args(&["--model"])).error.is_some());
        assert!(parse_args(&args(&["-c"])).error.is_some());
        assert!(parse_args(&args(&["--help"])).help);
        assert!(parse_args(&args(&["-V"])).version);
    }
}
