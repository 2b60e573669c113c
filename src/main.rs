//! mgsh - a management shell
//!
//! Usage:
//!   mgsh              Start interactive REPL
//!   mgsh -c "line"    Execute a single line
//!   mgsh script.mgsh  Execute a script file

mod cli;
mod rcfile;
mod repl;
mod terminal;

use std::env;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter = env::var("MGSH_LOG")
        .ok()
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .unwrap_or_else(|| EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let cli_args = cli::parse_args(&args);

    if cli_args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if cli_args.version {
        println!("mgsh {}", cli::VERSION);
        return ExitCode::SUCCESS;
    }
    if let Some(bad) = &cli_args.error {
        eprintln!("Error: {}", bad);
        eprintln!("Try 'mgsh --help' for usage.");
        return ExitCode::from(2);
    }

    let mut shell = match cli::build_shell(&cli_args) {
        Ok(shell) => shell,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(1);
        }
    };

    if let Some(command) = &cli_args.command {
        return cli::run_command(&mut shell, command);
    }
    if let Some(script) = &cli_args.script {
        return cli::run_script(&mut shell, script);
    }

    match repl::run_repl(&mut shell) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("REPL error: {}", e);
            ExitCode::from(1)
        }
    }
}
