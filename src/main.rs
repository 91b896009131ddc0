use std::env;

mod builtins;
mod config;
mod error;
mod execution;
mod io_helpers;
mod job_control;
mod parse;
mod prompt;
mod repl;
mod signals;

use repl::{init_state, run_once};
use signals::{SignalCoordinator, init_session};

fn main() {
    init_logging();
    let mut trace = false;
    for arg in env::args().skip(1) {
        if arg == "-x" {
            trace = true;
        } else {
            eprintln!("error: unknown option '{arg}'");
            std::process::exit(2);
        }
    }
    let interactive = unsafe { libc::isatty(libc::STDIN_FILENO) == 1 };
    let signals = match SignalCoordinator::install() {
        Ok(signals) => signals,
        Err(err) => {
            eprintln!("error: {err}");
            return;
        }
    };
    let shell_pgid = match init_session(interactive) {
        Ok(pgid) => pgid,
        Err(err) => {
            eprintln!("error: {err}");
            return;
        }
    };
    let mut state = match init_state(trace, interactive, shell_pgid, signals) {
        Ok(state) => state,
        Err(err) => {
            eprintln!("error: {err}");
            return;
        }
    };

    loop {
        match run_once(&mut state) {
            Ok(true) => continue,
            Ok(false) => break,
            Err(err) => eprintln!("error: {err}"),
        }
    }
}

fn init_logging() {
    let env = env_logger::Env::default().filter_or("JOBSH_LOG", "info");
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}
