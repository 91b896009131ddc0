use rustyline::DefaultEditor;
use std::env;
use std::io;

use log::{debug, warn};

use crate::builtins::dir_cmds::DirState;
use crate::builtins::history_cmds::History;
use crate::config::{ShellConfig, load_config};
use crate::execution::execute_command;
use crate::io_helpers::{build_editor, read_input_line};
use crate::job_control::JobControl;
use crate::parse::{TokenKind, parse_command, split_segments, tokenize};
use crate::prompt::build_prompt;
use crate::signals::SignalCoordinator;

const HISTORY_FILE_NAME: &str = ".jobsh_history";

pub(crate) struct ShellState {
    pub(crate) editor: DefaultEditor,
    pub(crate) jobs: JobControl,
    pub(crate) dirs: DirState,
    pub(crate) history: History,
    pub(crate) config: ShellConfig,
    pub(crate) last_status: i32,
    pub(crate) interactive: bool,
    pub(crate) trace: bool,
}

pub(crate) fn init_state(
    trace: bool,
    interactive: bool,
    shell_pgid: i32,
    signals: SignalCoordinator,
) -> io::Result<ShellState> {
    let home = env::current_dir()?;
    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config error: {err}");
            ShellConfig::default()
        }
    };
    let history_path = config
        .history_file
        .clone()
        .unwrap_or_else(|| home.join(HISTORY_FILE_NAME));
    let mut history = History::new(config.history_size, Some(history_path));
    if let Err(err) = history.load() {
        warn!("history event=load error={}", err);
    }

    let mut editor = build_editor()?;
    for entry in history.entries() {
        let _ = editor.add_history_entry(entry);
    }

    debug!(
        "shell event=init home={} interactive={} pgid={}",
        home.display(),
        interactive,
        shell_pgid
    );
    Ok(ShellState {
        editor,
        jobs: JobControl::new(signals, shell_pgid, interactive, config.max_jobs),
        dirs: DirState::new(home),
        history,
        config,
        last_status: 0,
        interactive,
        trace,
    })
}

/// One prompt/read/execute cycle. Returns `false` once input is exhausted.
pub(crate) fn run_once(state: &mut ShellState) -> io::Result<bool> {
    state.jobs.poll();

    let cwd = env::current_dir().unwrap_or_else(|_| state.dirs.home.clone());
    let prompt = build_prompt(
        state.interactive,
        state.config.prompt.as_deref(),
        &cwd,
        &state.dirs.home,
    );
    let line = match read_input_line(&mut state.editor, state.interactive, &prompt)? {
        Some(line) => line,
        None => {
            shutdown(state);
            return Ok(false);
        }
    };
    run_line(state, &line, true);
    Ok(true)
}

/// Run every `;`-separated segment of `line`, optionally recording each one
/// in history. Returns the status of the last segment.
pub(crate) fn run_line(state: &mut ShellState, line: &str, record: bool) -> i32 {
    for segment in split_segments(line) {
        if record {
            state.history.record(segment);
        }
        if state.trace {
            let texts: Vec<String> = tokenize(segment)
                .into_iter()
                .filter(|token| token.kind != TokenKind::End)
                .map(|token| token.text)
                .collect();
            eprintln!("trace: tokens {texts:?}");
        }
        state.last_status = match parse_command(segment) {
            Ok(parsed) => execute_command(state, &parsed),
            Err(err) => {
                eprintln!("{}", err.display_with_input(segment));
                err.kind.status()
            }
        };
    }
    state.last_status
}

fn shutdown(state: &mut ShellState) {
    debug!("shell event=shutdown jobs={}", state.jobs.table.len());
    state.jobs.shutdown();
    if let Err(err) = state.history.save() {
        warn!("history event=save error={}", err);
    }
    if state.interactive {
        println!();
    }
    println!("logout");
}
