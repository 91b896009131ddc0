//! Builtin commands and their dispatch.
//!
//! A builtin runs either inside the shell process (single-stage foreground
//! group) or inside a forked pipeline or background child, where it only sees
//! the child's copy of the shell state.
use log::debug;

use crate::error::ShellError;
use crate::repl::ShellState;

pub mod dir_cmds;
pub mod history_cmds;
pub mod job_cmds;
pub mod signal_cmds;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Builtin {
    Hop,
    Reveal,
    Log,
    Ping,
    Activities,
    Fg,
    Bg,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "hop" => Some(Builtin::Hop),
            "reveal" => Some(Builtin::Reveal),
            "log" => Some(Builtin::Log),
            "ping" => Some(Builtin::Ping),
            "activities" => Some(Builtin::Activities),
            "fg" => Some(Builtin::Fg),
            "bg" => Some(Builtin::Bg),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Hop => "hop",
            Builtin::Reveal => "reveal",
            Builtin::Log => "log",
            Builtin::Ping => "ping",
            Builtin::Activities => "activities",
            Builtin::Fg => "fg",
            Builtin::Bg => "bg",
        }
    }
}

/// Where a builtin is running.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Context {
    Shell,
    Child,
}

/// Run a builtin and return its exit status. Errors are reported here.
pub fn run_builtin(
    state: &mut ShellState,
    builtin: Builtin,
    args: &[String],
    context: Context,
) -> i32 {
    debug!(
        "builtin event=run name={} context={:?}",
        builtin.name(),
        context
    );
    let result = match builtin {
        Builtin::Fg | Builtin::Bg if context == Context::Child => Err(ShellError::resource(
            format!(
                "{}: job control is unavailable in a pipeline or background job",
                builtin.name()
            ),
        )),
        Builtin::Hop => dir_cmds::handle_hop(&mut state.dirs, args),
        Builtin::Reveal => dir_cmds::handle_reveal(&state.dirs, args),
        Builtin::Log => history_cmds::handle_log(state, args, context),
        Builtin::Ping => signal_cmds::handle_ping(args),
        Builtin::Activities => job_cmds::handle_activities(&state.jobs.table),
        Builtin::Fg => job_cmds::handle_fg(state, args),
        Builtin::Bg => job_cmds::handle_bg(state, args),
    };
    match result {
        Ok(status) => status,
        Err(err) => {
            eprintln!("{err}");
            err.kind.status()
        }
    }
}
