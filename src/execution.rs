//! Turns a validated command into running process groups.
//!
//! A command is cut into job groups at `&` and `&&`. Each group is planned
//! (redirections pulled out, stages split on `|`), its files opened, and
//! then either run as an in-process builtin or forked as one process group.
use log::debug;

use crate::builtins::{Builtin, Context, run_builtin};
use crate::error::{ShellError, ShellResult};
use crate::job_control::{JobSpec, JobStatus, SignalMaskGuard};
use crate::parse::{AND_OPERATOR, ParsedCommand};
use crate::repl::ShellState;

pub mod redirection;
pub mod spawning;

use redirection::{StdioGuard, open_redirections, plan_group};
use spawning::{exec_external, launch_group};

/// What follows a job group on the command line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Connector {
    End,
    /// `&`: run in the background and continue with the next group.
    Background,
    /// `&&`: run the next group only if this one exited 0.
    And,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct JobGroup {
    pub words: Vec<String>,
    pub connector: Connector,
}

impl JobGroup {
    pub fn is_background(&self) -> bool {
        self.connector == Connector::Background
    }

    pub fn display(&self) -> String {
        self.words.join(" ")
    }
}

pub fn split_groups(words: &[String]) -> Vec<JobGroup> {
    let mut groups = Vec::new();
    let mut current: Vec<String> = Vec::new();
    for word in words {
        let connector = match word.as_str() {
            "&" => Connector::Background,
            AND_OPERATOR => Connector::And,
            _ => {
                current.push(word.clone());
                continue;
            }
        };
        groups.push(JobGroup {
            words: std::mem::take(&mut current),
            connector,
        });
    }
    if !current.is_empty() {
        groups.push(JobGroup {
            words: current,
            connector: Connector::End,
        });
    }
    groups
}

/// Run every group of a command; returns the status of the last group run.
pub fn execute_command(state: &mut ShellState, parsed: &ParsedCommand) -> i32 {
    let mut status = 0;
    let mut skip = false;
    for group in split_groups(parsed.words()) {
        if skip {
            debug!("exec event=skip group={}", group.display());
            skip = group.connector == Connector::And;
            continue;
        }
        status = match run_group(state, &group) {
            Ok(status) => status,
            Err(err) => {
                eprintln!("{err}");
                err.kind.status()
            }
        };
        skip = group.connector == Connector::And && status != 0;
    }
    status
}

fn run_group(state: &mut ShellState, group: &JobGroup) -> ShellResult<i32> {
    let plan = plan_group(&group.words)?;
    let trace = state.trace;
    if trace {
        eprintln!("trace: stages {:?}", plan.stages);
    }
    let background = group.is_background();
    if background && state.jobs.table.is_full() {
        return Err(ShellError::capacity(state.jobs.table.capacity()));
    }
    let redirections = open_redirections(&plan)?;

    if !background && plan.stages.len() == 1 {
        if let Some(builtin) = Builtin::from_name(&plan.stages[0][0]) {
            let _stdio = StdioGuard::redirect(redirections)?;
            return Ok(run_builtin(state, builtin, &plan.stages[0], Context::Shell));
        }
    }

    // Held until the group is either registered or owns the foreground slot.
    let mask = SignalMaskGuard::new()?;
    let launched = launch_group(&plan.stages, redirections, trace, |args| {
        run_stage(state, args)
    })?;
    let spec = JobSpec {
        pid: launched.pgid,
        pgid: launched.pgid,
        last_pid: launched.last_pid(),
        command: group.display(),
        members: launched.pids.len(),
    };

    if background {
        let job = state.jobs.table.register(spec, true, JobStatus::Running)?;
        println!("[{}] {}", job.number, job.pid);
        drop(mask);
        return Ok(0);
    }
    state.jobs.run_foreground(spec, Some(mask))
}

/// Body of a forked stage: a builtin on the child's copy of the state, or exec.
fn run_stage(state: &mut ShellState, args: &[String]) -> i32 {
    match Builtin::from_name(&args[0]) {
        Some(builtin) => run_builtin(state, builtin, args, Context::Child),
        None => exec_external(args),
    }
}
