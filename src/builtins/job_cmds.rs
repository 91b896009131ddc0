use std::io::{self, Write};

use crate::error::ShellResult;
use crate::job_control::{JobTable, parse_job_number, resume_in_background};
use crate::repl::ShellState;

pub(crate) fn handle_fg(state: &mut ShellState, args: &[String]) -> ShellResult<i32> {
    let number = parse_job_number("fg", args.get(1))?;
    state.jobs.bring_to_foreground(number)
}

pub(crate) fn handle_bg(state: &mut ShellState, args: &[String]) -> ShellResult<i32> {
    let number = parse_job_number("bg", args.get(1))?;
    resume_in_background(&mut state.jobs.table, number)?;
    Ok(0)
}

pub(crate) fn handle_activities(table: &JobTable) -> ShellResult<i32> {
    let mut out = io::stdout().lock();
    for job in table.list_for_display() {
        writeln!(out, "[{}] : {} - {}", job.pid, job.command, job.status.label())?;
    }
    Ok(0)
}
