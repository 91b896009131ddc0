use std::io;
use std::os::fd::BorrowedFd;
#[cfg(test)]
use std::os::unix::process::CommandExt;
#[cfg(test)]
use std::process::Command;

use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::signal::{
    SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal, kill, sigaction, sigprocmask,
};
use nix::sys::termios::{SetArg, Termios, tcgetattr, tcsetattr};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{Pid, tcsetpgrp};

use crate::error::{ErrorKind, ShellError, ShellResult};
use crate::signals::{SignalCoordinator, SignalKind};

pub mod table;

pub use table::{Foreground, JobSpec, JobStatus, JobTable};

#[cfg(test)]
pub fn set_process_group_explicit(command: &mut Command, pgid: i32) {
    unsafe {
        command.pre_exec(move || {
            reset_child_signals()?;
            nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(pgid))
                .map_err(|err| io::Error::other(err.to_string()))?;
            Ok(())
        });
    }
}

/// Restore default dispositions and an empty mask in a freshly forked child.
pub fn reset_child_signals() -> io::Result<()> {
    let action = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    for &sig in &[
        Signal::SIGINT,
        Signal::SIGTSTP,
        Signal::SIGQUIT,
        Signal::SIGTTIN,
        Signal::SIGTTOU,
        Signal::SIGCHLD,
    ] {
        unsafe { sigaction(sig, &action) }.map_err(|err| io::Error::other(err.to_string()))?;
    }
    sigprocmask(SigmaskHow::SIG_SETMASK, Some(&SigSet::empty()), None)
        .map_err(|err| io::Error::other(err.to_string()))
}

pub fn set_terminal_foreground(pgid: i32) -> io::Result<()> {
    let fd = unsafe { BorrowedFd::borrow_raw(libc::STDIN_FILENO) };
    match tcsetpgrp(fd, Pid::from_raw(pgid)) {
        Ok(()) => Ok(()),
        Err(Errno::ENOTTY) => Ok(()),
        Err(err) => Err(io::Error::other(err.to_string())),
    }
}

/// Holds job-control signals back while a group is being launched or handed
/// the terminal; anything that arrived meanwhile is delivered on drop.
pub struct SignalMaskGuard {
    old: SigSet,
}

impl SignalMaskGuard {
    pub fn new() -> io::Result<Self> {
        let mut set = SigSet::empty();
        set.add(Signal::SIGINT);
        set.add(Signal::SIGTSTP);
        set.add(Signal::SIGCHLD);
        let mut old = SigSet::empty();
        sigprocmask(SigmaskHow::SIG_BLOCK, Some(&set), Some(&mut old))
            .map_err(|err| io::Error::other(err.to_string()))?;
        Ok(Self { old })
    }
}

impl Drop for SignalMaskGuard {
    fn drop(&mut self) {
        if let Err(err) = sigprocmask(SigmaskHow::SIG_SETMASK, Some(&self.old), None) {
            warn!("signal event=restore mask error={}", err);
        }
    }
}

pub struct TermiosGuard {
    saved: Option<Termios>,
}

impl TermiosGuard {
    pub fn new() -> Self {
        Self {
            saved: tcgetattr(unsafe { BorrowedFd::borrow_raw(libc::STDIN_FILENO) }).ok(),
        }
    }
}

impl Drop for TermiosGuard {
    fn drop(&mut self) {
        if let Some(ref termios) = self.saved {
            let fd = unsafe { BorrowedFd::borrow_raw(libc::STDIN_FILENO) };
            if let Err(err) = tcsetattr(fd, SetArg::TCSANOW, termios) {
                warn!("termios event=restore error={}", err);
            }
        }
    }
}

pub struct TerminalGuard {
    shell_pgid: i32,
    active: bool,
}

impl TerminalGuard {
    pub fn new(shell_pgid: i32) -> Self {
        Self {
            shell_pgid,
            active: false,
        }
    }

    pub fn set_foreground(&mut self, pgid: i32) -> io::Result<()> {
        set_terminal_foreground(pgid)?;
        self.active = true;
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.active {
            if let Err(err) = set_terminal_foreground(self.shell_pgid) {
                warn!("tty event=restore error={}", err);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum WaitOutcome {
    Exited,
    Stopped,
}

pub struct WaitResult {
    pub outcome: WaitOutcome,
    pub status_code: Option<i32>,
    /// Members reaped during this wait.
    pub reaped: usize,
    /// Whether any reaped member was killed by a signal.
    pub signaled: bool,
}

pub fn continue_job(pgid: i32) -> io::Result<()> {
    debug!("job event=cont pgid={}", pgid);
    kill(Pid::from_raw(-pgid), Signal::SIGCONT).map_err(|err| io::Error::other(err.to_string()))
}

/// Block until every expected member of `pgid` has exited, or one stops.
pub fn wait_for_process_group(
    pgid: i32,
    expected_count: usize,
    last_pid: i32,
) -> io::Result<WaitResult> {
    debug!(
        "job event=wait pgid={} expected_count={} last_pid={}",
        pgid, expected_count, last_pid
    );
    let mut reaped = 0usize;
    let mut signaled = false;
    let mut status_code = None;
    loop {
        match waitpid(Pid::from_raw(-pgid), Some(WaitPidFlag::WUNTRACED)) {
            Ok(WaitStatus::Exited(pid, code)) => {
                debug!("job event=exit pgid={} pid={} code={}", pgid, pid, code);
                if pid.as_raw() == last_pid {
                    status_code = Some(code);
                }
                reaped += 1;
            }
            Ok(WaitStatus::Signaled(pid, sig, _)) => {
                debug!(
                    "job event=signal pgid={} pid={} signal={}",
                    pgid, pid, sig as i32
                );
                if pid.as_raw() == last_pid {
                    status_code = Some(128 + sig as i32);
                }
                signaled = true;
                reaped += 1;
            }
            Ok(WaitStatus::Stopped(_, _)) => {
                debug!("job event=stopped pgid={}", pgid);
                // Stop the rest of the pipeline along with the member that stopped.
                let _ = kill(Pid::from_raw(-pgid), Signal::SIGTSTP);
                return Ok(WaitResult {
                    outcome: WaitOutcome::Stopped,
                    status_code: None,
                    reaped,
                    signaled,
                });
            }
            Ok(WaitStatus::PtraceEvent(_, _, _)) | Ok(WaitStatus::PtraceSyscall(_)) => continue,
            Ok(WaitStatus::StillAlive) | Ok(WaitStatus::Continued(_)) => continue,
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => break,
            Err(err) => {
                debug!("job event=wait error={}", err);
                return Err(io::Error::other(err.to_string()));
            }
        }
        if expected_count > 0 && reaped >= expected_count {
            break;
        }
    }
    Ok(WaitResult {
        outcome: WaitOutcome::Exited,
        status_code: Some(status_code.unwrap_or(0)),
        reaped,
        signaled,
    })
}

#[derive(Default, Debug)]
struct GroupPoll {
    exited: usize,
    signaled: bool,
    stopped: bool,
    continued: bool,
    gone: bool,
}

fn poll_process_group(pgid: i32) -> GroupPoll {
    let mut poll = GroupPoll::default();
    loop {
        match waitpid(
            Pid::from_raw(-pgid),
            Some(WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED),
        ) {
            Ok(WaitStatus::Exited(_, _)) => {
                debug!("job event=poll exited pgid={}", pgid);
                poll.exited += 1;
            }
            Ok(WaitStatus::Signaled(_, _, _)) => {
                debug!("job event=poll signaled pgid={}", pgid);
                poll.exited += 1;
                poll.signaled = true;
            }
            Ok(WaitStatus::Stopped(_, _)) => {
                debug!("job event=poll stopped pgid={}", pgid);
                poll.stopped = true;
                poll.continued = false;
            }
            Ok(WaitStatus::Continued(_)) => {
                debug!("job event=poll continued pgid={}", pgid);
                poll.continued = true;
                poll.stopped = false;
            }
            Ok(WaitStatus::PtraceEvent(_, _, _)) | Ok(WaitStatus::PtraceSyscall(_)) => continue,
            Ok(WaitStatus::StillAlive) => break,
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => {
                poll.gone = true;
                break;
            }
            Err(_) => break,
        }
    }
    poll
}

/// Collect state changes of every tracked job and report them.
pub fn reap_jobs(table: &mut JobTable) {
    let jobs = table.jobs_mut();
    let mut index = 0;
    while index < jobs.len() {
        let poll = poll_process_group(jobs[index].pgid);
        let job = &mut jobs[index];
        job.live_members = job.live_members.saturating_sub(poll.exited);
        job.signaled |= poll.signaled;
        if poll.gone || job.live_members == 0 {
            let job = jobs.remove(index);
            debug!("job event=reap done pgid={} id={}", job.pgid, job.number);
            let how = if job.signaled { "abnormally" } else { "normally" };
            println!("{} with pid {} exited {how}", job.command, job.pid);
            continue;
        }
        if poll.stopped && job.status != JobStatus::Stopped {
            job.status = JobStatus::Stopped;
            debug!("job event=reap stopped pgid={} id={}", job.pgid, job.number);
            println!("[{}] Stopped {}", job.number, job.command);
        } else if poll.continued && job.status != JobStatus::Running {
            job.status = JobStatus::Running;
            debug!("job event=reap running pgid={} id={}", job.pgid, job.number);
            println!("[{}] Running {}", job.number, job.command);
        }
        index += 1;
    }
}

fn kill_and_reap(pgid: i32) {
    match kill(Pid::from_raw(-pgid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => warn!("job event=terminate pgid={} error={}", pgid, err),
    }
    loop {
        match waitpid(Pid::from_raw(-pgid), None) {
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(_) => break,
        }
    }
}

/// Kill and reap every tracked job. Used when input runs out.
pub fn terminate_all(table: &mut JobTable) {
    for job in table.jobs_mut().drain(..) {
        debug!("job event=terminate pgid={} id={}", job.pgid, job.number);
        kill_and_reap(job.pgid);
    }
}

/// Resume a stopped job without giving it the terminal.
pub fn resume_in_background(table: &mut JobTable, number: Option<usize>) -> ShellResult<()> {
    let pid = table
        .resolve(number)
        .map(|job| job.pid)
        .ok_or_else(|| ShellError::lookup("bg: no such job"))?;
    let Some(job) = table.get_mut(pid) else {
        return Err(ShellError::lookup("bg: no such job"));
    };
    if job.status == JobStatus::Running {
        return Err(ShellError::new(ErrorKind::Lookup, "bg: job already running"));
    }
    continue_job(job.pgid).map_err(|err| ShellError::resource(format!("bg: {err}")))?;
    job.status = JobStatus::Running;
    job.background = true;
    println!("[{}] {} &", job.number, job.command);
    Ok(())
}

pub fn parse_job_number(name: &str, arg: Option<&String>) -> ShellResult<Option<usize>> {
    if let Some(value) = arg {
        let trimmed = value.strip_prefix('%').unwrap_or(value);
        trimmed
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ShellError::lookup(format!("{name}: job id must be a number")))
    } else {
        Ok(None)
    }
}

/// Job table, foreground slot and signal layer, owned by the main loop.
pub struct JobControl {
    pub table: JobTable,
    foreground: Option<Foreground>,
    signals: SignalCoordinator,
    shell_pgid: i32,
    interactive: bool,
}

impl JobControl {
    pub fn new(
        signals: SignalCoordinator,
        shell_pgid: i32,
        interactive: bool,
        max_jobs: usize,
    ) -> Self {
        Self {
            table: JobTable::new(max_jobs),
            foreground: None,
            signals,
            shell_pgid,
            interactive,
        }
    }

    fn enter_foreground(&mut self, slot: Foreground) {
        self.signals.set_foreground(slot.pgid);
        self.foreground = Some(slot);
    }

    fn leave_foreground(&mut self) -> Option<Foreground> {
        self.signals.clear_foreground();
        self.foreground.take()
    }

    /// Poll background jobs if any child changed state since the last call.
    pub fn poll(&mut self) {
        if self.signals.take_child_activity() {
            reap_jobs(&mut self.table);
        }
    }

    /// Give a just-launched group the foreground and wait for it.
    ///
    /// `mask` is the guard taken before the group was forked; it is released
    /// once the foreground slot points at the new group.
    pub fn run_foreground(
        &mut self,
        spec: JobSpec,
        mask: Option<SignalMaskGuard>,
    ) -> ShellResult<i32> {
        self.enter_foreground(Foreground {
            pid: spec.pid,
            pgid: spec.pgid,
            command: spec.command.clone(),
        });
        let result = self.wait_in_foreground(spec.pgid, spec.members, spec.last_pid, mask);
        let stop_forwarded = self
            .signals
            .drain_events()
            .iter()
            .any(|event| event.kind == SignalKind::Stop && event.pgid == spec.pgid);
        let slot = self.leave_foreground();
        let result = result?;

        if result.outcome == WaitOutcome::Exited {
            return Ok(result.status_code.unwrap_or(0));
        }
        debug!(
            "job event=fg-stopped pgid={} forwarded={}",
            spec.pgid, stop_forwarded
        );
        let command = slot.map(|fg| fg.command).unwrap_or(spec.command.clone());
        let members = spec.members.saturating_sub(result.reaped);
        let registered = self.table.register(
            JobSpec {
                command,
                members,
                ..spec
            },
            true,
            JobStatus::Stopped,
        );
        match registered {
            Ok(job) => {
                println!("[{}] Stopped {}", job.number, job.command);
                Ok(128 + libc::SIGTSTP)
            }
            Err(err) => {
                // An untracked stopped group could never be resumed.
                kill_and_reap(spec.pgid);
                Err(err)
            }
        }
    }

    /// `fg`: continue a tracked job in the foreground and wait for it.
    pub fn bring_to_foreground(&mut self, number: Option<usize>) -> ShellResult<i32> {
        let job = self
            .table
            .resolve(number)
            .cloned()
            .ok_or_else(|| ShellError::lookup("fg: no such job"))?;
        debug!("job event=fg pgid={} id={}", job.pgid, job.number);
        println!("{}", job.command);

        let mask = SignalMaskGuard::new()?;
        if job.status == JobStatus::Stopped {
            continue_job(job.pgid).map_err(|err| ShellError::resource(format!("fg: {err}")))?;
        }
        if let Some(entry) = self.table.get_mut(job.pid) {
            entry.status = JobStatus::Running;
            entry.background = false;
        }
        self.enter_foreground(Foreground {
            pid: job.pid,
            pgid: job.pgid,
            command: job.command.clone(),
        });
        let result = self.wait_in_foreground(job.pgid, job.live_members, job.last_pid, Some(mask));
        self.signals.drain_events();
        self.leave_foreground();
        let result = result?;

        match result.outcome {
            WaitOutcome::Exited => {
                self.table.unregister(job.pid);
                Ok(result.status_code.unwrap_or(0))
            }
            WaitOutcome::Stopped => {
                if let Some(entry) = self.table.get_mut(job.pid) {
                    entry.status = JobStatus::Stopped;
                    entry.background = true;
                    entry.live_members = entry.live_members.saturating_sub(result.reaped);
                    entry.signaled |= result.signaled;
                    println!("[{}] Stopped {}", entry.number, entry.command);
                }
                Ok(128 + libc::SIGTSTP)
            }
        }
    }

    fn wait_in_foreground(
        &self,
        pgid: i32,
        members: usize,
        last_pid: i32,
        mask: Option<SignalMaskGuard>,
    ) -> ShellResult<WaitResult> {
        let _termios_guard = self.interactive.then(TermiosGuard::new);
        let mut tty_guard = TerminalGuard::new(self.shell_pgid);
        if self.interactive {
            tty_guard.set_foreground(pgid)?;
        }
        drop(mask);
        Ok(wait_for_process_group(pgid, members, last_pid)?)
    }

    /// Kill everything still tracked; called once input is exhausted.
    pub fn shutdown(&mut self) {
        if let Some(fg) = self.leave_foreground() {
            debug!(
                "job event=terminate kind=foreground pid={} pgid={} command={}",
                fg.pid, fg.pgid, fg.command
            );
            kill_and_reap(fg.pgid);
        }
        terminate_all(&mut self.table);
    }
}
