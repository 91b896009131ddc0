use std::ffi::CString;
use std::fs;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, OwnedFd};

use log::debug;
use nix::fcntl::OFlag;
use nix::unistd::{ForkResult, Pid, dup2, execvp, fork, pipe2, setpgid};

use crate::error::{ShellError, ShellResult};
use crate::job_control::reset_child_signals;

use super::redirection::Redirections;

/// A process group that was forked for one job group.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Launched {
    pub pgid: i32,
    /// Member pids in pipeline order.
    pub pids: Vec<i32>,
}

impl Launched {
    pub fn last_pid(&self) -> i32 {
        self.pids.last().copied().unwrap_or(self.pgid)
    }
}

/// Fork one child per stage, wired together with pipes, all in one process
/// group led by the first child. `run_stage` runs inside each child and
/// returns its exit status; the child never returns to the caller.
///
/// On a pipe or fork failure every descriptor opened so far is closed and
/// already-forked children are left running.
pub fn launch_group<F>(
    stages: &[Vec<String>],
    redirections: Redirections,
    trace: bool,
    mut run_stage: F,
) -> ShellResult<Launched>
where
    F: FnMut(&[String]) -> i32,
{
    debug!("job event=launch start count={}", stages.len());
    let mut pgid: Option<i32> = None;
    let mut pids = Vec::with_capacity(stages.len());
    let mut prev_read: Option<OwnedFd> = redirections.input.map(OwnedFd::from);
    let mut output: Option<OwnedFd> = redirections.output.map(OwnedFd::from);

    for (idx, args) in stages.iter().enumerate() {
        let last = idx + 1 == stages.len();
        let (next_read, write_end) = if last {
            (None, None)
        } else {
            let (read, write) = pipe2(OFlag::O_CLOEXEC)
                .map_err(|err| ShellError::resource(format!("pipe: {err}")))?;
            (Some(read), Some(write))
        };

        let _ = io::stdout().flush();
        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                drop(next_read);
                let stdout = if last { output.take() } else { write_end };
                let code = match enter_child(pgid.unwrap_or(0), prev_read, stdout) {
                    Ok(()) => run_stage(args.as_slice()),
                    Err(err) => {
                        eprintln!("{}: {err}", args[0]);
                        1
                    }
                };
                let _ = io::stdout().flush();
                let _ = io::stderr().flush();
                unsafe { libc::_exit(code) }
            }
            Ok(ForkResult::Parent { child }) => {
                let leader = *pgid.get_or_insert(child.as_raw());
                // The child may already have exec'd; it set its own group then.
                let _ = setpgid(child, Pid::from_raw(leader));
                if trace {
                    eprintln!("trace: spawn pid {child} pgid {leader}");
                }
                debug!(
                    "job event=spawn kind=stage idx={} pid={} pgid={}",
                    idx, child, leader
                );
                pids.push(child.as_raw());
                prev_read = next_read;
                drop(write_end);
            }
            Err(err) => {
                debug!("job event=spawn error={}", err);
                return Err(ShellError::resource(format!("fork: {err}")));
            }
        }
    }
    drop(output);

    Ok(Launched {
        pgid: pgid.unwrap_or(0),
        pids,
    })
}

fn enter_child(pgid: i32, stdin: Option<OwnedFd>, stdout: Option<OwnedFd>) -> io::Result<()> {
    setpgid(Pid::from_raw(0), Pid::from_raw(pgid))
        .map_err(|err| io::Error::other(err.to_string()))?;
    reset_child_signals()?;
    if let Some(fd) = stdin {
        dup2(fd.as_raw_fd(), libc::STDIN_FILENO)
            .map_err(|err| io::Error::other(err.to_string()))?;
    }
    if let Some(fd) = stdout {
        dup2(fd.as_raw_fd(), libc::STDOUT_FILENO)
            .map_err(|err| io::Error::other(err.to_string()))?;
    }
    Ok(())
}

/// Replace the current process with `args[0]`. Returns only on failure,
/// after reporting it, with the status the child should exit with.
pub fn exec_external(args: &[String]) -> i32 {
    let argv: Result<Vec<CString>, _> = args
        .iter()
        .map(|arg| CString::new(arg.as_bytes()))
        .collect();
    let argv = match argv {
        Ok(argv) => argv,
        Err(_) => {
            eprintln!("{}: argument contains null byte", args[0]);
            return 1;
        }
    };
    let err = match execvp(&argv[0], &argv) {
        Ok(never) => match never {},
        Err(errno) => io::Error::from(errno),
    };
    eprintln!("{}", spawn_error_message(&args[0], &err));
    status_from_error(&err)
}

pub fn status_from_error(err: &io::Error) -> i32 {
    match err.kind() {
        io::ErrorKind::NotFound => 127,
        io::ErrorKind::PermissionDenied => 126,
        _ => 1,
    }
}

pub fn spawn_error_message(cmd: &str, err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => format!("{cmd}: command not found"),
        io::ErrorKind::PermissionDenied => {
            if cmd.contains('/') && fs::metadata(cmd).is_ok_and(|meta| meta.is_dir()) {
                format!("{cmd}: is a directory")
            } else {
                format!("{cmd}: permission denied")
            }
        }
        _ => format!("{cmd}: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_control::{WaitOutcome, wait_for_process_group};
    use std::io::Read;
    use tempfile::tempdir;

    fn words(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn pipeline_members_share_group_and_pipe_output() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let output = fs::File::create(&path).unwrap();
        let stages = vec![words("printf b\\na\\n"), words("sort")];
        let launched = launch_group(
            &stages,
            Redirections {
                input: None,
                output: Some(output),
            },
            false,
            exec_external,
        )
        .unwrap();
        assert_eq!(launched.pids.len(), 2);
        assert_eq!(launched.pgid, launched.pids[0]);

        let result = wait_for_process_group(launched.pgid, 2, launched.last_pid()).unwrap();
        assert_eq!(result.outcome, WaitOutcome::Exited);
        assert_eq!(result.status_code, Some(0));
        let mut text = String::new();
        fs::File::open(&path)
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "a\nb\n");
    }

    #[test]
    fn unknown_command_exits_127() {
        let stages = vec![words("definitely-not-a-command-xyz")];
        let launched =
            launch_group(&stages, Redirections::default(), false, exec_external).unwrap();
        let result = wait_for_process_group(launched.pgid, 1, launched.last_pid()).unwrap();
        assert_eq!(result.status_code, Some(127));
    }

    #[test]
    fn spawn_error_messages() {
        let not_found = io::Error::from(io::ErrorKind::NotFound);
        assert_eq!(spawn_error_message("foo", &not_found), "foo: command not found");
        assert_eq!(status_from_error(&not_found), 127);
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(spawn_error_message("foo", &denied), "foo: permission denied");
        assert_eq!(status_from_error(&denied), 126);
    }
}
