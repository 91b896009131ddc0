use log::debug;
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;

use crate::error::{ErrorKind, ShellError, ShellResult};

fn ping_syntax() -> ShellError {
    ShellError::new(ErrorKind::Syntax, "Invalid syntax!")
}

/// Arguments of `ping <pid> <signal>`: the pid and the requested number.
fn parse_ping_args(args: &[String]) -> ShellResult<(i32, i32)> {
    let (Some(pid), Some(signal), None) = (args.get(1), args.get(2), args.get(3)) else {
        return Err(ping_syntax());
    };
    let pid = pid.parse::<i32>().map_err(|_| ping_syntax())?;
    let signal = signal.parse::<i32>().map_err(|_| ping_syntax())?;
    if pid <= 0 || signal <= 0 {
        return Err(ping_syntax());
    }
    Ok((pid, signal))
}

pub(crate) fn handle_ping(args: &[String]) -> ShellResult<i32> {
    let (pid, requested) = parse_ping_args(args)?;
    let actual = requested % 32;
    debug!("signal event=ping pid={} requested={} actual={}", pid, requested, actual);
    let result = if actual == 0 {
        kill(Pid::from_raw(pid), None)
    } else {
        let signal = nix::sys::signal::Signal::try_from(actual)
            .map_err(|_| ShellError::resource(format!("ping: unsupported signal {actual}")))?;
        kill(Pid::from_raw(pid), signal)
    };
    match result {
        Ok(()) => {
            println!("Sent signal {requested} to process with pid {pid}");
            Ok(0)
        }
        Err(Errno::ESRCH) => Err(ShellError::lookup("No such process found")),
        Err(err) => Err(ShellError::resource(format!("ping: {err}"))),
    }
}
