//! Signal coordination between the terminal, the shell and the foreground job.
//!
//! The handlers see only two things: an atomic cell holding the foreground
//! process group and the write side of a socket pair. On SIGINT/SIGTSTP they
//! forward the signal to that group and push a fixed-size event; every table
//! change and every message happens later on the main loop, right after its
//! interrupted wait returns.
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::sync::{
    Arc, OnceLock,
    atomic::{AtomicBool, AtomicI32, Ordering},
};

use log::debug;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use signal_hook::consts::signal::SIGCHLD;
use signal_hook::flag;

static FOREGROUND_PGID: AtomicI32 = AtomicI32::new(0);
static EVENTS: OnceLock<EventStream> = OnceLock::new();

const EVENT_SIZE: usize = 8;

struct EventStream {
    rx: UnixStream,
    tx: UnixStream,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SignalKind {
    Interrupt,
    Stop,
}

/// One forwarded signal: what was sent and to which group.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SignalEvent {
    pub kind: SignalKind,
    pub pgid: i32,
}

impl SignalEvent {
    fn encode(signo: libc::c_int, pgid: i32) -> [u8; EVENT_SIZE] {
        let mut buf = [0u8; EVENT_SIZE];
        buf[..4].copy_from_slice(&signo.to_ne_bytes());
        buf[4..].copy_from_slice(&pgid.to_ne_bytes());
        buf
    }

    fn decode(buf: &[u8; EVENT_SIZE]) -> Option<Self> {
        let signo = i32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let pgid = i32::from_ne_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let kind = match signo {
            libc::SIGINT => SignalKind::Interrupt,
            libc::SIGTSTP => SignalKind::Stop,
            _ => return None,
        };
        Some(Self { kind, pgid })
    }
}

extern "C" {
    #[cfg_attr(
        any(target_os = "macos", target_os = "ios", target_os = "freebsd"),
        link_name = "__error"
    )]
    #[cfg_attr(
        any(target_os = "openbsd", target_os = "netbsd", target_os = "android"),
        link_name = "__errno"
    )]
    #[cfg_attr(target_os = "linux", link_name = "__errno_location")]
    fn errno_location() -> *mut libc::c_int;
}

/// Run `f` and put `errno` back as it was; the interrupted code may be about
/// to read it.
fn with_saved_errno<F: FnOnce()>(f: F) {
    let saved = unsafe { *errno_location() };
    f();
    unsafe { *errno_location() = saved };
}

// Runs in signal context: atomics, kill(2) and send(2) only.
extern "C" fn forward_signal(signo: libc::c_int) {
    with_saved_errno(|| {
        let pgid = FOREGROUND_PGID.load(Ordering::SeqCst);
        if pgid <= 0 {
            return;
        }
        unsafe {
            libc::kill(-pgid, signo);
        }
        if let Some(stream) = EVENTS.get() {
            let event = SignalEvent::encode(signo, pgid);
            unsafe {
                libc::send(
                    stream.tx.as_raw_fd(),
                    event.as_ptr().cast(),
                    EVENT_SIZE,
                    libc::MSG_DONTWAIT,
                );
            }
        }
    });
}

/// Main-loop side of the signal layer.
pub struct SignalCoordinator {
    child_activity: Arc<AtomicBool>,
}

impl SignalCoordinator {
    /// Install the shell's handlers. Only one coordinator may exist per process.
    pub fn install() -> io::Result<Self> {
        let (rx, tx) = UnixStream::pair()?;
        rx.set_nonblocking(true)?;
        tx.set_nonblocking(true)?;
        if EVENTS.set(EventStream { rx, tx }).is_err() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "signal handlers already installed",
            ));
        }

        let forward = SigAction::new(
            SigHandler::Handler(forward_signal),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        install_action(Signal::SIGINT, &forward)?;
        install_action(Signal::SIGTSTP, &forward)?;

        let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::SA_RESTART, SigSet::empty());
        install_action(Signal::SIGQUIT, &ignore)?;
        install_action(Signal::SIGTTIN, &ignore)?;
        install_action(Signal::SIGTTOU, &ignore)?;

        let child_activity = Arc::new(AtomicBool::new(false));
        flag::register(SIGCHLD, Arc::clone(&child_activity))?;
        debug!("signal event=install forward=INT,TSTP ignore=QUIT,TTIN,TTOU");
        Ok(Self { child_activity })
    }

    pub fn set_foreground(&self, pgid: i32) {
        debug!("signal event=foreground pgid={pgid}");
        FOREGROUND_PGID.store(pgid, Ordering::SeqCst);
    }

    pub fn clear_foreground(&self) {
        FOREGROUND_PGID.store(0, Ordering::SeqCst);
    }

    /// Collect every event recorded since the last call. Never blocks.
    pub fn drain_events(&self) -> Vec<SignalEvent> {
        let mut events = Vec::new();
        let Some(stream) = EVENTS.get() else {
            return events;
        };
        let fd = stream.rx.as_raw_fd();
        loop {
            let mut buf = [0u8; EVENT_SIZE];
            let read = unsafe {
                libc::recv(fd, buf.as_mut_ptr().cast(), EVENT_SIZE, libc::MSG_DONTWAIT)
            };
            if read != EVENT_SIZE as isize {
                break;
            }
            if let Some(event) = SignalEvent::decode(&buf) {
                debug!("signal event=forwarded kind={:?} pgid={}", event.kind, event.pgid);
                events.push(event);
            }
        }
        events
    }

    /// True if SIGCHLD arrived since the last call.
    pub fn take_child_activity(&self) -> bool {
        self.child_activity.swap(false, Ordering::SeqCst)
    }
}

pub fn init_session(interactive: bool) -> io::Result<i32> {
    let pid = unsafe { libc::getpid() };
    let pgid = unsafe { libc::getpgrp() };
    if !interactive {
        return Ok(pgid);
    }
    if pgid != pid {
        let rc = unsafe { libc::setpgid(0, 0) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    let pgid = unsafe { libc::getpgrp() };
    let rc = unsafe { libc::tcsetpgrp(libc::STDIN_FILENO, pgid) };
    if rc != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ENOTTY) {
            return Err(err);
        }
    }
    Ok(pgid)
}

fn install_action(signal: Signal, action: &SigAction) -> io::Result<()> {
    unsafe { sigaction(signal, action) }
        .map(|_| ())
        .map_err(|err| io::Error::other(err.to_string()))
}
