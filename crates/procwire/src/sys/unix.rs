// SPDX-License-Identifier: MIT OR Apache-2.0
//! POSIX process backend.
//!
//! The only module in the crate that performs raw descriptor and
//! process-table syscalls, and therefore the only one allowed unsafe
//! code. The child branch after `fork` is restricted to async-signal-safe
//! calls: every allocation it needs happens before the fork.
#![allow(unsafe_code)]

use std::ffi::{CStr, CString, c_char};
use std::io;
use std::mem::MaybeUninit;
use std::os::fd::{FromRawFd, OwnedFd, RawFd};
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{self, Signal};
use nix::sys::socket::{AddressFamily, SockFlag, SockType, socketpair};
use nix::unistd::{self, ForkResult};
use procwire_spec::{EnvBlock, FileMode};

use crate::EXEC_FAILURE_STATUS;
use crate::error::SpawnError;

// ---------------------------------------------------------------------------
// SIGCHLD ownership
// ---------------------------------------------------------------------------

static SIGCHLD_CLAIMED: AtomicBool = AtomicBool::new(false);

/// Claim child-exit signal delivery for the runtime.
///
/// The terminal wait suspends on the runtime's SIGCHLD stream; a handler
/// installed directly by the embedding application would race it for wait
/// status, so the first spawn refuses outright if one is present. Once
/// claimed, the check is never repeated (the runtime's own chained
/// handler would otherwise trip it).
pub(crate) fn claim_sigchld() -> Result<(), SpawnError> {
    if SIGCHLD_CLAIMED.load(Ordering::Acquire) {
        return Ok(());
    }
    let mut old = MaybeUninit::<libc::sigaction>::zeroed();
    let rc = unsafe { libc::sigaction(libc::SIGCHLD, ptr::null(), old.as_mut_ptr()) };
    if rc == 0 {
        let old = unsafe { old.assume_init() };
        if old.sa_sigaction != libc::SIG_DFL && old.sa_sigaction != libc::SIG_IGN {
            return Err(SpawnError::SigchldConflict);
        }
    }
    SIGCHLD_CLAIMED.store(true, Ordering::Release);
    Ok(())
}

// ---------------------------------------------------------------------------
// Descriptor helpers
// ---------------------------------------------------------------------------

/// Duplicate a raw descriptor into a new owned one. Plain `dup`: the
/// duplicate must remain inheritable across `exec`.
pub(crate) fn dup_fd(fd: RawFd) -> io::Result<OwnedFd> {
    let duped = unsafe { libc::dup(fd) };
    if duped < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { OwnedFd::from_raw_fd(duped) })
}

/// Open a file for a descriptor spec. Creation mode is `0o666`, filtered
/// by the umask like any shell redirection.
pub(crate) fn open_file(path: &CStr, mode: FileMode) -> io::Result<OwnedFd> {
    let mut flags = match (mode.read, mode.write) {
        (true, true) => libc::O_RDWR,
        (false, true) => libc::O_WRONLY,
        _ => libc::O_RDONLY,
    };
    if mode.append {
        flags |= libc::O_APPEND;
    }
    if mode.truncate {
        flags |= libc::O_TRUNC;
    }
    if mode.create {
        flags |= libc::O_CREAT;
    }
    let fd = unsafe { libc::open(path.as_ptr(), flags, 0o666 as libc::c_uint) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Open the null device read/write.
pub(crate) fn open_null() -> io::Result<OwnedFd> {
    let fd = unsafe { libc::open(c"/dev/null".as_ptr(), libc::O_RDWR) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Create a connected, bidirectional descriptor pair for a pipe spec.
pub(crate) fn pipe_pair() -> io::Result<(OwnedFd, OwnedFd)> {
    socketpair(
        AddressFamily::Unix,
        SockType::Stream,
        None,
        SockFlag::empty(),
    )
    .map_err(io::Error::from)
}

/// Mark a descriptor close-on-exec so later spawns never inherit it.
pub(crate) fn set_cloexec(fd: RawFd) -> io::Result<()> {
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Fork + exec
// ---------------------------------------------------------------------------

/// How the child locates its program image.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Program {
    /// `exec*p` on argv element 0, searched on `PATH`.
    PathSearch,
    /// The shell interpreter with a prepared `sh -c` argv.
    Interpreter,
}

/// One descriptor rewiring step, flattened to raw descriptor numbers so
/// the child branch touches no owned types.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WireStep {
    /// Desired descriptor number in the child.
    pub(crate) target: RawFd,
    /// Descriptor to install at `target`.
    pub(crate) childend: RawFd,
    /// Parent end of a pipe pair, closed in the child before anything
    /// else.
    pub(crate) parentend: Option<RawFd>,
}

/// Everything the child branch needs, prepared before `fork`.
pub(crate) struct ChildSpec<'a> {
    pub(crate) program: Program,
    pub(crate) argv: &'a [CString],
    pub(crate) env: Option<&'a EnvBlock>,
    pub(crate) cwd: Option<&'a CStr>,
    pub(crate) wiring: &'a [WireStep],
}

const SHELL: &CStr = c"/bin/sh";

/// Fork and, in the child, rewire descriptors and exec. Returns the child
/// pid to the parent. The two post-fork branches are the two arms of
/// nix's `ForkResult`.
pub(crate) fn spawn_child(spec: &ChildSpec<'_>) -> io::Result<i32> {
    // Flatten argv and envp to NUL-terminated pointer arrays up front:
    // after fork only async-signal-safe calls are allowed, which rules
    // out the allocator.
    let argv_ptrs: Vec<*const c_char> = spec
        .argv
        .iter()
        .map(|a| a.as_ptr())
        .chain(std::iter::once(ptr::null()))
        .collect();
    let envp_ptrs: Option<Vec<*const c_char>> = spec.env.map(EnvBlock::as_ptr_array);

    match unsafe { unistd::fork() } {
        Ok(ForkResult::Child) => exec_child(spec, &argv_ptrs, envp_ptrs.as_deref()),
        Ok(ForkResult::Parent { child }) => Ok(child.as_raw()),
        Err(errno) => Err(io::Error::from(errno)),
    }
}

/// Child branch: never returns. Any exec failure terminates the child
/// with [`EXEC_FAILURE_STATUS`] without unwinding into caller code.
fn exec_child(spec: &ChildSpec<'_>, argv: &[*const c_char], envp: Option<&[*const c_char]>) -> ! {
    unsafe {
        for step in spec.wiring {
            if let Some(parentend) = step.parentend {
                libc::close(parentend);
            }
            // A failed dup2 leaves the slot pointing at whatever the
            // parent had there; the exec below surfaces real trouble as
            // status 127.
            libc::dup2(step.childend, step.target);
            if step.childend != step.target {
                libc::close(step.childend);
            }
        }

        if let Some(cwd) = spec.cwd {
            // Best effort, shell-style: a missing directory shows up as
            // an exec failure, not a spawn error.
            libc::chdir(cwd.as_ptr());
        }

        // The Rust host ignores SIGPIPE process-wide; give the child the
        // conventional default back.
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);

        match (spec.program, envp) {
            (Program::PathSearch, Some(envp)) => {
                libc::execvpe(argv[0], argv.as_ptr(), envp.as_ptr());
            }
            (Program::PathSearch, None) => {
                libc::execvp(argv[0], argv.as_ptr());
            }
            (Program::Interpreter, Some(envp)) => {
                libc::execve(SHELL.as_ptr(), argv.as_ptr(), envp.as_ptr());
            }
            (Program::Interpreter, None) => {
                libc::execv(SHELL.as_ptr(), argv.as_ptr());
            }
        }
        libc::_exit(EXEC_FAILURE_STATUS);
    }
}

// ---------------------------------------------------------------------------
// Wait / signal
// ---------------------------------------------------------------------------

/// Result of a non-blocking wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RawWait {
    /// The child has not changed state.
    StillRunning,
    /// A status was collected (the raw wait status word).
    Reaped(i32),
    /// The pid is gone or was already reaped.
    Gone,
}

/// Non-blocking wait; `untraced` additionally reports stopped children.
pub(crate) fn wait_nohang(pid: i32, untraced: bool) -> RawWait {
    let mut flags = libc::WNOHANG;
    if untraced {
        flags |= libc::WUNTRACED;
    }
    let mut status: libc::c_int = 0;
    loop {
        let rc = unsafe { libc::waitpid(pid, &mut status, flags) };
        if rc == pid {
            return RawWait::Reaped(status);
        }
        if rc == 0 {
            return RawWait::StillRunning;
        }
        if io::Error::last_os_error().raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return RawWait::Gone;
    }
}

/// Blocking wait used by the orphan reaper's fallback thread.
pub(crate) fn wait_blocking(pid: i32) {
    let mut status: libc::c_int = 0;
    loop {
        let rc = unsafe { libc::waitpid(pid, &mut status, 0) };
        if rc >= 0 {
            return;
        }
        if io::Error::last_os_error().raw_os_error() != Some(libc::EINTR) {
            return;
        }
    }
}

/// Decoded raw wait status word.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WaitDecode {
    pub(crate) exited: bool,
    pub(crate) exit_code: i32,
    pub(crate) signaled: bool,
    pub(crate) term_signal: i32,
    pub(crate) stopped: bool,
    pub(crate) stop_signal: i32,
}

/// Decode a raw status word into the fields the status query reports.
pub(crate) fn decode_wait(raw: i32) -> WaitDecode {
    let mut decoded = WaitDecode::default();
    if libc::WIFEXITED(raw) {
        decoded.exited = true;
        decoded.exit_code = libc::WEXITSTATUS(raw);
    }
    if libc::WIFSIGNALED(raw) {
        decoded.signaled = true;
        decoded.term_signal = libc::WTERMSIG(raw);
    }
    if libc::WIFSTOPPED(raw) {
        decoded.stopped = true;
        decoded.stop_signal = libc::WSTOPSIG(raw);
    }
    decoded
}

/// Deliver `sig` to `pid`; reports whether delivery succeeded.
pub(crate) fn send_signal(pid: i32, sig: i32) -> bool {
    match Signal::try_from(sig) {
        Ok(sig) => signal::kill(unistd::Pid::from_raw(pid), sig).is_ok(),
        Err(_) => false,
    }
}

/// SIGKILL without ceremony, for abandon-on-error paths.
pub(crate) fn kill_hard(pid: i32) {
    let _ = signal::kill(unistd::Pid::from_raw(pid), Signal::SIGKILL);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
