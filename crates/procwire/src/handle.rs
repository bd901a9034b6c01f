// SPDX-License-Identifier: MIT OR Apache-2.0
//! The live handle to a spawned process.

use tracing::debug;

use crate::orphan;
use crate::pipe::ProcPipe;
use crate::sys;

/// One descriptor slot on the handle: the child descriptor number and,
/// for pipe specs, the parent endpoint until the caller takes it.
#[derive(Debug)]
pub(crate) struct PipeSlot {
    pub(crate) target: i32,
    pub(crate) port: Option<ProcPipe>,
}

/// Termination details cached at reap time so repeated status queries and
/// the terminal close never have to wait on the pid twice.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReapedStatus {
    pub(crate) raw: i32,
    pub(crate) exitcode: i32,
    pub(crate) signaled: bool,
    pub(crate) termsig: i32,
}

/// A handle to a spawned child process.
///
/// The handle owns the parent-side pipe endpoints until the caller takes
/// them with [`ChildProc::take_pipe`]; endpoints taken out live and close
/// independently. Dropping the handle releases every endpoint it still
/// holds first and, unless the spec was marked persistent, hands a
/// still-running pid to a background reaper so no zombie is left behind
/// even without an explicit [`close`](Self::close).
#[derive(Debug)]
pub struct ChildProc {
    pid: i32,
    command: String,
    slots: Vec<PipeSlot>,
    running: bool,
    reaped: Option<ReapedStatus>,
    persistent: bool,
}

impl ChildProc {
    pub(crate) fn new(
        pid: i32,
        command: String,
        slots: Vec<PipeSlot>,
        persistent: bool,
    ) -> Self {
        Self {
            pid,
            command,
            slots,
            running: true,
            reaped: None,
            persistent,
        }
    }

    /// OS process id of the child.
    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// The command string recorded at spawn.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Last known running state. No syscall: use
    /// [`poll_status`](Self::poll_status) for a fresh answer.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Take the parent endpoint for the given child descriptor number.
    ///
    /// Returns `None` if that slot was not a pipe spec or the endpoint
    /// was already taken.
    pub fn take_pipe(&mut self, target: i32) -> Option<ProcPipe> {
        self.slots
            .iter_mut()
            .find(|slot| slot.target == target)
            .and_then(|slot| slot.port.take())
    }

    /// Child descriptor numbers whose endpoints are still held by the
    /// handle.
    pub fn held_pipes(&self) -> Vec<i32> {
        self.slots
            .iter()
            .filter(|slot| slot.port.is_some())
            .map(|slot| slot.target)
            .collect()
    }

    /// Drop every endpoint the handle still holds. Closing the parent
    /// ends first is what unblocks a child stuck writing into a full,
    /// unread pipe.
    pub(crate) fn release_pipes(&mut self) {
        for slot in &mut self.slots {
            slot.port = None;
        }
    }

    pub(crate) fn reaped(&self) -> Option<ReapedStatus> {
        self.reaped
    }

    pub(crate) fn mark_gone(&mut self) {
        self.running = false;
    }

    /// Record a terminal wait status. Idempotent: both the status poll
    /// and the terminal close funnel through here.
    pub(crate) fn record_exit(&mut self, raw: i32) {
        let decoded = sys::decode_wait(raw);
        self.running = false;
        self.reaped = Some(ReapedStatus {
            raw,
            exitcode: if decoded.exited { decoded.exit_code } else { -1 },
            signaled: decoded.signaled,
            termsig: decoded.term_signal,
        });
        debug!(target: "procwire", pid = self.pid, raw, "child reaped");
    }
}

impl Drop for ChildProc {
    fn drop(&mut self) {
        self.release_pipes();
        if self.running && self.reaped.is_none() && !self.persistent {
            debug!(
                target: "procwire",
                pid = self.pid,
                command = %self.command,
                "handle dropped with child still running; handing to orphan reaper"
            );
            orphan::register(self.pid);
        }
    }
}
