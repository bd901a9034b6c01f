// SPDX-License-Identifier: MIT OR Apache-2.0
//! Status polling, signalling and the terminal close.

use std::time::Duration;

use procwire_spec::ProcStatus;
use tokio::signal::unix::{SignalKind, signal};
use tracing::debug;

use crate::handle::ChildProc;
use crate::sys;

/// How often the terminal close re-checks the pid when no SIGCHLD stream
/// could be set up.
const POLL_FALLBACK: Duration = Duration::from_millis(20);

impl ChildProc {
    /// Non-blocking status query. Never suspends.
    ///
    /// Decodes exit code, terminating signal or stop signal from a
    /// `WNOHANG | WUNTRACED` wait. A stop does not end the process; exit
    /// and signal termination flip `running` to false and are cached, so
    /// every later query keeps reporting the same terminal status.
    pub fn poll_status(&mut self) -> ProcStatus {
        let mut status = ProcStatus::running(self.command(), self.pid());
        status.running = self.is_running();

        if let Some(reaped) = self.reaped() {
            status.running = false;
            status.signaled = reaped.signaled;
            status.exitcode = reaped.exitcode;
            status.termsig = reaped.termsig;
            return status;
        }

        match sys::wait_nohang(self.pid(), true) {
            sys::RawWait::StillRunning => {}
            sys::RawWait::Reaped(raw) => {
                let decoded = sys::decode_wait(raw);
                if decoded.exited || decoded.signaled {
                    self.record_exit(raw);
                    status.running = false;
                    status.signaled = decoded.signaled;
                    status.exitcode = if decoded.exited { decoded.exit_code } else { -1 };
                    status.termsig = decoded.term_signal;
                }
                if decoded.stopped {
                    status.stopped = true;
                    status.stopsig = decoded.stop_signal;
                }
            }
            sys::RawWait::Gone => {
                // Already reaped elsewhere: no longer running, details
                // unknown.
                self.mark_gone();
                status.running = false;
            }
        }
        status
    }

    /// Deliver an arbitrary signal to the child. Returns whether the
    /// delivery call succeeded; does not wait for any effect.
    pub fn send_signal(&self, sig: i32) -> bool {
        sys::send_signal(self.pid(), sig)
    }

    /// Deliver `SIGTERM` to the child.
    pub fn terminate(&self) -> bool {
        self.send_signal(libc::SIGTERM)
    }

    /// Terminal close: release every still-held pipe endpoint, then wait
    /// for the child to exit. The wait suspends the calling task, never
    /// the worker thread. Returns the raw wait status.
    ///
    /// Endpoints are closed before waiting so a child blocked writing
    /// into a full, unread pipe sees EOF/EPIPE instead of deadlocking
    /// against the wait. If the pid was already reaped by a status poll
    /// the cached raw status is returned without waiting again. There is
    /// no built-in timeout: send a signal first if a bound is needed.
    pub async fn close(mut self) -> i32 {
        self.release_pipes();

        if let Some(reaped) = self.reaped() {
            return reaped.raw;
        }
        if !self.is_running() {
            return 0;
        }

        // Register the SIGCHLD stream before the first check: an exit
        // landing between a check and the await still wakes the stream.
        let mut sigchld = signal(SignalKind::child()).ok();
        loop {
            match sys::wait_nohang(self.pid(), false) {
                sys::RawWait::Reaped(raw) => {
                    self.record_exit(raw);
                    debug!(target: "procwire", pid = self.pid(), raw, "terminal close collected status");
                    return raw;
                }
                sys::RawWait::Gone => {
                    self.mark_gone();
                    return 0;
                }
                sys::RawWait::StillRunning => {
                    let stream_alive = match sigchld.as_mut() {
                        Some(stream) => stream.recv().await.is_some(),
                        None => {
                            tokio::time::sleep(POLL_FALLBACK).await;
                            true
                        }
                    };
                    if !stream_alive {
                        // The signal stream closed underneath us; fall
                        // back to interval polling.
                        sigchld = None;
                    }
                }
            }
        }
    }
}
