// SPDX-License-Identifier: MIT OR Apache-2.0
//! Background reaper for children abandoned by a dropped handle.
//!
//! `Drop` cannot suspend, so a handle dropped while its child is still
//! running hands the pid to a dedicated joiner thread that polls it until
//! the status is collected. This guarantees no zombie outlives the
//! process even when callers never call the terminal close.

use std::sync::OnceLock;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::sys;

static TX: OnceLock<mpsc::Sender<i32>> = OnceLock::new();

const TICK: Duration = Duration::from_millis(250);

/// Hand a still-running pid to the joiner thread.
pub(crate) fn register(pid: i32) {
    let tx = TX.get_or_init(|| {
        let (tx, rx) = mpsc::channel::<i32>();

        let _ = thread::Builder::new()
            .name("procwire-orphan-reaper".to_string())
            .spawn(move || joiner_loop(rx));

        tx
    });

    match tx.send(pid) {
        Ok(()) => {}
        Err(mpsc::SendError(pid)) => spawn_fallback_waiter(pid),
    }
}

fn joiner_loop(rx: mpsc::Receiver<i32>) {
    let mut pids: Vec<i32> = Vec::new();
    let mut rx_open = true;

    while rx_open || !pids.is_empty() {
        match rx.recv_timeout(TICK) {
            Ok(pid) => pids.push(pid),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => rx_open = false,
        }

        pids.retain(|&pid| matches!(sys::wait_nohang(pid, false), sys::RawWait::StillRunning));
    }
}

fn spawn_fallback_waiter(pid: i32) {
    let _ = thread::Builder::new()
        .name("procwire-orphan-wait".to_string())
        .spawn(move || sys::wait_blocking(pid));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::register;
    use std::thread::sleep;
    use std::time::{Duration, Instant};

    #[test]
    #[allow(unsafe_code)]
    fn joiner_reaps_quick_exit_child_no_zombie_left() {
        let child = std::process::Command::new("true")
            .spawn()
            .or_else(|_| std::process::Command::new("sh").args(["-c", "exit 0"]).spawn())
            .expect("spawn quick-exit child");

        let pid: libc::pid_t = child.id().try_into().expect("pid_t conversion");
        std::mem::forget(child);

        register(pid);

        let deadline = Instant::now() + Duration::from_secs(3);
        let mut saw_esrch = false;
        while Instant::now() < deadline {
            let rc = unsafe { libc::kill(pid, 0) };
            if rc == -1 {
                let err = std::io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::ESRCH) {
                    saw_esrch = true;
                    break;
                }
            }
            sleep(Duration::from_millis(10));
        }

        if !saw_esrch {
            // Not gone yet: it must at least already be reaped (ECHILD),
            // not lingering as a zombie.
            let mut status: libc::c_int = 0;
            let rc = unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG) };
            if rc == -1 {
                let err = std::io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::ECHILD) {
                    return;
                }
            }
            panic!("child pid did not disappear (possible zombie): {pid}");
        }

        let mut status: libc::c_int = 0;
        let rc = unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG) };
        assert_eq!(rc, -1);
        let err = std::io::Error::last_os_error();
        assert_eq!(err.raw_os_error(), Some(libc::ECHILD));
    }
}
