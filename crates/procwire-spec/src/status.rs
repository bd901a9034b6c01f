// SPDX-License-Identifier: MIT OR Apache-2.0
//! Status snapshots for spawned processes.

use serde::{Deserialize, Serialize};

/// A point-in-time status snapshot for a spawned process.
///
/// `exitcode` is `-1` while the process is running or when the exit code
/// is unknown (e.g. the process was killed by a signal). `termsig` and
/// `stopsig` are `0` unless the corresponding flag is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcStatus {
    /// The command string recorded at spawn.
    pub command: String,
    /// OS process id.
    pub pid: i32,
    /// Whether the process was still running at snapshot time.
    pub running: bool,
    /// Whether the process was terminated by a signal.
    pub signaled: bool,
    /// Whether the process is currently stopped (e.g. `SIGSTOP`); a
    /// stopped process is still running.
    pub stopped: bool,
    /// Exit code, or `-1` if unknown.
    pub exitcode: i32,
    /// Terminating signal number when `signaled`.
    pub termsig: i32,
    /// Stop signal number when `stopped`.
    pub stopsig: i32,
}

impl ProcStatus {
    /// Snapshot for a process with no termination information yet.
    pub fn running(command: impl Into<String>, pid: i32) -> Self {
        Self {
            command: command.into(),
            pid,
            running: true,
            signaled: false,
            stopped: false,
            exitcode: -1,
            termsig: 0,
            stopsig: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_snapshot_defaults() {
        let st = ProcStatus::running("cat", 42);
        assert_eq!(st.pid, 42);
        assert!(st.running);
        assert!(!st.signaled && !st.stopped);
        assert_eq!(st.exitcode, -1);
        assert_eq!(st.termsig, 0);
        assert_eq!(st.stopsig, 0);
    }

    #[test]
    fn serde_roundtrip() {
        let mut st = ProcStatus::running("sleep 30", 4242);
        st.running = false;
        st.signaled = true;
        st.termsig = 15;
        let json = serde_json::to_string(&st).unwrap();
        let back: ProcStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(st, back);
    }

    #[test]
    fn serialized_field_names() {
        let st = ProcStatus::running("x", 1);
        let v: serde_json::Value = serde_json::to_value(&st).unwrap();
        for key in [
            "command", "pid", "running", "signaled", "stopped", "exitcode", "termsig", "stopsig",
        ] {
            assert!(v.get(key).is_some(), "missing field {key}");
        }
    }
}
