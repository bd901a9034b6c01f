// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors from descriptor planning and process launching.

use std::io;

use procwire_spec::SpecError;
use thiserror::Error;

/// Errors from a spawn attempt.
///
/// Every variant is synchronous and pre-handle: when `spawn` returns an
/// error, no process is left running and every descriptor opened during
/// the attempt has been closed. Problems inside the child after `exec`
/// (nonzero exits, signal deaths, exec failure itself) are not errors of
/// this crate; they are status data.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The spawn specification failed validation before any OS resource
    /// was created.
    #[error(transparent)]
    Spec(#[from] SpecError),

    /// Creating the connected pair for a pipe descriptor failed.
    #[error("failed to create a pipe pair for descriptor {index}: {source}")]
    Pipe {
        /// Child descriptor number of the failing entry.
        index: i32,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Opening a file descriptor spec failed.
    #[error("failed to open {path:?} for descriptor {index}: {source}")]
    File {
        /// Child descriptor number of the failing entry.
        index: i32,
        /// Path that failed to open.
        path: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Opening the null device failed.
    #[error("failed to open the null device for descriptor {index}: {source}")]
    NullDevice {
        /// Child descriptor number of the failing entry.
        index: i32,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Duplicating a descriptor (redirect or raw handle) failed.
    #[error("failed to duplicate a descriptor for index {index}: {source}")]
    Dup {
        /// Child descriptor number of the failing entry.
        index: i32,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// A redirect referenced a descriptor number that is neither an
    /// earlier entry in the same set nor a standard stream.
    #[error("redirect target {target} not found among planned descriptors")]
    RedirectTargetNotFound {
        /// The unresolvable target.
        target: i32,
    },

    /// The fork call itself failed.
    #[error("fork failed: {0}")]
    Fork(#[source] io::Error),

    /// A pipe parent end could not be registered with the async runtime.
    /// The already-forked child is killed and handed to the background
    /// reaper before this is returned.
    #[error("failed to register a pipe endpoint with the runtime: {0}")]
    Endpoint(#[source] io::Error),

    /// A SIGCHLD handler installed by the embedding application would
    /// race the reaper for wait status; spawning is refused outright.
    #[error("a SIGCHLD handler is already installed; refusing to spawn")]
    SigchldConflict,
}
