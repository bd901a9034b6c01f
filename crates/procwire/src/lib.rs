// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! procwire
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The engine behind the `procwire-spec` model: a descriptor planner that
//! turns specs into concrete parent/child descriptor pairs, a fork/exec
//! launcher that rewires the child and cleans up on every failure path,
//! and a reaper that collects exit status either non-blockingly (status
//! polls) or by suspending the calling task on the runtime's SIGCHLD
//! stream (terminal close).

#[cfg(not(unix))]
compile_error!("procwire requires a Unix platform");

pub mod error;
pub mod handle;
pub mod pipe;

mod launch;
mod orphan;
mod plan;
mod reap;
mod sys;

pub use error::SpawnError;
pub use handle::ChildProc;
pub use pipe::ProcPipe;

// Re-export the declarative model so callers need a single import line.
pub use procwire_spec::{
    Command, DescriptorSet, DescriptorSpec, EnvBlock, FileMode, PipeDirection, ProcStatus,
    SpawnSpec, SpecError,
};

/// Exit status a child reports when `exec` itself fails, following the
/// shell "command not found" convention. Exec failure is data, not an
/// error: it surfaces only through the status query.
pub const EXEC_FAILURE_STATUS: i32 = 127;
