// SPDX-License-Identifier: MIT OR Apache-2.0
//! Platform backends behind one narrow capability seam.
//!
//! Everything that touches the OS process layer (descriptor creation and
//! duplication, fork/exec, wait status, signal delivery) funnels through
//! the functions this module re-exports. A second backend for a
//! native-handle platform would be a sibling module implementing the same
//! surface.

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub(crate) use unix::*;
