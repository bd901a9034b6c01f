// SPDX-License-Identifier: MIT OR Apache-2.0
//! Validation errors for spawn specifications.

use thiserror::Error;

/// Errors detected while validating a spawn specification, before any OS
/// resource is created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    /// A string that must become a native C string contains an embedded
    /// NUL byte. The payload names the offending field.
    #[error("{0} contains an embedded NUL byte")]
    NulByte(String),

    /// An argv-form command was given zero elements.
    #[error("command argv must have at least one element")]
    EmptyArgv,

    /// A descriptor index was negative; child descriptor slots are keyed
    /// by non-negative integers.
    #[error("descriptor index {0} is negative")]
    NegativeIndex(i32),

    /// A file mode string was not one of the recognized `r/w/a` forms.
    #[error("unrecognized file mode {0:?}")]
    UnknownFileMode(String),
}
