// SPDX-License-Identifier: MIT OR Apache-2.0
//! Descriptor specifications: how each child descriptor slot is populated.

use std::os::fd::OwnedFd;

use crate::error::SpecError;

// ---------------------------------------------------------------------------
// PipeDirection
// ---------------------------------------------------------------------------

/// Which way a pipe descriptor flows, expressed from the child's point of
/// view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeDirection {
    /// The child reads from its end; the parent keeps the write side.
    ChildReads,
    /// The child writes to its end; the parent keeps the read side.
    ChildWrites,
}

impl PipeDirection {
    /// Parse a pipe mode string.
    ///
    /// The mode describes the **child's** use of its end: a leading `'w'`
    /// means the child writes (the parent keeps the read side); any other
    /// mode, `"r"` included, means the child reads (the parent keeps the
    /// write side).
    pub fn from_mode(mode: &str) -> Self {
        if mode.starts_with('w') {
            Self::ChildWrites
        } else {
            Self::ChildReads
        }
    }
}

// ---------------------------------------------------------------------------
// FileMode
// ---------------------------------------------------------------------------

/// Parsed open-mode for a file descriptor spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMode {
    /// Open for reading.
    pub read: bool,
    /// Open for writing.
    pub write: bool,
    /// Append on every write.
    pub append: bool,
    /// Truncate to zero length on open.
    pub truncate: bool,
    /// Create the file if it does not exist.
    pub create: bool,
}

impl FileMode {
    /// Read-only mode (`"r"`).
    pub const READ: Self = Self {
        read: true,
        write: false,
        append: false,
        truncate: false,
        create: false,
    };

    /// Write-only, create + truncate (`"w"`).
    pub const WRITE: Self = Self {
        read: false,
        write: true,
        append: false,
        truncate: true,
        create: true,
    };

    /// Write-only, create + append (`"a"`).
    pub const APPEND: Self = Self {
        read: false,
        write: true,
        append: true,
        truncate: false,
        create: true,
    };

    /// Parse an fopen-style mode string: the `r`/`w`/`a` families with an
    /// optional `+` and a tolerated (ignored) `b`.
    pub fn parse(mode: &str) -> Result<Self, SpecError> {
        let mut chars = mode.chars();
        let base = chars
            .next()
            .ok_or_else(|| SpecError::UnknownFileMode(mode.to_string()))?;
        let mut plus = false;
        for c in chars {
            match c {
                '+' => plus = true,
                'b' => {}
                _ => return Err(SpecError::UnknownFileMode(mode.to_string())),
            }
        }
        let parsed = match base {
            'r' => Self {
                read: true,
                write: plus,
                append: false,
                truncate: false,
                create: false,
            },
            'w' => Self {
                read: plus,
                write: true,
                append: false,
                truncate: true,
                create: true,
            },
            'a' => Self {
                read: plus,
                write: true,
                append: true,
                truncate: false,
                create: true,
            },
            _ => return Err(SpecError::UnknownFileMode(mode.to_string())),
        };
        Ok(parsed)
    }
}

// ---------------------------------------------------------------------------
// DescriptorSpec
// ---------------------------------------------------------------------------

/// How one child descriptor slot should be populated.
///
/// This is the closed set of wiring kinds; there is no pseudo-terminal
/// variant.
#[derive(Debug)]
pub enum DescriptorSpec {
    /// A connected pipe pair; the parent keeps the end opposite the
    /// child's declared use.
    Pipe(PipeDirection),
    /// A file opened at spawn time; the child gets the descriptor, the
    /// parent keeps nothing.
    File {
        /// Path to open.
        path: String,
        /// Open mode.
        mode: FileMode,
    },
    /// Duplicate the child-side descriptor of an earlier entry in the
    /// same set, or, if the target is 0, 1 or 2 and not otherwise
    /// specified, the parent's own standard descriptor.
    Redirect(i32),
    /// The null device, opened read/write.
    Null,
    /// An already-open descriptor supplied by the caller; the child gets
    /// a duplicate.
    Handle(OwnedFd),
}

impl DescriptorSpec {
    /// Shorthand for [`DescriptorSpec::Pipe`].
    pub fn pipe(direction: PipeDirection) -> Self {
        Self::Pipe(direction)
    }

    /// Shorthand for a pipe whose direction comes from a mode string (see
    /// [`PipeDirection::from_mode`]).
    pub fn pipe_mode(mode: &str) -> Self {
        Self::Pipe(PipeDirection::from_mode(mode))
    }

    /// Shorthand for [`DescriptorSpec::File`] with a mode string.
    pub fn file(path: impl Into<String>, mode: &str) -> Result<Self, SpecError> {
        Ok(Self::File {
            path: path.into(),
            mode: FileMode::parse(mode)?,
        })
    }
}

// ---------------------------------------------------------------------------
// DescriptorSet
// ---------------------------------------------------------------------------

/// Ordered collection of `(child descriptor number, spec)` pairs.
///
/// Order is significant: a [`DescriptorSpec::Redirect`] resolves only
/// against entries that appear earlier in the set.
#[derive(Debug, Default)]
pub struct DescriptorSet {
    entries: Vec<(i32, DescriptorSpec)>,
}

impl DescriptorSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The conventional stdio wiring: stdin pipe the child reads, stdout
    /// and stderr pipes the child writes.
    pub fn piped_stdio() -> Self {
        let mut set = Self::new();
        set.push(0, DescriptorSpec::Pipe(PipeDirection::ChildReads));
        set.push(1, DescriptorSpec::Pipe(PipeDirection::ChildWrites));
        set.push(2, DescriptorSpec::Pipe(PipeDirection::ChildWrites));
        set
    }

    /// Append a spec for the given child descriptor number.
    pub fn push(&mut self, target: i32, spec: DescriptorSpec) -> &mut Self {
        self.entries.push((target, spec));
        self
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(target, spec)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, &DescriptorSpec)> {
        self.entries.iter().map(|(t, s)| (*t, s))
    }

    /// Structural validation: every child descriptor number must be
    /// non-negative.
    pub fn validate(&self) -> Result<(), SpecError> {
        for (target, _) in &self.entries {
            if *target < 0 {
                return Err(SpecError::NegativeIndex(*target));
            }
        }
        Ok(())
    }

    /// Consume the set into its ordered entries.
    pub fn into_entries(self) -> Vec<(i32, DescriptorSpec)> {
        self.entries
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
