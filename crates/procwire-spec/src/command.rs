// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command forms and the top-level spawn specification.

use std::collections::BTreeMap;

use crate::error::SpecError;
use crate::spec::{DescriptorSet, DescriptorSpec};

/// What to execute in the child process.
///
/// A [`Command::Shell`] line is handed to `/bin/sh -c`; a
/// [`Command::Argv`] vector execs element 0 directly (searched on `PATH`)
/// with the remaining elements as its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A single shell-interpreted command line.
    Shell(String),
    /// An argument vector; element 0 is the executable.
    Argv(Vec<String>),
}

impl Command {
    /// Create a shell-interpreted command.
    pub fn shell(line: impl Into<String>) -> Self {
        Self::Shell(line.into())
    }

    /// Create an argv-form command from any iterator of string-likes.
    pub fn argv<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Argv(args.into_iter().map(Into::into).collect())
    }

    /// The command string recorded on the handle and reported in status
    /// snapshots: the shell line itself, or argv element 0.
    ///
    /// Empty argv yields `""`; [`Command::validate`] rejects that case
    /// before it can reach a spawn.
    pub fn name(&self) -> &str {
        match self {
            Self::Shell(line) => line,
            Self::Argv(args) => args.first().map(String::as_str).unwrap_or(""),
        }
    }

    /// Structural validation: argv must be non-empty.
    ///
    /// NUL-byte checks happen at C-string conversion time in the engine,
    /// where the offending element can be named precisely.
    pub fn validate(&self) -> Result<(), SpecError> {
        match self {
            Self::Shell(_) => Ok(()),
            Self::Argv(args) if args.is_empty() => Err(SpecError::EmptyArgv),
            Self::Argv(_) => Ok(()),
        }
    }
}

/// Full specification for one spawn: the command, the descriptor wiring,
/// and the optional working directory and environment.
///
/// `env: None` inherits the parent environment; `Some(map)` installs
/// exactly the given variables (an empty map gives the child an empty
/// environment).
#[derive(Debug)]
pub struct SpawnSpec {
    /// Command to execute.
    pub command: Command,
    /// Ordered descriptor wiring, keyed by child descriptor number.
    pub descriptors: DescriptorSet,
    /// Optional working directory for the child (best-effort `chdir`).
    pub cwd: Option<String>,
    /// Optional environment; `None` inherits the parent's.
    pub env: Option<BTreeMap<String, String>>,
    /// A persistent child is expected to outlive its handle: dropping the
    /// handle will not hand the pid to the background reaper.
    pub persistent: bool,
}

impl SpawnSpec {
    /// Create a spec with the given command and no descriptor wiring.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            descriptors: DescriptorSet::new(),
            cwd: None,
            env: None,
            persistent: false,
        }
    }

    /// Add one descriptor specification at the given child descriptor
    /// number.
    pub fn descriptor(mut self, target: i32, spec: DescriptorSpec) -> Self {
        self.descriptors.push(target, spec);
        self
    }

    /// Set the child's working directory.
    pub fn cwd(mut self, dir: impl Into<String>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Replace the child environment wholesale.
    pub fn env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    /// Add a single environment variable (switches the spec from
    /// inherited to explicit environment on first use).
    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Mark the child as outliving its handle.
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
