// SPDX-License-Identifier: MIT OR Apache-2.0
//! Spawn orchestration: validate, serialize, plan, fork, wire up the
//! handle.

use std::ffi::CString;
use std::os::fd::AsRawFd;

use procwire_spec::{Command, EnvBlock, PipeDirection, SpawnSpec, SpecError};
use tracing::debug;

use crate::error::SpawnError;
use crate::handle::{ChildProc, PipeSlot};
use crate::pipe::ProcPipe;
use crate::plan::{ActionKind, DescriptorAction, plan_descriptors};
use crate::sys;

impl ChildProc {
    /// Spawn a child process wired as the spec describes.
    ///
    /// Must be called inside a tokio runtime: the pipe parent ends are
    /// registered with the reactor before the handle is returned. On any
    /// error no process is left running and every descriptor opened by
    /// the attempt has been closed.
    pub async fn spawn(spec: SpawnSpec) -> Result<Self, SpawnError> {
        sys::claim_sigchld()?;

        let SpawnSpec {
            command,
            descriptors,
            cwd,
            env,
            persistent,
        } = spec;

        command.validate()?;
        let command_name = command.name().to_string();

        // Everything the child branch needs is allocated here, before the
        // fork.
        let (program, argv) = prepare_exec(&command)?;
        let cwd = cwd
            .as_deref()
            .map(|dir| {
                CString::new(dir).map_err(|_| SpecError::NulByte("working directory".to_string()))
            })
            .transpose()?;
        let env_block = env.as_ref().map(EnvBlock::from_map).transpose()?;

        let actions = plan_descriptors(descriptors)?;
        let wiring: Vec<sys::WireStep> = actions
            .iter()
            .map(|action| sys::WireStep {
                target: action.target,
                childend: action.childend.as_raw_fd(),
                parentend: action.parentend.as_ref().map(|fd| fd.as_raw_fd()),
            })
            .collect();

        let child_spec = sys::ChildSpec {
            program,
            argv: &argv,
            env: env_block.as_ref(),
            cwd: cwd.as_deref(),
            wiring: &wiring,
        };

        // Fork failure drops `actions`, which closes every descriptor the
        // plan opened, parent ends included.
        let pid = sys::spawn_child(&child_spec).map_err(SpawnError::Fork)?;

        debug!(
            target: "procwire",
            pid,
            command = %command_name,
            descriptors = wiring.len(),
            "spawned child process"
        );

        wire_parent(pid, command_name, actions, persistent)
    }
}

/// Prepare the program image and argv C strings for the child branch.
fn prepare_exec(command: &Command) -> Result<(sys::Program, Vec<CString>), SpawnError> {
    match command {
        Command::Argv(args) => {
            let argv = args
                .iter()
                .enumerate()
                .map(|(i, arg)| {
                    CString::new(arg.as_str()).map_err(|_| {
                        SpecError::NulByte(format!("command argument {}", i + 1))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok((sys::Program::PathSearch, argv))
        }
        Command::Shell(line) => {
            let line = CString::new(line.as_str())
                .map_err(|_| SpecError::NulByte("shell command line".to_string()))?;
            Ok((
                sys::Program::Interpreter,
                vec![CString::from(c"sh"), CString::from(c"-c"), line],
            ))
        }
    }
}

/// Parent side after a successful fork: close every child end, wrap each
/// pipe parent end as an endpoint at its descriptor slot, in original
/// order.
fn wire_parent(
    pid: i32,
    command: String,
    actions: Vec<DescriptorAction>,
    persistent: bool,
) -> Result<ChildProc, SpawnError> {
    let mut slots = Vec::with_capacity(actions.len());
    let mut wrap_failure = None;

    for action in actions {
        let DescriptorAction {
            target,
            kind,
            childend,
            parentend,
            parent_writes,
        } = action;

        // The parent never touches child ends, success or not.
        drop(childend);

        let port = match (kind, parentend) {
            (ActionKind::Pipe, Some(parentend)) if wrap_failure.is_none() => {
                let direction = if parent_writes {
                    PipeDirection::ChildReads
                } else {
                    PipeDirection::ChildWrites
                };
                match ProcPipe::from_owned(target, direction, parentend) {
                    Ok(port) => Some(port),
                    Err(err) => {
                        wrap_failure = Some(err);
                        None
                    }
                }
            }
            _ => None,
        };
        slots.push(PipeSlot { target, port });
    }

    if let Some(err) = wrap_failure {
        // The child is already alive but the caller will never see a
        // handle for it: kill it and let the background reaper collect
        // the status so nothing leaks.
        drop(slots);
        sys::kill_hard(pid);
        crate::orphan::register(pid);
        return Err(SpawnError::Endpoint(err));
    }

    Ok(ChildProc::new(pid, command, slots, persistent))
}
