// SPDX-License-Identifier: MIT OR Apache-2.0
//! Descriptor planning: specs become concrete parent/child descriptor
//! pairs.

use std::ffi::CString;
use std::os::fd::{AsRawFd, OwnedFd};

use procwire_spec::{DescriptorSet, DescriptorSpec, PipeDirection, SpecError};

use crate::error::SpawnError;
use crate::sys;

/// What a planned action wired the child descriptor slot to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ActionKind {
    /// A pipe pair; the parent keeps one end.
    Pipe,
    /// A file, raw handle or other parentless descriptor.
    File,
    /// A duplicate of an earlier action's child end.
    Redirect,
    /// A duplicate of the parent's own standard descriptor.
    InheritedStd,
    /// The null device.
    Null,
}

/// One planned descriptor: the concrete fds behind a spec entry.
///
/// The child end is always present and is closed by the parent after
/// fork no matter what; the parent end exists only for pipes and becomes
/// the exposed endpoint. Both are owned, so an abandoned plan (any error
/// path) closes every descriptor it opened.
#[derive(Debug)]
pub(crate) struct DescriptorAction {
    pub(crate) target: i32,
    pub(crate) kind: ActionKind,
    pub(crate) childend: OwnedFd,
    pub(crate) parentend: Option<OwnedFd>,
    /// For pipes: the parent keeps the write side (the child reads).
    pub(crate) parent_writes: bool,
}

/// Walk the descriptor set in order and open the OS resources each entry
/// needs. On any failure every descriptor opened so far is closed before
/// the error returns.
pub(crate) fn plan_descriptors(set: DescriptorSet) -> Result<Vec<DescriptorAction>, SpawnError> {
    set.validate()?;

    let mut actions: Vec<DescriptorAction> = Vec::with_capacity(set.len());
    for (target, spec) in set.into_entries() {
        let action = match spec {
            DescriptorSpec::Pipe(direction) => {
                let (first, second) =
                    sys::pipe_pair().map_err(|source| SpawnError::Pipe { index: target, source })?;
                let (parentend, childend, parent_writes) = match direction {
                    PipeDirection::ChildReads => (second, first, true),
                    PipeDirection::ChildWrites => (first, second, false),
                };
                DescriptorAction {
                    target,
                    kind: ActionKind::Pipe,
                    childend,
                    parentend: Some(parentend),
                    parent_writes,
                }
            }

            DescriptorSpec::File { path, mode } => {
                let cpath = CString::new(path.as_str())
                    .map_err(|_| SpecError::NulByte("file path".to_string()))?;
                let childend = sys::open_file(&cpath, mode).map_err(|source| SpawnError::File {
                    index: target,
                    path,
                    source,
                })?;
                DescriptorAction {
                    target,
                    kind: ActionKind::File,
                    childend,
                    parentend: None,
                    parent_writes: false,
                }
            }

            DescriptorSpec::Redirect(wanted) => {
                if let Some(existing) = actions.iter().find(|a| a.target == wanted) {
                    let childend = sys::dup_fd(existing.childend.as_raw_fd())
                        .map_err(|source| SpawnError::Dup { index: target, source })?;
                    DescriptorAction {
                        target,
                        kind: ActionKind::Redirect,
                        childend,
                        parentend: None,
                        parent_writes: false,
                    }
                } else if (0..=2).contains(&wanted) {
                    // An unspecified standard stream: the child inherits a
                    // duplicate of the parent's own descriptor.
                    let childend = sys::dup_fd(wanted)
                        .map_err(|source| SpawnError::Dup { index: target, source })?;
                    DescriptorAction {
                        target,
                        kind: ActionKind::InheritedStd,
                        childend,
                        parentend: None,
                        parent_writes: false,
                    }
                } else {
                    return Err(SpawnError::RedirectTargetNotFound { target: wanted });
                }
            }

            DescriptorSpec::Null => {
                let childend = sys::open_null()
                    .map_err(|source| SpawnError::NullDevice { index: target, source })?;
                DescriptorAction {
                    target,
                    kind: ActionKind::Null,
                    childend,
                    parentend: None,
                    parent_writes: false,
                }
            }

            DescriptorSpec::Handle(fd) => {
                let childend = sys::dup_fd(fd.as_raw_fd())
                    .map_err(|source| SpawnError::Dup { index: target, source })?;
                // The supplied handle is released with the spec; the child
                // gets the independent duplicate.
                drop(fd);
                DescriptorAction {
                    target,
                    kind: ActionKind::File,
                    childend,
                    parentend: None,
                    parent_writes: false,
                }
            }
        };
        actions.push(action);
    }

    Ok(actions)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    fn open_fds() -> usize {
        std::fs::read_dir("/proc/self/fd")
            .map(|dir| dir.count())
            .unwrap_or(0)
    }

    #[cfg(not(target_os = "linux"))]
    fn open_fds() -> usize {
        0
    }

    #[test]
    fn pipe_entries_have_parent_ends() {
        let mut set = DescriptorSet::new();
        set.push(0, DescriptorSpec::pipe(PipeDirection::ChildReads));
        set.push(1, DescriptorSpec::pipe(PipeDirection::ChildWrites));
        set.push(2, DescriptorSpec::Null);

        let actions = plan_descriptors(set).unwrap();
        assert_eq!(actions.len(), 3);
        let parent_ends = actions.iter().filter(|a| a.parentend.is_some()).count();
        assert_eq!(parent_ends, 2);
        assert!(actions[0].parent_writes);
        assert!(!actions[1].parent_writes);
        assert_eq!(actions[2].kind, ActionKind::Null);
    }

    #[test]
    fn redirect_duplicates_earlier_child_end() {
        let mut set = DescriptorSet::new();
        set.push(1, DescriptorSpec::pipe(PipeDirection::ChildWrites));
        set.push(2, DescriptorSpec::Redirect(1));

        let mut actions = plan_descriptors(set).unwrap();
        assert_eq!(actions[1].kind, ActionKind::Redirect);
        let original = actions[0].childend.as_raw_fd();
        let duplicate = actions[1].childend.as_raw_fd();
        assert_ne!(original, duplicate);

        // Closing the duplicate must not invalidate the original.
        let dup_action = actions.pop().unwrap();
        drop(dup_action);
        let rc = fcntl_getfd(original);
        assert!(rc >= 0, "original child end closed by duplicate teardown");
    }

    // fcntl(F_GETFD) probe: fails with -1 once a descriptor is closed.
    #[allow(unsafe_code)]
    fn fcntl_getfd(fd: i32) -> i32 {
        unsafe { libc::fcntl(fd, libc::F_GETFD) }
    }

    #[test]
    fn redirect_to_unspecified_std_inherits() {
        let mut set = DescriptorSet::new();
        set.push(1, DescriptorSpec::Redirect(2));
        let actions = plan_descriptors(set).unwrap();
        assert_eq!(actions[0].kind, ActionKind::InheritedStd);
    }

    #[test]
    fn redirect_to_unknown_target_fails() {
        let mut set = DescriptorSet::new();
        set.push(1, DescriptorSpec::Redirect(7));
        match plan_descriptors(set) {
            Err(SpawnError::RedirectTargetNotFound { target }) => assert_eq!(target, 7),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn redirect_resolves_in_order_only() {
        // The redirect appears before the pipe it names; resolution only
        // looks backwards, so target 1 falls through to the std-stream
        // rule.
        let mut set = DescriptorSet::new();
        set.push(2, DescriptorSpec::Redirect(1));
        set.push(1, DescriptorSpec::pipe(PipeDirection::ChildWrites));
        let actions = plan_descriptors(set).unwrap();
        assert_eq!(actions[0].kind, ActionKind::InheritedStd);
    }

    #[test]
    fn negative_index_rejected_before_any_open() {
        let before = open_fds();
        let mut set = DescriptorSet::new();
        set.push(-3, DescriptorSpec::Null);
        assert!(matches!(
            plan_descriptors(set),
            Err(SpawnError::Spec(SpecError::NegativeIndex(-3)))
        ));
        assert_eq!(open_fds(), before);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_plan_leaks_no_descriptors() {
        let before = open_fds();
        let mut set = DescriptorSet::new();
        set.push(0, DescriptorSpec::pipe(PipeDirection::ChildReads));
        set.push(1, DescriptorSpec::pipe(PipeDirection::ChildWrites));
        set.push(5, DescriptorSpec::Redirect(9));
        assert!(matches!(
            plan_descriptors(set),
            Err(SpawnError::RedirectTargetNotFound { target: 9 })
        ));
        assert_eq!(open_fds(), before, "planner leaked descriptors on failure");
    }

    #[test]
    fn handle_spec_duplicates_and_releases() {
        let (a, b) = sys::pipe_pair().unwrap();
        let raw_a = a.as_raw_fd();
        let mut set = DescriptorSet::new();
        set.push(3, DescriptorSpec::Handle(a));
        let actions = plan_descriptors(set).unwrap();
        assert_eq!(actions[0].kind, ActionKind::File);
        assert_ne!(actions[0].childend.as_raw_fd(), raw_a);
        drop(b);
    }

    #[test]
    fn file_path_with_nul_rejected() {
        let mut set = DescriptorSet::new();
        set.push(
            1,
            DescriptorSpec::File {
                path: "bad\0path".to_string(),
                mode: procwire_spec::FileMode::READ,
            },
        );
        assert!(matches!(
            plan_descriptors(set),
            Err(SpawnError::Spec(SpecError::NulByte(_)))
        ));
    }

    #[test]
    fn file_open_failure_reports_path() {
        let mut set = DescriptorSet::new();
        set.push(
            1,
            DescriptorSpec::File {
                path: "/definitely/not/a/real/dir/file".to_string(),
                mode: procwire_spec::FileMode::READ,
            },
        );
        match plan_descriptors(set) {
            Err(SpawnError::File { index, path, .. }) => {
                assert_eq!(index, 1);
                assert!(path.contains("not/a/real"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
