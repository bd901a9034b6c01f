// SPDX-License-Identifier: MIT OR Apache-2.0
//! Closing a handle whose child has filled an unread pipe must not hang:
//! endpoint closure before the wait is what breaks the cycle.

use std::time::Duration;

use procwire::{ChildProc, Command, DescriptorSpec, PipeDirection, SpawnSpec};

#[tokio::test]
async fn close_with_full_unread_pipe_terminates() {
    let spec = SpawnSpec::new(Command::argv(["yes"]))
        .descriptor(1, DescriptorSpec::pipe(PipeDirection::ChildWrites));
    let child = ChildProc::spawn(spec).await.expect("spawn yes");

    // Never read: give the writer time to fill the socket buffer and
    // block.
    tokio::time::sleep(Duration::from_millis(300)).await;

    // close drops the parent end first, so the blocked writer hits
    // EPIPE and exits; without that ordering this would deadlock.
    let raw = tokio::time::timeout(Duration::from_secs(10), child.close())
        .await
        .expect("close did not complete; endpoint-before-wait ordering broken");
    assert!(libc::WIFEXITED(raw) || libc::WIFSIGNALED(raw));
}

#[tokio::test]
async fn drop_with_full_unread_pipe_does_not_wedge_the_runtime() {
    let spec = SpawnSpec::new(Command::argv(["yes"]))
        .descriptor(1, DescriptorSpec::pipe(PipeDirection::ChildWrites));
    let child = ChildProc::spawn(spec).await.expect("spawn yes");
    let pid = child.pid();

    tokio::time::sleep(Duration::from_millis(200)).await;
    drop(child);

    // The drop path releases the endpoint and hands the pid to the
    // background reaper; the child must disappear on its own.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if !pid_alive(pid) {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "abandoned writer child {pid} never exited"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

fn pid_alive(pid: i32) -> bool {
    unsafe { libc::kill(pid, 0) == 0 }
}
