use crate::events::Exit;

use futures::future::FutureExt;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::sync::Arc;
use tokio::{process::Child, select, sync::oneshot};
use tracing::{debug, warn};

/// Reap `child`, then report how it ended on `completion_tx`.
///
/// A terminate request kills the child's process group but does not skip the wait, so a killed
/// child is still reaped here.
pub(super) async fn wait_for_exit(
    mut child: Child,
    terminate_rx: oneshot::Receiver<()>,
    completion_tx: oneshot::Sender<Exit>,
    prefix: Arc<str>,
) {
    let mut terminate_rx = terminate_rx.fuse();
    let status = loop {
        select! {
            request = &mut terminate_rx => {
                // a dropped sender just means nobody will ask us to kill
                if request.is_ok() {
                    terminate(&mut child, &prefix);
                }
            }
            status = child.wait() => break status,
        }
    };

    let exit = classify(status);
    if exit.success() {
        debug!(job = %prefix, "Job Finished");
    } else {
        warn!(job = %prefix, %exit, "Error waiting for command to finish");
    }
    let _ = completion_tx.send(exit);
}

fn classify(status: io::Result<ExitStatus>) -> Exit {
    match status {
        Ok(status) => match (status.code(), status.signal()) {
            (Some(code), _) => Exit::Code(code),
            (None, Some(signal)) => Exit::Signal(signal),
            (None, None) => Exit::WaitFailed(status.to_string()),
        },
        Err(err) => Exit::WaitFailed(err.to_string()),
    }
}

fn terminate(child: &mut Child, prefix: &str) {
    // the child leads its own process group, so this also takes down anything the script started
    if let Some(pgid) = child.id().and_then(|pid| i32::try_from(pid).ok()) {
        match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
            Ok(()) => {
                debug!(job = %prefix, pgid, "killed process group");
                return;
            }
            Err(errno) => warn!(job = %prefix, pgid, error = %errno, "Error killing process group"),
        }
    }
    if let Err(err) = child.start_kill() {
        warn!(job = %prefix, error = %err, "Error killing command");
    }
}
