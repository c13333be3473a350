mod reader;
mod waiter;

use crate::events::{Exit, JobEvent, LogEntry, LogSink};
use crate::registry::Registry;
use crate::types::{JobId, Line};

use std::process::Stdio;
use std::sync::Arc;
use tokio::{
    process::{Child, Command},
    select,
    sync::{mpsc, oneshot},
};
use tracing::{debug, error, warn};

/// Owns one job from spawn until its registry entry is gone.
///
/// The entry must already be registered under `id`; the supervisor removes it once the last line
/// of output has been relayed, and only then publishes the terminal event.
pub(crate) struct Supervisor {
    id: JobId,
    prefix: Arc<str>,
    registry: Registry,
    sink: LogSink,
}

impl Supervisor {
    pub(crate) fn new(id: JobId, prefix: Arc<str>, registry: Registry, sink: LogSink) -> Self {
        Self {
            id,
            prefix,
            registry,
            sink,
        }
    }

    pub(crate) fn spawn(self, command: Command, cancel_rx: oneshot::Receiver<()>) {
        tokio::spawn(async move { self.run(command, cancel_rx).await });
    }

    async fn run(self, mut command: Command, cancel_rx: oneshot::Receiver<()>) {
        let spawned = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn();

        let terminal = match spawned {
            Ok(child) => {
                debug!(job = %self.prefix, pid = child.id(), "spawned");
                // the child leads its own group, so its pid is the group id
                if let Some(pgid) = child.id().and_then(|pid| i32::try_from(pid).ok()) {
                    self.registry.set_group(self.id, pgid);
                }
                let (output_tx, output_rx) = mpsc::unbounded_channel();
                let (terminal, ()) = tokio::join!(
                    self.race(child, output_tx, cancel_rx),
                    self.relay(output_rx)
                );
                terminal
            }
            Err(err) => {
                // no process, so no reader, no waiter and no output
                error!(job = %self.prefix, error = %err, "Error starting command");
                JobEvent::SpawnFailed(err.to_string())
            }
        };

        self.registry.remove(self.id);
        self.publish(terminal);
    }

    /// Race the kill request against the process exiting on its own.
    ///
    /// Our share of the output channel is released once the race resolves; the channel closes
    /// when the reader has released its share too.
    async fn race(
        &self,
        mut child: Child,
        output_tx: mpsc::UnboundedSender<Line>,
        cancel_rx: oneshot::Receiver<()>,
    ) -> JobEvent {
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(reader::forward_lines(
                stdout,
                output_tx.clone(),
                self.prefix.clone(),
            ));
        }

        let (terminate_tx, terminate_rx) = oneshot::channel();
        let (completion_tx, completion_rx) = oneshot::channel();
        tokio::spawn(waiter::wait_for_exit(
            child,
            terminate_rx,
            completion_tx,
            self.prefix.clone(),
        ));

        let terminal = select! {
            Ok(()) = cancel_rx => {
                debug!(job = %self.prefix, "Killed by API");
                request_terminate(terminate_tx, &self.prefix);
                JobEvent::Killed
            }
            exit = completion_rx => {
                let exit = exit
                    .unwrap_or_else(|_| Exit::WaitFailed("completion waiter went away".into()));
                debug!(job = %self.prefix, %exit, "Over");
                JobEvent::Finished(exit)
            }
        };
        drop(output_tx);
        terminal
    }

    async fn relay(&self, mut output_rx: mpsc::UnboundedReceiver<Line>) {
        while let Some(line) = output_rx.recv().await {
            self.publish(JobEvent::Output(line));
        }
    }

    fn publish(&self, event: JobEvent) {
        // the log consumer going away must not take the job down with it
        let _ = self.sink.send(LogEntry {
            job_id: self.id,
            prefix: self.prefix.clone(),
            event,
        });
    }
}

/// Ask the waiter to kill the process. Returns false if the waiter was already done with it.
fn request_terminate(terminate_tx: oneshot::Sender<()>, prefix: &str) -> bool {
    if terminate_tx.send(()).is_err() {
        warn!(job = %prefix, "Error killing command: process already exited");
        return false;
    }
    true
}
