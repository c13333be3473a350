use crate::types::{JobId, JobName, Line};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Where a job's process ended up, as observed by the completion waiter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Exit {
    Code(i32),
    Signal(i32),
    WaitFailed(String),
}

impl Exit {
    pub fn success(&self) -> bool {
        matches!(self, Exit::Code(0))
    }
}

impl fmt::Display for Exit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exit::Code(code) => write!(f, "exit status: {}", code),
            Exit::Signal(signal) => write!(f, "signal: {}", signal),
            Exit::WaitFailed(reason) => f.write_str(reason),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobEvent {
    Started { name: JobName },
    Output(Line),
    Killed,
    Finished(Exit),
    SpawnFailed(String),
}

impl JobEvent {
    /// The last event a job ever publishes.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobEvent::Killed | JobEvent::Finished(_) | JobEvent::SpawnFailed(_)
        )
    }
}

/// One entry in the job log, tagged with the job it belongs to.
#[derive(Clone, Debug)]
pub struct LogEntry {
    pub job_id: JobId,
    pub prefix: Arc<str>,
    pub event: JobEvent,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use JobEvent::*;
        match &self.event {
            Started { name } => write!(f, "job {} start", name),
            Output(line) => write!(f, "{} {}", self.prefix, line),
            Killed => write!(f, "{} Killed by API", self.prefix),
            Finished(exit) if exit.success() => write!(f, "{} Job Finished", self.prefix),
            Finished(exit) => write!(f, "{} Job Failed: {}", self.prefix, exit),
            SpawnFailed(err) => write!(f, "{} Error starting command: {}", self.prefix, err),
        }
    }
}

/// Receiving end is whatever writes the job log; the server relays it to `tracing`.
pub type LogSink = mpsc::UnboundedSender<LogEntry>;

/// Tag put in front of every log line a job produces.
pub fn log_prefix(job_id: JobId, name: &str) -> String {
    format!("AID:{} JOB:{} Output", job_id, name)
}
