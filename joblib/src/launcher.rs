use crate::error::{Error, Result};
use crate::events::{log_prefix, JobEvent, LogEntry, LogSink};
use crate::job::Supervisor;
use crate::registry::{JobSnapshot, Registry};
use crate::types::JobId;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::{process::Command, sync::oneshot};
use tracing::info;

/// A `JobLauncher` starts scripts as jobs, delivers kills, and answers status queries.
///
/// Scripts live in one directory and are found by name: job `build` runs `./build.sh` through
/// `sh` with that directory as its working directory. Ids start at 1 and are never handed out
/// twice by the same launcher.
///
/// Clones share the same id counter, registry and log sink.
#[derive(Clone)]
pub struct JobLauncher {
    inner: Arc<Inner>,
}

struct Inner {
    scripts_dir: PathBuf,
    next_id: AtomicU64,
    registry: Registry,
    sink: LogSink,
}

impl JobLauncher {
    pub fn new(scripts_dir: impl Into<PathBuf>, sink: LogSink) -> Self {
        Self {
            inner: Arc::new(Inner {
                scripts_dir: scripts_dir.into(),
                next_id: AtomicU64::new(0),
                registry: Registry::new(),
                sink,
            }),
        }
    }

    pub fn scripts_dir(&self) -> &Path {
        &self.inner.scripts_dir
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Path of the script a job name refers to.
    pub fn artifact_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.inner.scripts_dir.join(format!("{}.sh", name)))
    }

    /// Start a new job.
    ///
    /// Fails without allocating an id if the name is unusable or no script exists for it.
    /// Success only means the job was accepted; how it ends shows up in the log sink.
    pub async fn start(&self, name: &str) -> Result<JobId> {
        let artifact = self.artifact_path(name)?;
        if !tokio::fs::try_exists(&artifact).await.unwrap_or(false) {
            info!(job = name, path = %artifact.display(), "Can not find job");
            return Err(Error::ArtifactNotFound(name.to_string()));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let prefix: Arc<str> = log_prefix(id, name).into();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.inner.registry.register(id, name.to_string(), cancel_tx)?;

        let _ = self.inner.sink.send(LogEntry {
            job_id: id,
            prefix: prefix.clone(),
            event: JobEvent::Started {
                name: name.to_string(),
            },
        });
        Supervisor::new(id, prefix, self.inner.registry.clone(), self.inner.sink.clone())
            .spawn(self.command(name), cancel_rx);
        Ok(id)
    }

    /// Ask a live job to die. Returns as soon as the request is delivered.
    pub fn kill(&self, id: JobId) -> Result<()> {
        self.inner.registry.cancel(id)?;
        info!(job_id = id, "kill delivered");
        Ok(())
    }

    pub fn status(&self, id: JobId) -> Result<JobSnapshot> {
        self.inner.registry.lookup(id)
    }

    fn command(&self, name: &str) -> Command {
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(format!("./{}.sh", name))
            .current_dir(&self.inner.scripts_dir);
        command
    }
}

/// Names end up inside a shell command line, so only a conservative alphabet is allowed.
fn validate_name(name: &str) -> Result<()> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.');
    if name.is_empty() || name.starts_with('.') || !name.chars().all(allowed) {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}
