use crate::error::{Error, Result};
use crate::types::{JobId, JobName};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    Running,
    /// A kill was delivered but the process has not been reaped yet.
    Killing,
    /// The process exited on its own and the last output is being relayed.
    Finishing,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobState::Running => "running",
            JobState::Killing => "killing",
            JobState::Finishing => "finishing",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobSnapshot {
    pub id: JobId,
    pub name: JobName,
    pub state: JobState,
}

struct Entry {
    name: JobName,
    // taken when the kill is delivered, so the signal is written at most once
    cancel: Option<oneshot::Sender<()>>,
    // process group of the spawned script, once there is one
    group: Option<i32>,
}

impl Entry {
    fn state(&self) -> JobState {
        match &self.cancel {
            None => JobState::Killing,
            Some(cancel) if cancel.is_closed() => JobState::Finishing,
            Some(_) => JobState::Running,
        }
    }
}

/// Directory of live jobs.
///
/// Cloning is cheap and every clone sees the same jobs. The lock is never held across an await.
#[derive(Clone, Default)]
pub struct Registry {
    jobs: Arc<Mutex<HashMap<JobId, Entry>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Entry>> {
        // no critical section leaves an entry half-updated
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(
        &self,
        id: JobId,
        name: JobName,
        cancel: oneshot::Sender<()>,
    ) -> Result<()> {
        use std::collections::hash_map::Entry::*;
        match self.lock().entry(id) {
            Occupied(_) => Err(Error::AlreadyRegistered(id)),
            Vacant(slot) => {
                slot.insert(Entry {
                    name,
                    cancel: Some(cancel),
                    group: None,
                });
                Ok(())
            }
        }
    }

    /// Remember the process group the job's script runs in.
    pub(crate) fn set_group(&self, id: JobId, pgid: i32) -> bool {
        match self.lock().get_mut(&id) {
            Some(entry) => {
                entry.group = Some(pgid);
                true
            }
            None => false,
        }
    }

    pub fn lookup(&self, id: JobId) -> Result<JobSnapshot> {
        self.lock()
            .get(&id)
            .map(|entry| JobSnapshot {
                id,
                name: entry.name.clone(),
                state: entry.state(),
            })
            .ok_or(Error::NotFound(id))
    }

    /// Deliver the cancel signal to a live job.
    ///
    /// Once the script itself has exited, whatever it left behind in its process group can still
    /// hold the output open. Such a job is killed by signalling the group directly. If the group is
    /// already empty the job counts as gone.
    pub fn cancel(&self, id: JobId) -> Result<()> {
        let mut jobs = self.lock();
        let entry = jobs.get_mut(&id).ok_or(Error::NotFound(id))?;
        if entry.state() == JobState::Finishing {
            // the group id stays reserved while any member is alive
            let pgid = entry.group.ok_or(Error::NotFound(id))?;
            killpg(Pid::from_raw(pgid), Signal::SIGKILL).map_err(|_| Error::NotFound(id))?;
            entry.cancel = None;
            return Ok(());
        }
        let cancel = entry.cancel.take().ok_or(Error::AlreadyKilled(id))?;
        cancel.send(()).map_err(|()| Error::NotFound(id))
    }

    pub(crate) fn remove(&self, id: JobId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Ids of all live jobs, oldest first.
    pub fn ids(&self) -> Vec<JobId> {
        let mut ids: Vec<_> = self.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
