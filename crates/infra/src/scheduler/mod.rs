use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chime_domain::{ReminderKey, Trigger};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

/// Opaque handle to a job armed in the [`JobScheduler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a job exists: the reminder's own trigger, or the re-notification
/// loop of a firing alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPurpose {
    Trigger,
    Escalation,
}

/// Event emitted on the fired-job queue whenever a timer elapses
#[derive(Debug, Clone)]
pub struct FiredJob {
    pub job: JobId,
    pub key: ReminderKey,
    pub purpose: JobPurpose,
}

struct JobEntry {
    trigger: Trigger,
    tz: Tz,
    handle: Option<JoinHandle<()>>,
}

/// Owns one timer task per armed job. Tasks never touch reminder state
/// themselves, they only push [`FiredJob`] events onto a queue consumed by
/// a single engine loop.
pub struct JobScheduler {
    jobs: Arc<Mutex<HashMap<JobId, JobEntry>>>,
    fired_tx: UnboundedSender<FiredJob>,
    fired_rx: Mutex<Option<UnboundedReceiver<FiredJob>>>,
}

impl JobScheduler {
    pub fn new() -> Self {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            fired_tx,
            fired_rx: Mutex::new(Some(fired_rx)),
        }
    }

    /// Takes the consuming end of the fired-job queue. There is exactly one,
    /// so this returns `None` on every call but the first.
    pub fn take_fired_rx(&self) -> Option<UnboundedReceiver<FiredJob>> {
        self.fired_rx.lock().unwrap().take()
    }

    /// Arms a timer task for `trigger` and returns its handle
    pub fn arm(&self, key: &ReminderKey, trigger: &Trigger, tz: Tz, purpose: JobPurpose) -> JobId {
        let job = JobId::new();
        self.jobs.lock().unwrap().insert(
            job,
            JobEntry {
                trigger: trigger.clone(),
                tz,
                handle: None,
            },
        );
        let handle = tokio::spawn(run_job(
            job,
            key.clone(),
            trigger.clone(),
            tz,
            purpose,
            self.fired_tx.clone(),
            Arc::clone(&self.jobs),
        ));
        // a due one-shot can fire and unregister before we get here, in
        // which case the entry is already gone and the handle can be dropped
        if let Some(entry) = self.jobs.lock().unwrap().get_mut(&job) {
            entry.handle = Some(handle);
        }
        job
    }

    /// Stops a job. Unknown or already finished jobs are a benign no-op.
    pub fn cancel(&self, job: JobId) {
        if let Some(entry) = self.jobs.lock().unwrap().remove(&job) {
            if let Some(handle) = entry.handle {
                handle.abort();
            }
        }
    }

    /// Next instant the job will fire at, computed from its trigger.
    /// `None` when the job is finished or was never armed.
    pub fn next_run_time(&self, job: JobId, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let jobs = self.jobs.lock().unwrap();
        let entry = jobs.get(&job)?;
        entry.trigger.next_occurrence(entry.tz, now)
    }

    pub fn contains(&self, job: JobId) -> bool {
        self.jobs.lock().unwrap().contains_key(&job)
    }

    pub fn job_count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_job(
    job: JobId,
    key: ReminderKey,
    trigger: Trigger,
    tz: Tz,
    purpose: JobPurpose,
    fired_tx: UnboundedSender<FiredJob>,
    jobs: Arc<Mutex<HashMap<JobId, JobEntry>>>,
) {
    loop {
        let now = Utc::now();
        let due = match &trigger {
            // a one-shot fires immediately when its instant already passed
            Trigger::OneShot(at) => *at,
            _ => match trigger.next_occurrence(tz, now) {
                Some(next) => next,
                None => break,
            },
        };
        sleep_until_due(due).await;
        let fired = FiredJob {
            job,
            key: key.clone(),
            purpose,
        };
        if fired_tx.send(fired).is_err() {
            break;
        }
        if let Trigger::OneShot(_) = trigger {
            break;
        }
    }
    jobs.lock().unwrap().remove(&job);
    debug!("Job {} finished and unregistered itself", job);
}

/// Sleeps until `due` has actually passed. `tokio::time::sleep` can wake a
/// fraction of a millisecond early because the delta is rounded down, so
/// the deadline is re-checked against the clock.
async fn sleep_until_due(due: DateTime<Utc>) {
    loop {
        let now = Utc::now();
        if now >= due {
            return;
        }
        let millis = (due - now).num_milliseconds().max(1) as u64;
        tokio::time::sleep(StdDuration::from_millis(millis)).await;
    }
}
