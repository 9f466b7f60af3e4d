//! The daemon's session table: one live [`Session`] per project key.
//!
//! The table lock is held only while a slot is looked up or replaced. Runs
//! for one project are serialized by its [`ProjectGate`], which outlives
//! session replacement and eviction, so a rebuild or a retry after a
//! timeout waits for the previous worker. Different projects proceed in
//! parallel.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use litweave_core::{JobRequest, Options, PluginRegistry, ProjectKey};
use litweave_session::{Session, SessionError, SessionState, SessionSummary};

pub type SharedSession = Arc<Mutex<Session>>;

/// Held for the whole of one run, including a worker that outlives its
/// request's timeout.
pub type ProjectGate = Arc<Mutex<()>>;

/// How `checkout` obtained the session it returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkout {
    Created,
    Reused,
    /// The job asked for a rebuild.
    Rebuilt,
    /// The job's option bag differed from the live session's.
    OptionsChanged,
}

struct SessionSlot {
    options: Options,
    session: SharedSession,
    created_at: DateTime<Utc>,
}

/// One row of `status`: a summary when the session is idle, or just its
/// key while a job holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub project: ProjectKey,
    pub busy: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<SessionSummary>,
}

#[derive(Default)]
struct Slots {
    sessions: HashMap<ProjectKey, SessionSlot>,
    gates: HashMap<ProjectKey, ProjectGate>,
}

#[derive(Default)]
pub struct SessionTable {
    slots: Mutex<Slots>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The gate for `key`. Lock it before `checkout` and keep the guard
    /// until the run's worker has returned.
    ///
    /// Gates of projects that have no session and no holder are dropped
    /// here.
    pub async fn gate(&self, key: &ProjectKey) -> ProjectGate {
        let mut slots = self.slots.lock().await;
        let Slots { sessions, gates } = &mut *slots;
        gates.retain(|k, gate| sessions.contains_key(k) || Arc::strong_count(gate) > 1);
        Arc::clone(gates.entry(key.clone()).or_default())
    }

    /// The session serving `job`, created or replaced as needed.
    ///
    /// A new session is only registered once it has been fully
    /// constructed; a construction failure leaves the table untouched.
    pub async fn checkout(
        &self,
        job: &JobRequest,
        registry: &Arc<PluginRegistry>,
    ) -> Result<(SharedSession, Checkout), SessionError> {
        let key = job.project_key();
        let mut slots = self.slots.lock().await;
        let reason = match slots.sessions.get(&key) {
            Some(_) if job.rebuild => Checkout::Rebuilt,
            Some(slot) if slot.options != job.options => Checkout::OptionsChanged,
            Some(slot) => return Ok((Arc::clone(&slot.session), Checkout::Reused)),
            None => Checkout::Created,
        };

        let session = Arc::new(Mutex::new(Session::from_job(job, Arc::clone(registry))?));
        slots.sessions.insert(
            key,
            SessionSlot {
                options: job.options.clone(),
                session: Arc::clone(&session),
                created_at: Utc::now(),
            },
        );
        Ok((session, reason))
    }

    /// Drop `key` if it still maps to `session`. A slot that was replaced
    /// in the meantime is left alone.
    pub async fn evict(&self, key: &ProjectKey, session: &SharedSession) -> bool {
        let mut slots = self.slots.lock().await;
        match slots.sessions.get(key) {
            Some(slot) if Arc::ptr_eq(&slot.session, session) => {
                slots.sessions.remove(key);
                true
            }
            _ => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.sessions.is_empty()
    }

    /// Status rows sorted by input path. Never waits on a running job.
    pub async fn statuses(&self) -> Vec<SessionStatus> {
        let slots = self.slots.lock().await;
        let mut rows: Vec<SessionStatus> = slots
            .sessions
            .iter()
            .map(|(key, slot)| match slot.session.try_lock() {
                Ok(session) => SessionStatus {
                    project: key.clone(),
                    busy: session.state() == SessionState::Running,
                    created_at: slot.created_at,
                    summary: Some(session.summary()),
                },
                Err(_) => SessionStatus {
                    project: key.clone(),
                    busy: true,
                    created_at: slot.created_at,
                    summary: None,
                },
            })
            .collect();
        rows.sort_by(|a, b| a.project.input.cmp(&b.project.input));
        rows
    }
}
