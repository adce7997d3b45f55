use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::audit::types::ThoughtEntry;
use crate::audit::AuditObserver;
use crate::reveal::{FragmentBuffer, RevealScheduler, RevealSink, SessionId};

/// Progress delivered to whoever is presenting the audit.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Status(String),
    Thought(ThoughtEntry),
}

/// Allows one audit at a time and owns the reveal timers.
pub struct SessionManager {
    scheduler: Arc<RevealScheduler>,
    busy: Arc<AtomicBool>,
    next_id: AtomicU64,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            scheduler: Arc::new(RevealScheduler::default()),
            busy: Arc::new(AtomicBool::new(false)),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Start a fresh session, or `None` if one is already running.
    pub fn begin(&self) -> Option<(ActiveSession, mpsc::UnboundedReceiver<SessionUpdate>)> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Audit already in flight, ignoring submission");
            return None;
        }

        // Nothing from an earlier session may reveal into this one
        self.scheduler.cancel_all();

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let fragments = FragmentBuffer::default();
        let (updates, rx) = mpsc::unbounded_channel();

        let reveal_tx = updates.clone();
        let sink: RevealSink = Arc::new(move |_session: SessionId, entry: ThoughtEntry| {
            let _ = reveal_tx.send(SessionUpdate::Thought(entry));
        });
        self.scheduler.schedule(id, fragments.clone(), sink);
        info!(session = id, "Audit session started");

        let session = ActiveSession {
            id,
            fragments,
            updates,
            scheduler: self.scheduler.clone(),
            busy: self.busy.clone(),
            completed: AtomicBool::new(false),
        };
        Some((session, rx))
    }
}

/// The single in-flight audit. Finishing (or dropping) it cancels its
/// timers and frees the manager for the next submission.
pub struct ActiveSession {
    id: SessionId,
    fragments: FragmentBuffer,
    updates: mpsc::UnboundedSender<SessionUpdate>,
    scheduler: Arc<RevealScheduler>,
    busy: Arc<AtomicBool>,
    completed: AtomicBool,
}

impl ActiveSession {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    pub fn finish(&self) {
        if self.completed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.scheduler.cancel(self.id);
        self.busy.store(false, Ordering::SeqCst);
        info!(
            session = self.id,
            fragments = self.fragments.len(),
            "Audit session finished"
        );
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.finish();
    }
}

impl AuditObserver for ActiveSession {
    fn on_status(&self, status: &str) {
        let _ = self.updates.send(SessionUpdate::Status(status.to_string()));
    }

    fn on_thought(&self, fragment: &str) {
        self.fragments.push(fragment);
    }
}
