use std::sync::Arc;

use crate::audit::AuditPipeline;
use crate::session::SessionManager;

pub struct AppState {
    pub pipeline: Arc<AuditPipeline>,
    pub sessions: Arc<SessionManager>,
    /// Model name, for display only.
    pub model: String,
}

pub type Context<'a> = poise::Context<'a, AppState, anyhow::Error>;
