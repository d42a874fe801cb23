//! Application State

use std::sync::Arc;

use p2p_calc::Session;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The single live calculator session
    pub session: Arc<Session>,
}

impl AppState {
    pub const fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}
