use std::sync::Arc;

use confab::agent::Agent;

/// Shared application state: the agent is assembled once at startup from
/// the loaded settings and handed to every request by reference.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
}

impl AppState {
    pub fn new(agent: Agent) -> Self {
        Self {
            agent: Arc::new(agent),
        }
    }
}
