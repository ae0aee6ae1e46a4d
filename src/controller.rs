//! Gate deciding whether new agent runs may start.

use std::sync::atomic::{AtomicBool, Ordering};

/// On/off switch for task intake.
///
/// Owners hold a controller and inject it into the dispatch layer; independent
/// instances can coexist, so tests never share ambient state.
#[derive(Debug)]
pub struct AgentController {
    enabled: AtomicBool,
}

impl AgentController {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

impl Default for AgentController {
    fn default() -> Self {
        Self::new(true)
    }
}
