//! Runtime-swappable risk scenario.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;
use tradesim_core::risk::RiskScenario;

/// Shared handle to the active scenario.
///
/// Readers take a copy; a swap never changes a copy already taken, so a batch
/// sizes every order against the scenario it started with.
#[derive(Debug, Clone, Default)]
pub struct ScenarioHandle {
    inner: Arc<RwLock<RiskScenario>>,
}

impl ScenarioHandle {
    pub fn new(scenario: RiskScenario) -> Self {
        Self {
            inner: Arc::new(RwLock::new(scenario)),
        }
    }

    pub fn snapshot(&self) -> RiskScenario {
        *self.inner.read()
    }

    /// Replace the active scenario, returning the previous one.
    pub fn swap(&self, scenario: RiskScenario) -> RiskScenario {
        let previous = std::mem::replace(&mut *self.inner.write(), scenario);
        info!(from = %previous.name, to = %scenario.name, "risk scenario swapped");
        previous
    }
}
