use super::{ComponentState, PicamOrchestrator};
use crate::error::Result;
use std::collections::HashMap;
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::debug;

/// A long-running task the main loop keeps an eye on
pub(super) struct Worker {
    pub(super) name: &'static str,
    pub(super) handle: JoinHandle<Result<()>>,
}

impl PicamOrchestrator {
    /// Update component state
    pub async fn set_component_state(&self, component: &str, state: ComponentState) {
        let mut states = self.component_states.lock().await;
        states.insert(component.to_string(), state.clone());
        debug!("Component '{}' state changed to: {:?}", component, state);
    }

    /// Get component state
    pub async fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        let states = self.component_states.lock().await;
        states.get(component).cloned()
    }

    /// Get all component states
    pub async fn get_all_component_states(&self) -> HashMap<String, ComponentState> {
        let states = self.component_states.lock().await;
        states.clone()
    }

    pub(super) async fn spawn_worker<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.set_component_state(name, ComponentState::Starting).await;
        let handle = tokio::spawn(task);
        self.workers.push(Worker { name, handle });
        self.set_component_state(name, ComponentState::Running).await;
    }

    /// Name of the first worker that has terminated, with the cause.
    ///
    /// Workers only return once cancelled, so any finished worker is a failure.
    pub(super) async fn finished_worker(&mut self) -> Option<(&'static str, String)> {
        let index = self.workers.iter().position(|w| w.handle.is_finished())?;
        let worker = self.workers.remove(index);

        let cause = match worker.handle.await {
            Ok(Ok(())) => "returned unexpectedly".to_string(),
            Ok(Err(e)) => e.to_string(),
            Err(e) => format!("panicked: {}", e),
        };
        self.set_component_state(worker.name, ComponentState::Failed)
            .await;
        Some((worker.name, cause))
    }
}
