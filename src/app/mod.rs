//! Process lifecycle: component wiring, startup, worker supervision, signal
//! handling and cleanup.

mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;

#[cfg(test)]
mod tests;

pub use orchestrator::PicamOrchestrator;
pub use types::{ComponentState, ShutdownReason};
