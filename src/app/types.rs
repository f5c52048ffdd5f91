use std::fmt;

/// Worker lifecycle states
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// Why the process is going down
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    /// A termination signal arrived
    Signal(i32),
    /// A worker terminated on its own
    WorkerDied(String),
}

impl ShutdownReason {
    /// Notice sent to every operator before exiting
    pub fn notice(&self) -> String {
        match self {
            ShutdownReason::Signal(signum) => {
                format!("Caught signal {}, terminating now.", signum)
            }
            ShutdownReason::WorkerDied(worker) => {
                format!("Thread \"{}\" died, terminating now.", worker)
            }
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal(signum) => write!(f, "signal {}", signum),
            ShutdownReason::WorkerDied(worker) => write!(f, "worker '{}' died", worker),
        }
    }
}
