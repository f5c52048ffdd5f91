use thiserror::Error;

#[derive(Error, Debug)]
pub enum PicamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GPIO error: {0}")]
    Gpio(String),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("Watcher error: {0}")]
    Watcher(#[from] notify::Error),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

/// Errors reported by the messaging gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Transient transport failure, safe to retry
    #[error("Network error: {0}")]
    Network(String),

    /// The access token was rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The API answered with an error
    #[error("API error: {0}")]
    Api(String),

    #[error("Failed to read upload {path}: {source}")]
    Upload {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl GatewayError {
    pub fn is_network(&self) -> bool {
        matches!(self, GatewayError::Network(_))
    }
}

/// Errors raised while managing external processes
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to spawn '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid PID file {path}: {details}")]
    InvalidPidFile { path: String, details: String },

    #[error("Failed to signal process {pid}: {source}")]
    SignalFailed {
        pid: i32,
        #[source]
        source: std::io::Error,
    },
}

impl PicamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PicamError>;
