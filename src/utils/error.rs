use crate::terminal::SpliceError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OverlayError>;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Attach failed: {0}")]
    Attach(String),

    #[error("Failed to decode {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("Splice error: {0}")]
    Splice(#[from] SpliceError),

    #[error("Terminal error: {0}")]
    Terminal(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// Convenience constructors
impl OverlayError {
    pub fn attach(msg: impl Into<String>) -> Self {
        Self::Attach(msg.into())
    }

    pub fn decode(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn terminal(msg: impl Into<String>) -> Self {
        Self::Terminal(msg.into())
    }

    pub fn process(msg: impl Into<String>) -> Self {
        Self::Process(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap the calling thread's last OS error with a prefix naming the failed call.
    pub fn last_os_error(call: &str) -> Self {
        let err = std::io::Error::last_os_error();
        Self::Io(std::io::Error::new(err.kind(), format!("{}: {}", call, err)))
    }
}
