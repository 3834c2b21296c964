use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutomaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AutomaError {
    /// Short, stable error code for CLI output and log fields.
    pub fn code(&self) -> &'static str {
        match self {
            AutomaError::Config(_) => "CONFIG_ERROR",
            AutomaError::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, AutomaError>;
