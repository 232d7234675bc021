use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to read the configuration file: {0}")]
    ConfigFileRead(#[from] std::io::Error),

    #[error(transparent)]
    Supervisor(#[from] runtime::SupervisorError),

    #[error("failed to serialize output as JSON: {0}")]
    JsonSerialize(serde_json::Error),

    #[error("shutdown requested")]
    ShutdownRequested,

    #[error("configuration error: {0}")]
    Config(String),
}
