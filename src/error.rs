use thiserror::Error;

/// Errors surfaced by the external store boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("unknown run id: {0}")]
    RunNotFound(i64),
    #[error("run {0} already finalized")]
    RunAlreadyFinalized(i64),
    #[error("seed fixture error: {0}")]
    Seed(String),
}

/// Errors raised while loading the YAML configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level error for a trial analysis run.
#[derive(Debug, Error)]
pub enum TrialwatchError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("analysis failed: {0}")]
    Analysis(String),
}
