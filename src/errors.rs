use crate::executor::TaskError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid view ID")]
    InvalidViewId,

    #[error("Engine initialization failed: {0}")]
    EngineInit(String),

    #[error("Core has been shut down")]
    ShutDown,

    #[error("Engine task failed: {0}")]
    Task(#[from] TaskError),
}
