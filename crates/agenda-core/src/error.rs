use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Unparseable recurrence rule: {0}")]
    UnparseableRule(String),

    #[error("Invalid date token: {0}")]
    InvalidDate(String),

    #[error("Storage error")]
    Storage(#[from] anyhow::Error),
}
