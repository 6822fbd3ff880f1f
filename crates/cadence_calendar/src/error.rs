use cadence_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("activity `{0}` is not loaded")]
    UnknownActivity(String),
}

pub type Result<T> = std::result::Result<T, CalendarError>;
