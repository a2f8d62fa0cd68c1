use thiserror::Error;

/// Failures reported by the health and inventory ledgers.
///
/// None of these are fatal: the ledger logs them and leaves its state
/// untouched before handing the value back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("entity {0} is not registered")]
    UnknownEntity(String),
    #[error("entity {0} is already dead")]
    AlreadyDead(String),
    #[error("item {0} does not exist in the item catalog")]
    UnknownItem(String),
}

/// Failure raised by a [`crate::gaze::RayHost`] while casting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ray cast failed: {message}")]
pub struct CastError {
    pub message: String,
}

impl CastError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("core services are already installed")]
    AlreadyInstalled,
}
