use crate::store::error::{StoreError, StoreResult};

/// Result of a write or delete issued through the sync layer.
///
/// `Cancelled` covers requests that were not attempted, such as deleting
/// while signed out or with nothing to delete.
#[derive(Clone, Debug, PartialEq)]
#[must_use]
pub enum WriteOutcome<T = ()> {
    Success(T),
    Failure(StoreError),
    Cancelled,
}

impl<T> WriteOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, WriteOutcome::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, WriteOutcome::Failure(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, WriteOutcome::Cancelled)
    }

    pub fn success(self) -> Option<T> {
        match self {
            WriteOutcome::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&StoreError> {
        match self {
            WriteOutcome::Failure(error) => Some(error),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> WriteOutcome<U> {
        match self {
            WriteOutcome::Success(value) => WriteOutcome::Success(f(value)),
            WriteOutcome::Failure(error) => WriteOutcome::Failure(error),
            WriteOutcome::Cancelled => WriteOutcome::Cancelled,
        }
    }

    /// Converts into a `Result`, mapping `Cancelled` to `Ok(None)`.
    pub fn into_result(self) -> StoreResult<Option<T>> {
        match self {
            WriteOutcome::Success(value) => Ok(Some(value)),
            WriteOutcome::Failure(error) => Err(error),
            WriteOutcome::Cancelled => Ok(None),
        }
    }
}

impl<T> From<StoreResult<T>> for WriteOutcome<T> {
    fn from(result: StoreResult<T>) -> Self {
        match result {
            Ok(value) => WriteOutcome::Success(value),
            Err(error) => WriteOutcome::Failure(error),
        }
    }
}
