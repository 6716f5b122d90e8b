use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreErrorCode {
    InvalidArgument,
    Internal,
    NotFound,
    PermissionDenied,
    Unauthenticated,
    Unavailable,
    ResourceExhausted,
    Cancelled,
}

impl StoreErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreErrorCode::InvalidArgument => "store/invalid-argument",
            StoreErrorCode::Internal => "store/internal",
            StoreErrorCode::NotFound => "store/not-found",
            StoreErrorCode::PermissionDenied => "store/permission-denied",
            StoreErrorCode::Unauthenticated => "store/unauthenticated",
            StoreErrorCode::Unavailable => "store/unavailable",
            StoreErrorCode::ResourceExhausted => "store/resource-exhausted",
            StoreErrorCode::Cancelled => "store/cancelled",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreError {
    pub code: StoreErrorCode,
    message: String,
}

impl StoreError {
    pub fn new(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl Error for StoreError {}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        invalid_argument(format!("failed to convert document data: {err}"))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

pub fn invalid_argument(message: impl Into<String>) -> StoreError {
    StoreError::new(StoreErrorCode::InvalidArgument, message)
}

pub fn internal_error(message: impl Into<String>) -> StoreError {
    StoreError::new(StoreErrorCode::Internal, message)
}

pub fn not_found(message: impl Into<String>) -> StoreError {
    StoreError::new(StoreErrorCode::NotFound, message)
}

pub fn permission_denied(message: impl Into<String>) -> StoreError {
    StoreError::new(StoreErrorCode::PermissionDenied, message)
}

pub fn unauthenticated(message: impl Into<String>) -> StoreError {
    StoreError::new(StoreErrorCode::Unauthenticated, message)
}

pub fn unavailable(message: impl Into<String>) -> StoreError {
    StoreError::new(StoreErrorCode::Unavailable, message)
}

pub fn resource_exhausted(message: impl Into<String>) -> StoreError {
    StoreError::new(StoreErrorCode::ResourceExhausted, message)
}

pub fn cancelled(message: impl Into<String>) -> StoreError {
    StoreError::new(StoreErrorCode::Cancelled, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code() {
        let err = unavailable("backend offline");
        assert_eq!(err.to_string(), "backend offline (store/unavailable)");
        assert_eq!(err.code, StoreErrorCode::Unavailable);
    }

    #[test]
    fn serde_errors_become_invalid_argument() {
        let err: StoreError = serde_json::from_str::<u32>("\"nope\"").unwrap_err().into();
        assert_eq!(err.code_str(), "store/invalid-argument");
    }
}
