use crate::auth::{Action, Denial};
use sled::transaction::TransactionError;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    MissingField(&'static str),
    #[error("quantity must be greater than zero")]
    NonPositiveQuantity,
    #[error("quantity is too large to post")]
    QuantityOverflow,
    #[error("an inward process needs at least one item")]
    NoItems,
    #[error("inward item needs a material link or a description")]
    UnidentifiedItem,
    #[error("username {0} is already taken")]
    DuplicateUsername(String),
    #[error("material code {0} is already registered")]
    DuplicateMaterialCode(String),
    #[error("user {0} is not an active officer")]
    NotAnOfficer(String),
    #[error("unknown role {0}")]
    UnknownRole(String),
    #[error("stock adjustment of zero has no effect")]
    ZeroAdjustment,
}

#[derive(thiserror::Error, Debug)]
pub enum WorkflowError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("{username} may not {action}: {reason}")]
    AuthorizationDenied {
        username: String,
        action: Action,
        reason: Denial,
    },
    #[error("invalid username or password")]
    AuthenticationFailed,
    #[error("{kind} {id} is {actual}, expected {expected}")]
    StateConflict {
        kind: &'static str,
        id: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("material {material} has {available} in stock, {requested} requested")]
    InsufficientStock {
        material: String,
        available: u64,
        requested: u64,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("an administrator has already been bootstrapped")]
    AlreadyBootstrapped,
    #[error("storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("record codec failure: {0}")]
    Codec(String),
    #[error("identifier generation failed: {0}")]
    Identifier(String),
    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),
}

impl WorkflowError {
    pub fn not_found(kind: &'static str, id: &str) -> Self {
        WorkflowError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

impl From<minicbor::decode::Error> for WorkflowError {
    fn from(err: minicbor::decode::Error) -> Self {
        WorkflowError::Codec(err.to_string())
    }
}

impl From<TransactionError<WorkflowError>> for WorkflowError {
    fn from(err: TransactionError<WorkflowError>) -> Self {
        match err {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => WorkflowError::Storage(e),
        }
    }
}
