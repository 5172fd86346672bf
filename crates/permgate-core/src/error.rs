use crate::state::UserId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("scheme policy for {subject_scheme} and {object_scheme} does not exist")]
    SchemePolicyNotFound {
        subject_scheme: String,
        object_scheme: String,
    },

    #[error("scheme policy for {subject_scheme} and {object_scheme} is already registered")]
    DuplicateSchemePolicy {
        subject_scheme: String,
        object_scheme: String,
    },

    #[error("expected {expected} uri but got {actual}")]
    UnexpectedUri {
        expected: &'static str,
        actual: String,
    },

    #[error("user {0} does not exist")]
    UserNotFound(UserId),

    #[error("added package {0} isn't found in package states")]
    AddedPackageNotFound(String),

    #[error("removed package {0} is still in package states")]
    RemovedPackageStillPresent(String),

    #[error("installed package {0} isn't found in package states")]
    InstalledPackageNotFound(String),
}

impl AccessError {
    /// Whether the error describes a caller bug rather than a setup mistake.
    pub fn is_contract_violation(&self) -> bool {
        match self {
            AccessError::SchemePolicyNotFound { .. }
            | AccessError::UnexpectedUri { .. }
            | AccessError::UserNotFound(_)
            | AccessError::AddedPackageNotFound(_)
            | AccessError::RemovedPackageStillPresent(_)
            | AccessError::InstalledPackageNotFound(_) => true,
            AccessError::DuplicateSchemePolicy { .. } => false,
        }
    }
}
