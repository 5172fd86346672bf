use permgate_core::AccessError;
use permgate_core::xml::XmlError;
use permgate_storage::StorageError;

use crate::snapshot::SnapshotError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("access error: {0}")]
    Access(#[from] AccessError),

    #[error("state document error: {0}")]
    Xml(#[from] XmlError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("package snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("service is not initialized")]
    NotInitialized,
}

impl ServiceError {
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, ServiceError::Access(err) if err.is_contract_violation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_from_access_error() {
        let access_err = AccessError::UserNotFound(10);
        let service_err: ServiceError = access_err.into();

        assert!(
            service_err.to_string().contains("user 10"),
            "expected 'user 10' in error message, got: {service_err}"
        );
        assert!(service_err.is_contract_violation());
    }

    #[test]
    fn service_error_from_storage_error() {
        let storage_err = StorageError::Internal("disk on fire".to_string());
        let service_err: ServiceError = storage_err.into();

        assert!(
            service_err.to_string().contains("disk on fire"),
            "expected storage message, got: {service_err}"
        );
        assert!(!service_err.is_contract_violation());
    }

    #[test]
    fn service_error_from_xml_error() {
        let xml_err = XmlError::MissingAttribute {
            tag: "app-op".to_string(),
            attribute: "mode".to_string(),
        };
        let service_err: ServiceError = xml_err.into();

        assert!(
            service_err.to_string().contains("mode"),
            "expected attribute name in error message, got: {service_err}"
        );
    }

    #[test]
    fn duplicate_registration_is_not_a_contract_violation() {
        let service_err: ServiceError = AccessError::DuplicateSchemePolicy {
            subject_scheme: "uid".to_string(),
            object_scheme: "app-op".to_string(),
        }
        .into();

        assert!(!service_err.is_contract_violation());
    }
}
