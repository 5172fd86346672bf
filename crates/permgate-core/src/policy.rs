use crate::error::AccessError;
use crate::scope::{GetStateScope, MutateStateScope};
use crate::state::{AppId, Decision, PackageState, SystemState, UserId, UserState};
use crate::uri::AccessUri;
use crate::xml::{XmlElement, XmlError, XmlSerializer};

/// Decision logic for one `(subject scheme, object scheme)` pair.
///
/// Lifecycle and serialization hooks default to no-ops. Parse hooks receive
/// one child of the outer `access` element and return whether they consumed
/// it.
pub trait SchemePolicy: Send + Sync {
    fn subject_scheme(&self) -> &'static str;

    fn object_scheme(&self) -> &'static str;

    fn get_decision(
        &self,
        scope: &GetStateScope<'_>,
        subject: &AccessUri,
        object: &AccessUri,
    ) -> Result<Decision, AccessError>;

    fn set_decision(
        &self,
        scope: &mut MutateStateScope<'_>,
        subject: &AccessUri,
        object: &AccessUri,
        decision: Decision,
    ) -> Result<(), AccessError>;

    fn on_user_added(
        &self,
        _scope: &mut MutateStateScope<'_>,
        _user_id: UserId,
    ) -> Result<(), AccessError> {
        Ok(())
    }

    fn on_user_removed(
        &self,
        _scope: &mut MutateStateScope<'_>,
        _user_id: UserId,
    ) -> Result<(), AccessError> {
        Ok(())
    }

    fn on_app_id_added(
        &self,
        _scope: &mut MutateStateScope<'_>,
        _app_id: AppId,
    ) -> Result<(), AccessError> {
        Ok(())
    }

    fn on_app_id_removed(
        &self,
        _scope: &mut MutateStateScope<'_>,
        _app_id: AppId,
    ) -> Result<(), AccessError> {
        Ok(())
    }

    fn on_storage_volume_mounted(
        &self,
        _scope: &mut MutateStateScope<'_>,
        _volume_uuid: Option<&str>,
        _is_system_updated: bool,
    ) -> Result<(), AccessError> {
        Ok(())
    }

    fn on_package_added(
        &self,
        _scope: &mut MutateStateScope<'_>,
        _package_state: &PackageState,
    ) -> Result<(), AccessError> {
        Ok(())
    }

    fn on_package_removed(
        &self,
        _scope: &mut MutateStateScope<'_>,
        _package_name: &str,
        _app_id: AppId,
    ) -> Result<(), AccessError> {
        Ok(())
    }

    fn on_package_installed(
        &self,
        _scope: &mut MutateStateScope<'_>,
        _package_state: &PackageState,
        _user_id: UserId,
    ) -> Result<(), AccessError> {
        Ok(())
    }

    fn on_package_uninstalled(
        &self,
        _scope: &mut MutateStateScope<'_>,
        _package_name: &str,
        _app_id: AppId,
        _user_id: UserId,
    ) -> Result<(), AccessError> {
        Ok(())
    }

    fn parse_system_state(
        &self,
        _element: &XmlElement,
        _system_state: &mut SystemState,
    ) -> Result<bool, XmlError> {
        Ok(false)
    }

    fn serialize_system_state(
        &self,
        _serializer: &mut XmlSerializer,
        _system_state: &SystemState,
    ) -> Result<(), XmlError> {
        Ok(())
    }

    fn parse_user_state(
        &self,
        _element: &XmlElement,
        _user_id: UserId,
        _user_state: &mut UserState,
    ) -> Result<bool, XmlError> {
        Ok(false)
    }

    fn serialize_user_state(
        &self,
        _serializer: &mut XmlSerializer,
        _user_id: UserId,
        _user_state: &UserState,
    ) -> Result<(), XmlError> {
        Ok(())
    }
}
