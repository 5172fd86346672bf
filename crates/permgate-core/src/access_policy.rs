use std::sync::Arc;

use crate::appop::{AppOpDefaults, AppOpPolicies};
use crate::collection::{IndexedMap, IndexedSet, IntSet};
use crate::error::AccessError;
use crate::policy::SchemePolicy;
use crate::scope::{GetStateScope, MutateStateScope};
use crate::state::{
    AccessState, AppId, Decision, PackageStates, PermissionAllowlist, SystemState, UserId,
    UserState,
};
use crate::uri::AccessUri;
use crate::xml::{XmlElement, XmlError, XmlSerializer, parse_document};

const TAG_ACCESS: &str = "access";

type SchemePolicies = IndexedMap<&'static str, IndexedMap<&'static str, Arc<dyn SchemePolicy>>>;

pub struct AccessPolicy {
    scheme_policies: SchemePolicies,
}

impl AccessPolicy {
    pub fn new<I>(policies: I) -> Result<Self, AccessError>
    where
        I: IntoIterator<Item = Arc<dyn SchemePolicy>>,
    {
        let mut scheme_policies = SchemePolicies::new();
        for policy in policies {
            let object_policies = scheme_policies.entry(policy.subject_scheme()).or_default();
            if object_policies.contains_key(policy.object_scheme()) {
                return Err(AccessError::DuplicateSchemePolicy {
                    subject_scheme: policy.subject_scheme().to_string(),
                    object_scheme: policy.object_scheme().to_string(),
                });
            }
            object_policies.insert(policy.object_scheme(), policy);
        }
        Ok(Self { scheme_policies })
    }

    pub fn with_defaults(defaults: AppOpDefaults) -> Result<(Self, AppOpPolicies), AccessError> {
        let app_ops = AppOpPolicies::new(defaults);
        let policy = Self::new(app_ops.scheme_policies())?;
        Ok((policy, app_ops))
    }

    pub fn get_scheme_policy(
        &self,
        subject_scheme: &str,
        object_scheme: &str,
    ) -> Result<&Arc<dyn SchemePolicy>, AccessError> {
        self.scheme_policies
            .get(subject_scheme)
            .and_then(|object_policies| object_policies.get(object_scheme))
            .ok_or_else(|| AccessError::SchemePolicyNotFound {
                subject_scheme: subject_scheme.to_string(),
                object_scheme: object_scheme.to_string(),
            })
    }

    pub fn get_decision(
        &self,
        scope: &GetStateScope<'_>,
        subject: &AccessUri,
        object: &AccessUri,
    ) -> Result<Decision, AccessError> {
        self.get_scheme_policy(subject.scheme(), object.scheme())?
            .get_decision(scope, subject, object)
    }

    pub fn set_decision(
        &self,
        scope: &mut MutateStateScope<'_>,
        subject: &AccessUri,
        object: &AccessUri,
        decision: Decision,
    ) -> Result<(), AccessError> {
        self.get_scheme_policy(subject.scheme(), object.scheme())?
            .set_decision(scope, subject, object, decision)
    }

    pub fn initialize(
        &self,
        state: &mut AccessState,
        user_ids: &IntSet,
        package_states: PackageStates,
        disabled_system_package_states: PackageStates,
        permission_allowlist: PermissionAllowlist,
    ) {
        let system_state = &mut state.system_state;
        system_state.user_ids.extend(user_ids.iter().copied());
        for package_state in package_states.values() {
            system_state
                .app_ids
                .entry(package_state.app_id)
                .or_default()
                .insert(package_state.package_name.clone());
        }
        system_state.package_states = package_states;
        system_state.disabled_system_package_states = disabled_system_package_states;
        system_state.permission_allowlist = permission_allowlist;

        for &user_id in user_ids {
            state.user_states.entry(user_id).or_default();
        }

        tracing::info!(
            users = state.system_state.user_ids.len(),
            packages = state.system_state.package_states.len(),
            app_ids = state.system_state.app_ids.len(),
            scheme_policies = self.scheme_policies().count(),
            "access policy initialized"
        );
    }

    pub fn on_user_added(
        &self,
        scope: &mut MutateStateScope<'_>,
        user_id: UserId,
    ) -> Result<(), AccessError> {
        let system_state = &mut scope.new_state.system_state;
        system_state.user_ids.insert(user_id);
        system_state.request_write();
        let mut user_state = UserState::new();
        user_state.request_write();
        scope.new_state.user_states.insert(user_id, user_state);
        for policy in self.scheme_policies() {
            policy.on_user_added(scope, user_id)?;
        }
        Ok(())
    }

    pub fn on_user_removed(
        &self,
        scope: &mut MutateStateScope<'_>,
        user_id: UserId,
    ) -> Result<(), AccessError> {
        let system_state = &mut scope.new_state.system_state;
        system_state.user_ids.shift_remove(&user_id);
        system_state.request_write();
        scope.new_state.user_states.shift_remove(&user_id);
        for policy in self.scheme_policies() {
            policy.on_user_removed(scope, user_id)?;
        }
        Ok(())
    }

    pub fn on_storage_volume_mounted(
        &self,
        scope: &mut MutateStateScope<'_>,
        package_states: PackageStates,
        disabled_system_package_states: PackageStates,
        volume_uuid: Option<&str>,
        is_system_updated: bool,
    ) -> Result<(), AccessError> {
        let system_state = &mut scope.new_state.system_state;
        system_state.package_states = package_states;
        system_state.disabled_system_package_states = disabled_system_package_states;
        system_state.request_write();
        for policy in self.scheme_policies() {
            policy.on_storage_volume_mounted(scope, volume_uuid, is_system_updated)?;
        }
        Ok(())
    }

    pub fn on_package_added(
        &self,
        scope: &mut MutateStateScope<'_>,
        package_states: PackageStates,
        disabled_system_package_states: PackageStates,
        package_name: &str,
    ) -> Result<(), AccessError> {
        let package_state = package_states
            .get(package_name)
            .cloned()
            .ok_or_else(|| AccessError::AddedPackageNotFound(package_name.to_string()))?;
        let app_id = package_state.app_id;

        let system_state = &mut scope.new_state.system_state;
        system_state.package_states = package_states;
        system_state.disabled_system_package_states = disabled_system_package_states;
        let is_app_id_added = !system_state.app_ids.contains_key(&app_id);
        system_state
            .app_ids
            .entry(app_id)
            .or_insert_with(IndexedSet::new)
            .insert(package_name.to_string());
        system_state.request_write();

        for policy in self.scheme_policies() {
            policy.on_package_added(scope, &package_state)?;
        }
        if is_app_id_added {
            for policy in self.scheme_policies() {
                policy.on_app_id_added(scope, app_id)?;
            }
        }
        Ok(())
    }

    pub fn on_package_removed(
        &self,
        scope: &mut MutateStateScope<'_>,
        package_states: PackageStates,
        disabled_system_package_states: PackageStates,
        package_name: &str,
        app_id: AppId,
    ) -> Result<(), AccessError> {
        if package_states.contains_key(package_name) {
            return Err(AccessError::RemovedPackageStillPresent(
                package_name.to_string(),
            ));
        }

        let system_state = &mut scope.new_state.system_state;
        system_state.package_states = package_states;
        system_state.disabled_system_package_states = disabled_system_package_states;
        let is_app_id_removed = match system_state.app_ids.get_mut(&app_id) {
            Some(package_names) => {
                package_names.shift_remove(package_name);
                package_names.is_empty()
            }
            None => false,
        };
        if is_app_id_removed {
            system_state.app_ids.shift_remove(&app_id);
        }
        system_state.request_write();

        for policy in self.scheme_policies() {
            policy.on_package_removed(scope, package_name, app_id)?;
        }
        if is_app_id_removed {
            for policy in self.scheme_policies() {
                policy.on_app_id_removed(scope, app_id)?;
            }
        }
        Ok(())
    }

    pub fn on_package_installed(
        &self,
        scope: &mut MutateStateScope<'_>,
        package_states: PackageStates,
        disabled_system_package_states: PackageStates,
        package_name: &str,
        user_id: UserId,
    ) -> Result<(), AccessError> {
        let package_state = package_states
            .get(package_name)
            .cloned()
            .ok_or_else(|| AccessError::InstalledPackageNotFound(package_name.to_string()))?;

        let system_state = &mut scope.new_state.system_state;
        system_state.package_states = package_states;
        system_state.disabled_system_package_states = disabled_system_package_states;

        for policy in self.scheme_policies() {
            policy.on_package_installed(scope, &package_state, user_id)?;
        }
        Ok(())
    }

    pub fn on_package_uninstalled(
        &self,
        scope: &mut MutateStateScope<'_>,
        package_states: PackageStates,
        disabled_system_package_states: PackageStates,
        package_name: &str,
        app_id: AppId,
        user_id: UserId,
    ) -> Result<(), AccessError> {
        let system_state = &mut scope.new_state.system_state;
        system_state.package_states = package_states;
        system_state.disabled_system_package_states = disabled_system_package_states;

        for policy in self.scheme_policies() {
            policy.on_package_uninstalled(scope, package_name, app_id, user_id)?;
        }
        Ok(())
    }

    pub fn parse_system_state(
        &self,
        xml: &str,
        system_state: &mut SystemState,
    ) -> Result<(), XmlError> {
        for element in parse_document(xml)? {
            if element.name != TAG_ACCESS {
                tracing::warn!(tag = %element.name, "ignoring unknown tag when parsing system state");
                continue;
            }
            for child in &element.children {
                let mut consumed = false;
                for policy in self.scheme_policies() {
                    consumed |= policy.parse_system_state(child, system_state)?;
                }
                if !consumed {
                    warn_unconsumed(child, None);
                }
            }
        }
        Ok(())
    }

    pub fn serialize_system_state(&self, system_state: &SystemState) -> Result<String, XmlError> {
        let mut serializer = XmlSerializer::new()?;
        serializer.tag(TAG_ACCESS, &[], |serializer| {
            for policy in self.scheme_policies() {
                policy.serialize_system_state(serializer, system_state)?;
            }
            Ok(())
        })?;
        serializer.finish()
    }

    pub fn parse_user_state(
        &self,
        xml: &str,
        user_id: UserId,
        user_state: &mut UserState,
    ) -> Result<(), XmlError> {
        for element in parse_document(xml)? {
            if element.name != TAG_ACCESS {
                tracing::warn!(
                    tag = %element.name,
                    user_id,
                    "ignoring unknown tag when parsing user state"
                );
                continue;
            }
            for child in &element.children {
                let mut consumed = false;
                for policy in self.scheme_policies() {
                    consumed |= policy.parse_user_state(child, user_id, user_state)?;
                }
                if !consumed {
                    warn_unconsumed(child, Some(user_id));
                }
            }
        }
        Ok(())
    }

    pub fn serialize_user_state(
        &self,
        user_id: UserId,
        user_state: &UserState,
    ) -> Result<String, XmlError> {
        let mut serializer = XmlSerializer::new()?;
        serializer.tag(TAG_ACCESS, &[], |serializer| {
            for policy in self.scheme_policies() {
                policy.serialize_user_state(serializer, user_id, user_state)?;
            }
            Ok(())
        })?;
        serializer.finish()
    }

    fn scheme_policies(&self) -> impl Iterator<Item = &Arc<dyn SchemePolicy>> {
        self.scheme_policies
            .values()
            .flat_map(|object_policies| object_policies.values())
    }
}

fn warn_unconsumed(element: &XmlElement, user_id: Option<UserId>) {
    match user_id {
        Some(user_id) => tracing::warn!(
            tag = %element.name,
            user_id,
            "no scheme policy understands tag, skipping"
        ),
        None => tracing::warn!(tag = %element.name, "no scheme policy understands tag, skipping"),
    }
}
