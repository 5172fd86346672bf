use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use permgate_core::appop::{
    AppOpDefaults, AppOpPolicies, OnAppOpModeChangedListener, OnUidAppOpModeChangedListener,
    mode_name,
};
use permgate_core::collection::IntSet;
use permgate_core::state::{PackageStates, PermissionAllowlist};
use permgate_core::uri::{AppOpUri, PackageUri, UidUri, uid_of};
use permgate_core::{
    AccessError, AccessPolicy, AccessState, AccessUri, AppId, Decision, GetStateScope,
    MutateStateScope, UserId, UserState,
};
use permgate_storage::StateStore;

use crate::audit::{self, AuditListener};
use crate::error::ServiceError;
use crate::snapshot::PackageSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionRecord {
    pub subject: String,
    pub object: String,
    pub decision: Decision,
    pub mode: Option<&'static str>,
}

/// Mode change listeners run while the state lock is held and must not call
/// back into the service.
pub struct AccessService<S: StateStore> {
    policy: AccessPolicy,
    app_ops: AppOpPolicies,
    inner: Mutex<InnerState>,
    store: S,
}

#[derive(Default)]
struct InnerState {
    state: Option<AccessState>,
    // Removed users whose documents are still in the store.
    pending_user_deletes: IntSet,
}

impl<S: StateStore> AccessService<S> {
    pub fn new(store: S, defaults: AppOpDefaults) -> Result<Self, ServiceError> {
        let (policy, app_ops) = AccessPolicy::with_defaults(defaults)?;
        let audit_listener = Arc::new(AuditListener);
        let package_listener: Arc<dyn OnAppOpModeChangedListener> = audit_listener.clone();
        let uid_listener: Arc<dyn OnUidAppOpModeChangedListener> = audit_listener;
        app_ops.package.add_on_app_op_mode_changed_listener(package_listener);
        app_ops.uid.add_on_uid_app_op_mode_changed_listener(uid_listener);

        Ok(Self {
            policy,
            app_ops,
            inner: Mutex::new(InnerState::default()),
            store,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn initialize_from_snapshot(&self, snapshot: &PackageSnapshot) -> Result<(), ServiceError> {
        self.initialize(
            &snapshot.user_id_set(),
            snapshot.package_states(),
            snapshot.disabled_system_package_states(),
            snapshot.permission_allowlist.clone(),
        )
    }

    pub fn initialize(
        &self,
        user_ids: &IntSet,
        package_states: PackageStates,
        disabled_system_package_states: PackageStates,
        permission_allowlist: PermissionAllowlist,
    ) -> Result<(), ServiceError> {
        let mut state = AccessState::new();
        self.policy.initialize(
            &mut state,
            user_ids,
            package_states,
            disabled_system_package_states,
            permission_allowlist,
        );

        if let Some(document) = self.store.read_system_state()? {
            self.policy
                .parse_system_state(&document, &mut state.system_state)?;
        }
        for (&user_id, user_state) in state.user_states.iter_mut() {
            if let Some(document) = self.store.read_user_state(user_id)? {
                self.policy
                    .parse_user_state(&document, user_id, user_state)?;
            }
        }
        for user_id in self.store.list_user_ids()? {
            if !user_ids.contains(&user_id) {
                tracing::warn!(user_id, "ignoring persisted state of unknown user");
            }
        }

        self.lock_inner().state = Some(state);
        tracing::info!(users = user_ids.len(), "access service initialized");
        Ok(())
    }

    pub fn get_decision(
        &self,
        subject: &AccessUri,
        object: &AccessUri,
    ) -> Result<Decision, ServiceError> {
        let inner = self.lock_inner();
        let state = inner.state.as_ref().ok_or(ServiceError::NotInitialized)?;
        Ok(self
            .policy
            .get_decision(&GetStateScope::new(state), subject, object)?)
    }

    pub fn set_decision(
        &self,
        subject: &AccessUri,
        object: &AccessUri,
        decision: Decision,
    ) -> Result<(), ServiceError> {
        self.mutate(
            |policy, scope| policy.set_decision(scope, subject, object, decision),
            |_| {},
        )
    }

    pub fn remove_app_op_modes(
        &self,
        package_name: &str,
        user_id: UserId,
    ) -> Result<bool, ServiceError> {
        self.mutate(
            |_, scope| {
                self.app_ops
                    .package
                    .remove_app_op_modes(scope, package_name, user_id)
            },
            |&removed| {
                if removed {
                    audit::audit_app_op_modes_removed(package_name, user_id);
                }
            },
        )
    }

    pub fn on_user_added(&self, user_id: UserId) -> Result<(), ServiceError> {
        self.mutate(
            |policy, scope| policy.on_user_added(scope, user_id),
            |_| audit::audit_user_added(user_id),
        )
    }

    pub fn on_user_removed(&self, user_id: UserId) -> Result<(), ServiceError> {
        self.mutate(
            |policy, scope| policy.on_user_removed(scope, user_id),
            |_| audit::audit_user_removed(user_id),
        )
    }

    pub fn on_storage_volume_mounted(
        &self,
        package_states: PackageStates,
        disabled_system_package_states: PackageStates,
        volume_uuid: Option<&str>,
        is_system_updated: bool,
    ) -> Result<(), ServiceError> {
        self.mutate(
            |policy, scope| {
                policy.on_storage_volume_mounted(
                    scope,
                    package_states,
                    disabled_system_package_states,
                    volume_uuid,
                    is_system_updated,
                )
            },
            |_| audit::audit_storage_volume_mounted(volume_uuid, is_system_updated),
        )
    }

    pub fn on_package_added(
        &self,
        package_states: PackageStates,
        disabled_system_package_states: PackageStates,
        package_name: &str,
    ) -> Result<(), ServiceError> {
        self.mutate(
            |policy, scope| {
                policy.on_package_added(
                    scope,
                    package_states,
                    disabled_system_package_states,
                    package_name,
                )
            },
            |_| audit::audit_package_added(package_name),
        )
    }

    pub fn on_package_removed(
        &self,
        package_states: PackageStates,
        disabled_system_package_states: PackageStates,
        package_name: &str,
        app_id: AppId,
    ) -> Result<(), ServiceError> {
        self.mutate(
            |policy, scope| {
                policy.on_package_removed(
                    scope,
                    package_states,
                    disabled_system_package_states,
                    package_name,
                    app_id,
                )
            },
            |_| audit::audit_package_removed(package_name, app_id),
        )
    }

    pub fn on_package_installed(
        &self,
        package_states: PackageStates,
        disabled_system_package_states: PackageStates,
        package_name: &str,
        user_id: UserId,
    ) -> Result<(), ServiceError> {
        self.mutate(
            |policy, scope| {
                policy.on_package_installed(
                    scope,
                    package_states,
                    disabled_system_package_states,
                    package_name,
                    user_id,
                )
            },
            |_| audit::audit_package_installed(package_name, user_id),
        )
    }

    pub fn on_package_uninstalled(
        &self,
        package_states: PackageStates,
        disabled_system_package_states: PackageStates,
        package_name: &str,
        app_id: AppId,
        user_id: UserId,
    ) -> Result<(), ServiceError> {
        self.mutate(
            |policy, scope| {
                policy.on_package_uninstalled(
                    scope,
                    package_states,
                    disabled_system_package_states,
                    package_name,
                    app_id,
                    user_id,
                )
            },
            |_| audit::audit_package_uninstalled(package_name, user_id),
        )
    }

    pub fn decisions(&self) -> Result<Vec<DecisionRecord>, ServiceError> {
        let inner = self.lock_inner();
        let state = inner.state.as_ref().ok_or(ServiceError::NotInitialized)?;

        let mut records = Vec::new();
        for (&user_id, user_state) in &state.user_states {
            collect_decisions(user_id, user_state, &mut records);
        }
        Ok(records)
    }

    pub fn add_on_app_op_mode_changed_listener(
        &self,
        listener: Arc<dyn OnAppOpModeChangedListener>,
    ) {
        self.app_ops.package.add_on_app_op_mode_changed_listener(listener);
    }

    pub fn remove_on_app_op_mode_changed_listener(
        &self,
        listener: &Arc<dyn OnAppOpModeChangedListener>,
    ) {
        self.app_ops
            .package
            .remove_on_app_op_mode_changed_listener(listener);
    }

    pub fn add_on_uid_app_op_mode_changed_listener(
        &self,
        listener: Arc<dyn OnUidAppOpModeChangedListener>,
    ) {
        self.app_ops
            .uid
            .add_on_uid_app_op_mode_changed_listener(listener);
    }

    pub fn remove_on_uid_app_op_mode_changed_listener(
        &self,
        listener: &Arc<dyn OnUidAppOpModeChangedListener>,
    ) {
        self.app_ops
            .uid
            .remove_on_uid_app_op_mode_changed_listener(listener);
    }

    // `on_commit` runs once the new state is current, even if flushing it
    // to the store fails afterwards.
    fn mutate<T, F, C>(&self, action: F, on_commit: C) -> Result<T, ServiceError>
    where
        F: FnOnce(&AccessPolicy, &mut MutateStateScope<'_>) -> Result<T, AccessError>,
        C: FnOnce(&T),
    {
        let mut guard = self.lock_inner();
        let inner = &mut *guard;
        let old_state = inner.state.as_ref().ok_or(ServiceError::NotInitialized)?;
        let mut new_state = old_state.clone();
        let result = {
            let mut scope = MutateStateScope::new(old_state, &mut new_state);
            action(&self.policy, &mut scope)
        };
        let value = match result {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "mutation rejected, state unchanged");
                return Err(err.into());
            }
        };

        inner.pending_user_deletes.extend(
            old_state
                .system_state
                .user_ids
                .iter()
                .copied()
                .filter(|user_id| !new_state.system_state.user_ids.contains(user_id)),
        );
        let state = inner.state.insert(new_state);
        on_commit(&value);
        self.flush(state, &mut inner.pending_user_deletes)?;
        Ok(value)
    }

    // Anything that fails stays pending and is retried by the next flush.
    fn flush(
        &self,
        state: &mut AccessState,
        pending_user_deletes: &mut IntSet,
    ) -> Result<(), ServiceError> {
        pending_user_deletes.retain(|user_id| !state.system_state.user_ids.contains(user_id));
        while let Some(&user_id) = pending_user_deletes.first() {
            self.store.delete_user_state(user_id)?;
            pending_user_deletes.shift_remove(&user_id);
            tracing::debug!(user_id, "deleted user state");
        }
        if state.system_state.requires_write() {
            let document = self.policy.serialize_system_state(&state.system_state)?;
            self.store.write_system_state(&document)?;
            state.system_state.clear_write_request();
        }
        for (&user_id, user_state) in state.user_states.iter_mut() {
            if !user_state.requires_write() {
                continue;
            }
            let document = self.policy.serialize_user_state(user_id, user_state)?;
            self.store.write_user_state(user_id, &document)?;
            user_state.clear_write_request();
            tracing::debug!(user_id, "flushed user state");
        }
        Ok(())
    }

    // A mutation never touches the current state in place, so a poisoned
    // lock still guards a consistent state.
    fn lock_inner(&self) -> MutexGuard<'_, InnerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn collect_decisions(user_id: UserId, user_state: &UserState, records: &mut Vec<DecisionRecord>) {
    for (package_name, app_op_modes) in &user_state.package_app_op_modes {
        let subject = PackageUri::new(package_name.as_str(), user_id).to_string();
        for (app_op_name, &mode) in app_op_modes {
            records.push(DecisionRecord {
                subject: subject.clone(),
                object: AppOpUri::new(app_op_name.as_str()).to_string(),
                decision: mode,
                mode: mode_name(mode),
            });
        }
    }
    for (&app_id, app_op_modes) in &user_state.uid_app_op_modes {
        let subject = UidUri::new(uid_of(user_id, app_id)).to_string();
        for (app_op_name, &mode) in app_op_modes {
            records.push(DecisionRecord {
                subject: subject.clone(),
                object: AppOpUri::new(app_op_name.as_str()).to_string(),
                decision: mode,
                mode: mode_name(mode),
            });
        }
    }
}
