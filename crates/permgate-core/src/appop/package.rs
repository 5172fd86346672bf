use std::sync::Arc;

use crate::collection::{MapDefaultExt, OptionMapDefaultExt};
use crate::error::AccessError;
use crate::policy::SchemePolicy;
use crate::scope::{GetStateScope, MutateStateScope};
use crate::state::{AppId, Decision, UserId, UserState};
use crate::uri::{AccessUri, AppOpUri, PackageUri};
use crate::xml::{XmlElement, XmlError, XmlSerializer};

use super::persistence::{ATTR_NAME, parse_app_op_modes, serialize_app_op_modes};
use super::{AppOpDefaults, ListenerRegistry};

const TAG_PACKAGE_APP_OPS: &str = "package-app-ops";
const TAG_PACKAGE: &str = "package";

pub trait OnAppOpModeChangedListener: Send + Sync {
    fn on_app_op_mode_changed(
        &self,
        package_name: &str,
        user_id: UserId,
        app_op_name: &str,
        old_mode: Decision,
        new_mode: Decision,
    );
}

impl<F> OnAppOpModeChangedListener for F
where
    F: Fn(&str, UserId, &str, Decision, Decision) + Send + Sync,
{
    fn on_app_op_mode_changed(
        &self,
        package_name: &str,
        user_id: UserId,
        app_op_name: &str,
        old_mode: Decision,
        new_mode: Decision,
    ) {
        self(package_name, user_id, app_op_name, old_mode, new_mode)
    }
}

pub struct PackageAppOpPolicy {
    defaults: AppOpDefaults,
    listeners: ListenerRegistry<dyn OnAppOpModeChangedListener>,
}

impl PackageAppOpPolicy {
    pub fn new(defaults: AppOpDefaults) -> Self {
        Self {
            defaults,
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn get_app_op_mode(
        &self,
        scope: &GetStateScope<'_>,
        package_name: &str,
        user_id: UserId,
        app_op_name: &str,
    ) -> Result<Decision, AccessError> {
        let user_state = scope.user_state(user_id)?;
        Ok(user_state
            .package_app_op_modes
            .get(package_name)
            .get_with_default(app_op_name, self.defaults.default_mode(app_op_name)))
    }

    /// Returns `false` without touching state when `mode` is already in
    /// effect.
    pub fn set_app_op_mode(
        &self,
        scope: &mut MutateStateScope<'_>,
        package_name: &str,
        user_id: UserId,
        app_op_name: &str,
        mode: Decision,
    ) -> Result<bool, AccessError> {
        let default_mode = self.defaults.default_mode(app_op_name);
        let user_state = scope.new_user_state(user_id)?;
        let old_mode = user_state
            .package_app_op_modes
            .get(package_name)
            .get_with_default(app_op_name, default_mode);
        if old_mode == mode {
            return Ok(false);
        }

        let app_op_modes = user_state
            .package_app_op_modes
            .entry(package_name.to_string())
            .or_default();
        app_op_modes.put_with_default(app_op_name.to_string(), mode, default_mode);
        if app_op_modes.is_empty() {
            user_state.package_app_op_modes.shift_remove(package_name);
        }
        user_state.request_write();

        tracing::debug!(
            package_name,
            user_id,
            app_op_name,
            old_mode,
            new_mode = mode,
            "package app-op mode changed"
        );
        for listener in self.listeners.snapshot().iter() {
            listener.on_app_op_mode_changed(package_name, user_id, app_op_name, old_mode, mode);
        }
        Ok(true)
    }

    /// Drops every explicit mode of `package_name` for one user. Listeners
    /// are not notified.
    pub fn remove_app_op_modes(
        &self,
        scope: &mut MutateStateScope<'_>,
        package_name: &str,
        user_id: UserId,
    ) -> Result<bool, AccessError> {
        let user_state = scope.new_user_state(user_id)?;
        let removed = user_state
            .package_app_op_modes
            .shift_remove(package_name)
            .is_some();
        if removed {
            user_state.request_write();
        }
        Ok(removed)
    }

    pub fn add_on_app_op_mode_changed_listener(
        &self,
        listener: Arc<dyn OnAppOpModeChangedListener>,
    ) {
        self.listeners.add(listener);
    }

    pub fn remove_on_app_op_mode_changed_listener(
        &self,
        listener: &Arc<dyn OnAppOpModeChangedListener>,
    ) {
        self.listeners.remove(listener);
    }
}

impl SchemePolicy for PackageAppOpPolicy {
    fn subject_scheme(&self) -> &'static str {
        PackageUri::SCHEME
    }

    fn object_scheme(&self) -> &'static str {
        AppOpUri::SCHEME
    }

    fn get_decision(
        &self,
        scope: &GetStateScope<'_>,
        subject: &AccessUri,
        object: &AccessUri,
    ) -> Result<Decision, AccessError> {
        let subject = subject.as_package()?;
        let object = object.as_app_op()?;
        self.get_app_op_mode(
            scope,
            &subject.package_name,
            subject.user_id,
            &object.app_op_name,
        )
    }

    fn set_decision(
        &self,
        scope: &mut MutateStateScope<'_>,
        subject: &AccessUri,
        object: &AccessUri,
        decision: Decision,
    ) -> Result<(), AccessError> {
        let subject = subject.as_package()?;
        let object = object.as_app_op()?;
        self.set_app_op_mode(
            scope,
            &subject.package_name,
            subject.user_id,
            &object.app_op_name,
            decision,
        )?;
        Ok(())
    }

    fn on_package_removed(
        &self,
        scope: &mut MutateStateScope<'_>,
        package_name: &str,
        _app_id: AppId,
    ) -> Result<(), AccessError> {
        // The package can't be resolved by listeners anymore, so don't notify.
        for user_state in scope.new_state.user_states.values_mut() {
            if user_state
                .package_app_op_modes
                .shift_remove(package_name)
                .is_some()
            {
                user_state.request_write();
            }
        }
        Ok(())
    }

    fn on_package_uninstalled(
        &self,
        scope: &mut MutateStateScope<'_>,
        package_name: &str,
        _app_id: AppId,
        user_id: UserId,
    ) -> Result<(), AccessError> {
        self.remove_app_op_modes(scope, package_name, user_id)?;
        Ok(())
    }

    fn parse_user_state(
        &self,
        element: &XmlElement,
        user_id: UserId,
        user_state: &mut UserState,
    ) -> Result<bool, XmlError> {
        if element.name != TAG_PACKAGE_APP_OPS {
            return Ok(false);
        }
        for child in &element.children {
            if child.name != TAG_PACKAGE {
                tracing::warn!(
                    tag = %child.name,
                    user_id,
                    "ignoring unknown tag when parsing package app-op modes"
                );
                continue;
            }
            let package_name = child.required_attribute(ATTR_NAME)?;
            let app_op_modes = parse_app_op_modes(child)?;
            if !app_op_modes.is_empty() {
                user_state
                    .package_app_op_modes
                    .insert(package_name.to_string(), app_op_modes);
            }
        }
        Ok(true)
    }

    fn serialize_user_state(
        &self,
        serializer: &mut XmlSerializer,
        _user_id: UserId,
        user_state: &UserState,
    ) -> Result<(), XmlError> {
        serializer.tag(TAG_PACKAGE_APP_OPS, &[], |serializer| {
            for (package_name, app_op_modes) in &user_state.package_app_op_modes {
                serializer.tag(
                    TAG_PACKAGE,
                    &[(ATTR_NAME, package_name.as_str())],
                    |serializer| serialize_app_op_modes(serializer, app_op_modes),
                )?;
            }
            Ok(())
        })
    }
}
