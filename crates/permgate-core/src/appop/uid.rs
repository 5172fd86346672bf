use std::sync::Arc;

use crate::collection::{MapDefaultExt, OptionMapDefaultExt};
use crate::error::AccessError;
use crate::policy::SchemePolicy;
use crate::scope::{GetStateScope, MutateStateScope};
use crate::state::{AppId, Decision, UserId, UserState};
use crate::uri::{AccessUri, AppOpUri, UidUri};
use crate::xml::{XmlElement, XmlError, XmlSerializer};

use super::persistence::{parse_app_op_modes, serialize_app_op_modes};
use super::{AppOpDefaults, ListenerRegistry};

const TAG_UID_APP_OPS: &str = "uid-app-ops";
const TAG_APP_ID: &str = "app-id";
const ATTR_ID: &str = "id";

pub trait OnUidAppOpModeChangedListener: Send + Sync {
    fn on_uid_app_op_mode_changed(
        &self,
        app_id: AppId,
        user_id: UserId,
        app_op_name: &str,
        old_mode: Decision,
        new_mode: Decision,
    );
}

impl<F> OnUidAppOpModeChangedListener for F
where
    F: Fn(AppId, UserId, &str, Decision, Decision) + Send + Sync,
{
    fn on_uid_app_op_mode_changed(
        &self,
        app_id: AppId,
        user_id: UserId,
        app_op_name: &str,
        old_mode: Decision,
        new_mode: Decision,
    ) {
        self(app_id, user_id, app_op_name, old_mode, new_mode)
    }
}

pub struct UidAppOpPolicy {
    defaults: AppOpDefaults,
    listeners: ListenerRegistry<dyn OnUidAppOpModeChangedListener>,
}

impl UidAppOpPolicy {
    pub fn new(defaults: AppOpDefaults) -> Self {
        Self {
            defaults,
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn get_app_op_mode(
        &self,
        scope: &GetStateScope<'_>,
        app_id: AppId,
        user_id: UserId,
        app_op_name: &str,
    ) -> Result<Decision, AccessError> {
        let user_state = scope.user_state(user_id)?;
        Ok(user_state
            .uid_app_op_modes
            .get(&app_id)
            .get_with_default(app_op_name, self.defaults.default_mode(app_op_name)))
    }

    pub fn set_app_op_mode(
        &self,
        scope: &mut MutateStateScope<'_>,
        app_id: AppId,
        user_id: UserId,
        app_op_name: &str,
        mode: Decision,
    ) -> Result<bool, AccessError> {
        let default_mode = self.defaults.default_mode(app_op_name);
        let user_state = scope.new_user_state(user_id)?;
        let old_mode = user_state
            .uid_app_op_modes
            .get(&app_id)
            .get_with_default(app_op_name, default_mode);
        if old_mode == mode {
            return Ok(false);
        }

        let app_op_modes = user_state.uid_app_op_modes.entry(app_id).or_default();
        app_op_modes.put_with_default(app_op_name.to_string(), mode, default_mode);
        if app_op_modes.is_empty() {
            user_state.uid_app_op_modes.shift_remove(&app_id);
        }
        user_state.request_write();

        tracing::debug!(
            app_id,
            user_id,
            app_op_name,
            old_mode,
            new_mode = mode,
            "uid app-op mode changed"
        );
        for listener in self.listeners.snapshot().iter() {
            listener.on_uid_app_op_mode_changed(app_id, user_id, app_op_name, old_mode, mode);
        }
        Ok(true)
    }

    pub fn remove_app_op_modes(
        &self,
        scope: &mut MutateStateScope<'_>,
        app_id: AppId,
        user_id: UserId,
    ) -> Result<bool, AccessError> {
        let user_state = scope.new_user_state(user_id)?;
        let removed = user_state.uid_app_op_modes.shift_remove(&app_id).is_some();
        if removed {
            user_state.request_write();
        }
        Ok(removed)
    }

    pub fn add_on_uid_app_op_mode_changed_listener(
        &self,
        listener: Arc<dyn OnUidAppOpModeChangedListener>,
    ) {
        self.listeners.add(listener);
    }

    pub fn remove_on_uid_app_op_mode_changed_listener(
        &self,
        listener: &Arc<dyn OnUidAppOpModeChangedListener>,
    ) {
        self.listeners.remove(listener);
    }
}

impl SchemePolicy for UidAppOpPolicy {
    fn subject_scheme(&self) -> &'static str {
        UidUri::SCHEME
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
        let subject = subject.as_uid()?;
        let object = object.as_app_op()?;
        self.get_app_op_mode(
            scope,
            subject.app_id(),
            subject.user_id(),
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
        let subject = subject.as_uid()?;
        let object = object.as_app_op()?;
        self.set_app_op_mode(
            scope,
            subject.app_id(),
            subject.user_id(),
            &object.app_op_name,
            decision,
        )?;
        Ok(())
    }

    fn on_app_id_removed(
        &self,
        scope: &mut MutateStateScope<'_>,
        app_id: AppId,
    ) -> Result<(), AccessError> {
        for user_state in scope.new_state.user_states.values_mut() {
            if user_state.uid_app_op_modes.shift_remove(&app_id).is_some() {
                user_state.request_write();
            }
        }
        Ok(())
    }

    fn parse_user_state(
        &self,
        element: &XmlElement,
        user_id: UserId,
        user_state: &mut UserState,
    ) -> Result<bool, XmlError> {
        if element.name != TAG_UID_APP_OPS {
            return Ok(false);
        }
        for child in &element.children {
            if child.name != TAG_APP_ID {
                tracing::warn!(
                    tag = %child.name,
                    user_id,
                    "ignoring unknown tag when parsing uid app-op modes"
                );
                continue;
            }
            let app_id = child.int_attribute(ATTR_ID)?;
            let app_op_modes = parse_app_op_modes(child)?;
            if !app_op_modes.is_empty() {
                user_state.uid_app_op_modes.insert(app_id, app_op_modes);
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
        serializer.tag(TAG_UID_APP_OPS, &[], |serializer| {
            for (app_id, app_op_modes) in &user_state.uid_app_op_modes {
                let app_id = app_id.to_string();
                serializer.tag(TAG_APP_ID, &[(ATTR_ID, app_id.as_str())], |serializer| {
                    serialize_app_op_modes(serializer, app_op_modes)
                })?;
            }
            Ok(())
        })
    }
}
