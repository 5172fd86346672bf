use std::sync::Arc;

use serde::Deserialize;

use crate::collection::{IndexedMap, IndexedSet, IntMap, IntSet};

pub type UserId = i32;
pub type AppId = i32;
pub type Decision = i32;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PackageState {
    pub package_name: String,
    pub app_id: AppId,
    #[serde(default)]
    pub volume_uuid: Option<String>,
    #[serde(default)]
    pub is_system: bool,
}

impl PackageState {
    pub fn new(package_name: impl Into<String>, app_id: AppId) -> Self {
        Self {
            package_name: package_name.into(),
            app_id,
            volume_uuid: None,
            is_system: false,
        }
    }
}

pub type PackageStates = Arc<IndexedMap<String, PackageState>>;

pub fn package_states<I>(packages: I) -> PackageStates
where
    I: IntoIterator<Item = PackageState>,
{
    Arc::new(
        packages
            .into_iter()
            .map(|package| (package.package_name.clone(), package))
            .collect(),
    )
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PermissionAllowlist {
    pub privileged_app_allowlist: IndexedMap<String, IndexedMap<String, bool>>,
}

impl PermissionAllowlist {
    pub fn privileged_app_permission(&self, package_name: &str, permission: &str) -> Option<bool> {
        self.privileged_app_allowlist
            .get(package_name)
            .and_then(|permissions| permissions.get(permission))
            .copied()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SystemState {
    pub user_ids: IntSet,
    pub package_states: PackageStates,
    pub disabled_system_package_states: PackageStates,
    pub app_ids: IntMap<IndexedSet<String>>,
    pub permission_allowlist: PermissionAllowlist,
    requires_write: bool,
}

impl SystemState {
    pub fn request_write(&mut self) {
        self.requires_write = true;
    }

    pub fn requires_write(&self) -> bool {
        self.requires_write
    }

    pub fn clear_write_request(&mut self) {
        self.requires_write = false;
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserState {
    pub package_app_op_modes: IndexedMap<String, IndexedMap<String, Decision>>,
    pub uid_app_op_modes: IntMap<IndexedMap<String, Decision>>,
    requires_write: bool,
}

impl UserState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_write(&mut self) {
        self.requires_write = true;
    }

    pub fn requires_write(&self) -> bool {
        self.requires_write
    }

    pub fn clear_write_request(&mut self) {
        self.requires_write = false;
    }
}

#[derive(Debug, Clone, Default)]
pub struct AccessState {
    pub system_state: SystemState,
    pub user_states: IntMap<UserState>,
}

impl AccessState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_state(&self, user_id: UserId) -> Option<&UserState> {
        self.user_states.get(&user_id)
    }

    pub fn user_state_mut(&mut self, user_id: UserId) -> Option<&mut UserState> {
        self.user_states.get_mut(&user_id)
    }
}
