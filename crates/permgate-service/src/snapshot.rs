use std::path::Path;

use serde::Deserialize;

use permgate_core::collection::IntSet;
use permgate_core::state::{PackageState, PackageStates, PermissionAllowlist, package_states};
use permgate_core::{AppId, UserId};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read package snapshot '{0}': {1}")]
    ReadFile(String, String),

    #[error("failed to parse package snapshot: {0}")]
    ParseToml(String),

    #[error("duplicate package '{0}' in package snapshot")]
    DuplicatePackage(String),
}

/// What the package manager knows: users, installed packages, disabled
/// system packages and the privileged permission allowlist.
///
/// ```toml
/// user_ids = [0, 10]
///
/// [[packages]]
/// package_name = "com.example.app"
/// app_id = 10001
///
/// [permission_allowlist.privileged_app_allowlist."com.example.app"]
/// "android.permission.READ_LOGS" = true
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PackageSnapshot {
    pub user_ids: Vec<UserId>,
    pub packages: Vec<PackageState>,
    pub disabled_system_packages: Vec<PackageState>,
    pub permission_allowlist: PermissionAllowlist,
}

impl PackageSnapshot {
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SnapshotError::ReadFile(path.display().to_string(), e.to_string()))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, SnapshotError> {
        let snapshot: PackageSnapshot =
            toml::from_str(contents).map_err(|e| SnapshotError::ParseToml(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    fn validate(&self) -> Result<(), SnapshotError> {
        let mut seen = std::collections::HashSet::new();
        for package in &self.packages {
            if !seen.insert(package.package_name.as_str()) {
                return Err(SnapshotError::DuplicatePackage(package.package_name.clone()));
            }
        }
        Ok(())
    }

    pub fn user_id_set(&self) -> IntSet {
        self.user_ids.iter().copied().collect()
    }

    pub fn package_states(&self) -> PackageStates {
        package_states(self.packages.iter().cloned())
    }

    pub fn disabled_system_package_states(&self) -> PackageStates {
        package_states(self.disabled_system_packages.iter().cloned())
    }

    pub fn app_id_of(&self, package_name: &str) -> Option<AppId> {
        self.packages
            .iter()
            .find(|package| package.package_name == package_name)
            .map(|package| package.app_id)
    }

    /// Package states as they were before `package_name` appeared.
    pub fn package_states_without(&self, package_name: &str) -> PackageStates {
        package_states(
            self.packages
                .iter()
                .filter(|package| package.package_name != package_name)
                .cloned(),
        )
    }

    /// Package states as they were before `package_name` went away.
    pub fn package_states_with(&self, package_name: &str, app_id: AppId) -> PackageStates {
        package_states(
            self.packages
                .iter()
                .filter(|package| package.package_name != package_name)
                .cloned()
                .chain(std::iter::once(PackageState::new(package_name, app_id))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"
user_ids = [0, 10]

[[packages]]
package_name = "com.example.camera"
app_id = 10001

[[packages]]
package_name = "com.example.camera.helper"
app_id = 10001
volume_uuid = "1234-ABCD"

[[packages]]
package_name = "com.android.settings"
app_id = 1000
is_system = true

[[disabled_system_packages]]
package_name = "com.android.settings"
app_id = 1000
is_system = true

[permission_allowlist.privileged_app_allowlist."com.android.settings"]
"android.permission.READ_LOGS" = true
"android.permission.REBOOT" = false
"#;

    #[test]
    fn parses_full_snapshot() {
        let snapshot = PackageSnapshot::from_toml_str(SNAPSHOT).unwrap();

        assert_eq!(snapshot.user_ids, vec![0, 10]);
        assert_eq!(snapshot.packages.len(), 3);
        assert_eq!(
            snapshot.packages[1].volume_uuid.as_deref(),
            Some("1234-ABCD")
        );
        assert!(snapshot.packages[2].is_system);
        assert_eq!(snapshot.disabled_system_packages.len(), 1);
        assert_eq!(
            snapshot
                .permission_allowlist
                .privileged_app_permission("com.android.settings", "android.permission.REBOOT"),
            Some(false)
        );
    }

    #[test]
    fn empty_snapshot_is_valid() {
        let snapshot = PackageSnapshot::from_toml_str("").unwrap();

        assert!(snapshot.user_ids.is_empty());
        assert!(snapshot.package_states().is_empty());
    }

    #[test]
    fn rejects_duplicate_packages() {
        let toml = r#"
[[packages]]
package_name = "com.a"
app_id = 10001

[[packages]]
package_name = "com.a"
app_id = 10002
"#;

        let err = PackageSnapshot::from_toml_str(toml).unwrap_err();

        assert!(matches!(err, SnapshotError::DuplicatePackage(ref name) if name == "com.a"));
    }

    #[test]
    fn package_states_before_and_after_events() {
        let snapshot = PackageSnapshot::from_toml_str(SNAPSHOT).unwrap();

        let before_add = snapshot.package_states_without("com.example.camera");
        assert!(!before_add.contains_key("com.example.camera"));
        assert_eq!(before_add.len(), 2);

        let before_remove = snapshot.package_states_with("com.example.gone", 10077);
        assert_eq!(before_remove["com.example.gone"].app_id, 10077);
        assert_eq!(before_remove.len(), 4);

        assert_eq!(snapshot.app_id_of("com.android.settings"), Some(1000));
        assert_eq!(snapshot.app_id_of("com.example.gone"), None);
    }

    #[test]
    fn malformed_snapshot_is_reported() {
        let err = PackageSnapshot::from_toml_str("user_ids = \"zero\"").unwrap_err();

        assert!(matches!(err, SnapshotError::ParseToml(_)));
    }
}
