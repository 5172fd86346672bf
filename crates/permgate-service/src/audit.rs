use permgate_core::appop::{OnAppOpModeChangedListener, OnUidAppOpModeChangedListener, mode_name};
use permgate_core::uri::{PackageUri, UidUri, uid_of};
use permgate_core::{AppId, Decision, UserId};

pub fn audit_app_op_mode_changed(
    subject: &str,
    app_op_name: &str,
    old_mode: Decision,
    new_mode: Decision,
) {
    tracing::info!(
        target: "audit",
        event = "app_op_mode_changed",
        subject = subject,
        app_op = app_op_name,
        old_mode = mode_name(old_mode).unwrap_or("unknown"),
        new_mode = mode_name(new_mode).unwrap_or("unknown"),
        "app-op mode changed"
    );
}

pub fn audit_user_added(user_id: UserId) {
    tracing::info!(
        target: "audit",
        event = "user_added",
        user_id = user_id,
        "user added"
    );
}

pub fn audit_user_removed(user_id: UserId) {
    tracing::info!(
        target: "audit",
        event = "user_removed",
        user_id = user_id,
        "user removed"
    );
}

pub fn audit_package_added(package_name: &str) {
    tracing::info!(
        target: "audit",
        event = "package_added",
        package_name = package_name,
        "package added"
    );
}

pub fn audit_package_removed(package_name: &str, app_id: AppId) {
    tracing::info!(
        target: "audit",
        event = "package_removed",
        package_name = package_name,
        app_id = app_id,
        "package removed"
    );
}

pub fn audit_package_installed(package_name: &str, user_id: UserId) {
    tracing::info!(
        target: "audit",
        event = "package_installed",
        package_name = package_name,
        user_id = user_id,
        "package installed for user"
    );
}

pub fn audit_package_uninstalled(package_name: &str, user_id: UserId) {
    tracing::info!(
        target: "audit",
        event = "package_uninstalled",
        package_name = package_name,
        user_id = user_id,
        "package uninstalled for user"
    );
}

pub fn audit_app_op_modes_removed(package_name: &str, user_id: UserId) {
    tracing::info!(
        target: "audit",
        event = "app_op_modes_removed",
        package_name = package_name,
        user_id = user_id,
        "package app-op modes reset"
    );
}

pub fn audit_storage_volume_mounted(volume_uuid: Option<&str>, is_system_updated: bool) {
    tracing::info!(
        target: "audit",
        event = "storage_volume_mounted",
        volume_uuid = volume_uuid.unwrap_or("internal"),
        is_system_updated = is_system_updated,
        "storage volume mounted"
    );
}

#[derive(Debug, Default)]
pub struct AuditListener;

impl OnAppOpModeChangedListener for AuditListener {
    fn on_app_op_mode_changed(
        &self,
        package_name: &str,
        user_id: UserId,
        app_op_name: &str,
        old_mode: Decision,
        new_mode: Decision,
    ) {
        let subject = PackageUri::new(package_name, user_id).to_string();
        audit_app_op_mode_changed(&subject, app_op_name, old_mode, new_mode);
    }
}

impl OnUidAppOpModeChangedListener for AuditListener {
    fn on_uid_app_op_mode_changed(
        &self,
        app_id: AppId,
        user_id: UserId,
        app_op_name: &str,
        old_mode: Decision,
        new_mode: Decision,
    ) {
        let subject = UidUri::new(uid_of(user_id, app_id)).to_string();
        audit_app_op_mode_changed(&subject, app_op_name, old_mode, new_mode);
    }
}


#[cfg(test)]
mod tests {
    use super::test_capture::{has_field, with_test_subscriber};
    use super::*;
    use permgate_core::appop::{MODE_ALLOWED, MODE_ERRORED, MODE_IGNORED};

    #[test]
    fn package_mode_change_names_package_uri() {
        let ((), events) = with_test_subscriber(|| {
            AuditListener.on_app_op_mode_changed("com.a", 10, "CAMERA", MODE_ALLOWED, MODE_IGNORED);
        });

        assert_eq!(events.len(), 1);
        assert!(has_field(&events[0], "event", "app_op_mode_changed"));
        assert!(has_field(&events[0], "subject", "package:///com.a/10"));
        assert!(has_field(&events[0], "app_op", "CAMERA"));
        assert!(has_field(&events[0], "old_mode", "allow"));
        assert!(has_field(&events[0], "new_mode", "ignore"));
    }

    #[test]
    fn uid_mode_change_names_uid_uri() {
        let ((), events) = with_test_subscriber(|| {
            AuditListener.on_uid_app_op_mode_changed(10001, 10, "CAMERA", MODE_ALLOWED, MODE_ERRORED);
        });

        assert_eq!(events.len(), 1);
        assert!(has_field(&events[0], "subject", "uid:///1010001"));
        assert!(has_field(&events[0], "new_mode", "deny"));
    }

    #[test]
    fn unknown_mode_is_labelled() {
        let ((), events) = with_test_subscriber(|| {
            audit_app_op_mode_changed("uid:///10001", "CAMERA", 42, MODE_ALLOWED);
        });

        assert!(has_field(&events[0], "old_mode", "unknown"));
    }

    #[test]
    fn lifecycle_events_carry_identifiers() {
        let ((), events) = with_test_subscriber(|| {
            audit_user_added(10);
            audit_package_removed("com.a", 10001);
            audit_package_installed("com.a", 10);
            audit_storage_volume_mounted(None, true);
        });

        assert_eq!(events.len(), 4);
        assert!(has_field(&events[0], "user_id", "10"));
        assert!(has_field(&events[1], "app_id", "10001"));
        assert!(has_field(&events[2], "package_name", "com.a"));
        assert!(has_field(&events[3], "volume_uuid", "internal"));
        assert!(has_field(&events[3], "is_system_updated", "true"));
    }

    #[test]
    fn audit_events_use_target_audit() {
        let ((), events) = with_test_subscriber(|| {
            audit_user_added(0);
            audit_user_removed(0);
            audit_package_added("com.a");
            audit_package_removed("com.a", 10001);
            audit_package_installed("com.a", 0);
            audit_package_uninstalled("com.a", 0);
            audit_app_op_modes_removed("com.a", 0);
            audit_storage_volume_mounted(Some("1234-ABCD"), false);
            audit_app_op_mode_changed("package:///com.a/0", "CAMERA", MODE_ALLOWED, MODE_IGNORED);
        });

        assert_eq!(events.len(), 9);
        for event in &events {
            assert_eq!(
                event.target, "audit",
                "event target should be 'audit', got '{}'",
                event.target
            );
        }
    }
}
