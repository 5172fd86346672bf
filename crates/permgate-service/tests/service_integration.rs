use std::sync::{Arc, Mutex};

use permgate_core::appop::{
    AppOpDefaults, MODE_ALLOWED, MODE_ERRORED, MODE_IGNORED, OnUidAppOpModeChangedListener,
};
use permgate_core::uri::{AppOpUri, PackageUri, UidUri, uid_of};
use permgate_core::{AccessUri, AppId, Decision, UserId};
use permgate_service::config::AppConfig;
use permgate_service::service::AccessService;
use permgate_service::snapshot::PackageSnapshot;
use permgate_storage::{FileStateStore, StateStore};

const SNAPSHOT: &str = r#"
user_ids = [0, 10]

[[packages]]
package_name = "com.example.camera"
app_id = 10001

[[packages]]
package_name = "com.example.camera.helper"
app_id = 10001

[[packages]]
package_name = "com.example.maps"
app_id = 10002
"#;

fn snapshot() -> PackageSnapshot {
    PackageSnapshot::from_toml_str(SNAPSHOT).unwrap()
}

fn start_service(dir: &std::path::Path) -> AccessService<FileStateStore> {
    start_service_with(dir, AppOpDefaults::new())
}

fn start_service_with(
    dir: &std::path::Path,
    defaults: AppOpDefaults,
) -> AccessService<FileStateStore> {
    let store = FileStateStore::open(dir).unwrap();
    let service = AccessService::new(store, defaults).unwrap();
    service.initialize_from_snapshot(&snapshot()).unwrap();
    service
}

fn package(name: &str, user_id: UserId) -> AccessUri {
    AccessUri::from(PackageUri::new(name, user_id))
}

fn uid(user_id: UserId, app_id: AppId) -> AccessUri {
    AccessUri::from(UidUri::new(uid_of(user_id, app_id)))
}

fn app_op(name: &str) -> AccessUri {
    AccessUri::from(AppOpUri::new(name))
}

#[test]
fn decisions_survive_restart_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    {
        let service = start_service(dir.path());
        service
            .set_decision(&package("com.example.camera", 0), &app_op("CAMERA"), MODE_IGNORED)
            .unwrap();
        service
            .set_decision(&uid(10, 10002), &app_op("FINE_LOCATION"), MODE_ERRORED)
            .unwrap();
    }

    let restarted = start_service(dir.path());

    assert_eq!(
        restarted
            .get_decision(&package("com.example.camera", 0), &app_op("CAMERA"))
            .unwrap(),
        MODE_IGNORED
    );
    assert_eq!(
        restarted
            .get_decision(&uid(10, 10002), &app_op("FINE_LOCATION"))
            .unwrap(),
        MODE_ERRORED
    );
    assert!(dir.path().join("users").join("0.xml").is_file());
    assert!(dir.path().join("users").join("10.xml").is_file());
}

#[test]
fn camera_default_override_and_explicit_modes() {
    let dir = tempfile::tempdir().unwrap();
    let service = start_service_with(
        dir.path(),
        AppOpDefaults::new().with_override("CAMERA", MODE_IGNORED),
    );
    let camera = package("com.example.camera", 0);

    assert_eq!(
        service.get_decision(&camera, &app_op("CAMERA")).unwrap(),
        MODE_IGNORED
    );

    service
        .set_decision(&camera, &app_op("CAMERA"), MODE_ALLOWED)
        .unwrap();
    assert_eq!(
        service.get_decision(&camera, &app_op("CAMERA")).unwrap(),
        MODE_ALLOWED
    );

    // Back to the default: nothing explicit is left to list.
    service
        .set_decision(&camera, &app_op("CAMERA"), MODE_IGNORED)
        .unwrap();
    assert!(service.decisions().unwrap().is_empty());
    let document = service.store().read_user_state(0).unwrap().unwrap();
    assert!(!document.contains("CAMERA"), "got: {document}");
}

#[test]
fn removing_one_package_of_shared_app_id_keeps_uid_modes() {
    let dir = tempfile::tempdir().unwrap();
    let service = start_service(dir.path());
    service
        .set_decision(&uid(0, 10001), &app_op("CAMERA"), MODE_ERRORED)
        .unwrap();
    service
        .set_decision(
            &package("com.example.camera.helper", 0),
            &app_op("CAMERA"),
            MODE_IGNORED,
        )
        .unwrap();
    let after = snapshot();
    let remaining = after.package_states_without("com.example.camera.helper");

    service
        .on_package_removed(
            remaining.clone(),
            after.disabled_system_package_states(),
            "com.example.camera.helper",
            10001,
        )
        .unwrap();

    assert_eq!(
        service
            .get_decision(&package("com.example.camera.helper", 0), &app_op("CAMERA"))
            .unwrap(),
        MODE_ALLOWED
    );
    assert_eq!(
        service.get_decision(&uid(0, 10001), &app_op("CAMERA")).unwrap(),
        MODE_ERRORED
    );

    let empty = permgate_core::state::package_states(
        remaining
            .values()
            .filter(|package| package.app_id != 10001)
            .cloned(),
    );
    service
        .on_package_removed(
            empty,
            after.disabled_system_package_states(),
            "com.example.camera",
            10001,
        )
        .unwrap();

    assert_eq!(
        service.get_decision(&uid(0, 10001), &app_op("CAMERA")).unwrap(),
        MODE_ALLOWED
    );
}

#[test]
fn removed_user_loses_document_and_added_user_starts_clean() {
    let dir = tempfile::tempdir().unwrap();
    let service = start_service(dir.path());
    service
        .set_decision(&package("com.example.maps", 10), &app_op("FINE_LOCATION"), MODE_IGNORED)
        .unwrap();

    service.on_user_removed(10).unwrap();
    assert!(!dir.path().join("users").join("10.xml").exists());

    service.on_user_added(10).unwrap();
    assert_eq!(
        service
            .get_decision(&package("com.example.maps", 10), &app_op("FINE_LOCATION"))
            .unwrap(),
        MODE_ALLOWED
    );
    assert!(dir.path().join("users").join("10.xml").is_file());
}

#[test]
fn contract_violation_does_not_reach_disk() {
    let dir = tempfile::tempdir().unwrap();
    let service = start_service(dir.path());
    let users_dir = dir.path().join("users");

    let err = service
        .on_package_installed(
            snapshot().package_states(),
            snapshot().disabled_system_package_states(),
            "com.example.unknown",
            0,
        )
        .unwrap_err();

    assert!(err.is_contract_violation());
    assert_eq!(std::fs::read_dir(users_dir).unwrap().count(), 0);
    assert!(!dir.path().join("system.xml").exists());
}

#[test]
fn uid_listener_sees_changes_from_service() {
    let dir = tempfile::tempdir().unwrap();
    let service = start_service(dir.path());
    let seen: Arc<Mutex<Vec<(AppId, UserId, Decision)>>> = Arc::default();
    let listener: Arc<dyn OnUidAppOpModeChangedListener> = {
        let seen = Arc::clone(&seen);
        Arc::new(
            move |app_id: AppId, user_id: UserId, _op: &str, _old: Decision, new: Decision| {
                seen.lock().unwrap().push((app_id, user_id, new));
            },
        )
    };
    service.add_on_uid_app_op_mode_changed_listener(listener);

    service
        .set_decision(&uid(10, 10002), &app_op("RECORD_AUDIO"), MODE_IGNORED)
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![(10002, 10, MODE_IGNORED)]);
}

#[test]
fn config_defaults_feed_the_service() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("permgate.toml");
    std::fs::write(
        &config_path,
        r#"
[app_ops.default_modes]
WRITE_SETTINGS = "deny"
"#,
    )
    .unwrap();
    let config = AppConfig::load(Some(&config_path)).unwrap();

    let service = start_service_with(&dir.path().join("state"), config.to_app_op_defaults());

    assert_eq!(
        service
            .get_decision(&package("com.example.maps", 0), &app_op("WRITE_SETTINGS"))
            .unwrap(),
        MODE_ERRORED
    );
}
