mod listeners;
mod package;
mod persistence;
mod uid;

pub use listeners::ListenerRegistry;
pub use package::{OnAppOpModeChangedListener, PackageAppOpPolicy};
pub use uid::{OnUidAppOpModeChangedListener, UidAppOpPolicy};

use std::sync::Arc;

use crate::collection::IndexedMap;
use crate::policy::SchemePolicy;
use crate::state::Decision;

pub const MODE_ALLOWED: Decision = 0;
pub const MODE_IGNORED: Decision = 1;
pub const MODE_ERRORED: Decision = 2;
pub const MODE_DEFAULT: Decision = 3;
pub const MODE_FOREGROUND: Decision = 4;

pub fn mode_name(mode: Decision) -> Option<&'static str> {
    match mode {
        MODE_ALLOWED => Some("allow"),
        MODE_IGNORED => Some("ignore"),
        MODE_ERRORED => Some("deny"),
        MODE_DEFAULT => Some("default"),
        MODE_FOREGROUND => Some("foreground"),
        _ => None,
    }
}

/// Accepts mode names as printed by [`mode_name`], their common aliases, or a
/// raw mode number.
pub fn parse_mode(value: &str) -> Option<Decision> {
    match value.to_ascii_lowercase().as_str() {
        "allow" | "allowed" => Some(MODE_ALLOWED),
        "ignore" | "ignored" => Some(MODE_IGNORED),
        "deny" | "errored" => Some(MODE_ERRORED),
        "default" => Some(MODE_DEFAULT),
        "foreground" => Some(MODE_FOREGROUND),
        other => other.parse().ok(),
    }
}

fn builtin_default_mode(app_op_name: &str) -> Decision {
    match app_op_name {
        "COARSE_LOCATION" | "FINE_LOCATION" | "CAMERA" | "RECORD_AUDIO" | "READ_CONTACTS"
        | "WRITE_CONTACTS" | "READ_CALENDAR" | "WRITE_CALENDAR" | "READ_SMS" | "VIBRATE"
        | "WAKE_LOCK" | "POST_NOTIFICATION" | "RUN_IN_BACKGROUND" | "RUN_ANY_IN_BACKGROUND"
        | "PICTURE_IN_PICTURE" | "READ_EXTERNAL_STORAGE" | "WRITE_EXTERNAL_STORAGE" => {
            MODE_ALLOWED
        }
        "PROJECT_MEDIA" | "ACTIVATE_VPN" => MODE_IGNORED,
        "MOCK_LOCATION" => MODE_ERRORED,
        _ => MODE_DEFAULT,
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppOpDefaults {
    overrides: IndexedMap<String, Decision>,
}

impl AppOpDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(mut self, app_op_name: impl Into<String>, mode: Decision) -> Self {
        self.overrides.insert(app_op_name.into(), mode);
        self
    }

    pub fn default_mode(&self, app_op_name: &str) -> Decision {
        self.overrides
            .get(app_op_name)
            .copied()
            .unwrap_or_else(|| builtin_default_mode(app_op_name))
    }
}

#[derive(Clone)]
pub struct AppOpPolicies {
    pub uid: Arc<UidAppOpPolicy>,
    pub package: Arc<PackageAppOpPolicy>,
}

impl AppOpPolicies {
    pub fn new(defaults: AppOpDefaults) -> Self {
        Self {
            uid: Arc::new(UidAppOpPolicy::new(defaults.clone())),
            package: Arc::new(PackageAppOpPolicy::new(defaults)),
        }
    }

    // Registration order: uid before package.
    pub fn scheme_policies(&self) -> Vec<Arc<dyn SchemePolicy>> {
        let uid: Arc<dyn SchemePolicy> = self.uid.clone();
        let package: Arc<dyn SchemePolicy> = self.package.clone();
        vec![uid, package]
    }
}
