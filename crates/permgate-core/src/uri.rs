use std::fmt;
use std::str::FromStr;

use crate::error::AccessError;
use crate::state::{AppId, UserId};

pub const PER_USER_RANGE: i32 = 100_000;

pub fn uid_of(user_id: UserId, app_id: AppId) -> i32 {
    user_id * PER_USER_RANGE + app_id
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageUri {
    pub package_name: String,
    pub user_id: UserId,
}

impl PackageUri {
    pub const SCHEME: &'static str = "package";

    pub fn new(package_name: impl Into<String>, user_id: UserId) -> Self {
        Self {
            package_name: package_name.into(),
            user_id,
        }
    }
}

impl fmt::Display for PackageUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:///{}/{}", Self::SCHEME, self.package_name, self.user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppOpUri {
    pub app_op_name: String,
}

impl AppOpUri {
    pub const SCHEME: &'static str = "app-op";

    pub fn new(app_op_name: impl Into<String>) -> Self {
        Self {
            app_op_name: app_op_name.into(),
        }
    }
}

impl fmt::Display for AppOpUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:///{}", Self::SCHEME, self.app_op_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UidUri {
    pub uid: i32,
}

impl UidUri {
    pub const SCHEME: &'static str = "uid";

    pub fn new(uid: i32) -> Self {
        Self { uid }
    }

    pub fn user_id(&self) -> UserId {
        self.uid / PER_USER_RANGE
    }

    pub fn app_id(&self) -> AppId {
        self.uid % PER_USER_RANGE
    }
}

impl fmt::Display for UidUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:///{}", Self::SCHEME, self.uid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccessUri {
    Package(PackageUri),
    AppOp(AppOpUri),
    Uid(UidUri),
}

impl AccessUri {
    pub fn scheme(&self) -> &'static str {
        match self {
            AccessUri::Package(_) => PackageUri::SCHEME,
            AccessUri::AppOp(_) => AppOpUri::SCHEME,
            AccessUri::Uid(_) => UidUri::SCHEME,
        }
    }

    pub fn as_package(&self) -> Result<&PackageUri, AccessError> {
        match self {
            AccessUri::Package(uri) => Ok(uri),
            other => Err(Self::unexpected(PackageUri::SCHEME, other)),
        }
    }

    pub fn as_app_op(&self) -> Result<&AppOpUri, AccessError> {
        match self {
            AccessUri::AppOp(uri) => Ok(uri),
            other => Err(Self::unexpected(AppOpUri::SCHEME, other)),
        }
    }

    pub fn as_uid(&self) -> Result<&UidUri, AccessError> {
        match self {
            AccessUri::Uid(uri) => Ok(uri),
            other => Err(Self::unexpected(UidUri::SCHEME, other)),
        }
    }

    fn unexpected(expected: &'static str, actual: &AccessUri) -> AccessError {
        AccessError::UnexpectedUri {
            expected,
            actual: actual.to_string(),
        }
    }
}

impl From<PackageUri> for AccessUri {
    fn from(uri: PackageUri) -> Self {
        AccessUri::Package(uri)
    }
}

impl From<AppOpUri> for AccessUri {
    fn from(uri: AppOpUri) -> Self {
        AccessUri::AppOp(uri)
    }
}

impl From<UidUri> for AccessUri {
    fn from(uri: UidUri) -> Self {
        AccessUri::Uid(uri)
    }
}

impl fmt::Display for AccessUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessUri::Package(uri) => uri.fmt(f),
            AccessUri::AppOp(uri) => uri.fmt(f),
            AccessUri::Uid(uri) => uri.fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UriParseError {
    #[error("missing scheme separator in '{0}'")]
    MissingScheme(String),

    #[error("unknown scheme '{0}'")]
    UnknownScheme(String),

    #[error("malformed {scheme} uri '{input}'")]
    Malformed { scheme: &'static str, input: String },
}

impl FromStr for AccessUri {
    type Err = UriParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, path) = s
            .split_once(":///")
            .ok_or_else(|| UriParseError::MissingScheme(s.to_string()))?;
        let malformed = |scheme: &'static str| UriParseError::Malformed {
            scheme,
            input: s.to_string(),
        };

        match scheme {
            PackageUri::SCHEME => {
                let (package_name, user_id) = path
                    .rsplit_once('/')
                    .ok_or_else(|| malformed(PackageUri::SCHEME))?;
                if package_name.is_empty() {
                    return Err(malformed(PackageUri::SCHEME));
                }
                let user_id = user_id
                    .parse()
                    .map_err(|_| malformed(PackageUri::SCHEME))?;
                Ok(PackageUri::new(package_name, user_id).into())
            }
            AppOpUri::SCHEME => {
                if path.is_empty() || path.contains('/') {
                    return Err(malformed(AppOpUri::SCHEME));
                }
                Ok(AppOpUri::new(path).into())
            }
            UidUri::SCHEME => {
                let uid = path.parse().map_err(|_| malformed(UidUri::SCHEME))?;
                Ok(UidUri::new(uid).into())
            }
            other => Err(UriParseError::UnknownScheme(other.to_string())),
        }
    }
}
