pub mod access_policy;
pub mod appop;
pub mod collection;
pub mod error;
pub mod policy;
pub mod scope;
pub mod state;
pub mod uri;
pub mod xml;

#[cfg(test)]
mod test_support;

pub use access_policy::AccessPolicy;
pub use error::AccessError;
pub use policy::SchemePolicy;
pub use scope::{GetStateScope, MutateStateScope};
pub use state::{AccessState, AppId, Decision, PackageState, SystemState, UserId, UserState};
pub use uri::AccessUri;
