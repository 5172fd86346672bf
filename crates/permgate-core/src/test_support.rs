use std::sync::Mutex;

use crate::error::AccessError;
use crate::scope::MutateStateScope;
use crate::state::{AccessState, Decision, UserId, UserState};

pub(crate) fn state_with_users(user_ids: &[UserId]) -> AccessState {
    let mut state = AccessState::new();
    for &user_id in user_ids {
        state.system_state.user_ids.insert(user_id);
        state.user_states.insert(user_id, UserState::new());
    }
    state
}

pub(crate) fn mutate<T>(
    state: &mut AccessState,
    action: impl FnOnce(&mut MutateStateScope<'_>) -> Result<T, AccessError>,
) -> Result<T, AccessError> {
    let mut new_state = state.clone();
    let result = {
        let mut scope = MutateStateScope::new(state, &mut new_state);
        action(&mut scope)?
    };
    *state = new_state;
    Ok(result)
}

pub(crate) fn clear_write_requests(state: &mut AccessState) {
    state.system_state.clear_write_request();
    for user_state in state.user_states.values_mut() {
        user_state.clear_write_request();
    }
}

pub(crate) type ModeChange = (String, UserId, String, Decision, Decision);

#[derive(Default)]
pub(crate) struct ModeChangeRecorder {
    changes: Mutex<Vec<ModeChange>>,
}

impl ModeChangeRecorder {
    pub(crate) fn record(&self, key: String, user_id: UserId, op: &str, old: Decision, new: Decision) {
        self.changes
            .lock()
            .unwrap()
            .push((key, user_id, op.to_string(), old, new));
    }

    pub(crate) fn changes(&self) -> Vec<ModeChange> {
        self.changes.lock().unwrap().clone()
    }
}
