use crate::error::AccessError;
use crate::state::{AccessState, UserId, UserState};

#[derive(Debug, Clone, Copy)]
pub struct GetStateScope<'a> {
    pub state: &'a AccessState,
}

impl<'a> GetStateScope<'a> {
    pub fn new(state: &'a AccessState) -> Self {
        Self { state }
    }

    pub fn user_state(&self, user_id: UserId) -> Result<&'a UserState, AccessError> {
        self.state
            .user_state(user_id)
            .ok_or(AccessError::UserNotFound(user_id))
    }
}

/// One logical mutation: `old_state` is the snapshot the mutation started
/// from, `new_state` is the copy being written.
#[derive(Debug)]
pub struct MutateStateScope<'a> {
    pub old_state: &'a AccessState,
    pub new_state: &'a mut AccessState,
}

impl<'a> MutateStateScope<'a> {
    pub fn new(old_state: &'a AccessState, new_state: &'a mut AccessState) -> Self {
        Self {
            old_state,
            new_state,
        }
    }

    pub fn new_user_state(&mut self, user_id: UserId) -> Result<&mut UserState, AccessError> {
        self.new_state
            .user_state_mut(user_id)
            .ok_or(AccessError::UserNotFound(user_id))
    }
}
