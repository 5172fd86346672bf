use std::sync::{Arc, Mutex, PoisonError};

/// Copy-on-write listener list.
///
/// Add and remove replace the whole list under `lock`; notification
/// iterates a snapshot taken up front, so changes made while a pass is in
/// flight only affect later passes.
pub struct ListenerRegistry<L: ?Sized> {
    listeners: Mutex<Arc<[Arc<L>]>>,
}

impl<L: ?Sized> ListenerRegistry<L> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Arc::from(Vec::new())),
        }
    }

    pub fn add(&self, listener: Arc<L>) {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        if listeners.iter().any(|it| same_listener(it, &listener)) {
            return;
        }
        let mut updated = listeners.to_vec();
        updated.push(listener);
        *listeners = Arc::from(updated);
    }

    pub fn remove(&self, listener: &Arc<L>) {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        if !listeners.iter().any(|it| same_listener(it, listener)) {
            return;
        }
        let updated: Vec<_> = listeners
            .iter()
            .filter(|it| !same_listener(it, listener))
            .cloned()
            .collect();
        *listeners = Arc::from(updated);
    }

    pub fn snapshot(&self) -> Arc<[Arc<L>]> {
        Arc::clone(&self.listeners.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl<L: ?Sized> Default for ListenerRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}

fn same_listener<L: ?Sized>(a: &Arc<L>, b: &Arc<L>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
