use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Documents that failed to render; reopening them fails fast
///
/// Created once by the application and handed to every viewer session.
#[derive(Clone, Debug, Default)]
pub struct ProblematicDocuments {
    uuids: Arc<Mutex<HashSet<String>>>,
}

impl ProblematicDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, uuid: impl Into<String>) -> bool {
        self.uuids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(uuid.into())
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.uuids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(uuid)
    }

    pub fn len(&self) -> usize {
        self.uuids.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
