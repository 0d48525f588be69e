use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tvc_store::ObjectStore;
use tvc_types::ObjectId;

use crate::error::RootResult;
use crate::root::RootValue;

/// The three roots of a working copy.
///
/// - `working`: the mutable state users edit
/// - `staged`: what the next commit will contain
/// - `head`: the last commit, read-only here
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Roots {
    pub working: RootValue,
    pub staged: RootValue,
    pub head: RootValue,
}

impl Roots {
    /// Group three roots.
    pub fn new(working: RootValue, staged: RootValue, head: RootValue) -> Self {
        Self {
            working,
            staged,
            head,
        }
    }

    /// Replace the Working root.
    pub fn with_working(&self, working: RootValue) -> Self {
        Self {
            working,
            ..self.clone()
        }
    }

    /// Replace the Staged root.
    pub fn with_staged(&self, staged: RootValue) -> Self {
        Self {
            staged,
            ..self.clone()
        }
    }

    /// Persist all three roots and return their ids.
    pub fn store(&self, store: &dyn ObjectStore) -> RootResult<RootIds> {
        Ok(RootIds {
            working: self.working.store(store)?,
            staged: self.staged.store(store)?,
            head: self.head.store(store)?,
        })
    }
}

/// Object ids of a persisted [`Roots`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootIds {
    pub working: ObjectId,
    pub staged: ObjectId,
    pub head: ObjectId,
}

impl RootIds {
    /// Load all three roots from `store`.
    pub fn load(&self, store: Arc<dyn ObjectStore>) -> RootResult<Roots> {
        Ok(Roots {
            working: RootValue::load(Arc::clone(&store), &self.working)?,
            staged: RootValue::load(Arc::clone(&store), &self.staged)?,
            head: RootValue::load(store, &self.head)?,
        })
    }
}
