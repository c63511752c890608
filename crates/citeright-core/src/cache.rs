//! Bounded local mirror of the user's saved references.
//!
//! Entries are ordered most-recently-saved first. Every mutation runs inside
//! a single-writer critical section (an async [`Mutex`]) that covers the
//! whole read-modify-write of the persisted `references` entry, and the
//! in-memory view only changes once the [`CredentialStore`] has accepted the
//! write. Concurrent savers, syncs and deletes therefore apply in the order
//! they reach the writer, which is after their remote effect was confirmed.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::model::{Reference, ReferenceId, ReferenceType};
use crate::store::{CredentialStore, REFERENCES_KEY};

/// Default maximum number of cached references.
pub const DEFAULT_CAPACITY: usize = 100;

/// History-page style filter over cached references.
#[derive(Debug, Clone, Default)]
pub struct ReferenceFilter {
    pub kind: Option<ReferenceType>,
    /// Case-insensitive substring matched against title and formatted citation.
    pub term: Option<String>,
}

impl ReferenceFilter {
    pub fn matches(&self, reference: &Reference) -> bool {
        if self.kind.as_ref().is_some_and(|k| *k != reference.kind) {
            return false;
        }
        match self.term.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                reference.title.to_lowercase().contains(&term)
                    || reference.formatted_citation.to_lowercase().contains(&term)
            }
        }
    }
}

pub struct ReferenceCache {
    store: Arc<dyn CredentialStore>,
    capacity: usize,
    /// `None` until first loaded from the store.
    entries: Mutex<Option<Vec<Reference>>>,
}

impl ReferenceCache {
    pub fn new(store: Arc<dyn CredentialStore>, capacity: usize) -> Self {
        Self {
            store,
            capacity: capacity.max(1),
            entries: Mutex::new(None),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn view<'g>(
        &self,
        slot: &'g mut Option<Vec<Reference>>,
    ) -> Result<&'g Vec<Reference>, StorageError> {
        if slot.is_none() {
            let loaded: Vec<Reference> = self.store.load(REFERENCES_KEY)?.unwrap_or_default();
            *slot = Some(loaded);
        }
        Ok(slot.get_or_insert_with(Vec::new))
    }

    fn commit(
        &self,
        slot: &mut Option<Vec<Reference>>,
        next: Vec<Reference>,
    ) -> Result<(), StorageError> {
        self.store.save(REFERENCES_KEY, &next)?;
        *slot = Some(next);
        Ok(())
    }

    /// Prepend `reference`, evicting the oldest entries beyond capacity.
    pub async fn insert_front(&self, reference: Reference) -> Result<(), StorageError> {
        let mut slot = self.entries.lock().await;
        let current = self.view(&mut slot)?;
        let mut next = Vec::with_capacity((current.len() + 1).min(self.capacity));
        next.push(reference);
        next.extend(current.iter().take(self.capacity - 1).cloned());
        self.commit(&mut slot, next)
    }

    /// Replace the whole cache with `references`, verbatim.
    ///
    /// The capacity is not reapplied here; the next [`insert_front`]
    /// restores it.
    ///
    /// [`insert_front`]: ReferenceCache::insert_front
    pub async fn replace_all(&self, references: Vec<Reference>) -> Result<(), StorageError> {
        let mut slot = self.entries.lock().await;
        if references.len() > self.capacity {
            tracing::warn!(
                count = references.len(),
                capacity = self.capacity,
                "synced reference list exceeds cache capacity"
            );
        }
        self.commit(&mut slot, references)
    }

    /// Drop the entry with `id`. Returns whether anything was removed.
    pub async fn remove_where(&self, id: &ReferenceId) -> Result<bool, StorageError> {
        let mut slot = self.entries.lock().await;
        let current = self.view(&mut slot)?;
        if !current.iter().any(|r| &r.id == id) {
            return Ok(false);
        }
        let next: Vec<Reference> = current.iter().filter(|r| &r.id != id).cloned().collect();
        self.commit(&mut slot, next)?;
        Ok(true)
    }

    pub async fn get_all(&self) -> Result<Vec<Reference>, StorageError> {
        let mut slot = self.entries.lock().await;
        Ok(self.view(&mut slot)?.clone())
    }

    pub async fn search(&self, filter: &ReferenceFilter) -> Result<Vec<Reference>, StorageError> {
        let mut slot = self.entries.lock().await;
        Ok(self
            .view(&mut slot)?
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    pub async fn len(&self) -> Result<usize, StorageError> {
        let mut slot = self.entries.lock().await;
        Ok(self.view(&mut slot)?.len())
    }
}
