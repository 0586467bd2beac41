//! Recreate-scoped identity registry.

use crate::{AdapterId, MnemoError, Oid};
use std::collections::BTreeMap;

/// Write-once-per-key map from Oid to the adapter recreated for it.
///
/// Reuse one instance across several `recreate_object` calls to make them
/// share identities; use a fresh one to get an independent graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedObjects {
    objects: BTreeMap<Oid, AdapterId>,
}

impl LoadedObjects {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, oid: Oid) -> Option<AdapterId> {
        self.objects.get(&oid).copied()
    }

    #[must_use]
    pub fn contains(&self, oid: Oid) -> bool {
        self.objects.contains_key(&oid)
    }

    /// Bind `oid` to `adapter`.
    ///
    /// Binding the same pair twice is a no-op; rebinding to a different
    /// adapter fails with `DuplicateIdentity`.
    pub fn insert(&mut self, oid: Oid, adapter: AdapterId) -> Result<(), MnemoError> {
        match self.objects.get(&oid) {
            Some(&existing) if existing == adapter => Ok(()),
            Some(_) => Err(MnemoError::DuplicateIdentity { oid }),
            None => {
                self.objects.insert(oid, adapter);
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Bindings in Oid order.
    pub fn iter(&self) -> impl Iterator<Item = (Oid, AdapterId)> + '_ {
        self.objects.iter().map(|(oid, id)| (*oid, *id))
    }

    /// Withdraw a binding added by a failed recreate.
    pub(crate) fn forget(&mut self, oid: Oid) {
        self.objects.remove(&oid);
    }
}
