//! # Identity Map / Object Loader
//!
//! The single authority mapping [`Oid`] to adapter within a session, and the
//! only component that changes an adapter's [`ResolveState`] or Oid.
//!
//! Guarantees:
//! - At most one registered adapter per Oid.
//! - Every lifecycle change is validated against the resolve-state table.
//! - `adapter_for_else_recreate` runs its recreate function at most once per
//!   Oid. The function only sees the [`ObjectSpace`], never the loader, so it
//!   cannot re-enter the map while the Oid is still unregistered.
//!
//! The loader is an owned value: one per session or unit of work. There is
//! no process-wide instance.

use crate::resolve::ResolveState;
use crate::space::{Adapter, AdapterView, ObjectSpace};
use crate::{AdapterId, MnemoError, Oid};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Identity map over an owned adapter arena.
#[derive(Debug, Clone, Default)]
pub struct ObjectLoader {
    space: ObjectSpace,
    identities: BTreeMap<Oid, AdapterId>,
}

impl ObjectLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The adapter arena.
    #[must_use]
    pub fn space(&self) -> &ObjectSpace {
        &self.space
    }

    /// Mutable access to the arena for field updates.
    pub fn space_mut(&mut self) -> &mut ObjectSpace {
        &mut self.space
    }

    // =========================================================================
    // IDENTITY
    // =========================================================================

    /// Adapter registered for `oid`, if any. No resolution is triggered.
    #[must_use]
    pub fn adapter_for(&self, oid: Oid) -> Option<AdapterId> {
        self.identities.get(&oid).copied()
    }

    /// Cached adapter for `oid`, or the result of `recreate` registered under it.
    ///
    /// An adapter returned by `recreate` in state `NEW` is moved to `GHOST`:
    /// it now has an identity but no loaded fields. If `recreate` or the
    /// binding fails, adapters allocated during the call are discarded.
    pub fn adapter_for_else_recreate<F>(&mut self, oid: Oid, recreate: F) -> Result<AdapterId, MnemoError>
    where
        F: FnOnce(&mut ObjectSpace) -> Result<AdapterId, MnemoError>,
    {
        if let Some(id) = self.adapter_for(oid) {
            trace!(%oid, adapter = %id, "identity map hit");
            return Ok(id);
        }

        let first_new = self.space.next_id();
        let bound = match recreate(&mut self.space) {
            Ok(id) => self.bind_recreated(oid, id).map(|()| id),
            Err(e) => Err(e),
        };
        match bound {
            Ok(id) => {
                debug!(%oid, adapter = %id, "recreated adapter");
                Ok(id)
            }
            Err(e) => {
                self.discard_from(first_new);
                Err(e)
            }
        }
    }

    fn bind_recreated(&mut self, oid: Oid, id: AdapterId) -> Result<(), MnemoError> {
        self.register_identity(oid, id)?;
        if self.space.state(id)? == ResolveState::New {
            self.change_state(id, ResolveState::Ghost)?;
        }
        Ok(())
    }

    /// Bind `oid` to `adapter` and assign the adapter's Oid.
    ///
    /// Re-registering the same pair is a no-op. Binding an Oid that already
    /// belongs to a different adapter fails with `DuplicateIdentity`.
    pub fn register_identity(&mut self, oid: Oid, adapter: AdapterId) -> Result<(), MnemoError> {
        match self.identities.get(&oid) {
            Some(&existing) if existing == adapter => return Ok(()),
            Some(_) => return Err(MnemoError::DuplicateIdentity { oid }),
            None => {}
        }

        self.space.set_oid(adapter, oid)?;
        self.identities.insert(oid, adapter);
        debug!(%oid, %adapter, "registered identity");
        Ok(())
    }

    /// Number of registered identities.
    #[must_use]
    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    /// Registered identities in Oid order.
    pub fn identities(&self) -> impl Iterator<Item = (Oid, AdapterId)> + '_ {
        self.identities.iter().map(|(oid, id)| (*oid, *id))
    }

    // =========================================================================
    // ADAPTER CREATION
    // =========================================================================

    /// Create a never-persisted adapter (`NEW -> TRANSIENT`).
    pub fn create_transient(&mut self, type_name: impl Into<String>) -> Result<AdapterId, MnemoError> {
        let id = self.space.create(type_name);
        self.change_state(id, ResolveState::Transient)?;
        Ok(id)
    }

    /// Cached adapter for `oid`, or a new unloaded `GHOST` of `type_name`.
    pub fn recreate_ghost(&mut self, oid: Oid, type_name: &str) -> Result<AdapterId, MnemoError> {
        self.adapter_for_else_recreate(oid, |space| Ok(space.create(type_name)))
    }

    /// Give a transient adapter its persistent identity (`TRANSIENT -> RESOLVED`).
    pub fn make_persistent(&mut self, adapter: AdapterId, oid: Oid) -> Result<(), MnemoError> {
        let state = self.space.state(adapter)?;
        if state != ResolveState::Transient {
            return Err(MnemoError::InvalidTransition {
                from: state,
                to: ResolveState::Resolved,
            });
        }
        self.register_identity(oid, adapter)?;
        self.change_state(adapter, ResolveState::Resolved)
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Apply a validated state transition.
    pub fn change_state(&mut self, adapter: AdapterId, next: ResolveState) -> Result<(), MnemoError> {
        let from = self.space.state(adapter)?;
        if !from.can_change_to(next) {
            return Err(MnemoError::InvalidTransition { from, to: next });
        }
        self.space.set_state(adapter, next)?;
        trace!(%adapter, from = from.code(), to = next.code(), "state change");
        Ok(())
    }

    /// Enter a load phase: `target` must be `RESOLVING`, `RESOLVING_PART` or `UPDATING`.
    pub fn start_resolving(&mut self, adapter: AdapterId, target: ResolveState) -> Result<(), MnemoError> {
        if !target.is_resolving() {
            let from = self.space.state(adapter)?;
            return Err(MnemoError::InvalidTransition { from, to: target });
        }
        self.change_state(adapter, target)
    }

    /// Leave the current load phase for its terminal state.
    pub fn end_resolving(&mut self, adapter: AdapterId) -> Result<(), MnemoError> {
        let from = self.space.state(adapter)?;
        let Some(end) = from.end_state() else {
            return Err(MnemoError::InvalidTransition {
                from,
                to: ResolveState::Resolved,
            });
        };
        self.change_state(adapter, end)
    }

    // =========================================================================
    // EVICTION
    // =========================================================================

    /// Drop the identity binding of `adapter`, returning the Oid it held.
    ///
    /// The adapter itself stays in the arena; handles to it remain valid.
    pub fn unloaded(&mut self, adapter: AdapterId) -> Result<Option<Oid>, MnemoError> {
        let Some(oid) = self.space.oid(adapter)? else {
            return Ok(None);
        };
        if self.identities.get(&oid) == Some(&adapter) {
            self.identities.remove(&oid);
            debug!(%oid, %adapter, "unloaded identity");
            return Ok(Some(oid));
        }
        Ok(None)
    }

    /// Clear every identity and every adapter.
    ///
    /// All previously issued handles become invalid.
    pub fn reset(&mut self) {
        debug!(
            identities = self.identities.len(),
            adapters = self.space.len(),
            "identity map reset"
        );
        self.identities.clear();
        self.space.clear();
    }

    /// Remove every adapter allocated at or after `first`.
    fn discard_from(&mut self, first: AdapterId) {
        let fresh: Vec<AdapterId> = self
            .space
            .iter()
            .map(Adapter::id)
            .filter(|id| *id >= first)
            .collect();
        for id in fresh {
            self.discard(id);
        }
    }

    /// Remove an adapter created during a failed operation.
    pub(crate) fn discard(&mut self, adapter: AdapterId) {
        if let Some(removed) = self.space.remove(adapter)
            && let Some(oid) = removed.oid()
            && self.identities.get(&oid) == Some(&adapter)
        {
            self.identities.remove(&oid);
        }
    }
}

impl AdapterView for ObjectLoader {
    fn adapter(&self, id: AdapterId) -> Result<&Adapter, MnemoError> {
        self.space.adapter(id)
    }
}

// =============================================================================
// TESTS
// =============================================================================
