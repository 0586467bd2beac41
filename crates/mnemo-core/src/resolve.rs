//! # Resolve-State Machine
//!
//! The lazy-loading lifecycle of an adapter.
//!
//! ```text
//! NEW            -> GHOST | TRANSIENT
//! GHOST          -> RESOLVING | RESOLVING_PART | UPDATING
//! TRANSIENT      -> RESOLVED
//! RESOLVING_PART -> PART_RESOLVED | RESOLVED
//! PART_RESOLVED  -> RESOLVING
//! RESOLVING      -> RESOLVED
//! RESOLVED       -> UPDATING
//! UPDATING       -> RESOLVED
//! ```
//!
//! The table is total: every `(from, to)` pair has a defined answer, and every
//! self-transition is illegal. Transitions are applied only through the
//! [`ObjectLoader`](crate::loader::ObjectLoader).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResolveState {
    /// Just constructed, no identity, no fields.
    New,
    /// Never persisted; fields present.
    Transient,
    /// Persistent identity known, fields not loaded.
    Ghost,
    /// Full load in progress.
    Resolving,
    /// Partial load in progress.
    ResolvingPart,
    /// Value fields loaded, associations not yet.
    PartResolved,
    /// Fully loaded.
    Resolved,
    /// Refresh in progress.
    Updating,
}

impl ResolveState {
    /// Every state, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::New,
        Self::Transient,
        Self::Ghost,
        Self::Resolving,
        Self::ResolvingPart,
        Self::PartResolved,
        Self::Resolved,
        Self::Updating,
    ];

    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub const fn can_change_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::New, Self::Ghost | Self::Transient)
                | (
                    Self::Ghost,
                    Self::Resolving | Self::ResolvingPart | Self::Updating
                )
                | (Self::Transient, Self::Resolved)
                | (Self::ResolvingPart, Self::PartResolved | Self::Resolved)
                | (Self::PartResolved, Self::Resolving)
                | (Self::Resolving, Self::Resolved)
                | (Self::Resolved, Self::Updating)
                | (Self::Updating, Self::Resolved)
        )
    }

    /// Whether the adapter's fields may be read.
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        matches!(
            self,
            Self::Resolved | Self::PartResolved | Self::Updating | Self::Transient
        )
    }

    /// Whether a load or refresh is in progress.
    #[must_use]
    pub const fn is_resolving(self) -> bool {
        matches!(self, Self::Resolving | Self::ResolvingPart | Self::Updating)
    }

    /// Whether the state implies a persistent identity.
    #[must_use]
    pub const fn is_persistent(self) -> bool {
        !matches!(self, Self::New | Self::Transient)
    }

    /// The state a load phase ends in, for resolving states.
    #[must_use]
    pub const fn end_state(self) -> Option<Self> {
        match self {
            Self::Resolving | Self::Updating => Some(Self::Resolved),
            Self::ResolvingPart => Some(Self::PartResolved),
            _ => None,
        }
    }

    /// Short code used in logs and tabular output.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::New => "N",
            Self::Transient => "T",
            Self::Ghost => "G",
            Self::Resolving => "r",
            Self::ResolvingPart => "p",
            Self::PartResolved => "P",
            Self::Resolved => "R",
            Self::Updating => "U",
        }
    }

    /// Upper-case name of the state.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Transient => "TRANSIENT",
            Self::Ghost => "GHOST",
            Self::Resolving => "RESOLVING",
            Self::ResolvingPart => "RESOLVING_PART",
            Self::PartResolved => "PART_RESOLVED",
            Self::Resolved => "RESOLVED",
            Self::Updating => "UPDATING",
        }
    }

    /// Legal successor states.
    pub fn successors(self) -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(move |s| self.can_change_to(*s))
    }
}

impl fmt::Display for ResolveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Free-function form of [`ResolveState::can_change_to`].
#[must_use]
pub const fn is_valid_to_change_to(from: ResolveState, to: ResolveState) -> bool {
    from.can_change_to(to)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::ResolveState::*;
    use super::*;
    use std::collections::{BTreeSet, VecDeque};

    const LEGAL: &[(ResolveState, ResolveState)] = &[
        (New, Ghost),
        (New, Transient),
        (Ghost, Resolving),
        (Ghost, ResolvingPart),
        (Ghost, Updating),
        (Transient, Resolved),
        (ResolvingPart, PartResolved),
        (ResolvingPart, Resolved),
        (PartResolved, Resolving),
        (Resolving, Resolved),
        (Resolved, Updating),
        (Updating, Resolved),
    ];

    #[test]
    fn table_matches_every_pair() {
        for from in ResolveState::ALL {
            for to in ResolveState::ALL {
                let expected = LEGAL.contains(&(from, to));
                assert_eq!(
                    is_valid_to_change_to(from, to),
                    expected,
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn self_transitions_are_illegal() {
        for state in ResolveState::ALL {
            assert!(!state.can_change_to(state), "{state}");
        }
    }

    #[test]
    fn every_state_has_a_successor() {
        for state in ResolveState::ALL {
            assert!(state.successors().next().is_some(), "{state} is trapped");
        }
    }

    #[test]
    fn every_state_reachable_from_new_reaches_resolved() {
        let reachable = |start: ResolveState| {
            let mut seen = BTreeSet::from([start]);
            let mut queue = VecDeque::from([start]);
            while let Some(s) = queue.pop_front() {
                for next in s.successors() {
                    if seen.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
            seen
        };

        let from_new = reachable(New);
        assert_eq!(from_new.len(), ResolveState::ALL.len());
        for state in from_new {
            assert!(reachable(state).contains(&Resolved), "{state}");
        }
    }

    #[test]
    fn readable_states() {
        let readable: Vec<_> = ResolveState::ALL
            .into_iter()
            .filter(|s| s.is_resolved())
            .collect();
        assert_eq!(readable, vec![Transient, PartResolved, Resolved, Updating]);
    }

    #[test]
    fn end_states_of_resolving_phases() {
        assert_eq!(Resolving.end_state(), Some(Resolved));
        assert_eq!(ResolvingPart.end_state(), Some(PartResolved));
        assert_eq!(Updating.end_state(), Some(Resolved));
        assert_eq!(Ghost.end_state(), None);
        assert_eq!(Resolved.end_state(), None);
        for state in ResolveState::ALL {
            if let Some(end) = state.end_state() {
                assert!(state.is_resolving());
                assert!(state.can_change_to(end));
            }
        }
    }

    #[test]
    fn persistence_follows_identity() {
        assert!(!New.is_persistent());
        assert!(!Transient.is_persistent());
        assert!(Ghost.is_persistent());
        assert!(Resolved.is_persistent());
    }
}
