//! Pending-order tracker
//!
//! Keyed registry of legs with an order operation in flight. Phase
//! recomputation is only allowed once every set is empty.

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::oms::types::LegId;

/// The four in-flight operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingSet {
    /// Entry submitted, not yet confirmed or canceled
    Entry,
    /// Exit submitted, not yet filled
    Exit,
    /// Working exit being canceled before a market-protected re-exit
    CancelExit,
    /// Working stop being canceled before it is reissued at cost
    SlToCost,
}

impl PendingSet {
    pub const ALL: [PendingSet; 4] = [
        PendingSet::Entry,
        PendingSet::Exit,
        PendingSet::CancelExit,
        PendingSet::SlToCost,
    ];

    /// Entry, SL-to-cost and cancel-exit are mutually exclusive per leg
    fn is_exclusive(self) -> bool {
        !matches!(self, PendingSet::Exit)
    }
}

impl fmt::Display for PendingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PendingSet::Entry => "pending_entry",
            PendingSet::Exit => "pending_exit",
            PendingSet::CancelExit => "pending_cancel_exit",
            PendingSet::SlToCost => "pending_sl_to_cost",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TrackerError {
    #[error("leg {leg} cannot join {requested} while in {existing}")]
    Conflict {
        leg: LegId,
        requested: PendingSet,
        existing: PendingSet,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Membership {
    entry: bool,
    exit: bool,
    cancel_exit: bool,
    sl_to_cost: bool,
}

impl Membership {
    fn flag(&mut self, set: PendingSet) -> &mut bool {
        match set {
            PendingSet::Entry => &mut self.entry,
            PendingSet::Exit => &mut self.exit,
            PendingSet::CancelExit => &mut self.cancel_exit,
            PendingSet::SlToCost => &mut self.sl_to_cost,
        }
    }

    fn get(&self, set: PendingSet) -> bool {
        match set {
            PendingSet::Entry => self.entry,
            PendingSet::Exit => self.exit,
            PendingSet::CancelExit => self.cancel_exit,
            PendingSet::SlToCost => self.sl_to_cost,
        }
    }

    fn is_empty(&self) -> bool {
        *self == Membership::default()
    }
}

/// Registry of legs awaiting broker confirmation
#[derive(Debug, Default, Clone)]
pub struct PendingOrderTracker {
    legs: HashMap<LegId, Membership>,
}

impl PendingOrderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `leg` to `set`. Returns `Ok(false)` if it was already there.
    pub fn add(&mut self, leg: LegId, set: PendingSet) -> Result<bool, TrackerError> {
        let membership = self.legs.entry(leg).or_default();

        if set.is_exclusive() {
            if let Some(existing) = PendingSet::ALL
                .into_iter()
                .find(|other| *other != set && other.is_exclusive() && membership.get(*other))
            {
                return Err(TrackerError::Conflict {
                    leg,
                    requested: set,
                    existing,
                });
            }
        }

        let flag = membership.flag(set);
        let added = !*flag;
        *flag = true;
        Ok(added)
    }

    /// Remove `leg` from `set`. Returns whether it was a member; absent legs are a no-op.
    pub fn discard(&mut self, leg: LegId, set: PendingSet) -> bool {
        let Some(membership) = self.legs.get_mut(&leg) else {
            return false;
        };

        let flag = membership.flag(set);
        let removed = *flag;
        *flag = false;

        if membership.is_empty() {
            self.legs.remove(&leg);
        }
        removed
    }

    pub fn contains(&self, leg: LegId, set: PendingSet) -> bool {
        self.legs.get(&leg).is_some_and(|m| m.get(set))
    }

    /// Number of legs in `set`
    pub fn len(&self, set: PendingSet) -> usize {
        self.legs.values().filter(|m| m.get(set)).count()
    }

    /// Legs in `set`, in id order
    pub fn members(&self, set: PendingSet) -> Vec<LegId> {
        let mut legs: Vec<LegId> = self
            .legs
            .iter()
            .filter(|(_, m)| m.get(set))
            .map(|(leg, _)| *leg)
            .collect();
        legs.sort();
        legs
    }

    /// True when all four sets are empty
    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    pub fn clear(&mut self) {
        self.legs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_discard_exactly_once() {
        let mut tracker = PendingOrderTracker::new();
        let leg = LegId(1);

        assert_eq!(tracker.add(leg, PendingSet::Entry), Ok(true));
        assert_eq!(tracker.add(leg, PendingSet::Entry), Ok(false));
        assert_eq!(tracker.len(PendingSet::Entry), 1);

        assert!(tracker.discard(leg, PendingSet::Entry));
        assert!(!tracker.discard(leg, PendingSet::Entry), "second discard is a no-op");
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_discard_unknown_leg_is_noop() {
        let mut tracker = PendingOrderTracker::new();
        assert!(!tracker.discard(LegId(42), PendingSet::SlToCost));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_exclusive_sets_conflict() {
        let mut tracker = PendingOrderTracker::new();
        let leg = LegId(3);

        tracker.add(leg, PendingSet::Entry).unwrap();
        assert_eq!(
            tracker.add(leg, PendingSet::SlToCost),
            Err(TrackerError::Conflict {
                leg,
                requested: PendingSet::SlToCost,
                existing: PendingSet::Entry,
            })
        );
        assert!(!tracker.contains(leg, PendingSet::SlToCost));
    }

    #[test]
    fn test_exit_combines_with_cancel_exit() {
        let mut tracker = PendingOrderTracker::new();
        let leg = LegId(5);

        tracker.add(leg, PendingSet::CancelExit).unwrap();
        tracker.add(leg, PendingSet::Exit).unwrap();
        assert!(tracker.contains(leg, PendingSet::CancelExit));
        assert!(tracker.contains(leg, PendingSet::Exit));

        tracker.discard(leg, PendingSet::CancelExit);
        assert!(!tracker.is_empty(), "pending exit still outstanding");
        tracker.discard(leg, PendingSet::Exit);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_rejected_add_keeps_existing_membership() {
        let mut tracker = PendingOrderTracker::new();
        tracker.add(LegId(1), PendingSet::CancelExit).unwrap();
        assert!(tracker.add(LegId(1), PendingSet::Entry).is_err());
        assert!(tracker.contains(LegId(1), PendingSet::CancelExit));
        assert!(!tracker.contains(LegId(1), PendingSet::Entry));
        tracker.discard(LegId(1), PendingSet::CancelExit);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_members_sorted() {
        let mut tracker = PendingOrderTracker::new();
        tracker.add(LegId(9), PendingSet::Exit).unwrap();
        tracker.add(LegId(2), PendingSet::Exit).unwrap();
        tracker.add(LegId(4), PendingSet::Entry).unwrap();
        assert_eq!(tracker.members(PendingSet::Exit), vec![LegId(2), LegId(9)]);
        tracker.clear();
        assert!(tracker.is_empty());
    }
}
