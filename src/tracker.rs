/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/

//! # Lock State Tracker
//!
//! Locally known busy state of the locks of a bank. This is a cache of what this processor did: it is updated after
//! every successful acquire and release, but a lock taken by a remote processor is not visible here. The
//! authoritative state is the total status register, see [HwLockBank::is_busy](crate::HwLockBank::is_busy).

use crate::regs;
use spin::Mutex;

/// One held bit per lock id. Ids without a bit in the 32 bit lock mask are never held.
#[derive(Debug, Default)]
pub struct LockStateTracker {
    held: Mutex<u32>,
}

impl LockStateTracker {
    /// A tracker with every lock free.
    pub const fn new() -> Self {
        Self {
            held: Mutex::new(0),
        }
    }

    /// Remember lock `id` as held or free. Ids beyond [MAX_LOCKS](regs::MAX_LOCKS) are ignored.
    pub fn record_state(&self, id: usize, held: bool) {
        let bit = match regs::lock_bit(id) {
            Some(bit) => bit,
            None => return,
        };
        let mut mask = self.held.lock();
        if held {
            *mask |= bit;
        } else {
            *mask &= !bit;
        }
    }

    /// Record lock `id` as free, returning whether it was recorded as held before.
    pub fn take_held(&self, id: usize) -> bool {
        let bit = match regs::lock_bit(id) {
            Some(bit) => bit,
            None => return false,
        };
        let mut mask = self.held.lock();
        let was_held = *mask & bit != 0;
        *mask &= !bit;
        was_held
    }

    /// The last recorded state of lock `id`. Never reads the hardware.
    pub fn query_busy(&self, id: usize) -> bool {
        regs::lock_bit(id).map_or(false, |bit| *self.held.lock() & bit != 0)
    }

    /// One bit per lock id this processor holds.
    pub fn held_mask(&self) -> u32 {
        *self.held.lock()
    }

    /// Whether this processor holds any lock at all.
    pub fn any_held(&self) -> bool {
        self.held_mask() != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_states() {
        let tracker = LockStateTracker::new();
        assert!(!tracker.any_held());

        tracker.record_state(0, true);
        tracker.record_state(31, true);
        assert!(tracker.query_busy(0));
        assert!(tracker.query_busy(31));
        assert!(!tracker.query_busy(1));
        assert_eq!(tracker.held_mask(), 0x8000_0001);

        tracker.record_state(0, false);
        tracker.record_state(0, false);
        assert!(!tracker.query_busy(0));
        assert_eq!(tracker.held_mask(), 0x8000_0000);
    }

    #[test]
    fn take_held_clears_once() {
        let tracker = LockStateTracker::new();
        tracker.record_state(7, true);
        assert!(tracker.take_held(7));
        assert!(!tracker.take_held(7));
        assert!(!tracker.any_held());
    }

    #[test]
    fn ids_beyond_the_mask_are_never_held() {
        let tracker = LockStateTracker::new();
        tracker.record_state(32, true);
        tracker.record_state(usize::MAX, true);
        assert!(!tracker.query_busy(32));
        assert!(!tracker.take_held(32));
        assert_eq!(tracker.held_mask(), 0);

        tracker.record_state(31, true);
        tracker.record_state(64, false);
        assert_eq!(tracker.held_mask(), 0x8000_0000);
    }
}
