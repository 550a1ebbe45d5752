/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/

//! # Abnormal Clear
//!
//! Forces a lock back into the free state, whoever holds it. Meant for recovery after a processor holding a lock
//! crashed, never for the regular release path. The hardware only latches the clear trigger while the clear enable
//! register holds the enable value, so the three writes must happen in exactly this order. Nothing is read back.

use crate::error::HwLockError;
use crate::regs::{self, RegisterIo};

/// Free lock `id` regardless of its holder. Ids beyond [MAX_LOCKS](regs::MAX_LOCKS) are rejected without touching
/// the hardware.
pub fn force_clear<R: RegisterIo>(regs: &R, id: usize) -> Result<(), HwLockError> {
    let bit = regs::lock_bit(id).ok_or(HwLockError::InvalidId {
        id,
        lock_count: regs::MAX_LOCKS,
    })?;

    regs.write(regs::CLEAREN, regs::ENABLE_CLEAR);
    regs.write(regs::CLEAR, bit);
    regs.write(regs::CLEAREN, !regs::ENABLE_CLEAR);
    Ok(())
}

/// Free the locks `0..lock_count`.
pub fn force_clear_all<R: RegisterIo>(regs: &R, lock_count: usize) -> Result<(), HwLockError> {
    if lock_count > regs::MAX_LOCKS {
        return Err(HwLockError::InvalidLockCount { lock_count });
    }
    for id in 0..lock_count {
        force_clear(regs, id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimHwSpinlock;
    use core::cell::RefCell;

    /// Records every register write.
    struct WriteLog(RefCell<Vec<(usize, u32)>>);

    impl RegisterIo for WriteLog {
        fn read(&self, _offset: usize) -> u32 {
            0
        }

        fn write(&self, offset: usize, value: u32) {
            self.0.borrow_mut().push((offset, value));
        }
    }

    #[test]
    fn clear_sequence() {
        let log = WriteLog(RefCell::new(Vec::new()));
        force_clear(&log, 5).unwrap();
        assert_eq!(
            *log.0.borrow(),
            vec![
                (regs::CLEAREN, regs::ENABLE_CLEAR),
                (regs::CLEAR, 1 << 5),
                (regs::CLEAREN, !regs::ENABLE_CLEAR),
            ]
        );
    }

    #[test]
    fn clear_all_stays_within_the_bank() {
        let log = WriteLog(RefCell::new(Vec::new()));
        force_clear_all(&log, 32).unwrap();
        let triggers: Vec<u32> = log
            .0
            .borrow()
            .iter()
            .filter(|(offset, _)| *offset == regs::CLEAR)
            .map(|(_, value)| *value)
            .collect();
        assert_eq!(triggers.len(), 32);
        assert_eq!(triggers[0], 1);
        assert_eq!(triggers[31], 1 << 31);
    }

    #[test]
    fn clears_foreign_holder() {
        for version in [0, 0x100].iter() {
            let hw = SimHwSpinlock::new(*version, 32);
            assert!(hw.take(7, 3));
            assert!(hw.take(8, 3));

            force_clear(&hw.port(0), 7).unwrap();
            assert!(!hw.is_taken(7));
            assert!(hw.is_taken(8));

            force_clear_all(&hw.port(0), 32).unwrap();
            assert!(!hw.is_taken(8));
        }
    }

    #[test]
    fn ids_beyond_the_mask_are_rejected() {
        let log = WriteLog(RefCell::new(Vec::new()));
        assert_eq!(
            force_clear(&log, 32),
            Err(HwLockError::InvalidId {
                id: 32,
                lock_count: regs::MAX_LOCKS
            })
        );
        assert_eq!(
            force_clear_all(&log, 33),
            Err(HwLockError::InvalidLockCount { lock_count: 33 })
        );
        assert!(log.0.borrow().is_empty());

        let hw = SimHwSpinlock::new(0x100, 32);
        assert!(hw.take(31, 2));
        assert!(force_clear_all(&hw.port(0), 33).is_err());
        assert!(hw.is_taken(31));
    }
}
