/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/

//! # Hardware Lock
//!
//! A claimed lock of a [HwLockBank]. The handle gives this processor the right to use the lock, holding it is a
//! separate step. Taking the lock is always a single non blocking attempt, waiting is expressed with a
//! [Backoff](super::Backoff) driving repeated attempts.
//!
//! # Example
//! ```no_run
//! use sprd_hwspinlock::sync::Backoff;
//! use sprd_hwspinlock::{BankConfig, Domain, HwLockBank, MmioRegisters};
//!
//! let regs = unsafe { MmioRegisters::new(0x4006_0000) };
//! let bank = HwLockBank::new(regs, BankConfig::new(Domain::Ap, 32)).unwrap();
//! let lock = bank.request_lock(7).unwrap();
//!
//! // give up after 10 attempts
//! if let Some(guard) = lock.lock_with(Backoff::new().limit(10)) {
//!     // exclusive across all processors of the SoC
//!     drop(guard);
//! };
//! ```

use super::backoff::Backoff;
use crate::bank::HwLockBank;
use crate::regs::RegisterIo;
use core::fmt;

/// A lock claimed from a [HwLockBank]. Dropping it hands the lock back to the bank, a lock still held at that point is
/// released first.
pub struct HwLock<'a, R: RegisterIo> {
    bank: &'a HwLockBank<R>,
    id: usize,
    name: Option<&'a str>,
}

/// Proof of holding a [HwLock]. The lock is released when this guard goes out of scope, unless it has been released
/// through [HwLock::release] or freed with a force clear in the meantime.
pub struct HwLockGuard<'l, 'a, R: RegisterIo> {
    lock: &'l HwLock<'a, R>,
}

impl<'a, R: RegisterIo> HwLock<'a, R> {
    pub(crate) fn new(bank: &'a HwLockBank<R>, id: usize, name: Option<&'a str>) -> Self {
        Self { bank, id, name }
    }

    /// The lock id within the bank.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The name of the reservation this lock has been claimed under.
    pub fn name(&self) -> Option<&'a str> {
        self.name
    }

    /// The bank this lock has been claimed from.
    pub fn bank(&self) -> &'a HwLockBank<R> {
        self.bank
    }

    /// Try once to take the lock. Returns `false` if another processor holds it.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        self.bank.try_acquire(self.id)
    }

    /// Release the lock. A [HwLockGuard] of this lock that is still alive will not release it a second time.
    ///
    /// # Panics
    /// On key based hardware if this processor does not hold the lock. The shared lock state is corrupted then.
    #[inline]
    pub fn release(&self) {
        self.bank.release(self.id)
    }

    /// Try once to take the lock, returning a guard releasing it on drop.
    pub fn try_lock(&self) -> Option<HwLockGuard<'_, 'a, R>> {
        if self.try_acquire() {
            Some(HwLockGuard { lock: self })
        } else {
            None
        }
    }

    /// Try to take the lock once per item of `attempts`. Returns `None` if `attempts` ran out before the lock could
    /// be taken.
    pub fn lock_with<I: IntoIterator>(&self, attempts: I) -> Option<HwLockGuard<'_, 'a, R>> {
        for _ in attempts {
            if let Some(guard) = self.try_lock() {
                return Some(guard);
            }
        }
        None
    }

    /// Take the lock, spinning until it becomes available.
    pub fn lock(&self) -> HwLockGuard<'_, 'a, R> {
        loop {
            if let Some(guard) = self.lock_with(Backoff::new()) {
                return guard;
            }
        }
    }

    /// Whether any processor holds the lock, read from the hardware.
    pub fn is_busy(&self) -> bool {
        self.bank.busy_mask() & (1 << self.id) != 0
    }

    /// The bus master holding the lock, if the hardware reports it.
    pub fn master_id(&self) -> Option<u32> {
        self.bank.master_id_of(self.id).ok().flatten()
    }
}

impl<R: RegisterIo> Drop for HwLock<'_, R> {
    fn drop(&mut self) {
        if self.bank.release_held(self.id) {
            log::debug!(
                "hwspinlock {}: lock {} released on drop of its handle",
                self.bank.domain(),
                self.id
            );
        }
        self.bank.unclaim(self.id);
    }
}

impl<R: RegisterIo> fmt::Debug for HwLock<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HwLock")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

impl<'a, R: RegisterIo> HwLockGuard<'_, 'a, R> {
    /// The lock this guard holds.
    pub fn lock(&self) -> &HwLock<'a, R> {
        self.lock
    }
}

impl<R: RegisterIo> Drop for HwLockGuard<'_, '_, R> {
    fn drop(&mut self) {
        self.lock.bank.release_held(self.lock.id);
    }
}

impl<R: RegisterIo> fmt::Debug for HwLockGuard<'_, '_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HwLockGuard")
            .field("id", &self.lock.id)
            .finish()
    }
}
