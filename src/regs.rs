/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/

//! # Register Access
//!
//! Raw access to the memory mapped register window of one hardware spinlock controller. All accesses are 32 bit
//! wide and *relaxed*: they are volatile, but no memory barrier is issued. Ordering of the arbitration sequence is
//! provided by the bus semantics of the token registers themselves.

use core::ptr;

/// Abnormal clear trigger, one bit per lock id.
pub const CLEAR: usize = 0x0;
/// Record control. Enables recording of the master id that took a lock.
pub const RECCTRL: usize = 0x4;
/// Total status, one busy bit per lock id.
pub const TTLSTS: usize = 0x8;
/// Abnormal clear enable. The CLEAR trigger is only latched while this holds [ENABLE_CLEAR].
pub const CLEAREN: usize = 0xC;
/// Hardware version id.
pub const VERID: usize = 0xFFC;

/// Value that is read from a free key based (V0) token register: `"RLSL"`.
pub const NOTTAKEN_V0: u32 = 0x524C_534C;
/// Value that frees a token based (V1 and later) lock when written to its token register.
pub const NOTTAKEN_V1: u32 = 0x55AA_10C5;
/// Magic value enabling the abnormal clear path.
pub const ENABLE_CLEAR: u32 = 0x454E;
/// RECCTRL bits to record the user/master id of the current lock holder.
pub const RECORD_USER_BITS: u32 = 0x1;
/// Key this processor writes into a key based token register if nothing else is configured.
pub const DEFAULT_PROCESSOR_KEY: u32 = 0x1;
/// Upper bound of locks per bank, CLEAR and TTLSTS are 32 bit masks.
pub const MAX_LOCKS: usize = 32;

/// The bit of lock `id` in the CLEAR and TTLSTS masks. `None` for ids no bank can have.
#[inline]
pub const fn lock_bit(id: usize) -> Option<u32> {
    if id < MAX_LOCKS {
        Some(1 << id)
    } else {
        None
    }
}

/// Offset of the master id register of a lock.
#[inline]
pub const fn master_id(id: usize) -> usize {
    0x80 + 0x4 * id
}

/// Offset of the key based (V0) token register of a lock. It aliases the master id register.
#[inline]
pub const fn token_v0(id: usize) -> usize {
    0x80 + 0x4 * id
}

/// Offset of the token based (V1 and later) token register of a lock.
#[inline]
pub const fn token_v1(id: usize) -> usize {
    0x800 + 0x4 * id
}

/// Read and write access to the register window of a hardware spinlock bank. Offsets are relative to the bank
/// base address.
pub trait RegisterIo {
    /// Read the 32 bit register at `offset`.
    fn read(&self, offset: usize) -> u32;

    /// Write `value` to the 32 bit register at `offset`.
    fn write(&self, offset: usize, value: u32);
}

impl<T: RegisterIo + ?Sized> RegisterIo for &T {
    #[inline]
    fn read(&self, offset: usize) -> u32 {
        (**self).read(offset)
    }

    #[inline]
    fn write(&self, offset: usize, value: u32) {
        (**self).write(offset, value)
    }
}

/// The register window of a bank mapped into the current address space.
#[derive(Debug)]
pub struct MmioRegisters {
    base: usize,
}

impl MmioRegisters {
    /// Access the register window mapped at `base`.
    ///
    /// # Safety
    /// `base` must be the virtual address of a mapped hardware spinlock register window of at least 4kB that stays
    /// mapped for the lifetime of this value.
    /// # Example
    /// ```no_run
    /// # use sprd_hwspinlock::MmioRegisters;
    /// let regs = unsafe { MmioRegisters::new(0x4006_0000) };
    /// ```
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    /// The base address of the register window.
    pub fn base(&self) -> usize {
        self.base
    }
}

impl RegisterIo for MmioRegisters {
    #[inline]
    fn read(&self, offset: usize) -> u32 {
        // SAFETY: the window has been guaranteed to be mapped when creating this instance
        unsafe { ptr::read_volatile((self.base + offset) as *const u32) }
    }

    #[inline]
    fn write(&self, offset: usize, value: u32) {
        // SAFETY: the window has been guaranteed to be mapped when creating this instance
        unsafe { ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }
}
