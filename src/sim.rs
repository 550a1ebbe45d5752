/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/

//! # Simulated Hardware Spinlock
//!
//! A register level model of a hardware spinlock bank to run the arbitration logic on a host. Several bus masters
//! share one [SimHwSpinlock] through their own [SimPort], each of them can drive a separate
//! [HwLockBank](crate::HwLockBank) the same way independent processors of a SoC would.
//!
//! The model follows the register contract of both protocol families:
//! - key based (V0): a write of a key to a free token register sticks, a write to a taken one is dropped, so only
//!   the first of several concurrent writers survives. Writing [NOTTAKEN_V0] frees the lock.
//! - token based (V1 and later): reading a free token register takes the lock and returns `0`, reading a taken one
//!   returns a non zero value. The master id of the holder is recorded. Writing [NOTTAKEN_V1] frees the lock.
//!
//! # Example
//! ```
//! # #[cfg(feature = "sim")]
//! # fn doc() {
//! use sprd_hwspinlock::sim::SimHwSpinlock;
//! use sprd_hwspinlock::{BankConfig, Domain, HwLockBank};
//!
//! let hw = SimHwSpinlock::new(0x100, 32);
//! let bank = HwLockBank::new(hw.port(1), BankConfig::new(Domain::Ap, 32)).unwrap();
//! let lock = bank.request_lock(3).unwrap();
//! assert!(lock.try_acquire());
//! assert_eq!(hw.holder(3), Some(1));
//! lock.release();
//! # }
//! ```

use crate::regs::{self, RegisterIo};
use crate::version::{HwVersion, ProtocolFamily};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};

/// Token state of a free token based lock in the model, taken locks store `master id + 1`.
const TOKEN_FREE: u32 = 0;

/// The shared register file of a simulated bank.
#[derive(Debug)]
pub struct SimHwSpinlock {
    version: u32,
    family: ProtocolFamily,
    tokens: Vec<AtomicU32>,
    recctrl: AtomicU32,
    clear_enable: AtomicU32,
}

impl SimHwSpinlock {
    /// Create a bank reporting `version` in its version id register with `lock_count` locks, all of them free.
    pub fn new(version: u32, lock_count: usize) -> Arc<Self> {
        let family = HwVersion::from_raw(version).family();
        let free = match family {
            ProtocolFamily::KeyBased => regs::NOTTAKEN_V0,
            ProtocolFamily::TokenBased => TOKEN_FREE,
        };
        let lock_count = lock_count.min(regs::MAX_LOCKS);

        Arc::new(Self {
            version,
            family,
            tokens: (0..lock_count).map(|_| AtomicU32::new(free)).collect(),
            recctrl: AtomicU32::new(0),
            clear_enable: AtomicU32::new(0),
        })
    }

    /// The register view of the bus master `master`.
    pub fn port(self: &Arc<Self>, master: u32) -> SimPort {
        SimPort {
            hw: Arc::clone(self),
            master,
        }
    }

    /// Whether lock `id` is currently taken by any master.
    pub fn is_taken(&self, id: usize) -> bool {
        self.tokens
            .get(id)
            .map_or(false, |token| self.token_taken(token.load(Ordering::Acquire)))
    }

    /// The current holder of lock `id`: the master id for token based banks, the written key for key based banks.
    pub fn holder(&self, id: usize) -> Option<u32> {
        let value = self.tokens.get(id)?.load(Ordering::Acquire);
        if !self.token_taken(value) {
            return None;
        }
        match self.family {
            ProtocolFamily::KeyBased => Some(value),
            ProtocolFamily::TokenBased => Some(value - 1),
        }
    }

    /// Let `master` take lock `id` behind the back of every bank, like a remote processor would.
    /// Returns `false` if the lock was taken already.
    pub fn take(&self, id: usize, master: u32) -> bool {
        let token = match self.tokens.get(id) {
            Some(token) => token,
            None => return false,
        };
        let (free, taken) = match self.family {
            ProtocolFamily::KeyBased => (regs::NOTTAKEN_V0, master),
            ProtocolFamily::TokenBased => (TOKEN_FREE, master + 1),
        };
        token
            .compare_exchange(free, taken, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// The last value written to the record control register.
    pub fn recctrl(&self) -> u32 {
        self.recctrl.load(Ordering::Acquire)
    }

    fn token_taken(&self, value: u32) -> bool {
        match self.family {
            ProtocolFamily::KeyBased => value != regs::NOTTAKEN_V0,
            ProtocolFamily::TokenBased => value != TOKEN_FREE,
        }
    }

    fn free_value(&self) -> u32 {
        match self.family {
            ProtocolFamily::KeyBased => regs::NOTTAKEN_V0,
            ProtocolFamily::TokenBased => TOKEN_FREE,
        }
    }

    fn busy_mask(&self) -> u32 {
        self.tokens
            .iter()
            .enumerate()
            .filter(|(_, token)| self.token_taken(token.load(Ordering::Acquire)))
            .fold(0, |mask, (id, _)| mask | (1 << id))
    }

    fn clear(&self, mask: u32) {
        if self.clear_enable.load(Ordering::Acquire) != regs::ENABLE_CLEAR {
            return;
        }
        let free = self.free_value();
        for (id, token) in self.tokens.iter().enumerate() {
            if mask & (1 << id) != 0 {
                token.store(free, Ordering::Release);
            }
        }
    }

    /// The per lock register addressed by `offset` within `base`, if any.
    fn lock_index(&self, offset: usize, base: usize) -> Option<usize> {
        if offset < base || (offset - base) % 4 != 0 {
            return None;
        }
        let id = (offset - base) / 4;
        if id < self.tokens.len() {
            Some(id)
        } else {
            None
        }
    }

    fn read(&self, offset: usize, master: u32) -> u32 {
        match offset {
            regs::RECCTRL => return self.recctrl(),
            regs::TTLSTS => return self.busy_mask(),
            regs::CLEAREN => return self.clear_enable.load(Ordering::Acquire),
            regs::VERID => return self.version,
            _ => (),
        }

        match self.family {
            ProtocolFamily::KeyBased => self
                .lock_index(offset, regs::token_v0(0))
                .map_or(0, |id| self.tokens[id].load(Ordering::Acquire)),
            ProtocolFamily::TokenBased => {
                if let Some(id) = self.lock_index(offset, regs::token_v1(0)) {
                    // reading a free token claims it for the reading master
                    match self.tokens[id].compare_exchange(
                        TOKEN_FREE,
                        master + 1,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => 0,
                        Err(holder) => holder,
                    }
                } else if let Some(id) = self.lock_index(offset, regs::master_id(0)) {
                    self.tokens[id].load(Ordering::Acquire).saturating_sub(1)
                } else {
                    0
                }
            }
        }
    }

    fn write(&self, offset: usize, value: u32) {
        match offset {
            regs::CLEAR => return self.clear(value),
            regs::RECCTRL => return self.recctrl.store(value, Ordering::Release),
            regs::CLEAREN => return self.clear_enable.store(value, Ordering::Release),
            _ => (),
        }

        match self.family {
            ProtocolFamily::KeyBased => {
                if let Some(id) = self.lock_index(offset, regs::token_v0(0)) {
                    if value == regs::NOTTAKEN_V0 {
                        self.tokens[id].store(value, Ordering::Release);
                    } else {
                        // only the first writer to a free token survives
                        let _ = self.tokens[id].compare_exchange(
                            regs::NOTTAKEN_V0,
                            value,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        );
                    }
                }
            }
            ProtocolFamily::TokenBased => {
                if let Some(id) = self.lock_index(offset, regs::token_v1(0)) {
                    if value == regs::NOTTAKEN_V1 {
                        self.tokens[id].store(TOKEN_FREE, Ordering::Release);
                    }
                }
            }
        }
    }
}

/// One bus master's access to a [SimHwSpinlock].
#[derive(Debug, Clone)]
pub struct SimPort {
    hw: Arc<SimHwSpinlock>,
    master: u32,
}

impl SimPort {
    /// The master id of this port.
    pub fn master(&self) -> u32 {
        self.master
    }

    /// The simulated bank behind this port.
    pub fn hw(&self) -> &Arc<SimHwSpinlock> {
        &self.hw
    }
}

impl RegisterIo for SimPort {
    fn read(&self, offset: usize) -> u32 {
        self.hw.read(offset, self.master)
    }

    fn write(&self, offset: usize, value: u32) {
        self.hw.write(offset, value)
    }
}
