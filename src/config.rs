/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/

//! # Bank Configuration
//!
//! Everything a bank needs to know that can not be read from the hardware itself. This is typically filled from the
//! devicetree of the board, parsing it is left to the caller.
//!
//! # Example
//! ```
//! use sprd_hwspinlock::{BankConfig, Domain, Reservation};
//!
//! let config = BankConfig::new(Domain::Aon, 32)
//!     .reserve(Reservation::new("adi", 0))
//!     .reserve(Reservation::new("glb", 1).field(0, 16));
//! assert_eq!(config.reservations().len(), 2);
//! ```

use crate::error::HwLockError;
use crate::regs;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// The power domain hosting a bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// Always-on domain.
    Aon,
    /// Application processor domain.
    Ap,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Aon => f.write_str("aon"),
            Domain::Ap => f.write_str("ap"),
        }
    }
}

/// A lock set aside for a fixed purpose of the SoC, e.g. arbitration of the ADI bus. Consumers look it up by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    name: String,
    id: usize,
    bit_offset: u32,
    bit_width: u32,
}

impl Reservation {
    /// Reserve lock `id` under `name`. No register field is attached until [Reservation::field] is called.
    pub fn new(name: impl Into<String>, id: usize) -> Self {
        Self {
            name: name.into(),
            id,
            bit_offset: 0,
            bit_width: 0,
        }
    }

    /// The register field guarded by this lock.
    pub fn field(mut self, bit_offset: u32, bit_width: u32) -> Self {
        self.bit_offset = bit_offset;
        self.bit_width = bit_width;
        self
    }

    /// The symbolic name consumers look the lock up by.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The reserved lock id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// First bit of the guarded register field.
    pub fn bit_offset(&self) -> u32 {
        self.bit_offset
    }

    /// Width of the guarded register field, `0` if no field is attached.
    pub fn bit_width(&self) -> u32 {
        self.bit_width
    }
}

/// Static configuration of one bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankConfig {
    domain: Domain,
    lock_count: usize,
    processor_key: u32,
    reservations: Vec<Reservation>,
}

impl BankConfig {
    /// A bank in `domain` with `lock_count` locks, no reservations and the
    /// [DEFAULT_PROCESSOR_KEY](regs::DEFAULT_PROCESSOR_KEY).
    pub fn new(domain: Domain, lock_count: usize) -> Self {
        Self {
            domain,
            lock_count,
            processor_key: regs::DEFAULT_PROCESSOR_KEY,
            reservations: Vec::new(),
        }
    }

    /// The key this processor writes to take a lock on key based hardware. Must be unique per processor.
    pub fn processor_key(mut self, key: u32) -> Self {
        self.processor_key = key;
        self
    }

    /// Add a reservation. Conflicts are reported by [BankConfig::validate], not here.
    pub fn reserve(mut self, reservation: Reservation) -> Self {
        self.reservations.push(reservation);
        self
    }

    /// The power domain hosting the bank.
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Number of locks of the bank.
    pub fn lock_count(&self) -> usize {
        self.lock_count
    }

    /// The configured processor key, see [BankConfig::processor_key].
    pub fn key(&self) -> u32 {
        self.processor_key
    }

    /// All reservations in the order they were added.
    pub fn reservations(&self) -> &[Reservation] {
        &self.reservations
    }

    /// Check the configuration for consistency: the lock count fits the hardware, the key differs from the free
    /// value and every reservation names a distinct lock of the bank under a distinct name.
    pub fn validate(&self) -> Result<(), HwLockError> {
        if self.lock_count == 0 || self.lock_count > regs::MAX_LOCKS {
            return Err(HwLockError::InvalidLockCount {
                lock_count: self.lock_count,
            });
        }
        if self.processor_key == regs::NOTTAKEN_V0 {
            return Err(HwLockError::InvalidKey {
                key: self.processor_key,
            });
        }

        for (idx, reservation) in self.reservations.iter().enumerate() {
            if reservation.id >= self.lock_count {
                return Err(HwLockError::InvalidId {
                    id: reservation.id,
                    lock_count: self.lock_count,
                });
            }
            let duplicate = self.reservations[..idx]
                .iter()
                .any(|other| other.id == reservation.id || other.name == reservation.name);
            if duplicate {
                return Err(HwLockError::DuplicateReservation { id: reservation.id });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_config() {
        let config = BankConfig::new(Domain::Ap, 32)
            .processor_key(0x2)
            .reserve(Reservation::new("adi", 0))
            .reserve(Reservation::new("glb", 1).field(4, 2));
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.key(), 0x2);
        assert_eq!(config.reservations()[1].bit_offset(), 4);
        assert_eq!(config.reservations()[1].bit_width(), 2);
    }

    #[test]
    fn lock_count_limits() {
        assert_eq!(
            BankConfig::new(Domain::Ap, 0).validate(),
            Err(HwLockError::InvalidLockCount { lock_count: 0 })
        );
        assert_eq!(
            BankConfig::new(Domain::Ap, 33).validate(),
            Err(HwLockError::InvalidLockCount { lock_count: 33 })
        );
        assert_eq!(BankConfig::new(Domain::Aon, 1).validate(), Ok(()));
    }

    #[test]
    fn reservation_out_of_range() {
        let config = BankConfig::new(Domain::Ap, 8).reserve(Reservation::new("adc", 8));
        assert_eq!(
            config.validate(),
            Err(HwLockError::InvalidId { id: 8, lock_count: 8 })
        );
    }

    #[test]
    fn duplicate_reservations() {
        let same_id = BankConfig::new(Domain::Ap, 8)
            .reserve(Reservation::new("adi", 2))
            .reserve(Reservation::new("glb", 2));
        assert_eq!(
            same_id.validate(),
            Err(HwLockError::DuplicateReservation { id: 2 })
        );

        let same_name = BankConfig::new(Domain::Ap, 8)
            .reserve(Reservation::new("adi", 2))
            .reserve(Reservation::new("adi", 3));
        assert_eq!(
            same_name.validate(),
            Err(HwLockError::DuplicateReservation { id: 3 })
        );
    }

    #[test]
    fn key_must_differ_from_free_value() {
        let config = BankConfig::new(Domain::Ap, 8).processor_key(regs::NOTTAKEN_V0);
        assert_eq!(
            config.validate(),
            Err(HwLockError::InvalidKey {
                key: regs::NOTTAKEN_V0
            })
        );
    }
}
