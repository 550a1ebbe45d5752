/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/

//! # Errors
//!
//! Recoverable configuration errors are returned as [HwLockError]. Contention is not an error, a failed attempt to
//! take a lock is reported as `false`/`None`. Releasing a key based lock this processor does not hold leaves the
//! shared hardware state inconsistent, this is reported as [ReleaseViolation] through a panic.

use core::fmt;

/// Errors returned while setting up a bank or requesting locks from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HwLockError {
    /// The lock id is outside of the bank.
    InvalidId { id: usize, lock_count: usize },
    /// The lock has already been handed out to another requester.
    AlreadyClaimed { id: usize },
    /// No reservation with this name exists in the bank.
    UnknownName,
    /// Two reservations refer to the same lock id or use the same name.
    DuplicateReservation { id: usize },
    /// The configured number of locks is zero or exceeds the hardware limit.
    InvalidLockCount { lock_count: usize },
    /// The processor key can not be distinguished from a free key based token register.
    InvalidKey { key: u32 },
}

impl fmt::Display for HwLockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidId { id, lock_count } => {
                write!(f, "lock id {} out of range, bank has {} locks", id, lock_count)
            }
            Self::AlreadyClaimed { id } => write!(f, "lock {} already claimed", id),
            Self::UnknownName => f.write_str("no lock reserved under this name"),
            Self::DuplicateReservation { id } => write!(f, "lock {} reserved more than once", id),
            Self::InvalidLockCount { lock_count } => write!(f, "unsupported lock count {}", lock_count),
            Self::InvalidKey { key } => write!(f, "processor key {:#x} equals the free token value", key),
        }
    }
}

/// A key based lock has been released by a processor that does not hold it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseViolation {
    /// The released lock.
    pub id: usize,
    /// The key of the releasing processor.
    pub key: u32,
    /// The value found in the token register.
    pub found: u32,
}

impl fmt::Display for ReleaseViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hwspinlock {} released without being held: key {:#x}, token register {:#x}",
            self.id, self.key, self.found
        )
    }
}

impl ReleaseViolation {
    /// Abort the current context. The shared token registers can no longer be trusted.
    #[cold]
    #[inline(never)]
    pub(crate) fn raise(self) -> ! {
        panic!("{}", self)
    }
}
