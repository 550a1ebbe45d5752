/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/
#![doc(html_root_url = "https://docs.rs/sprd-hwspinlock/||VERSION||")]
#![cfg_attr(not(any(test, doctest)), no_std)]

//! # Hardware spinlocks for Spreadtrum/Unisoc SoCs
//!
//! This crate drives the hardware spinlock controller found on Spreadtrum/Unisoc SoCs. The controller provides a
//! bank of up to 32 locks implemented as memory mapped *token* registers. As the arbitration happens in hardware the
//! locks provide mutual exclusion between processors that do not share cache coherent memory, e.g. the application
//! cores and the power management or modem processors of the SoC. A software lock can not replace them there.
//!
//! ## Usage Hint:
//! Taking a lock is always a single attempt that never blocks. Waiting for a lock is done by the caller, driven by a
//! [Backoff](sync::Backoff) or the blocking [HwLock::lock]. The silicon revision is detected once when the bank is
//! set up and selects the arbitration protocol. Unknown revisions are driven with the legacy key based protocol.
//!
//! ## Features
//!
//! Feature | Usage
//! --------|--------
//! async_locks | allows usage of the `async` lock acquisition.
//! sim | provides a simulated controller to run the lock logic on a host.
//!
//! # Usage
//!
//! ```no_run
//! use sprd_hwspinlock::{BankConfig, Domain, HwLockBank, MmioRegisters, Reservation};
//!
//! fn main() {
//!     let regs = unsafe { MmioRegisters::new(0x4006_0000) };
//!     let config = BankConfig::new(Domain::Ap, 32)
//!         .reserve(Reservation::new("adi", 0))
//!         .reserve(Reservation::new("glb", 1));
//!     let bank = HwLockBank::new(regs, config).unwrap();
//!
//!     let adi = bank.request_by_name("adi").unwrap();
//!     if adi.try_acquire() {
//!         // exclusive access to the ADI bus across all processors of the SoC
//!         adi.release();
//!     }
//!
//!     // a blocking lock spins until the lock could be taken and releases it once the guard is dropped
//!     let glb = bank.request_lock(1).unwrap();
//!     let _guard = glb.lock();
//! }
//! ```

extern crate alloc;

pub mod regs;
pub use regs::{MmioRegisters, RegisterIo};

pub mod version;
pub use version::{HwVersion, ProtocolFamily};

pub mod protocol;

pub mod tracker;

pub mod recovery;

mod config;
pub use config::*;

mod error;
pub use error::*;

mod bank;
pub use bank::*;

// re-export the lock handle types, always at root level and witin the sync module
pub mod sync;
pub use sync::{HwLock, HwLockGuard};

#[cfg(any(feature = "async_locks", test, doc))]
pub mod r#async;

#[cfg(any(feature = "sim", test))]
pub mod sim;

#[cfg(test)]
mod test_log;
