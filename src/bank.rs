/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/

//! # Hardware Spinlock Bank
//!
//! One hardware spinlock controller instance and the locks it provides. A SoC typically hosts one bank in the
//! always-on domain and one in the application processor domain. The bank owns the register window, the
//! protocol selected for its silicon revision, the locally known lock states and the table of claimed locks.
//!
//! Locks are handed out as [HwLock] handles borrowing the bank, so no handle can outlive it. Each lock id can be
//! claimed by exactly one requester at a time. Locks reserved for a fixed purpose of the SoC are pre-claimed by the
//! bank and handed out to the first requester asking for them by name or by id.
//!
//! # Example
//! ```no_run
//! use sprd_hwspinlock::{BankConfig, Domain, HwLockBank, MmioRegisters, Reservation};
//!
//! let regs = unsafe { MmioRegisters::new(0x4006_0000) };
//! let config = BankConfig::new(Domain::Aon, 32).reserve(Reservation::new("adi", 0));
//! let bank = HwLockBank::new(regs, config).unwrap();
//!
//! let adi = bank.request_by_name("adi").unwrap();
//! if let Some(_guard) = adi.try_lock() {
//!     // the ADI bus is exclusively ours until the guard is dropped
//! };
//! ```

use crate::config::{BankConfig, Domain, Reservation};
use crate::error::HwLockError;
use crate::protocol::{Protocol, ProtocolHandler};
use crate::recovery;
use crate::regs::{self, RegisterIo};
use crate::sync::HwLock;
use crate::tracker::LockStateTracker;
use crate::version::{self, HwVersion};
use alloc::vec::Vec;
use core::fmt;
use spin::Mutex;

/// Who a lock id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claim {
    Free,
    /// Pre-claimed for the reservation with this index.
    Reserved(usize),
    /// Handed out, optionally under the reservation with this index.
    Claimed(Option<usize>),
}

/// A hardware spinlock controller and its locks.
pub struct HwLockBank<R: RegisterIo> {
    regs: R,
    config: BankConfig,
    version: HwVersion,
    protocol: Protocol,
    tracker: LockStateTracker,
    claims: Mutex<Vec<Claim>>,
}

impl<R: RegisterIo> HwLockBank<R> {
    /// Set up the bank behind `regs`. Reads the hardware version, selects the matching protocol and pre-claims all
    /// reserved locks. Unknown versions are not an error, they fall back to the key based legacy protocol.
    pub fn new(regs: R, config: BankConfig) -> Result<Self, HwLockError> {
        config.validate()?;

        let version = version::detect(&regs);
        if !version.is_known() {
            log::warn!(
                "hwspinlock {}: unrecognized version id {:#x}, using legacy protocol",
                config.domain(),
                version.raw()
            );
        }
        let protocol = Protocol::for_version(version, config.key());
        protocol.init(&regs);

        let mut claims: Vec<Claim> = (0..config.lock_count()).map(|_| Claim::Free).collect();
        for (idx, reservation) in config.reservations().iter().enumerate() {
            claims[reservation.id()] = Claim::Reserved(idx);
        }

        log::info!(
            "hwspinlock {}: version {}, {} locks, {} reserved",
            config.domain(),
            version,
            config.lock_count(),
            config.reservations().len()
        );

        Ok(Self {
            regs,
            config,
            version,
            protocol,
            tracker: LockStateTracker::new(),
            claims: Mutex::new(claims),
        })
    }

    /// The hardware revision detected when the bank was set up.
    pub fn version(&self) -> HwVersion {
        self.version
    }

    /// The arbitration protocol selected for [HwLockBank::version].
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// The power domain hosting this bank.
    pub fn domain(&self) -> Domain {
        self.config.domain()
    }

    /// Number of locks of this bank, valid lock ids are `0..lock_count`.
    pub fn lock_count(&self) -> usize {
        self.config.lock_count()
    }

    /// Raw access to the register window, e.g. for diagnostics not covered by the bank.
    pub fn registers(&self) -> &R {
        &self.regs
    }

    /// Claim lock `id`. Fails if the id is outside the bank or the lock is already claimed.
    pub fn request_lock(&self, id: usize) -> Result<HwLock<'_, R>, HwLockError> {
        self.check_id(id)?;

        let mut claims = self.claims.lock();
        let reservation = match claims[id] {
            Claim::Free => None,
            Claim::Reserved(idx) => Some(idx),
            Claim::Claimed(_) => return Err(HwLockError::AlreadyClaimed { id }),
        };
        claims[id] = Claim::Claimed(reservation);
        drop(claims);

        Ok(HwLock::new(
            self,
            id,
            reservation.map(|idx| self.config.reservations()[idx].name()),
        ))
    }

    /// Claim the lock reserved under `name`.
    pub fn request_by_name(&self, name: &str) -> Result<HwLock<'_, R>, HwLockError> {
        let id = self.reservation(name).ok_or(HwLockError::UnknownName)?.id();
        self.request_lock(id)
    }

    /// The reservation registered under `name`, whether it is claimed or not.
    pub fn reservation(&self, name: &str) -> Option<&Reservation> {
        self.config.reservations().iter().find(|r| r.name() == name)
    }

    /// Whether lock `id` is taken by any processor, read from the total status register.
    pub fn is_busy(&self, id: usize) -> Result<bool, HwLockError> {
        self.check_id(id)?;
        Ok(self.busy_mask() & (1 << id) != 0)
    }

    /// One bit per taken lock, read from the total status register.
    pub fn busy_mask(&self) -> u32 {
        self.regs.read(regs::TTLSTS) & lock_mask(self.lock_count())
    }

    /// Whether this processor last recorded lock `id` as held. Locks taken by remote processors are not reflected,
    /// use [HwLockBank::is_busy] for the hardware state.
    pub fn query_busy(&self, id: usize) -> Result<bool, HwLockError> {
        self.check_id(id)?;
        Ok(self.tracker.query_busy(id))
    }

    /// Force lock `id` free, whoever holds it.
    pub fn force_clear(&self, id: usize) -> Result<(), HwLockError> {
        self.check_id(id)?;
        log::debug!("hwspinlock {}: force clear lock {}", self.domain(), id);
        recovery::force_clear(&self.regs, id)?;
        self.tracker.record_state(id, false);
        Ok(())
    }

    /// Force every lock of the bank free.
    pub fn force_clear_all(&self) -> Result<(), HwLockError> {
        log::debug!("hwspinlock {}: force clear all locks", self.domain());
        recovery::force_clear_all(&self.regs, self.lock_count())?;
        for id in 0..self.lock_count() {
            self.tracker.record_state(id, false);
        }
        Ok(())
    }

    /// The bus master holding lock `id` at register level. `Ok(None)` if the hardware revision does not report
    /// master ids.
    pub fn master_id_of(&self, id: usize) -> Result<Option<u32>, HwLockError> {
        self.check_id(id)?;
        Ok(self.protocol.master_id(&self.regs, id))
    }

    /// Snapshot of the bank state for diagnostics.
    pub fn status(&self) -> BankStatus {
        BankStatus {
            domain: self.domain(),
            version: self.version,
            lock_count: self.lock_count(),
            busy_mask: self.busy_mask(),
            held_mask: self.tracker.held_mask(),
        }
    }

    /// Snapshot of the state of lock `id` for diagnostics.
    pub fn lock_info(&self, id: usize) -> Result<LockInfo<'_>, HwLockError> {
        let busy = self.is_busy(id)?;
        let claim = self.claims.lock()[id];
        let (claimed, reservation) = match claim {
            Claim::Free => (false, None),
            Claim::Reserved(idx) => (false, Some(idx)),
            Claim::Claimed(idx) => (true, idx),
        };

        Ok(LockInfo {
            id,
            busy,
            held_locally: self.tracker.query_busy(id),
            master_id: self.protocol.master_id(&self.regs, id),
            claimed,
            name: reservation.map(|idx| self.config.reservations()[idx].name()),
        })
    }

    pub(crate) fn try_acquire(&self, id: usize) -> bool {
        if self.protocol.try_acquire(&self.regs, id) {
            self.tracker.record_state(id, true);
            true
        } else {
            log::trace!(
                "hwspinlock {}: lock {} busy, master {:?}",
                self.domain(),
                id,
                self.protocol.master_id(&self.regs, id)
            );
            false
        }
    }

    pub(crate) fn release(&self, id: usize) {
        self.protocol.release(&self.regs, id);
        self.tracker.record_state(id, false);
    }

    /// Release lock `id` only if this processor still records it as held. A lock released in between, or freed with
    /// a force clear, is left alone. Returns whether the lock was released.
    pub(crate) fn release_held(&self, id: usize) -> bool {
        if self.tracker.take_held(id) {
            self.protocol.release(&self.regs, id);
            true
        } else {
            false
        }
    }

    /// Hand a claimed lock back to the bank. Reserved locks become reserved again.
    pub(crate) fn unclaim(&self, id: usize) {
        let mut claims = self.claims.lock();
        claims[id] = match claims[id] {
            Claim::Claimed(Some(idx)) => Claim::Reserved(idx),
            _ => Claim::Free,
        };
    }

    fn check_id(&self, id: usize) -> Result<(), HwLockError> {
        if id < self.lock_count() {
            Ok(())
        } else {
            Err(HwLockError::InvalidId {
                id,
                lock_count: self.lock_count(),
            })
        }
    }
}

impl<R: RegisterIo> fmt::Debug for HwLockBank<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HwLockBank")
            .field("domain", &self.domain())
            .field("version", &self.version)
            .field("lock_count", &self.lock_count())
            .finish_non_exhaustive()
    }
}

fn lock_mask(lock_count: usize) -> u32 {
    if lock_count >= regs::MAX_LOCKS {
        u32::MAX
    } else {
        (1 << lock_count) - 1
    }
}

/// Bank state for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankStatus {
    pub domain: Domain,
    pub version: HwVersion,
    /// Number of locks of the bank, the masks carry no bits above it.
    pub lock_count: usize,
    /// Locks taken by any processor.
    pub busy_mask: u32,
    /// Locks this processor recorded as held.
    pub held_mask: u32,
}

impl fmt::Display for BankStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hwspinlock {} version {}: {} locks, busy {:#010x}, held {:#010x}",
            self.domain, self.version, self.lock_count, self.busy_mask, self.held_mask
        )
    }
}

/// State of a single lock for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo<'a> {
    pub id: usize,
    /// Taken by any processor, read from the hardware.
    pub busy: bool,
    /// Recorded as held by this processor.
    pub held_locally: bool,
    /// Bus master holding the lock, on revisions reporting it.
    pub master_id: Option<u32>,
    /// Handed out as a [HwLock].
    pub claimed: bool,
    /// Name of the reservation of this lock.
    pub name: Option<&'a str>,
}

impl fmt::Display for LockInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lock {}", self.id)?;
        if let Some(name) = self.name {
            write!(f, " ({})", name)?;
        }
        f.write_str(if self.busy { ": busy" } else { ": free" })?;
        if self.held_locally {
            f.write_str(", held here")?;
        }
        if let Some(master) = self.master_id {
            write!(f, ", master {}", master)?;
        }
        if self.claimed {
            f.write_str(", claimed")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimHwSpinlock, SimPort};
    use crate::test_log;
    use crate::version::ProtocolFamily;
    use log::Level;

    fn reserved_config(lock_count: usize) -> BankConfig {
        BankConfig::new(Domain::Aon, lock_count)
            .reserve(Reservation::new("ADI", 0))
            .reserve(Reservation::new("GLB", 1))
            .reserve(Reservation::new("AGPIO", 2))
    }

    fn setup(version: u32) -> (std::sync::Arc<SimHwSpinlock>, HwLockBank<SimPort>) {
        let hw = SimHwSpinlock::new(version, 32);
        let bank = HwLockBank::new(hw.port(1), reserved_config(32)).unwrap();
        (hw, bank)
    }

    #[test]
    fn reserved_lock_can_be_claimed_once() {
        let (_hw, bank) = setup(0x100);

        let adi = bank.request_lock(0).unwrap();
        assert_eq!(adi.name(), Some("ADI"));
        assert_eq!(
            bank.request_lock(0).unwrap_err(),
            HwLockError::AlreadyClaimed { id: 0 }
        );
        assert_eq!(
            bank.request_by_name("ADI").unwrap_err(),
            HwLockError::AlreadyClaimed { id: 0 }
        );

        // the rest of the bank stays usable
        let glb = bank.request_by_name("GLB").unwrap();
        assert_eq!(glb.id(), 1);
        assert!(glb.try_acquire());
        glb.release();
    }

    #[test]
    fn dropped_handle_returns_claim() {
        let (_hw, bank) = setup(0x200);

        drop(bank.request_by_name("AGPIO").unwrap());
        let agpio = bank.request_lock(2).unwrap();
        assert_eq!(agpio.name(), Some("AGPIO"));

        drop(bank.request_lock(17).unwrap());
        let plain = bank.request_lock(17).unwrap();
        assert_eq!(plain.name(), None);
    }

    #[test]
    fn configuration_errors() {
        let (_hw, bank) = setup(0x100);
        assert_eq!(
            bank.request_lock(32).unwrap_err(),
            HwLockError::InvalidId { id: 32, lock_count: 32 }
        );
        assert_eq!(
            bank.request_by_name("ADC").unwrap_err(),
            HwLockError::UnknownName
        );
        assert_eq!(
            bank.is_busy(40).unwrap_err(),
            HwLockError::InvalidId { id: 40, lock_count: 32 }
        );
        assert!(bank.force_clear(32).is_err());
        assert!(bank.master_id_of(32).is_err());

        let hw = SimHwSpinlock::new(0x100, 32);
        assert_eq!(
            HwLockBank::new(hw.port(0), BankConfig::new(Domain::Ap, 64)).unwrap_err(),
            HwLockError::InvalidLockCount { lock_count: 64 }
        );
    }

    #[test]
    fn token_round_trip_leaves_lock_free() {
        for version in [0x100, 0x200, 0x300].iter() {
            let (_hw, bank) = setup(*version);
            assert_eq!(bank.protocol().family(), ProtocolFamily::TokenBased);

            for id in 0..bank.lock_count() {
                let lock = bank.request_lock(id).unwrap();
                assert!(lock.try_acquire());
                assert!(bank.is_busy(id).unwrap());
                assert!(bank.query_busy(id).unwrap());
                lock.release();
                assert!(!bank.is_busy(id).unwrap());
                assert!(!bank.query_busy(id).unwrap());
            }
        }
    }

    #[test]
    fn force_clear_frees_every_lock() {
        for version in [0, 0x100, 0x300].iter() {
            let (hw, bank) = setup(*version);
            for id in 0..bank.lock_count() {
                assert!(hw.take(id, 9));
            }
            assert_eq!(bank.busy_mask(), u32::MAX);

            for id in 0..bank.lock_count() {
                bank.force_clear(id).unwrap();
                assert!(!bank.is_busy(id).unwrap());
            }
        }
    }

    #[test]
    fn force_clear_all_resets_tracker() {
        let (hw, bank) = setup(0);
        let lock = bank.request_lock(5).unwrap();
        assert!(lock.try_acquire());
        assert!(hw.take(31, 0x7));
        assert!(bank.status().held_mask != 0);

        bank.force_clear_all().unwrap();
        assert_eq!(bank.busy_mask(), 0);
        assert_eq!(bank.status().held_mask, 0);
        // the lock is free again for everybody
        assert!(lock.try_acquire());
        lock.release();
    }

    #[test]
    fn tracker_is_a_local_cache() {
        let (hw, bank) = setup(0x100);
        assert!(hw.take(4, 3));
        assert!(bank.is_busy(4).unwrap());
        assert!(!bank.query_busy(4).unwrap());
    }

    #[test]
    fn master_id_depends_on_revision() {
        let (hw, bank) = setup(0x300);
        assert!(hw.take(6, 4));
        assert_eq!(bank.master_id_of(6), Ok(Some(4)));

        let (hw, bank) = setup(0);
        assert!(hw.take(6, 4));
        assert_eq!(bank.master_id_of(6), Ok(None));
    }

    #[test]
    fn token_bank_enables_master_recording() {
        let (hw, _bank) = setup(0x100);
        assert_eq!(hw.recctrl(), regs::RECORD_USER_BITS);

        let (hw, _bank) = setup(0);
        assert_eq!(hw.recctrl(), 0);
    }

    #[test]
    fn legacy_version_warns_once_per_bank() {
        for version in [0, 0xFFFF, 0x400].iter() {
            test_log::capture();
            let (_hw, bank) = setup(*version);
            assert_eq!(bank.version(), HwVersion::Legacy(*version));
            assert_eq!(bank.protocol().family(), ProtocolFamily::KeyBased);

            let lock = bank.request_lock(3).unwrap();
            assert!(lock.try_acquire());
            lock.release();
            assert_eq!(test_log::count(Level::Warn), 1);
        }
    }

    #[test]
    fn known_version_does_not_warn() {
        for version in [0x100, 0x200, 0x300].iter() {
            test_log::capture();
            let _ = setup(*version);
            assert_eq!(test_log::count(Level::Warn), 0);
            assert_eq!(test_log::count(Level::Info), 1);
        }
    }

    #[test]
    fn diagnostics() {
        let (hw, bank) = setup(0x100);
        let adi = bank.request_by_name("ADI").unwrap();
        assert!(adi.try_acquire());
        assert!(hw.take(9, 2));

        let status = bank.status();
        assert_eq!(status.busy_mask, (1 << 9) | 1);
        assert_eq!(status.held_mask, 1);
        assert_eq!(
            format!("{}", status),
            "hwspinlock aon version 0x100: 32 locks, busy 0x00000201, held 0x00000001"
        );

        let info = bank.lock_info(0).unwrap();
        assert_eq!(info.name, Some("ADI"));
        assert!(info.claimed && info.busy && info.held_locally);
        assert_eq!(info.master_id, Some(1));
        assert_eq!(
            format!("{}", info),
            "lock 0 (ADI): busy, held here, master 1, claimed"
        );

        let info = bank.lock_info(1).unwrap();
        assert_eq!(format!("{}", info), "lock 1 (GLB): free, master 0");

        adi.release();
    }

    #[test]
    fn partial_bank_masks_status() {
        let hw = SimHwSpinlock::new(0x100, 32);
        let bank = HwLockBank::new(hw.port(0), BankConfig::new(Domain::Ap, 8)).unwrap();
        assert!(hw.take(12, 1));
        assert_eq!(bank.busy_mask(), 0);
        assert!(hw.take(7, 1));
        assert_eq!(bank.busy_mask(), 1 << 7);
    }
}
