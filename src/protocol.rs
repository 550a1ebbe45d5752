/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/

//! # Arbitration Protocols
//!
//! The hardware mutual exclusion sequence differs between silicon revisions. The protocol is chosen once from the
//! detected [HwVersion] when the bank is set up, the lock operations dispatch through [Protocol] and never check
//! the version again.
//!
//! Every operation is a single, bounded attempt. Waiting for a lock is up to the caller, see
//! [Backoff](crate::sync::Backoff).

use crate::error::ReleaseViolation;
use crate::regs::{self, RegisterIo};
use crate::version::{HwVersion, ProtocolFamily};

/// The register level sequence to take and free a lock.
pub trait ProtocolHandler {
    /// Prepare the bank for this protocol. Called once when the bank is set up.
    fn init<R: RegisterIo>(&self, _regs: &R) {}

    /// Try once to take lock `id`. Returns `true` if this processor now holds it.
    fn try_acquire<R: RegisterIo>(&self, regs: &R, id: usize) -> bool;

    /// Free lock `id`.
    fn release<R: RegisterIo>(&self, regs: &R, id: usize);

    /// The id of the bus master holding lock `id`, `None` if the hardware does not report it.
    fn master_id<R: RegisterIo>(&self, regs: &R, id: usize) -> Option<u32>;
}

/// V0 key based protocol. A processor writes its unique key into a free token register and reads it back. The
/// hardware keeps the first value written to a free register, so only one of several racing writers reads back its
/// own key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyProtocol {
    key: u32,
}

impl KeyProtocol {
    /// The protocol for a processor writing `key`. The key must differ from every other processor's key and from
    /// [NOTTAKEN_V0](regs::NOTTAKEN_V0).
    pub const fn new(key: u32) -> Self {
        Self { key }
    }

    /// The key of this processor.
    pub const fn key(&self) -> u32 {
        self.key
    }

    /// First phase: is the token register free?
    pub(crate) fn check_free<R: RegisterIo>(&self, regs: &R, id: usize) -> bool {
        regs.read(regs::token_v0(id)) == regs::NOTTAKEN_V0
    }

    /// Second phase: write the own key.
    pub(crate) fn claim<R: RegisterIo>(&self, regs: &R, id: usize) {
        regs.write(regs::token_v0(id), self.key);
    }

    /// Third phase: did the own key survive?
    pub(crate) fn confirm<R: RegisterIo>(&self, regs: &R, id: usize) -> bool {
        regs.read(regs::token_v0(id)) == self.key
    }
}

impl ProtocolHandler for KeyProtocol {
    fn try_acquire<R: RegisterIo>(&self, regs: &R, id: usize) -> bool {
        if !self.check_free(regs, id) {
            return false;
        }
        self.claim(regs, id);
        self.confirm(regs, id)
    }

    fn release<R: RegisterIo>(&self, regs: &R, id: usize) {
        let found = regs.read(regs::token_v0(id));
        if found != self.key {
            ReleaseViolation {
                id,
                key: self.key,
                found,
            }
            .raise();
        }
        regs.write(regs::token_v0(id), regs::NOTTAKEN_V0);
    }

    fn master_id<R: RegisterIo>(&self, _regs: &R, _id: usize) -> Option<u32> {
        // the master id register aliases the token register on this revision
        None
    }
}

/// V1 and later token based protocol. Reading a free token register takes the lock, the winning read returns `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenProtocol;

impl ProtocolHandler for TokenProtocol {
    fn init<R: RegisterIo>(&self, regs: &R) {
        regs.write(regs::RECCTRL, regs::RECORD_USER_BITS);
    }

    fn try_acquire<R: RegisterIo>(&self, regs: &R, id: usize) -> bool {
        regs.read(regs::token_v1(id)) == 0
    }

    fn release<R: RegisterIo>(&self, regs: &R, id: usize) {
        regs.write(regs::token_v1(id), regs::NOTTAKEN_V1);
    }

    fn master_id<R: RegisterIo>(&self, regs: &R, id: usize) -> Option<u32> {
        Some(regs.read(regs::master_id(id)))
    }
}

/// The protocol of one bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Legacy and unknown revisions.
    Key(KeyProtocol),
    /// V1 and later.
    Token(TokenProtocol),
}

impl Protocol {
    /// Select the protocol for `version`. `key` is only used by the key based protocol.
    pub fn for_version(version: HwVersion, key: u32) -> Self {
        match version.family() {
            ProtocolFamily::KeyBased => Protocol::Key(KeyProtocol::new(key)),
            ProtocolFamily::TokenBased => Protocol::Token(TokenProtocol),
        }
    }

    /// The family of the selected protocol.
    pub fn family(&self) -> ProtocolFamily {
        match self {
            Protocol::Key(_) => ProtocolFamily::KeyBased,
            Protocol::Token(_) => ProtocolFamily::TokenBased,
        }
    }
}

impl ProtocolHandler for Protocol {
    fn init<R: RegisterIo>(&self, regs: &R) {
        match self {
            Protocol::Key(key) => key.init(regs),
            Protocol::Token(token) => token.init(regs),
        }
    }

    #[inline]
    fn try_acquire<R: RegisterIo>(&self, regs: &R, id: usize) -> bool {
        match self {
            Protocol::Key(key) => key.try_acquire(regs, id),
            Protocol::Token(token) => token.try_acquire(regs, id),
        }
    }

    #[inline]
    fn release<R: RegisterIo>(&self, regs: &R, id: usize) {
        match self {
            Protocol::Key(key) => key.release(regs, id),
            Protocol::Token(token) => token.release(regs, id),
        }
    }

    fn master_id<R: RegisterIo>(&self, regs: &R, id: usize) -> Option<u32> {
        match self {
            Protocol::Key(key) => key.master_id(regs, id),
            Protocol::Token(token) => token.master_id(regs, id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimHwSpinlock;

    #[test]
    fn selects_protocol_once_per_version() {
        assert_eq!(
            Protocol::for_version(HwVersion::V1, 7),
            Protocol::Token(TokenProtocol)
        );
        assert_eq!(
            Protocol::for_version(HwVersion::Legacy(0), 7),
            Protocol::Key(KeyProtocol::new(7))
        );
    }

    #[test]
    fn interleaved_key_writes_have_one_winner() {
        let hw = SimHwSpinlock::new(0, 32);
        let (port0, port1) = (hw.port(0), hw.port(1));
        let (cpu0, cpu1) = (KeyProtocol::new(0x11), KeyProtocol::new(0x22));

        // both processors see the lock free before either writes
        assert!(cpu0.check_free(&port0, 5));
        assert!(cpu1.check_free(&port1, 5));
        // both write before either reads back
        cpu0.claim(&port0, 5);
        cpu1.claim(&port1, 5);
        let won0 = cpu0.confirm(&port0, 5);
        let won1 = cpu1.confirm(&port1, 5);

        assert!(won0 ^ won1);
        assert!(won0);
    }

    #[test]
    fn interleaved_key_writes_reverse_order() {
        let hw = SimHwSpinlock::new(0, 32);
        let (port0, port1) = (hw.port(0), hw.port(1));
        let (cpu0, cpu1) = (KeyProtocol::new(0x11), KeyProtocol::new(0x22));

        assert!(cpu0.check_free(&port0, 0));
        assert!(cpu1.check_free(&port1, 0));
        cpu1.claim(&port1, 0);
        cpu0.claim(&port0, 0);

        assert!(!cpu0.confirm(&port0, 0));
        assert!(cpu1.confirm(&port1, 0));
    }

    #[test]
    fn key_acquire_release() {
        let hw = SimHwSpinlock::new(0, 32);
        let port = hw.port(0);
        let cpu = KeyProtocol::new(0x1);

        assert!(cpu.try_acquire(&port, 9));
        assert!(!cpu.try_acquire(&port, 9));
        assert_eq!(cpu.master_id(&port, 9), None);
        cpu.release(&port, 9);
        assert!(!hw.is_taken(9));
    }

    #[test]
    #[should_panic(expected = "released without being held")]
    fn key_release_of_foreign_lock_is_fatal() {
        let hw = SimHwSpinlock::new(0, 32);
        let port = hw.port(0);
        assert!(hw.take(4, 0x42));
        KeyProtocol::new(0x1).release(&port, 4);
    }

    #[test]
    #[should_panic(expected = "released without being held")]
    fn key_release_of_free_lock_is_fatal() {
        let hw = SimHwSpinlock::new(0, 32);
        KeyProtocol::new(0x1).release(&hw.port(0), 4);
    }

    #[test]
    fn token_acquire_release() {
        for version in [0x100, 0x200, 0x300].iter() {
            let hw = SimHwSpinlock::new(*version, 32);
            let (port0, port1) = (hw.port(2), hw.port(6));
            let protocol = TokenProtocol;

            protocol.init(&port0);
            assert_eq!(hw.recctrl(), regs::RECORD_USER_BITS);

            assert!(protocol.try_acquire(&port0, 1));
            assert!(!protocol.try_acquire(&port1, 1));
            assert_eq!(protocol.master_id(&port1, 1), Some(2));
            protocol.release(&port0, 1);
            assert!(!hw.is_taken(1));
            assert!(protocol.try_acquire(&port1, 1));
        }
    }
}
