/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/

//! # Version Detection
//!
//! The silicon revision of a bank is read once from its version id register. Only the revisions `0x100`, `0x200`
//! and `0x300` are known to implement the token based protocol. Every other value, including `0` and ids of
//! undocumented future revisions, is treated as the key based legacy protocol.

use crate::regs::{self, RegisterIo};
use core::fmt;

/// The arbitration protocol a bank implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolFamily {
    /// V0: a processor specific key is written to a free token register and verified by reading it back.
    KeyBased,
    /// V1 and later: reading the token register claims the lock.
    TokenBased,
}

/// Hardware revision of a bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwVersion {
    /// Any version id not known to be token based. Keeps the raw id for diagnostics.
    Legacy(u32),
    /// Version id `0x100`, the first token based revision.
    V1,
    /// Version id `0x200`.
    V2,
    /// Version id `0x300`. Same token semantics as [HwVersion::V1].
    V3,
}

impl HwVersion {
    /// Classify a raw version id.
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            0x100 => HwVersion::V1,
            0x200 => HwVersion::V2,
            0x300 => HwVersion::V3,
            other => HwVersion::Legacy(other),
        }
    }

    /// The raw version id as read from the hardware.
    pub const fn raw(self) -> u32 {
        match self {
            HwVersion::Legacy(raw) => raw,
            HwVersion::V1 => 0x100,
            HwVersion::V2 => 0x200,
            HwVersion::V3 => 0x300,
        }
    }

    /// The protocol family driving this revision. Anything not known falls back to the key based protocol.
    ///
    /// # Example
    /// ```
    /// use sprd_hwspinlock::{HwVersion, ProtocolFamily};
    ///
    /// assert_eq!(HwVersion::from_raw(0x200).family(), ProtocolFamily::TokenBased);
    /// assert_eq!(HwVersion::from_raw(0x400).family(), ProtocolFamily::KeyBased);
    /// ```
    pub const fn family(self) -> ProtocolFamily {
        match self {
            HwVersion::Legacy(_) => ProtocolFamily::KeyBased,
            _ => ProtocolFamily::TokenBased,
        }
    }

    /// Whether this is a revision with documented token semantics.
    pub const fn is_known(self) -> bool {
        !matches!(self, HwVersion::Legacy(_))
    }
}

impl fmt::Display for HwVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HwVersion::Legacy(raw) => write!(f, "legacy ({:#x})", raw),
            known => write!(f, "{:#x}", known.raw()),
        }
    }
}

/// Read the version id register of a bank. This is a pure read without any side effect, the result is classified
/// with [HwVersion::from_raw].
pub fn detect<R: RegisterIo>(regs: &R) -> HwVersion {
    HwVersion::from_raw(regs.read(regs::VERID))
}
