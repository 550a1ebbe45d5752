/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/

//! # Backoff
//!
//! The lock primitives never wait on their own. Callers that need to wait for a lock drive the attempts with a
//! [Backoff], an iterator yielding the number of the next attempt and relaxing the core in between.
//!
//! # Example
//! ```
//! use sprd_hwspinlock::sync::Backoff;
//!
//! let mut relaxed = 0;
//! let attempts: Vec<u32> = Backoff::with_relax(|| relaxed += 1).limit(3).collect();
//! assert_eq!(attempts, vec![0, 1, 2]);
//! assert_eq!(relaxed, 2);
//! ```

/// Spin loop hints issued by the default relax between two attempts. Roughly half of a typical hold time.
pub const RELAX_SPINS: u32 = 100;

/// Burn a few cycles before the next attempt.
#[inline]
pub fn spin_relax() {
    for _ in 0..RELAX_SPINS {
        core::hint::spin_loop();
    }
}

/// Iterator over lock attempts. The relax function runs before every attempt except the first.
#[derive(Debug, Clone)]
pub struct Backoff<F = fn()> {
    attempt: u32,
    limit: Option<u32>,
    relax: F,
}

impl Backoff<fn()> {
    /// Unlimited attempts with [spin_relax] in between.
    pub fn new() -> Self {
        Self::with_relax(spin_relax)
    }
}

impl Default for Backoff<fn()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: FnMut()> Backoff<F> {
    /// Unlimited attempts with `relax` in between.
    pub fn with_relax(relax: F) -> Self {
        Self {
            attempt: 0,
            limit: None,
            relax,
        }
    }

    /// Stop after `attempts` attempts.
    pub fn limit(mut self, attempts: u32) -> Self {
        self.limit = Some(attempts);
        self
    }
}

impl<F: FnMut()> Iterator for Backoff<F> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if let Some(limit) = self.limit {
            if self.attempt >= limit {
                return None;
            }
        }
        if self.attempt > 0 {
            (self.relax)();
        }
        let attempt = self.attempt;
        self.attempt = self.attempt.saturating_add(1);
        Some(attempt)
    }
}
