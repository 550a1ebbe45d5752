/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/

//! # Sync Locking
//!
//! Blocking and non blocking use of the hardware locks handed out by a [HwLockBank](crate::HwLockBank).

// re-export the lock handle and its guard
mod hwlock;
#[doc(inline)]
pub use hwlock::*;

// re-export the retry combinator
mod backoff;
#[doc(inline)]
pub use backoff::*;
