/***********************************************************************************************************************
 * Copyright (c) 2020 by the authors
 *
 * Author: André Borrmann <pspwizard@gmx.de>
 * License: Apache License 2.0 / MIT
 **********************************************************************************************************************/

//! # Async Hardware Lock
//!
//! Waiting for a hardware lock without blocking the executor. The holder of a hardware lock may be another processor
//! that can not wake us, so the future does not register for a wake up on release. Instead every poll is a single
//! attempt and a failed attempt re-schedules the task right away, yielding to the other tasks in between.

use crate::regs::RegisterIo;
use crate::sync::{HwLock, HwLockGuard};
use core::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

impl<'a, R: RegisterIo> HwLock<'a, R> {
    /// Take the lock, yielding to other tasks while it is held elsewhere. The returned [HwLockFuture] resolves into
    /// the [HwLockGuard] once the lock could be taken.
    pub fn lock_async(&self) -> HwLockFuture<'_, 'a, R> {
        HwLockFuture {
            lock: self,
            attempts: 0,
        }
    }
}

/// The `Future` that resolves once a [HwLock] could be taken, created with [HwLock::lock_async].
pub struct HwLockFuture<'l, 'a, R: RegisterIo> {
    lock: &'l HwLock<'a, R>,
    attempts: u32,
}

impl<'l, 'a, R: RegisterIo> HwLockFuture<'l, 'a, R> {
    /// The number of failed attempts so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl<'l, 'a, R: RegisterIo> Future for HwLockFuture<'l, 'a, R> {
    type Output = HwLockGuard<'l, 'a, R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let lock: &'l HwLock<'a, R> = this.lock;
        if let Some(guard) = lock.try_lock() {
            Poll::Ready(guard)
        } else {
            this.attempts = this.attempts.saturating_add(1);
            // nobody will wake us on release, so ask to be polled again
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}
