// Copyright (C) 2024 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! Cooperative cancellation shared between the control side and worker threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

#[derive(Default)]
struct Shared {
    /// Checked lock-free from the audio callback.
    cancelled: AtomicBool,
    /// Wakes threads sleeping in wait_timeout.
    lock: Mutex<()>,
    wake: Condvar,
}

/// A clonable flag that can be raised once. Every clone observes the same flag.
#[derive(Clone, Default)]
pub struct CancelHandle {
    shared: Arc<Shared>,
}

impl CancelHandle {
    pub fn new() -> CancelHandle {
        CancelHandle::default()
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// Sleeps for up to `timeout`, waking as soon as the handle is cancelled.
    /// Returns whether the handle is cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut guard = self.shared.lock.lock();
        if !self.is_cancelled() {
            self.shared
                .wake
                .wait_while_for(&mut guard, |_| !self.is_cancelled(), timeout);
        }
        self.is_cancelled()
    }

    /// Raises the flag. Later calls do nothing.
    pub fn cancel(&self) {
        if self.shared.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        let _guard = self.shared.lock.lock();
        self.shared.wake.notify_all();
    }
}

#[cfg(test)]
mod test {
    use std::thread;
    use std::time::Instant;

    use super::*;

    #[test]
    fn test_cancel_wakes_waiter() {
        let handle = CancelHandle::new();
        assert!(!handle.is_cancelled());

        let waiter = {
            let handle = handle.clone();
            thread::spawn(move || handle.wait_timeout(Duration::from_secs(10)))
        };

        let start = Instant::now();
        handle.cancel();
        assert!(waiter.join().expect("wait thread panicked"));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_wait_times_out() {
        let handle = CancelHandle::new();
        let start = Instant::now();
        assert!(!handle.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let handle = CancelHandle::new();
        handle.cancel();
        handle.cancel();
        assert!(handle.clone().is_cancelled());
        assert!(handle.wait_timeout(Duration::from_secs(1)));
    }
}
