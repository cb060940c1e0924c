// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! A read/write lock with writer priority: once a writer is waiting, no new
//! reader may acquire until every queued writer has gone through. Guards
//! release on drop, so every exit path unlocks.
//!
//! Connection threads take the read side for matching and rendering; every
//! mutation of the world goes through the write side. The snapshot dumper
//! holds the read side for the duration of serialization.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex};

#[derive(Default)]
struct LockState {
    readers: usize,
    writer_active: bool,
    writers_waiting: usize,
}

pub struct WorldLock<T> {
    state: Mutex<LockState>,
    readers_cv: Condvar,
    writers_cv: Condvar,
    data: UnsafeCell<T>,
}

// Readers hand out &T and writers &mut T under the protocol below, which is
// exactly the contract of std::sync::RwLock.
unsafe impl<T: Send> Send for WorldLock<T> {}
unsafe impl<T: Send + Sync> Sync for WorldLock<T> {}

impl<T> WorldLock<T> {
    pub fn new(data: T) -> Self {
        WorldLock {
            state: Mutex::new(LockState::default()),
            readers_cv: Condvar::new(),
            writers_cv: Condvar::new(),
            data: UnsafeCell::new(data),
        }
    }

    pub fn read(&self) -> ReadGuard<'_, T> {
        let mut state = self.state.lock().expect("world lock poisoned");
        while state.writer_active || state.writers_waiting > 0 {
            state = self.readers_cv.wait(state).expect("world lock poisoned");
        }
        state.readers += 1;
        ReadGuard { lock: self }
    }

    pub fn write(&self) -> WriteGuard<'_, T> {
        let mut state = self.state.lock().expect("world lock poisoned");
        state.writers_waiting += 1;
        while state.writer_active || state.readers > 0 {
            state = self.writers_cv.wait(state).expect("world lock poisoned");
        }
        state.writers_waiting -= 1;
        state.writer_active = true;
        WriteGuard { lock: self }
    }

    fn release_read(&self) {
        let mut state = self.state.lock().expect("world lock poisoned");
        state.readers -= 1;
        if state.readers == 0 && state.writers_waiting > 0 {
            self.writers_cv.notify_one();
        }
    }

    fn release_write(&self) {
        let mut state = self.state.lock().expect("world lock poisoned");
        state.writer_active = false;
        if state.writers_waiting > 0 {
            self.writers_cv.notify_one();
        } else {
            self.readers_cv.notify_all();
        }
    }
}

pub struct ReadGuard<'a, T> {
    lock: &'a WorldLock<T>,
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

pub struct WriteGuard<'a, T> {
    lock: &'a WorldLock<T>,
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn readers_are_concurrent() {
        let lock = Arc::new(WorldLock::new(7));
        let peak = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for _ in 0..4 {
            let lock = lock.clone();
            let peak = peak.clone();
            let active = active.clone();
            handles.push(thread::spawn(move || {
                let guard = lock.read();
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(30));
                active.fetch_sub(1, Ordering::SeqCst);
                assert_eq!(*guard, 7);
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) > 1, "readers never overlapped");
    }

    #[test]
    fn waiting_writer_blocks_new_readers() {
        let lock = Arc::new(WorldLock::new(0u32));

        let r = lock.read();
        let writer = {
            let lock = lock.clone();
            thread::spawn(move || {
                let mut w = lock.write();
                *w = 1;
            })
        };
        // Give the writer time to queue up.
        thread::sleep(Duration::from_millis(30));

        let late_reader = {
            let lock = lock.clone();
            thread::spawn(move || *lock.read())
        };
        // The late reader must not get in ahead of the queued writer.
        thread::sleep(Duration::from_millis(30));
        assert!(!late_reader.is_finished());

        drop(r);
        writer.join().unwrap();
        assert_eq!(late_reader.join().unwrap(), 1);
    }

    #[test]
    fn writes_are_exclusive() {
        let lock = Arc::new(WorldLock::new(0u64));
        let mut handles = vec![];
        for _ in 0..8 {
            let lock = lock.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    let mut w = lock.write();
                    *w += 1;
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*lock.read(), 800);
    }
}
