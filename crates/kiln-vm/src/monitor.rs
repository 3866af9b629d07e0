//! Object monitors
//!
//! Re-entrant ownership plus a wait set. Ownership is mirrored into an
//! `AtomicCell` so `holdsLock` can be answered without taking the state lock.
//!
//! `notify` hands out a wake-up token that exactly one waiter consumes;
//! `notifyAll` hands out one per current waiter. A waiter leaves the wait set
//! on a token, a timeout or an interrupt, and in every case reacquires the
//! monitor (with its saved recursion count) before returning.

use std::time::{Duration, Instant};

use crossbeam::atomic::AtomicCell;
use parking_lot::{Condvar, Mutex};

use crate::error::{Failure, NativeResult};
use crate::object::ObjectRef;
use crate::thread::{ThreadId, VmThread};

#[derive(Debug, Default)]
struct MonitorState {
    owner: Option<ThreadId>,
    count: u32,
    waiting: u32,
    tokens: u32,
}

enum Wakeup {
    Notified,
    TimedOut,
    Interrupted,
}

/// Monitor attached to every object
#[derive(Debug)]
pub struct Monitor {
    owner: AtomicCell<Option<ThreadId>>,
    state: Mutex<MonitorState>,
    entry: Condvar,
    wait_set: Condvar,
}

impl Monitor {
    /// Create an unowned monitor
    pub fn new() -> Self {
        Self {
            owner: AtomicCell::new(None),
            state: Mutex::new(MonitorState::default()),
            entry: Condvar::new(),
            wait_set: Condvar::new(),
        }
    }

    /// Current owner
    pub fn owner(&self) -> Option<ThreadId> {
        self.owner.load()
    }

    /// Check if `thread` owns the monitor
    pub fn is_owned_by(&self, thread: ThreadId) -> bool {
        self.owner.load() == Some(thread)
    }

    /// Acquire the monitor, blocking while another thread owns it
    pub fn enter(&self, thread: ThreadId) {
        let mut state = self.state.lock();
        while matches!(state.owner, Some(owner) if owner != thread) {
            self.entry.wait(&mut state);
        }
        state.owner = Some(thread);
        state.count += 1;
        self.owner.store(Some(thread));
    }

    /// Release one level of ownership
    pub fn exit(&self, thread: ThreadId) -> NativeResult<()> {
        let mut state = self.state.lock();
        if state.owner != Some(thread) {
            return Err(Failure::IllegalMonitorState);
        }
        state.count -= 1;
        if state.count == 0 {
            state.owner = None;
            self.owner.store(None);
            self.entry.notify_one();
        }
        Ok(())
    }

    /// Wait on `obj`'s monitor, which `thread` must own
    ///
    /// `timeout` of `None` waits until notified or interrupted.
    pub fn wait(obj: &ObjectRef, thread: &VmThread, timeout: Option<Duration>) -> NativeResult<()> {
        let monitor = obj.monitor();
        let me = thread.id();
        let mut state = monitor.state.lock();
        if state.owner != Some(me) {
            return Err(Failure::IllegalMonitorState);
        }
        if thread.take_interrupt() {
            return Err(Failure::Interrupted);
        }

        thread.set_waiting_on(Some(obj.clone()));
        let saved = state.count;
        state.owner = None;
        state.count = 0;
        monitor.owner.store(None);
        monitor.entry.notify_one();
        state.waiting += 1;

        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let wakeup = loop {
            if state.tokens > 0 {
                state.tokens -= 1;
                break Wakeup::Notified;
            }
            if thread.is_interrupted() {
                break Wakeup::Interrupted;
            }
            match deadline {
                Some(deadline) => {
                    if monitor.wait_set.wait_until(&mut state, deadline).timed_out() {
                        break Wakeup::TimedOut;
                    }
                }
                None => monitor.wait_set.wait(&mut state),
            }
        };
        state.waiting -= 1;
        state.tokens = state.tokens.min(state.waiting);

        while state.owner.is_some() {
            monitor.entry.wait(&mut state);
        }
        state.owner = Some(me);
        state.count = saved;
        monitor.owner.store(Some(me));
        drop(state);
        thread.set_waiting_on(None);

        match wakeup {
            Wakeup::Interrupted => {
                thread.take_interrupt();
                Err(Failure::Interrupted)
            }
            Wakeup::Notified | Wakeup::TimedOut => Ok(()),
        }
    }

    /// Wake one waiter
    pub fn notify(&self, thread: ThreadId) -> NativeResult<()> {
        let mut state = self.state.lock();
        if state.owner != Some(thread) {
            return Err(Failure::IllegalMonitorState);
        }
        if state.tokens < state.waiting {
            state.tokens += 1;
            self.wait_set.notify_all();
        }
        Ok(())
    }

    /// Wake every waiter
    pub fn notify_all(&self, thread: ThreadId) -> NativeResult<()> {
        let mut state = self.state.lock();
        if state.owner != Some(thread) {
            return Err(Failure::IllegalMonitorState);
        }
        state.tokens = state.waiting;
        self.wait_set.notify_all();
        Ok(())
    }

    /// Wake waiters so they re-check their interrupt flags
    pub(crate) fn wake_waiters(&self) {
        let _state = self.state.lock();
        self.wait_set.notify_all();
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reentrant_enter_exit() {
        let monitor = Monitor::new();
        let t = ThreadId::next();
        monitor.enter(t);
        monitor.enter(t);
        assert!(monitor.is_owned_by(t));
        monitor.exit(t).unwrap();
        assert!(monitor.is_owned_by(t));
        monitor.exit(t).unwrap();
        assert_eq!(monitor.owner(), None);
    }

    #[test]
    fn test_exit_by_non_owner() {
        let monitor = Monitor::new();
        let owner = ThreadId::next();
        let other = ThreadId::next();
        monitor.enter(owner);
        assert!(matches!(monitor.exit(other), Err(Failure::IllegalMonitorState)));
        assert!(matches!(monitor.notify(other), Err(Failure::IllegalMonitorState)));
        assert!(matches!(
            monitor.notify_all(other),
            Err(Failure::IllegalMonitorState)
        ));
    }

    #[test]
    fn test_notify_without_waiters_is_noop() {
        let monitor = Monitor::new();
        let t = ThreadId::next();
        monitor.enter(t);
        monitor.notify(t).unwrap();
        monitor.notify_all(t).unwrap();
        monitor.exit(t).unwrap();
    }
}
