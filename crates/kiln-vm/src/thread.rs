//! Threads and per-thread execution environments
//!
//! A [`VmThread`] is the VM's record of one managed thread: identity,
//! interrupt flag, liveness and the object it is currently waiting on. The
//! [`ExecEnv`] is the state only the running thread touches: its frame chain,
//! operand stack and pending failure.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex};

use crate::error::{Failure, NativeResult};
use crate::object::ObjectRef;
use crate::stack::{FrameChain, OperandStack};

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

/// Unique thread identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(u64);

impl ThreadId {
    /// Allocate a fresh identifier
    pub fn next() -> Self {
        ThreadId(NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// VM-side record of a managed thread
#[derive(Debug)]
pub struct VmThread {
    id: ThreadId,
    name: String,
    java_thread: OnceCell<ObjectRef>,
    interrupted: AtomicBool,
    alive: AtomicBool,
    waiting_on: Mutex<Option<ObjectRef>>,
    park_lock: Mutex<()>,
    park: Condvar,
}

impl VmThread {
    /// Create a live thread record
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: ThreadId::next(),
            name: name.into(),
            java_thread: OnceCell::new(),
            interrupted: AtomicBool::new(false),
            alive: AtomicBool::new(true),
            waiting_on: Mutex::new(None),
            park_lock: Mutex::new(()),
            park: Condvar::new(),
        })
    }

    /// Thread identity
    #[inline]
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Diagnostic name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `java/lang/Thread` object, once attached
    pub fn java_thread(&self) -> Option<&ObjectRef> {
        self.java_thread.get()
    }

    pub(crate) fn set_java_thread(&self, thread: ObjectRef) {
        let _ = self.java_thread.set(thread);
    }

    /// Check if the thread has not yet terminated
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub(crate) fn mark_terminated(&self) {
        self.alive.store(false, Ordering::Release);
    }

    // ========================================================================
    // Interruption
    // ========================================================================

    /// Set the interrupt flag and wake the thread if it is blocked
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);

        let waiting = self.waiting_on.lock().clone();
        if let Some(obj) = waiting {
            obj.monitor().wake_waiters();
        }

        let _guard = self.park_lock.lock();
        self.park.notify_all();
    }

    /// Read the interrupt flag without clearing it
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Read and clear the interrupt flag in one step
    pub fn take_interrupt(&self) -> bool {
        self.interrupted.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn set_waiting_on(&self, obj: Option<ObjectRef>) {
        *self.waiting_on.lock() = obj;
    }

    // ========================================================================
    // Sleeping
    // ========================================================================

    /// Sleep for `duration`, returning early with `Interrupted` if interrupted
    ///
    /// The interrupt flag is cleared when the interruption is reported.
    pub fn sleep(&self, duration: Duration) -> NativeResult<()> {
        let deadline = Instant::now().checked_add(duration);
        let mut guard = self.park_lock.lock();
        loop {
            if self.take_interrupt() {
                return Err(Failure::Interrupted);
            }
            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return Ok(());
                    }
                    self.park.wait_until(&mut guard, deadline);
                }
                None => self.park.wait(&mut guard),
            }
        }
    }
}

/// Execution state owned by the running thread
pub struct ExecEnv {
    thread: Arc<VmThread>,
    frames: FrameChain,
    stack: OperandStack,
    pending: Option<Failure>,
}

impl ExecEnv {
    /// Environment for `thread` with an operand stack of `stack_slots`
    pub fn new(thread: Arc<VmThread>, stack_slots: usize) -> Self {
        Self {
            thread,
            frames: FrameChain::new(),
            stack: OperandStack::with_capacity(stack_slots),
            pending: None,
        }
    }

    /// The thread this environment belongs to
    #[inline]
    pub fn thread(&self) -> &Arc<VmThread> {
        &self.thread
    }

    /// Frame chain
    #[inline]
    pub fn frames(&self) -> &FrameChain {
        &self.frames
    }

    /// Frame chain, mutably
    #[inline]
    pub fn frames_mut(&mut self) -> &mut FrameChain {
        &mut self.frames
    }

    /// Operand stack
    #[inline]
    pub fn stack(&self) -> &OperandStack {
        &self.stack
    }

    /// Operand stack, mutably
    #[inline]
    pub fn stack_mut(&mut self) -> &mut OperandStack {
        &mut self.stack
    }

    /// Failure left by the last native call, if any
    pub fn pending(&self) -> Option<&Failure> {
        self.pending.as_ref()
    }

    /// Take (and clear) the pending failure
    pub fn take_pending(&mut self) -> Option<Failure> {
        self.pending.take()
    }

    pub(crate) fn set_pending(&mut self, failure: Failure) {
        self.pending = Some(failure);
    }
}

/// Live threads keyed by their `java/lang/VMThread` object
#[derive(Default)]
pub struct ThreadTable {
    threads: DashMap<usize, Arc<VmThread>>,
}

impl ThreadTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    fn key(obj: &ObjectRef) -> usize {
        Arc::as_ptr(obj) as usize
    }

    /// Record `thread` under `vm_thread`
    pub fn register(&self, vm_thread: &ObjectRef, thread: Arc<VmThread>) {
        self.threads.insert(Self::key(vm_thread), thread);
    }

    /// Thread record for `vm_thread`
    pub fn get(&self, vm_thread: &ObjectRef) -> Option<Arc<VmThread>> {
        self.threads.get(&Self::key(vm_thread)).map(|t| Arc::clone(&t))
    }

    /// Forget `vm_thread`
    pub fn remove(&self, vm_thread: &ObjectRef) -> Option<Arc<VmThread>> {
        self.threads.remove(&Self::key(vm_thread)).map(|(_, t)| t)
    }

    /// Number of registered threads
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    /// Check if no thread is registered
    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_ids_unique() {
        let a = VmThread::new("a");
        let b = VmThread::new("b");
        assert_ne!(a.id(), b.id());
        assert!(a.is_alive());
    }

    #[test]
    fn test_interrupt_flag_test_and_clear() {
        let t = VmThread::new("t");
        assert!(!t.is_interrupted());
        t.interrupt();
        assert!(t.is_interrupted());
        assert!(t.is_interrupted());
        assert!(t.take_interrupt());
        assert!(!t.take_interrupt());
    }

    #[test]
    fn test_sleep_completes() {
        let t = VmThread::new("t");
        let start = Instant::now();
        t.sleep(Duration::from_millis(10)).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_sleep_interrupted_before_start() {
        let t = VmThread::new("t");
        t.interrupt();
        assert!(matches!(
            t.sleep(Duration::from_secs(10)),
            Err(Failure::Interrupted)
        ));
        assert!(!t.is_interrupted());
    }

    #[test]
    fn test_sleep_woken_by_interrupt() {
        let t = VmThread::new("t");
        let sleeper = Arc::clone(&t);
        let handle = std::thread::spawn(move || sleeper.sleep(Duration::from_secs(30)));
        std::thread::sleep(Duration::from_millis(20));
        t.interrupt();
        assert!(matches!(handle.join().unwrap(), Err(Failure::Interrupted)));
    }

    #[test]
    fn test_env_pending_slot() {
        let mut env = ExecEnv::new(VmThread::new("main"), 16);
        assert!(env.pending().is_none());
        env.set_pending(Failure::ArrayStore);
        assert!(matches!(env.take_pending(), Some(Failure::ArrayStore)));
        assert!(env.pending().is_none());
        assert_eq!(env.stack().max_size(), 16);
    }
}
