//! Operand stack and frame chain
//!
//! Each thread owns one [`OperandStack`] and one [`FrameChain`].
//!
//! # Frame Chain
//!
//! ```text
//! top ──► Real(m3) ──► Boundary ──► Real(m2) ──► Real(m1) ──► Root
//!         (newest)                                             (sentinel)
//! ```
//!
//! Every frame except `Root` links to its predecessor, so classification is
//! a structural match on the frame kind.

use std::sync::Arc;

use crate::class::Method;
use crate::error::{Failure, NativeResult};
use crate::value::Slot;

/// Default maximum operand stack size (in slots)
pub const DEFAULT_MAX_STACK_SLOTS: usize = 1024 * 64;

/// One entry of a thread's call chain
#[derive(Debug)]
pub enum Frame {
    /// Activation of a method
    Real(Arc<Method>, Arc<Frame>),
    /// Transition from VM invocation machinery into executed code
    Boundary(Arc<Frame>),
    /// End of the chain
    Root,
}

impl Frame {
    /// Predecessor frame (`None` for the root)
    #[inline]
    pub fn prev(&self) -> Option<&Arc<Frame>> {
        match self {
            Frame::Real(_, prev) | Frame::Boundary(prev) => Some(prev),
            Frame::Root => None,
        }
    }

    /// Method of a real frame
    #[inline]
    pub fn method(&self) -> Option<&Arc<Method>> {
        match self {
            Frame::Real(method, _) => Some(method),
            _ => None,
        }
    }

    /// Check if this is a boundary marker
    #[inline]
    pub fn is_boundary(&self) -> bool {
        matches!(self, Frame::Boundary(_))
    }
}

/// Newest-first chain of a thread's frames
#[derive(Debug)]
pub struct FrameChain {
    top: Arc<Frame>,
    depth: usize,
}

impl FrameChain {
    /// Chain holding only the root sentinel
    pub fn new() -> Self {
        Self {
            top: Arc::new(Frame::Root),
            depth: 0,
        }
    }

    /// Newest frame
    #[inline]
    pub fn top(&self) -> &Arc<Frame> {
        &self.top
    }

    /// Number of frames above the root
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Push a real frame for `method`
    pub fn push_real(&mut self, method: Arc<Method>) {
        let prev = Arc::clone(&self.top);
        self.top = Arc::new(Frame::Real(method, prev));
        self.depth += 1;
    }

    /// Push a boundary marker
    pub fn push_boundary(&mut self) {
        let prev = Arc::clone(&self.top);
        self.top = Arc::new(Frame::Boundary(prev));
        self.depth += 1;
    }

    /// Pop the newest frame; the root is never popped
    pub fn pop(&mut self) -> Option<Arc<Frame>> {
        let prev = Arc::clone(self.top.prev()?);
        self.depth -= 1;
        Some(std::mem::replace(&mut self.top, prev))
    }

    /// Iterate from the newest frame to the root (inclusive)
    pub fn iter(&self) -> FrameIter<'_> {
        FrameIter {
            next: Some(&self.top),
        }
    }
}

impl Default for FrameChain {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FrameChain {
    fn drop(&mut self) {
        // Unlink iteratively so a deep chain cannot overflow the native stack
        let mut next = Some(std::mem::replace(&mut self.top, Arc::new(Frame::Root)));
        while let Some(frame) = next {
            next = match Arc::try_unwrap(frame) {
                Ok(Frame::Real(_, prev)) | Ok(Frame::Boundary(prev)) => Some(prev),
                _ => None,
            };
        }
    }
}

/// Iterator over frames, newest first
pub struct FrameIter<'a> {
    next: Option<&'a Arc<Frame>>,
}

impl<'a> Iterator for FrameIter<'a> {
    type Item = &'a Arc<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.prev();
        Some(current)
    }
}

/// Operand stack shared by the interpreter and native functions
#[derive(Debug)]
pub struct OperandStack {
    slots: Vec<Slot>,
    max_size: usize,
}

impl OperandStack {
    /// Create a stack with default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_STACK_SLOTS)
    }

    /// Create a stack holding at most `max_size` slots
    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            slots: Vec::with_capacity(max_size.min(1024)),
            max_size,
        }
    }

    // ========================================================================
    // Operand Stack Operations
    // ========================================================================

    /// Push a slot
    ///
    /// # Errors
    ///
    /// Returns `Failure::Internal` if the stack is full.
    #[inline]
    pub fn push(&mut self, slot: Slot) -> NativeResult<()> {
        if self.slots.len() >= self.max_size {
            return Err(Failure::Internal("operand stack overflow".into()));
        }
        self.slots.push(slot);
        Ok(())
    }

    /// Pop a slot
    #[inline]
    pub fn pop(&mut self) -> NativeResult<Slot> {
        self.slots
            .pop()
            .ok_or_else(|| Failure::Internal("operand stack underflow".into()))
    }

    /// Check that `n` more slots fit
    pub fn ensure(&self, n: usize) -> NativeResult<()> {
        if self.slots.len() + n > self.max_size {
            return Err(Failure::Internal("operand stack overflow".into()));
        }
        Ok(())
    }

    /// Slot at absolute position `index`
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    /// Slots from `start` to the top
    #[inline]
    pub fn slots_from(&self, start: usize) -> &[Slot] {
        self.slots.get(start..).unwrap_or(&[])
    }

    /// Current top-of-stack position (number of slots)
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the stack is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Maximum number of slots
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Drop every slot at or above `len`
    #[inline]
    pub fn truncate(&mut self, len: usize) {
        self.slots.truncate(len);
    }
}

impl Default for OperandStack {
    fn default() -> Self {
        Self::new()
    }
}
