//! A fixed-capacity, allocation-free single-producer/single-consumer ring
//! buffer. Used on the audio-thread boundary: the DSP producer pushes 32 kHz
//! stereo samples, the resampler/host consumer pops them, and no lock or
//! allocation is ever involved on either side. Also backs the control-plane
//! command queue for compound commands (key events, SPC swaps) that cannot
//! be expressed as a single atomic scalar.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct SpscRingBuffer<T> {
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

unsafe impl<T: Send> Sync for SpscRingBuffer<T> {}

impl<T> SpscRingBuffer<T> {
    /// `capacity` is rounded up to the next power of two.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1).next_power_of_two();
        let buffer =
            (0..capacity).map(|_| UnsafeCell::new(MaybeUninit::uninit())).collect::<Vec<_>>();

        Self {
            buffer: buffer.into_boxed_slice(),
            mask: capacity - 1,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    #[must_use]
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.wrapping_sub(head)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Single-producer only. Returns the value back if the buffer is full.
    pub fn push(&self, value: T) -> Result<(), T> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail.wrapping_sub(head) >= self.capacity() {
            return Err(value);
        }

        let index = tail & self.mask;
        // SAFETY: single producer, this slot was vacated by the consumer
        // (or never written) and is not concurrently accessed; `tail` is
        // only published after the write completes.
        unsafe {
            (*self.buffer[index].get()).write(value);
        }
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Single-consumer only.
    pub fn pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }

        let index = head & self.mask;
        // SAFETY: `head != tail` means this slot was published by the
        // producer and ownership moves to the caller; the slot is not read
        // again until the producer overwrites it after `head` advances.
        let value = unsafe { (*self.buffer[index].get()).assume_init_read() };
        self.head.store(head.wrapping_add(1), Ordering::Release);
        Some(value)
    }

    /// Control-thread only: must not be called concurrently with `push`/`pop`.
    /// Used at `LoadSpc`/`Seek`/`Stop` boundaries, which are serialized with
    /// the audio thread via the command queue rather than run concurrently
    /// with it. Drops any values still logically queued.
    pub fn clear(&self) {
        while self.pop().is_some() {}
    }
}

impl<T> Drop for SpscRingBuffer<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

/// A single-producer/single-consumer queue for compound control-plane
/// commands. Thin naming wrapper over [`SpscRingBuffer`] for call-site clarity.
pub struct CommandQueue<T> {
    inner: SpscRingBuffer<T>,
}

impl<T> CommandQueue<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { inner: SpscRingBuffer::new(capacity) }
    }

    pub fn push(&self, value: T) -> Result<(), T> {
        self.inner.push(value)
    }

    pub fn pop(&self) -> Option<T> {
        self.inner.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_order() {
        let ring: SpscRingBuffer<i16> = SpscRingBuffer::new(4);
        assert!(ring.push(1).is_ok());
        assert!(ring.push(2).is_ok());
        assert_eq!(ring.pop(), Some(1));
        assert_eq!(ring.pop(), Some(2));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn rejects_push_when_full() {
        let ring: SpscRingBuffer<u8> = SpscRingBuffer::new(2);
        assert!(ring.push(1).is_ok());
        assert!(ring.push(2).is_ok());
        assert_eq!(ring.push(3), Err(3));
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn clear_resets_to_empty() {
        let ring: SpscRingBuffer<u8> = SpscRingBuffer::new(4);
        let _ = ring.push(1);
        let _ = ring.push(2);
        ring.clear();
        assert!(ring.is_empty());
    }

    #[test]
    fn command_queue_round_trip() {
        let queue: CommandQueue<String> = CommandQueue::new(4);
        assert!(queue.push("hello".to_string()).is_ok());
        assert_eq!(queue.pop().as_deref(), Some("hello"));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn drop_does_not_leak_or_double_drop() {
        use std::rc::Rc;
        let ring: SpscRingBuffer<Rc<()>> = SpscRingBuffer::new(4);
        let value = Rc::new(());
        let _ = ring.push(value.clone());
        let _ = ring.push(value.clone());
        assert_eq!(Rc::strong_count(&value), 3);
        drop(ring);
        assert_eq!(Rc::strong_count(&value), 1);
    }
}
