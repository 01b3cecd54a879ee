//! Microtask batching queue.
//!
//! Property writes coalesce through this queue: everything scheduled before a
//! flush boundary runs together, synchronously, in FIFO order, before any
//! timer-based work the host may run. The host event loop (or a test) is the
//! platform collaborator that decides when the boundary happens, by calling
//! [`microtask::flush`].

use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};

use thiserror::Error;

/// Handle used for canceling a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskHandle(u64);

/// Error raised for misuse of the queue.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    /// The handle's task already ran or was already canceled. Double-cancel
    /// is a programming error, not a recoverable condition.
    #[error("invalid task handle: {0}")]
    InvalidHandle(u64),
}

type Callback = Box<dyn FnOnce()>;

#[derive(Default)]
struct Queue {
    callbacks: Vec<Option<Callback>>,
    /// Handle of the first callback still in `callbacks`.
    drained: u64,
}

thread_local! {
    static QUEUE: RefCell<Queue> = RefCell::new(Queue::default());
}

/// The microtask queue.
pub mod microtask {
    use super::*;

    /// Enqueue a callback for the next flush boundary.
    pub fn run(callback: impl FnOnce() + 'static) -> TaskHandle {
        QUEUE.with(|queue| {
            let mut queue = queue.borrow_mut();
            let handle = queue.drained + queue.callbacks.len() as u64;
            queue.callbacks.push(Some(Box::new(callback)));
            TaskHandle(handle)
        })
    }

    /// Cancel a pending task. Canceling one that already ran (or was already
    /// canceled) is an error; the FIFO slots of other tasks are unaffected.
    pub fn cancel(handle: TaskHandle) -> Result<(), ScheduleError> {
        QUEUE.with(|queue| {
            let mut queue = queue.borrow_mut();
            let TaskHandle(raw) = handle;
            if raw < queue.drained {
                return Err(ScheduleError::InvalidHandle(raw));
            }
            let index = (raw - queue.drained) as usize;
            match queue.callbacks.get_mut(index) {
                Some(slot) if slot.is_some() => {
                    *slot = None;
                    Ok(())
                }
                _ => Err(ScheduleError::InvalidHandle(raw)),
            }
        })
    }

    /// Run one batch: every callback scheduled before this call, in
    /// submission order. Callbacks scheduled while the batch runs land in the
    /// next batch. A panicking callback is isolated and reported; its
    /// siblings still run. Returns how many callbacks ran.
    pub fn flush() -> usize {
        let batch: Vec<Option<Callback>> = QUEUE.with(|queue| {
            let mut queue = queue.borrow_mut();
            let len = queue.callbacks.len();
            queue.drained += len as u64;
            queue.callbacks.drain(..len).collect()
        });
        let mut ran = 0;
        for callback in batch.into_iter().flatten() {
            if catch_unwind(AssertUnwindSafe(callback)).is_err() {
                tracing::error!("microtask callback panicked; continuing batch");
            }
            ran += 1;
        }
        ran
    }

    /// Flush until the queue is empty, following chained schedules.
    pub fn flush_all() -> usize {
        let mut total = 0;
        loop {
            let ran = flush();
            if ran == 0 && pending() == 0 {
                return total;
            }
            total += ran;
        }
    }

    /// Number of callbacks currently queued (including canceled slots).
    pub fn pending() -> usize {
        QUEUE.with(|queue| queue.borrow().callbacks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_fifo_batching() {
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let o = order.clone();
            microtask::run(move || o.borrow_mut().push(i));
        }
        assert_eq!(microtask::flush(), 3);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_cancel_pending() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let o = order.clone();
        microtask::run(move || o.borrow_mut().push("a"));
        let o = order.clone();
        let b = microtask::run(move || o.borrow_mut().push("b"));
        let o = order.clone();
        microtask::run(move || o.borrow_mut().push("c"));
        microtask::cancel(b).unwrap();
        microtask::flush();
        assert_eq!(*order.borrow(), vec!["a", "c"]);
    }

    #[test]
    fn test_cancel_after_run_errors() {
        let handle = microtask::run(|| {});
        microtask::flush();
        assert!(microtask::cancel(handle).is_err());
    }

    #[test]
    fn test_double_cancel_errors() {
        let handle = microtask::run(|| {});
        microtask::cancel(handle).unwrap();
        assert!(microtask::cancel(handle).is_err());
        microtask::flush();
    }

    #[test]
    fn test_schedule_during_flush_is_next_batch() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let o = order.clone();
        microtask::run(move || {
            o.borrow_mut().push("first");
            let o2 = o.clone();
            microtask::run(move || o2.borrow_mut().push("second"));
        });
        assert_eq!(microtask::flush(), 1);
        assert_eq!(*order.borrow(), vec!["first"]);
        microtask::flush();
        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_panic_does_not_stop_batch() {
        let order = Rc::new(RefCell::new(Vec::new()));
        microtask::run(|| panic!("boom"));
        let o = order.clone();
        microtask::run(move || o.borrow_mut().push("after"));
        microtask::flush();
        assert_eq!(*order.borrow(), vec!["after"]);
    }
}
