//! Cooperative single-threaded task queue
//!
//! Persistence requests never run inline. `save`, `destroy` and `fetch`
//! queue a task here; the task performs the transport call and applies
//! the completion when the loop is pumped. Tasks run strictly one at a
//! time in FIFO order, and tasks queued by a running task run after
//! everything already queued.

use log::debug;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

struct Task {
    label: String,
    run: Box<dyn FnOnce()>,
}

/// Shared handle to the application's task queue
#[derive(Clone, Default)]
pub struct EventLoop {
    queue: Rc<RefCell<VecDeque<Task>>>,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a task to run on a later tick
    pub fn spawn(&self, label: impl Into<String>, task: impl FnOnce() + 'static) {
        let label = label.into();
        debug!("queued task: {}", label);
        self.queue.borrow_mut().push_back(Task {
            label,
            run: Box::new(task),
        });
    }

    /// Number of queued tasks
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Labels of queued tasks, oldest first
    pub fn pending_labels(&self) -> Vec<String> {
        self.queue.borrow().iter().map(|t| t.label.clone()).collect()
    }

    /// Run the oldest queued task. Returns false when the queue was empty.
    pub fn run_once(&self) -> bool {
        // The borrow must end before the task runs: tasks spawn more tasks.
        let task = self.queue.borrow_mut().pop_front();
        match task {
            Some(task) => {
                debug!("running task: {}", task.label);
                (task.run)();
                true
            }
            None => false,
        }
    }

    /// Run tasks until the queue is empty, returning how many ran
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_once() {
            ran += 1;
        }
        ran
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("pending", &self.pending_labels())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tasks_run_in_fifo_order() {
        let event_loop = EventLoop::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            event_loop.spawn(format!("task {i}"), move || order.borrow_mut().push(i));
        }

        assert_eq!(event_loop.pending(), 3);
        assert!(order.borrow().is_empty());
        assert_eq!(event_loop.run_until_idle(), 3);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
        assert!(event_loop.is_idle());
    }

    #[test]
    fn test_nested_spawn_runs_after_queued_tasks() {
        let event_loop = EventLoop::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let inner_loop = event_loop.clone();
        let o = order.clone();
        event_loop.spawn("outer", move || {
            o.borrow_mut().push("outer");
            let o = o.clone();
            inner_loop.spawn("nested", move || o.borrow_mut().push("nested"));
        });
        let o = order.clone();
        event_loop.spawn("second", move || o.borrow_mut().push("second"));

        assert!(event_loop.run_once());
        assert_eq!(event_loop.pending_labels(), vec!["second", "nested"]);
        event_loop.run_until_idle();
        assert_eq!(*order.borrow(), vec!["outer", "second", "nested"]);
    }

    #[test]
    fn test_run_once_on_empty_queue() {
        assert!(!EventLoop::new().run_once());
    }
}
