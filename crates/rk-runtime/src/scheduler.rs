//! Single-threaded cooperative task scheduler (spec.md §4.1, §5), ported
//! from `original_source/src/task_handler.py`'s `TaskHandler`.
//!
//! Deliberately not `tokio`: spec.md §5 calls for one thread, one queue, no
//! locks. `Scheduler` is a thin `Rc<RefCell<_>>` handle — cheap to `Clone`
//! and hand to every component that needs to queue its own ticks, the same
//! role the teacher's `tokio::sync::mpsc` command channel plays in
//! `wf-runtime`'s `Scheduler`, but single-threaded instead of actor-style.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::log_macros::rk_warn;

type TaskFn = Box<dyn FnMut(TaskHandle)>;

struct QueuedTask {
    uid: u64,
    func: TaskFn,
    next_fire: Instant,
    period: Option<Duration>,
    cancelled: bool,
    executing: bool,
}

struct Inner {
    uid_gen: u64,
    queue: Vec<QueuedTask>,
}

impl Inner {
    /// Insert keeping the queue ordered by `next_fire` ascending; ties are
    /// broken by insertion order (new task goes after any existing task due
    /// at the exact same instant), matching `__insert_task`'s `>=` scan.
    fn insert_sorted(&mut self, task: QueuedTask) {
        let idx =
            self.queue.iter().position(|t| t.next_fire > task.next_fire).unwrap_or(self.queue.len());
        self.queue.insert(idx, task);
    }

    fn remove_task(&mut self, uid: u64) -> bool {
        let Some(pos) = self.queue.iter().position(|t| t.uid == uid) else {
            return false;
        };
        if self.queue[pos].executing {
            self.queue[pos].cancelled = true;
        } else {
            self.queue.remove(pos);
        }
        true
    }
}

/// A cloneable handle to the single shared task queue. Cloning is an `Rc`
/// bump, not a new scheduler.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<RefCell<Inner>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self { inner: Rc::new(RefCell::new(Inner { uid_gen: 0, queue: Vec::new() })) }
    }

    /// Queue `func` to run once, `delay_ms` from now.
    pub fn delay(&self, func: impl FnMut(TaskHandle) + 'static, delay_ms: u64) -> TaskHandle {
        self.schedule(func, delay_ms, None)
    }

    /// Queue `func` to run every `period_ms`, first firing `period_ms` from
    /// now.
    pub fn interval(&self, func: impl FnMut(TaskHandle) + 'static, period_ms: u64) -> TaskHandle {
        self.schedule(func, period_ms, Some(Duration::from_millis(period_ms)))
    }

    fn schedule(
        &self,
        func: impl FnMut(TaskHandle) + 'static,
        delay_ms: u64,
        period: Option<Duration>,
    ) -> TaskHandle {
        let mut inner = self.inner.borrow_mut();
        inner.uid_gen += 1;
        let uid = inner.uid_gen;
        let handle = TaskHandle { uid, inner: Rc::clone(&self.inner) };
        inner.insert_sorted(QueuedTask {
            uid,
            func: Box::new(func),
            next_fire: Instant::now() + Duration::from_millis(delay_ms),
            period,
            cancelled: false,
            executing: false,
        });
        handle
    }

    /// Run until the queue is empty. Blocking; intended to be the process's
    /// only loop (spec.md §5).
    pub fn run(&self) {
        loop {
            let uid = loop {
                let mut inner = self.inner.borrow_mut();
                let Some(head) = inner.queue.first() else {
                    return;
                };
                if head.cancelled {
                    inner.queue.remove(0);
                    continue;
                }
                break head.uid;
            };

            let next_fire = self.inner.borrow().queue[0].next_fire;
            let now = Instant::now();
            if next_fire > now {
                std::thread::sleep(next_fire - now);
            }

            let mut func = {
                let mut inner = self.inner.borrow_mut();
                let task = &mut inner.queue[0];
                task.executing = true;
                std::mem::replace(&mut task.func, Box::new(|_| {}))
            };
            func(TaskHandle { uid, inner: Rc::clone(&self.inner) });

            let mut inner = self.inner.borrow_mut();
            let mut task = inner.queue.remove(0);
            task.func = func;
            task.executing = false;
            if let Some(period) = task.period {
                if !task.cancelled {
                    task.next_fire = Instant::now() + period;
                    inner.insert_sorted(task);
                }
            }
        }
    }

    pub fn task_count(&self) -> usize {
        self.inner.borrow().queue.len()
    }
}

/// Handle returned by [`Scheduler::delay`] / [`Scheduler::interval`]. Cheap
/// to `Clone`; a task's own closure is handed one each time it runs so it
/// can cancel itself (spec.md §8 scenario 5).
#[derive(Clone)]
pub struct TaskHandle {
    uid: u64,
    inner: Rc<RefCell<Inner>>,
}

impl TaskHandle {
    pub fn cancel(&self) {
        if !self.inner.borrow_mut().remove_task(self.uid) {
            rk_warn!(sched, uid = self.uid, "cancel of unknown or already-finished task");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc as StdRc;

    #[test]
    fn fires_in_time_order_regardless_of_insertion_order() {
        let scheduler = Scheduler::new();
        let order = StdRc::new(RefCell::new(Vec::new()));

        let o = StdRc::clone(&order);
        scheduler.delay(move |_| o.borrow_mut().push('B'), 20);
        let o = StdRc::clone(&order);
        scheduler.delay(move |_| o.borrow_mut().push('A'), 10);
        let o = StdRc::clone(&order);
        scheduler.delay(move |_| o.borrow_mut().push('C'), 5);

        scheduler.run();

        assert_eq!(order.borrow().as_slice(), &['C', 'A', 'B']);
    }

    #[test]
    fn cancelling_an_interval_stops_it() {
        let scheduler = Scheduler::new();
        let count = StdRc::new(RefCell::new(0u32));
        let done = StdRc::new(RefCell::new(false));

        let c = StdRc::clone(&count);
        let d = StdRc::clone(&done);
        scheduler.interval(
            move |handle| {
                *c.borrow_mut() += 1;
                if *d.borrow() {
                    handle.cancel();
                }
            },
            10,
        );

        let d = StdRc::clone(&done);
        scheduler.delay(move |_| *d.borrow_mut() = true, 100);

        scheduler.run();

        // interval fired roughly every 10ms for 100ms, then cancelled itself
        // on its own next firing after the flag flips.
        assert!(*count.borrow() >= 7 && *count.borrow() <= 15);
    }

    #[test]
    fn self_cancel_from_within_task_body_does_not_deadlock() {
        let scheduler = Scheduler::new();
        let runs = StdRc::new(RefCell::new(0));
        let r = StdRc::clone(&runs);
        scheduler.interval(
            move |handle| {
                *r.borrow_mut() += 1;
                handle.cancel();
            },
            1,
        );
        scheduler.run();
        assert_eq!(*runs.borrow(), 1);
    }
}
