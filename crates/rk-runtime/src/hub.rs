//! In-process publish/subscribe message hub (spec.md §4.2), ported from
//! `original_source/src/message.py`'s `MessageHub` / `Producer` / `Consumer`.
//!
//! The two-phase, batched dispatch is the load-bearing property: `deliver`
//! only ever enqueues and, the first time the queue goes from empty to
//! non-empty, schedules a single zero-delay flush task. `flush` swaps the
//! queue out before dispatching, so a message published *while* dispatching
//! the current batch lands in the *next* batch rather than recursing —
//! this is what keeps the navigator/motor/estimator cycle (spec.md §3, §9)
//! from blowing the stack.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use rk_core::message::{Message, MessageId, Payload};

use crate::clock::now_ms;
use crate::log_macros::rk_error;
use crate::scheduler::Scheduler;

/// A component that wants to receive messages of the kinds named by
/// [`Consumer::get_consumed`].
pub trait Consumer {
    fn send(&mut self, message: &Message);
    fn get_consumed(&self) -> Vec<MessageId>;
}

/// Start/stop lifecycle shared by every long-running component (spec.md
/// §4.8's `Service` capability).
pub trait Service {
    fn start(&mut self);
    fn stop(&mut self);
}

struct HubInner {
    consumers: HashMap<MessageId, Vec<Rc<RefCell<dyn Consumer>>>>,
    queue: Vec<Message>,
    flush_pending: bool,
    scheduler: Scheduler,
}

/// A cloneable handle to the shared hub. Components hold a clone and call
/// [`Hub::deliver`] directly rather than going through a separate `Producer`
/// trait object — in Rust, "is a producer" is just "holds a `Hub`".
#[derive(Clone)]
pub struct Hub {
    inner: Rc<RefCell<HubInner>>,
}

impl Hub {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            inner: Rc::new(RefCell::new(HubInner {
                consumers: HashMap::new(),
                queue: Vec::new(),
                flush_pending: false,
                scheduler,
            })),
        }
    }

    /// Register a consumer for every [`MessageId`] its
    /// [`Consumer::get_consumed`] names.
    pub fn add_consumer(&self, consumer: Rc<RefCell<dyn Consumer>>) {
        let consumed = consumer.borrow().get_consumed();
        let mut inner = self.inner.borrow_mut();
        for id in consumed {
            inner.consumers.entry(id).or_default().push(Rc::clone(&consumer));
        }
    }

    /// Publish a payload, stamped with the current wall-clock time. Queues
    /// the message and, if no flush is already pending, schedules one.
    pub fn deliver(&self, payload: Payload) {
        let message = Message::new(now_ms(), payload);
        let mut inner = self.inner.borrow_mut();
        inner.queue.push(message);
        if !inner.flush_pending {
            inner.flush_pending = true;
            let hub = self.clone();
            inner.scheduler.delay(move |_| hub.flush(), 0);
        }
    }

    fn flush(&self) {
        let messages = {
            let mut inner = self.inner.borrow_mut();
            inner.flush_pending = false;
            std::mem::take(&mut inner.queue)
        };

        for message in messages {
            let subscribers = {
                let inner = self.inner.borrow();
                match inner.consumers.get(&message.id()) {
                    Some(subs) => subs.clone(),
                    None => continue,
                }
            };
            for consumer in subscribers {
                let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    consumer.borrow_mut().send(&message);
                }));
                if outcome.is_err() {
                    rk_error!(sched, id = ?message.id(), "consumer panicked while handling message, isolating");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rk_core::message::Payload;

    struct Recorder {
        wants: Vec<MessageId>,
        seen: Rc<RefCell<Vec<MessageId>>>,
    }

    impl Consumer for Recorder {
        fn send(&mut self, message: &Message) {
            self.seen.borrow_mut().push(message.id());
        }

        fn get_consumed(&self) -> Vec<MessageId> {
            self.wants.clone()
        }
    }

    #[test]
    fn delivers_only_to_subscribed_consumers() {
        let scheduler = Scheduler::new();
        let hub = Hub::new(scheduler.clone());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let recorder = Rc::new(RefCell::new(Recorder {
            wants: vec![MessageId::SonarReading],
            seen: Rc::clone(&seen),
        }));
        hub.add_consumer(recorder);

        hub.deliver(Payload::SonarReading { reading_m: 1.0, std: 0.1, constant_std: 0.01, normal_std: 0.2 });
        hub.deliver(Payload::StartRequest);
        scheduler.run();

        assert_eq!(seen.borrow().as_slice(), &[MessageId::SonarReading]);
    }

    #[test]
    fn a_message_published_during_flush_is_delivered_in_the_next_batch() {
        let scheduler = Scheduler::new();
        let hub = Hub::new(scheduler.clone());
        let order = Rc::new(RefCell::new(Vec::new()));

        struct Chainer {
            hub: Hub,
            order: Rc<RefCell<Vec<&'static str>>>,
            fired: bool,
        }
        impl Consumer for Chainer {
            fn send(&mut self, _message: &Message) {
                self.order.borrow_mut().push("first");
                if !self.fired {
                    self.fired = true;
                    self.hub.deliver(Payload::TerminateRequest);
                }
            }
            fn get_consumed(&self) -> Vec<MessageId> {
                vec![MessageId::StartRequest, MessageId::TerminateRequest]
            }
        }

        let chainer = Rc::new(RefCell::new(Chainer { hub: hub.clone(), order: Rc::clone(&order), fired: false }));
        hub.add_consumer(chainer);
        hub.deliver(Payload::StartRequest);
        scheduler.run();

        assert_eq!(order.borrow().as_slice(), &["first", "first"]);
    }

    #[test]
    fn a_panicking_consumer_does_not_stop_other_subscribers() {
        let scheduler = Scheduler::new();
        let hub = Hub::new(scheduler.clone());
        let seen = Rc::new(RefCell::new(Vec::new()));

        struct Panicker;
        impl Consumer for Panicker {
            fn send(&mut self, _message: &Message) {
                panic!("boom");
            }
            fn get_consumed(&self) -> Vec<MessageId> {
                vec![MessageId::StartRequest]
            }
        }

        hub.add_consumer(Rc::new(RefCell::new(Panicker)));
        hub.add_consumer(Rc::new(RefCell::new(Recorder { wants: vec![MessageId::StartRequest], seen: Rc::clone(&seen) })));

        let prev_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(|_| {}));
        hub.deliver(Payload::StartRequest);
        scheduler.run();
        std::panic::set_hook(prev_hook);

        assert_eq!(seen.borrow().as_slice(), &[MessageId::StartRequest]);
    }
}
