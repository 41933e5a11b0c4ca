//! Self-terminating work queue
//!
//! The queue is an actor: one spawned task owns the pending items, the set of
//! items handed out but not yet acknowledged, and the pollers waiting for
//! work. Every handle talks to it over an unbounded channel, so mutations are
//! serialized without locks.
//!
//! The queue closes itself once nothing is pending, nothing is active, and
//! no producer lease is held. Closing wakes every parked poller with `None`.
//! An active item can still cause new pushes, so a momentarily empty backlog
//! never ends the crawl on its own.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use tokio::sync::{mpsc, oneshot};

enum Command<T> {
    Push(T),
    Poll(oneshot::Sender<Option<T>>),
    Ack(T),
    Count(oneshot::Sender<usize>),
    Hold,
    Release,
}

/// Handle to a running queue
///
/// Handles are cheap to clone; the owning task exits when the last handle
/// and the last producer lease are dropped.
pub struct Queue<T> {
    tx: mpsc::UnboundedSender<Command<T>>,
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> Queue<T>
where
    T: Eq + Hash + Clone + Send + 'static,
{
    /// Spawns the owning task on the current tokio runtime
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx));
        Self { tx }
    }

    /// Enqueues an item without blocking
    pub fn push(&self, item: T) {
        self.send(Command::Push(item));
    }

    /// Waits for the next item
    ///
    /// # Returns
    ///
    /// * `Some(item)` - The item is now active and must be acknowledged
    /// * `None` - The queue has closed
    pub async fn poll(&self) -> Option<T> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Poll(reply));
        rx.await.unwrap_or(None)
    }

    /// Marks an active item as done
    pub fn ack(&self, item: T) {
        self.send(Command::Ack(item));
    }

    /// Returns the number of pending items
    pub async fn count(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Count(reply));
        rx.await.unwrap_or(0)
    }

    /// Takes a producer lease
    ///
    /// The queue stays open while the returned guard is alive, even when it
    /// has nothing pending or active.
    pub fn producer(&self) -> ProducerGuard<T> {
        self.send(Command::Hold);
        ProducerGuard {
            queue: self.clone(),
        }
    }

    fn send(&self, command: Command<T>) {
        if self.tx.send(command).is_err() {
            tracing::error!("Queue task is gone");
        }
    }
}

impl<T> Default for Queue<T>
where
    T: Eq + Hash + Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Producer lease returned by [`Queue::producer`]; releases on drop
pub struct ProducerGuard<T> {
    queue: Queue<T>,
}

impl<T> ProducerGuard<T>
where
    T: Eq + Hash + Clone + Send + 'static,
{
    pub fn push(&self, item: T) {
        self.queue.push(item);
    }
}

impl<T> Drop for ProducerGuard<T> {
    fn drop(&mut self) {
        let _ = self.queue.tx.send(Command::Release);
    }
}

struct State<T> {
    pending: VecDeque<T>,
    active: HashMap<T, usize>,
    waiters: VecDeque<oneshot::Sender<Option<T>>>,
    producers: usize,
    closed: bool,
}

impl<T> State<T>
where
    T: Eq + Hash + Clone,
{
    fn activate(&mut self, item: T) {
        *self.active.entry(item).or_insert(0) += 1;
    }

    fn deactivate(&mut self, item: &T) {
        if let Some(count) = self.active.get_mut(item) {
            *count -= 1;
            if *count == 0 {
                self.active.remove(item);
            }
        }
    }

    fn push(&mut self, mut item: T) {
        if self.closed {
            tracing::debug!("Push after the queue closed was dropped");
            return;
        }

        // Hand the item straight to a parked poller if one is still listening
        while let Some(waiter) = self.waiters.pop_front() {
            self.activate(item.clone());
            match waiter.send(Some(item)) {
                Ok(()) => return,
                Err(returned) => match returned {
                    Some(back) => {
                        self.deactivate(&back);
                        item = back;
                    }
                    None => return,
                },
            }
        }

        self.pending.push_back(item);
    }

    fn poll(&mut self, reply: oneshot::Sender<Option<T>>) {
        if self.closed {
            let _ = reply.send(None);
            return;
        }

        match self.pending.pop_front() {
            Some(item) => {
                self.activate(item.clone());
                if let Err(Some(item)) = reply.send(Some(item)) {
                    self.deactivate(&item);
                    self.pending.push_front(item);
                }
            }
            None => self.waiters.push_back(reply),
        }
    }

    fn close_if_idle(&mut self) {
        if self.closed
            || !self.pending.is_empty()
            || !self.active.is_empty()
            || self.producers > 0
        {
            return;
        }

        self.closed = true;
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(None);
        }
    }
}

async fn run<T>(mut rx: mpsc::UnboundedReceiver<Command<T>>)
where
    T: Eq + Hash + Clone,
{
    let mut state = State {
        pending: VecDeque::new(),
        active: HashMap::new(),
        waiters: VecDeque::new(),
        producers: 0,
        closed: false,
    };

    while let Some(command) = rx.recv().await {
        match command {
            Command::Push(item) => state.push(item),
            Command::Poll(reply) => state.poll(reply),
            Command::Ack(item) => {
                state.deactivate(&item);
                state.close_if_idle();
            }
            Command::Count(reply) => {
                let _ = reply.send(state.pending.len());
            }
            Command::Hold => state.producers += 1,
            Command::Release => {
                state.producers = state.producers.saturating_sub(1);
                state.close_if_idle();
            }
        }
    }
}
