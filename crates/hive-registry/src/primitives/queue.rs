//! Counting-barrier queue

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use hive_core::RegistryError;
use hive_protocol::Value;

#[derive(Debug, Default)]
struct Inner {
    items: VecDeque<Value>,
    /// Last value ever put; returned by `get` when the queue is empty
    last: Option<Value>,
    /// Mirror of every append while attached; the barrier counts this
    counter: Option<Vec<Value>>,
}

/// Unbounded multi-producer/multi-consumer queue with barrier
/// bookkeeping.
///
/// `put` mirrors every append into the counter sub-queue while one is
/// attached; `wait_for_count` polls until the counter holds exactly the
/// target number of items. `get` never blocks: once anything has been
/// put, an empty queue answers with the last-seen value.
#[derive(Debug, Default)]
pub struct CounterQueue {
    inner: Mutex<Inner>,
}

impl CounterQueue {
    /// Create a new queue with no counter attached
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` `times` times, mirroring each append into the
    /// counter if one is attached
    pub fn put(&self, value: Value, times: u32) {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        inner.last = Some(value.clone());
        for _ in 0..times {
            if let Some(counter) = inner.counter.as_mut() {
                counter.push(value.clone());
            }
            inner.items.push_back(value.clone());
        }
    }

    /// Pop the front of the queue, or return the last-seen value when
    /// empty. `None` only before the first `put`.
    pub fn get(&self) -> Option<Value> {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        match inner.items.pop_front() {
            Some(value) => Some(value),
            None => inner.last.clone(),
        }
    }

    /// Drain the queue and return its final element, or the last-seen
    /// value if already empty
    pub fn get_last(&self) -> Option<Value> {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        let drained = inner.items.drain(..).last();
        if let Some(value) = drained {
            inner.last = Some(value.clone());
            return Some(value);
        }
        inner.last.clone()
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue mutex poisoned").items.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start mirroring appends into the counter sub-queue
    pub fn attach_counter(&self) {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        if inner.counter.is_none() {
            inner.counter = Some(Vec::new());
        }
    }

    /// Stop mirroring and discard the counter
    pub fn detach_counter(&self) {
        self.inner.lock().expect("queue mutex poisoned").counter = None;
    }

    /// Drain the counter sub-queue, keeping it attached
    pub fn reset_counter(&self) {
        if let Some(counter) = self
            .inner
            .lock()
            .expect("queue mutex poisoned")
            .counter
            .as_mut()
        {
            counter.clear();
        }
    }

    /// Snapshot of the counter sub-queue, without removal
    pub fn counter_items(&self) -> Vec<Value> {
        self.inner
            .lock()
            .expect("queue mutex poisoned")
            .counter
            .clone()
            .unwrap_or_default()
    }

    /// Poll until the counter holds exactly `count` items, then return
    /// them all without removing them.
    ///
    /// Yields to the scheduler on every poll; `deadline` opts into
    /// timeout failure instead of waiting forever.
    pub async fn wait_for_count(
        &self,
        count: usize,
        interval: Duration,
        deadline: Option<Duration>,
    ) -> Result<Vec<Value>, RegistryError> {
        let started = Instant::now();
        loop {
            let items = self.counter_items();
            if items.len() == count {
                return Ok(items);
            }
            if let Some(deadline) = deadline {
                if started.elapsed() >= deadline {
                    return Err(RegistryError::DeadlineExceeded {
                        what: format!("barrier count {}", count),
                        deadline,
                    });
                }
            }
            tokio::time::sleep(interval).await;
        }
    }
}
