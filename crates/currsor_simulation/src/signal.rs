//! Observer lists for core signals.
//!
//! Subscribers run synchronously inside `emit`, in registration order, on the
//! simulation thread. The optional journal keeps a copy of every payload
//! until drained; the ECS bridge uses it to re-publish signals as Bevy events.

/// Handle returned by [`Signal::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber<T> = Box<dyn FnMut(&T) + Send + Sync>;

pub struct Signal<T> {
    subscribers: Vec<(SubscriptionId, Subscriber<T>)>,
    next_id: u64,
    emitted: u64,
    journal: Option<Vec<T>>,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
            next_id: 0,
            emitted: 0,
            journal: None,
        }
    }
}

impl<T> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("subscribers", &self.subscribers.len())
            .field("emitted", &self.emitted)
            .field("journaled", &self.journal.as_ref().map(Vec::len))
            .finish()
    }
}

impl<T: Clone> Signal<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, subscriber: F) -> SubscriptionId
    where
        F: FnMut(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
        self.subscribers.len() != before
    }

    pub fn emit(&mut self, payload: &T) {
        self.emitted += 1;
        for (_, subscriber) in self.subscribers.iter_mut() {
            subscriber(payload);
        }
        if let Some(journal) = self.journal.as_mut() {
            journal.push(payload.clone());
        }
    }

    /// Total number of `emit` calls since creation.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn enable_journal(&mut self) {
        if self.journal.is_none() {
            self.journal = Some(Vec::new());
        }
    }

    pub fn drain_journal(&mut self) -> Vec<T> {
        self.journal.as_mut().map(std::mem::take).unwrap_or_default()
    }
}
