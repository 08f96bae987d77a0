pub type SubscriberId = String;

/// Subscriptions of one loopback topic, in the order they were made.
#[derive(Debug, Default)]
pub struct Topic {
    pub name: String,
    pub subscribers: Vec<SubscriberId>,
    /// Payloads fanned out on this topic so far.
    pub published: u64,
}

impl Topic {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subscribers: Vec::new(),
            published: 0,
        }
    }

    /// Returns false if `id` was already subscribed.
    pub fn subscribe(&mut self, id: SubscriberId) -> bool {
        if self.subscribers.contains(&id) {
            return false;
        }
        self.subscribers.push(id);
        true
    }

    pub fn unsubscribe(&mut self, id: &SubscriberId) {
        self.subscribers.retain(|s| s != id);
    }

    pub fn is_idle(&self) -> bool {
        self.subscribers.is_empty()
    }
}
