use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;

/// Per-key queue: callers draw consecutive tickets and run when the ticket
/// being served reaches theirs.
#[derive(Debug)]
struct KeySlot {
    next_ticket: u64,
    serving: u64,
    turn: watch::Sender<u64>,
    /// Tickets whose callers were dropped before their turn came
    abandoned: BTreeSet<u64>,
    pending: usize,
}

impl KeySlot {
    fn new() -> Self {
        let (turn, _) = watch::channel(0);
        Self {
            next_ticket: 0,
            serving: 0,
            turn,
            abandoned: BTreeSet::new(),
            pending: 0,
        }
    }

    /// Hand the key to the next live ticket
    fn advance(&mut self) {
        self.serving += 1;
        while self.abandoned.remove(&self.serving) {
            self.serving += 1;
        }
        self.turn.send_replace(self.serving);
    }
}

/// Mutual exclusion keyed by an identifier
///
/// For a fixed key, [`dispatch`](Self::dispatch) runs operations one at a time
/// in the order `dispatch` was called, whatever order the returned futures are
/// first polled in. Operations on distinct keys do not wait on each other. A
/// key's slot is created on first use and dropped once nothing is queued on it.
#[derive(Debug)]
pub struct KeyedLock<K> {
    slots: Mutex<HashMap<K, KeySlot>>,
}

impl<K> KeyedLock<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Queue `operation` behind every earlier call on `key`
    ///
    /// The place in the queue is taken when this method is called, not when
    /// the returned future is first polled. The operation's output, including
    /// any error it returns, goes back to this caller only. The key is
    /// released when the operation finishes or when the returned future is
    /// dropped.
    pub fn dispatch<F, Fut, R>(&self, key: K, operation: F) -> impl Future<Output = R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let mut entry = self.enter(key);
        async move {
            entry.wait_turn().await;
            operation().await
        }
    }

    /// Number of keys with queued or in-flight operations
    pub fn active_keys(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn enter(&self, key: K) -> PendingEntry<'_, K> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = slots.entry(key.clone()).or_insert_with(KeySlot::new);
        let ticket = slot.next_ticket;
        slot.next_ticket += 1;
        slot.pending += 1;

        PendingEntry {
            lock: self,
            key,
            ticket,
            turn: slot.turn.subscribe(),
        }
    }

    fn leave(&self, key: &K, ticket: u64) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get_mut(key) {
            if slot.serving == ticket {
                slot.advance();
            } else {
                slot.abandoned.insert(ticket);
            }
            slot.pending -= 1;
            if slot.pending == 0 {
                slots.remove(key);
            }
        }
    }
}

impl<K> Default for KeyedLock<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// One caller's ticket on a key; gives up its turn on drop.
struct PendingEntry<'a, K>
where
    K: Eq + Hash + Clone,
{
    lock: &'a KeyedLock<K>,
    key: K,
    ticket: u64,
    turn: watch::Receiver<u64>,
}

impl<K> PendingEntry<'_, K>
where
    K: Eq + Hash + Clone,
{
    async fn wait_turn(&mut self) {
        let ticket = self.ticket;
        // The sender lives in the slot, which outlives every pending entry
        let _ = self.turn.wait_for(|serving| *serving == ticket).await;
    }
}

impl<K> Drop for PendingEntry<'_, K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        self.lock.leave(&self.key, self.ticket);
    }
}
