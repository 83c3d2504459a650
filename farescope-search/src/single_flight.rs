use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

struct Flight<T> {
    generation: u64,
    result: watch::Receiver<Option<T>>,
}

type Table<K, T> = Arc<Mutex<HashMap<K, Flight<T>>>>;

/// Waiter table that lets exactly one caller per key do the work.
///
/// The mutex only guards the table; it is never held across an await.
pub struct SingleFlight<K, T> {
    table: Table<K, T>,
    generations: AtomicU64,
}

pub enum Role<K: Hash + Eq, T> {
    Leader(LeaderGuard<K, T>),
    Follower(Follower<T>),
}

impl<K, T> Default for SingleFlight<K, T>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> SingleFlight<K, T>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(HashMap::new())),
            generations: AtomicU64::new(0),
        }
    }

    /// Become the leader for `key`, or follow the flight already in progress.
    pub fn join(&self, key: &K) -> Role<K, T> {
        let mut table = self.table.lock();
        if let Some(flight) = table.get(key) {
            return Role::Follower(Follower {
                result: flight.result.clone(),
            });
        }
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        table.insert(key.clone(), Flight { generation, result: rx });
        Role::Leader(LeaderGuard {
            table: Arc::clone(&self.table),
            key: key.clone(),
            generation,
            tx,
        })
    }

    pub fn in_flight(&self) -> usize {
        self.table.lock().len()
    }
}

/// Held by the one caller doing the work for a key.
///
/// Dropping it without calling [`complete`](Self::complete) (error path,
/// cancellation, panic) releases every follower empty-handed.
pub struct LeaderGuard<K: Hash + Eq, T> {
    table: Table<K, T>,
    key: K,
    generation: u64,
    tx: watch::Sender<Option<T>>,
}

impl<K: Hash + Eq, T> LeaderGuard<K, T> {
    /// Hand `value` to every follower and retire the flight.
    pub fn complete(self, value: T) {
        self.tx.send_replace(Some(value));
    }
}

impl<K: Hash + Eq, T> Drop for LeaderGuard<K, T> {
    fn drop(&mut self) {
        let mut table = self.table.lock();
        if table
            .get(&self.key)
            .is_some_and(|flight| flight.generation == self.generation)
        {
            table.remove(&self.key);
        }
    }
}

pub struct Follower<T> {
    result: watch::Receiver<Option<T>>,
}

impl<T: Clone> Follower<T> {
    /// The leader's value, or `None` if the leader went away without one.
    pub async fn wait(mut self) -> Option<T> {
        match self.result.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone(),
            Err(_) => None,
        }
    }
}
