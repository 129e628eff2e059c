use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use collections::{CapacityError, GrowableConcurrentList};
use crossbeam::queue::SegQueue;
use crossbeam::utils::CachePadded;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

/// The surface the harness drives a collection through.
///
/// Producers only call `put`. The single consumer only calls `has_items` and `drain_into`.
/// `remaining` is read once the run has finished.
pub trait CollectionAdapter<T>: Send + Sync {
    fn put(&self, item: T);

    fn has_items(&self) -> bool;

    /// Moves everything currently held into `output`.
    fn drain_into(&self, output: &mut Vec<T>);

    fn remaining(&self) -> usize;
}

impl<T: Send> CollectionAdapter<T> for GrowableConcurrentList<T> {
    fn put(&self, item: T) {
        self.add(item);
    }

    fn has_items(&self) -> bool {
        !self.is_empty()
    }

    fn drain_into(&self, output: &mut Vec<T>) {
        let evicted = self.evict_all();
        if output.is_empty() {
            *output = evicted;
        } else {
            output.extend(evicted);
        }
    }

    fn remaining(&self) -> usize {
        self.len()
    }
}

impl<T: Send> CollectionAdapter<T> for SegQueue<T> {
    fn put(&self, item: T) {
        self.push(item);
    }

    fn has_items(&self) -> bool {
        !self.is_empty()
    }

    fn drain_into(&self, output: &mut Vec<T>) {
        while let Some(item) = self.pop() {
            output.push(item);
        }
    }

    fn remaining(&self) -> usize {
        self.len()
    }
}

/// FIFO queue behind a single lock.
pub struct LockedQueue<T> {
    inner: Mutex<VecDeque<T>>,
}

impl<T> LockedQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T> Default for LockedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> CollectionAdapter<T> for LockedQueue<T> {
    fn put(&self, item: T) {
        self.inner.lock().push_back(item);
    }

    fn has_items(&self) -> bool {
        !self.inner.lock().is_empty()
    }

    fn drain_into(&self, output: &mut Vec<T>) {
        output.extend(self.inner.lock().drain(..));
    }

    fn remaining(&self) -> usize {
        self.inner.lock().len()
    }
}

/// LIFO stack behind a single lock. Drains newest first.
pub struct LockedStack<T> {
    inner: Mutex<Vec<T>>,
}

impl<T> LockedStack<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
        }
    }
}

impl<T> Default for LockedStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> CollectionAdapter<T> for LockedStack<T> {
    fn put(&self, item: T) {
        self.inner.lock().push(item);
    }

    fn has_items(&self) -> bool {
        !self.inner.lock().is_empty()
    }

    fn drain_into(&self, output: &mut Vec<T>) {
        output.extend(self.inner.lock().drain(..).rev());
    }

    fn remaining(&self) -> usize {
        self.inner.lock().len()
    }
}

/// Unordered bag. Each thread appends to its own shard so producers rarely contend.
pub struct ShardedBag<T> {
    shards: Box<[CachePadded<SegQueue<T>>]>,
}

impl<T> ShardedBag<T> {
    pub fn new(shards: usize) -> Self {
        let mut v = Vec::with_capacity(shards.max(1));
        v.resize_with(shards.max(1), || CachePadded::new(SegQueue::new()));

        Self {
            shards: v.into_boxed_slice(),
        }
    }

    fn shard(&self) -> &SegQueue<T> {
        &self.shards[thread_key() % self.shards.len()]
    }
}

impl<T> Default for ShardedBag<T> {
    fn default() -> Self {
        Self::new(default_shard_count())
    }
}

impl<T: Send> CollectionAdapter<T> for ShardedBag<T> {
    fn put(&self, item: T) {
        self.shard().push(item);
    }

    fn has_items(&self) -> bool {
        self.shards.iter().any(|shard| !shard.is_empty())
    }

    fn drain_into(&self, output: &mut Vec<T>) {
        for shard in self.shards.iter() {
            while let Some(item) = shard.pop() {
                output.push(item);
            }
        }
    }

    fn remaining(&self) -> usize {
        self.shards.iter().map(|shard| shard.len()).sum()
    }
}

/// Dictionary of queues keyed by the producing thread. Queues are created on first use.
pub struct KeyedQueues<T> {
    queues: RwLock<HashMap<usize, SegQueue<T>>>,
}

impl<T> KeyedQueues<T> {
    pub fn new() -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> Default for KeyedQueues<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> CollectionAdapter<T> for KeyedQueues<T> {
    fn put(&self, item: T) {
        let key = thread_key();

        if let Some(queue) = self.queues.read().get(&key) {
            queue.push(item);
            return;
        }

        self.queues.write().entry(key).or_default().push(item);
    }

    fn has_items(&self) -> bool {
        self.queues.read().values().any(|queue| !queue.is_empty())
    }

    fn drain_into(&self, output: &mut Vec<T>) {
        for queue in self.queues.read().values() {
            while let Some(item) = queue.pop() {
                output.push(item);
            }
        }
    }

    fn remaining(&self) -> usize {
        self.queues.read().values().map(|queue| queue.len()).sum()
    }
}

/// Named registry of every collection the harness knows how to drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdapterKind {
    GrowableConcurrentList,
    LockedQueue,
    SegQueue,
    LockedStack,
    ShardedBag,
    KeyedQueues,
}

impl AdapterKind {
    pub const ALL: [AdapterKind; 6] = [
        AdapterKind::GrowableConcurrentList,
        AdapterKind::LockedQueue,
        AdapterKind::SegQueue,
        AdapterKind::LockedStack,
        AdapterKind::ShardedBag,
        AdapterKind::KeyedQueues,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AdapterKind::GrowableConcurrentList => "growable_concurrent_list",
            AdapterKind::LockedQueue => "locked_queue",
            AdapterKind::SegQueue => "seg_queue",
            AdapterKind::LockedStack => "locked_stack",
            AdapterKind::ShardedBag => "sharded_bag",
            AdapterKind::KeyedQueues => "keyed_queues",
        }
    }

    /// Creates an empty collection of this kind. `capacity_power` only applies to the growable list.
    pub fn create<T: Send + 'static>(
        self,
        capacity_power: u32,
    ) -> Result<Arc<dyn CollectionAdapter<T>>, CapacityError> {
        let adapter: Arc<dyn CollectionAdapter<T>> = match self {
            AdapterKind::GrowableConcurrentList => {
                Arc::new(GrowableConcurrentList::<T>::new(capacity_power)?)
            }
            AdapterKind::LockedQueue => Arc::new(LockedQueue::<T>::new()),
            AdapterKind::SegQueue => Arc::new(SegQueue::<T>::new()),
            AdapterKind::LockedStack => Arc::new(LockedStack::<T>::new()),
            AdapterKind::ShardedBag => Arc::new(ShardedBag::<T>::default()),
            AdapterKind::KeyedQueues => Arc::new(KeyedQueues::<T>::new()),
        };

        Ok(adapter)
    }
}

fn default_shard_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(8)
}

/// Small dense id for the calling thread, assigned on first use.
fn thread_key() -> usize {
    static NEXT_KEY: AtomicUsize = AtomicUsize::new(0);

    thread_local! {
        static KEY: Cell<Option<usize>> = const { Cell::new(None) };
    }

    KEY.with(|key| match key.get() {
        Some(k) => k,
        None => {
            let k = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
            key.set(Some(k));
            k
        }
    })
}
