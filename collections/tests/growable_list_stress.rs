use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use collections::GrowableConcurrentList;
use common::create_rng_from_seed;
use rand::Rng;

#[test]
fn concurrent_adds_are_all_evicted() {
    const PRODUCERS: usize = 8;
    const PER_PRODUCER: usize = 20_000;

    let list = Arc::new(GrowableConcurrentList::new(6).unwrap());

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let list = list.clone();
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    list.add(p * PER_PRODUCER + i);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(list.len(), PRODUCERS * PER_PRODUCER);

    let mut evicted = list.evict_all();
    evicted.sort_unstable();

    assert_eq!(evicted, (0..PRODUCERS * PER_PRODUCER).collect::<Vec<_>>());
    assert!(list.is_empty());
}

#[test]
fn each_producer_order_is_preserved() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 5_000;

    let list = Arc::new(GrowableConcurrentList::new(4).unwrap());

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let list = list.clone();
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    list.add((p, i));
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let evicted = list.evict_all();
    let mut last_seen = vec![None; PRODUCERS];

    for (p, i) in evicted {
        if let Some(last) = last_seen[p] {
            assert!(i > last, "producer {} went backwards: {} after {}", p, i, last);
        }
        last_seen[p] = Some(i);
    }

    assert!(last_seen.iter().all(|l| *l == Some(PER_PRODUCER - 1)));
}

#[test]
fn evict_while_adding_sees_every_item_once() {
    const PRODUCERS: usize = 8;
    const PER_PRODUCER: usize = 25_000;

    let list = Arc::new(GrowableConcurrentList::new(5).unwrap());
    let producing = Arc::new(AtomicBool::new(true));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let list = list.clone();
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    list.add(p * PER_PRODUCER + i);
                    if i % 13 == 0 {
                        thread::yield_now();
                    }
                }
            })
        })
        .collect();

    let evictor = {
        let list = list.clone();
        let producing = producing.clone();
        thread::spawn(move || {
            let mut batches = vec![];
            while producing.load(Ordering::Acquire) {
                batches.push(list.evict_all());
                thread::yield_now();
            }
            batches
        })
    };

    for p in producers {
        p.join().unwrap();
    }
    producing.store(false, Ordering::Release);

    let batches = evictor.join().unwrap();
    let remaining = list.evict_all();

    let mut seen = HashSet::with_capacity(PRODUCERS * PER_PRODUCER);
    for item in batches.into_iter().flatten().chain(remaining) {
        assert!(seen.insert(item), "item {} evicted twice", item);
    }

    assert_eq!(seen.len(), PRODUCERS * PER_PRODUCER);
    assert!(list.is_empty());
}

#[test]
fn random_capacities_and_producer_counts() {
    let mut rng = create_rng_from_seed(17);

    for _ in 0..10 {
        let capacity_power = rng.gen_range(1..=12);
        let producers = rng.gen_range(1..=16);
        let per_producer = rng.gen_range(0..=4_000);

        let list = Arc::new(GrowableConcurrentList::new(capacity_power).unwrap());

        let handles: Vec<_> = (0..producers)
            .map(|p| {
                let list = list.clone();
                thread::spawn(move || {
                    for i in 0..per_producer {
                        list.add(p * per_producer + i);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        let mut evicted = list.evict_all();
        evicted.sort_unstable();
        assert_eq!(evicted, (0..producers * per_producer).collect::<Vec<_>>());
    }
}

#[test]
fn every_item_is_dropped_exactly_once() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 2_000;

    let constructed = Arc::new(AtomicUsize::new(0));
    let dropped = Arc::new(AtomicUsize::new(0));

    {
        let list = Arc::new(GrowableConcurrentList::new(3).unwrap());

        let handles: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let list = list.clone();
                let constructed = constructed.clone();
                let dropped = dropped.clone();
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        list.add(DropCounter::new(
                            p * PER_PRODUCER + i,
                            constructed.clone(),
                            dropped.clone(),
                        ));
                    }
                })
            })
            .collect();

        // Evict part way through, leave the rest for the list's own drop.
        let evicted = list.evict_all();

        for h in handles {
            h.join().unwrap();
        }

        assert!(evicted.iter().all(|item| item.value < PRODUCERS * PER_PRODUCER));
    }

    assert_eq!(constructed.load(Ordering::Relaxed), PRODUCERS * PER_PRODUCER);
    assert_eq!(
        constructed.load(Ordering::Relaxed),
        dropped.load(Ordering::Relaxed),
        "Every constructed instance must be dropped exactly once"
    );
}

struct DropCounter {
    value: usize,
    dropped: Arc<AtomicUsize>,
}

impl DropCounter {
    fn new(value: usize, constructed: Arc<AtomicUsize>, dropped: Arc<AtomicUsize>) -> Self {
        constructed.fetch_add(1, Ordering::Relaxed);
        Self { value, dropped }
    }
}

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}
