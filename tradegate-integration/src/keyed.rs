use fnv::FnvHashMap;
use parking_lot::Mutex;
use smol_str::SmolStr;
use std::collections::VecDeque;
use tokio::sync::oneshot;

/// String-keyed asynchronous mutex.
///
/// Callers contending on the same key are admitted FIFO; distinct keys never
/// contend. Constructed with `concurrency = 1` this is strict mutual
/// exclusion; larger bounds admit up to `concurrency` holders per key
/// simultaneously.
///
/// Key state is removed from the map once the last holder releases and no
/// waiters remain, so the map only ever contains keys with live interest.
#[derive(Debug)]
pub struct KeyedMutex {
    concurrency: usize,
    queue_cap: Option<usize>,
    state: Mutex<FnvHashMap<SmolStr, KeyState>>,
}

#[derive(Debug, Default)]
struct KeyState {
    holders: usize,
    waiters: VecDeque<oneshot::Sender<()>>,
}

impl Default for KeyedMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyedMutex {
    /// Strict mutual exclusion per key.
    pub fn new() -> Self {
        Self::with_concurrency(1)
    }

    /// Admit up to `concurrency` holders of the same key simultaneously.
    pub fn with_concurrency(concurrency: usize) -> Self {
        assert!(concurrency >= 1, "concurrency bound must be >= 1");
        Self {
            concurrency,
            queue_cap: None,
            state: Mutex::new(FnvHashMap::default()),
        }
    }

    /// Bound the per-key waiter queue.
    ///
    /// Beyond the cap the oldest waiter is admitted immediately rather than
    /// left queued, trading strict admission for bounded memory.
    pub fn with_queue_cap(mut self, cap: usize) -> Self {
        self.queue_cap = Some(cap);
        self
    }

    /// Acquire the lock for `key`, suspending until admitted.
    ///
    /// The returned guard releases on drop, so all exit paths (including
    /// panics) hand the slot to the next waiter.
    pub async fn lock(&self, key: impl Into<SmolStr>) -> KeyedGuard<'_> {
        let key = key.into();

        let waiter = {
            let mut state = self.state.lock();
            let entry = state.entry(key.clone()).or_default();

            if entry.holders < self.concurrency && entry.waiters.is_empty() {
                entry.holders += 1;
                None
            } else {
                let (tx, rx) = oneshot::channel();
                entry.waiters.push_back(tx);

                if let Some(cap) = self.queue_cap {
                    while entry.waiters.len() > cap {
                        if let Some(oldest) = entry.waiters.pop_front() {
                            entry.holders += 1;
                            let _ = oldest.send(());
                        }
                    }
                }

                Some(rx)
            }
        };

        if let Some(rx) = waiter {
            // A dropped sender means this waiter was evicted by the queue
            // cap; the slot was already accounted to us at eviction time.
            let _ = rx.await;
        }

        KeyedGuard { mutex: self, key }
    }

    /// Run `f` while holding the lock for `key`.
    pub async fn with_lock<F, Fut, T>(&self, key: impl Into<SmolStr>, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.lock(key).await;
        f().await
    }

    fn release(&self, key: &SmolStr) {
        let mut state = self.state.lock();
        let Some(entry) = state.get_mut(key) else {
            return;
        };

        // Hand the slot to the next live waiter; a send failure means the
        // waiting task was cancelled, so try the one behind it.
        loop {
            match entry.waiters.pop_front() {
                Some(tx) => {
                    if tx.send(()).is_ok() {
                        return;
                    }
                }
                None => {
                    entry.holders = entry.holders.saturating_sub(1);
                    if entry.holders == 0 {
                        state.remove(key);
                    }
                    return;
                }
            }
        }
    }

    /// Number of keys with live holders or waiters. Diagnostic only.
    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().is_empty()
    }
}

/// Scoped admission to a [`KeyedMutex`] key. Releases on drop.
#[derive(Debug)]
pub struct KeyedGuard<'a> {
    mutex: &'a KeyedMutex,
    key: SmolStr,
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        self.mutex.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use std::time::Duration;

    #[tokio::test]
    async fn test_distinct_keys_never_contend() {
        let mutex = KeyedMutex::new();
        let _a = mutex.lock("binance").await;
        // Would deadlock if "bybit" contended with "binance"
        let _b = mutex.lock("bybit").await;
        assert_eq!(mutex.len(), 2);
    }

    #[tokio::test]
    async fn test_exclusion_and_fifo_handoff() {
        let mutex = Arc::new(KeyedMutex::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let guard = mutex.lock("key").await;

        let mut tasks = Vec::new();
        for i in 0..4 {
            let mutex = Arc::clone(&mutex);
            let order = Arc::clone(&order);
            tasks.push(tokio::spawn(async move {
                let _guard = mutex.lock("key").await;
                order.lock().push(i);
            }));
            // Give each spawned task time to enqueue before the next
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        drop(guard);
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
        assert!(mutex.is_empty());
    }

    #[tokio::test]
    async fn test_bounded_concurrency_admits_n_holders() {
        let mutex = Arc::new(KeyedMutex::with_concurrency(2));
        let held = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..6 {
            let mutex = Arc::clone(&mutex);
            let held = Arc::clone(&held);
            let peak = Arc::clone(&peak);
            tasks.push(tokio::spawn(async move {
                let _guard = mutex.lock("key").await;
                let now = held.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                held.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(mutex.is_empty());
    }

    #[tokio::test]
    async fn test_panic_releases_on_unwind() {
        let mutex = Arc::new(KeyedMutex::new());

        let task = {
            let mutex = Arc::clone(&mutex);
            tokio::spawn(async move {
                let _guard = mutex.lock("key").await;
                panic!("holder dies");
            })
        };
        assert!(task.await.is_err());

        // Lock must be reacquirable after the panicking holder unwound
        let _guard = mutex.lock("key").await;
    }
}
