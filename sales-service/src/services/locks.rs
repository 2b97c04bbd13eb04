//! Per-document-number serialisation of ledger read-modify-write sequences.

use crate::models::DocumentNumber;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone, Default)]
pub struct DocumentLocks {
    locks: Arc<DashMap<DocumentNumber, Arc<Mutex<()>>>>,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `number`.
    pub async fn acquire(&self, number: &DocumentNumber) -> DocumentGuard {
        let mutex = self
            .locks
            .entry(number.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        DocumentGuard {
            number: number.clone(),
            locks: self.locks.clone(),
            _guard: Some(guard),
        }
    }

    /// Numbers currently tracked; entries disappear once nobody holds or waits.
    pub fn tracked(&self) -> usize {
        self.locks.len()
    }
}

/// Proof that the holder owns the lock for `number`.
pub struct DocumentGuard {
    number: DocumentNumber,
    locks: Arc<DashMap<DocumentNumber, Arc<Mutex<()>>>>,
    _guard: Option<OwnedMutexGuard<()>>,
}

impl DocumentGuard {
    pub fn number(&self) -> &DocumentNumber {
        &self.number
    }
}

impl Drop for DocumentGuard {
    fn drop(&mut self) {
        // Release first so the strong count reflects only the map and waiters.
        self._guard.take();
        self.locks
            .remove_if(&self.number, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn number(raw: &str) -> DocumentNumber {
        DocumentNumber::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_entries_are_evicted_after_release() {
        let locks = DocumentLocks::new();
        {
            let guard = locks.acquire(&number("INV-1")).await;
            assert_eq!(guard.number().as_str(), "INV-1");
            assert_eq!(locks.tracked(), 1);
        }
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn test_same_number_is_exclusive() {
        let locks = DocumentLocks::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(&number("INV-2")).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn test_different_numbers_do_not_block() {
        let locks = DocumentLocks::new();
        let _a = locks.acquire(&number("INV-A")).await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.acquire(&number("INV-B"))).await;
        assert!(b.is_ok());
    }
}
