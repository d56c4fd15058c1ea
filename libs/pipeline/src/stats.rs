use std::sync::atomic::{AtomicU64, Ordering};

/// Счётчики pipeline. Разделяются между задачами через `Arc`.
#[derive(Debug, Default)]
pub struct PipelineStats {
    connections_total: AtomicU64,
    messages_accepted: AtomicU64,
    messages_empty: AtomicU64,
    messages_oversized: AtomicU64,
    messages_rejected: AtomicU64,
    documents_malformed: AtomicU64,
    batches_flushed: AtomicU64,
    documents_indexed: AtomicU64,
    documents_failed: AtomicU64,
    batches_abandoned: AtomicU64,
    bulk_retries: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn connection_opened(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn message_accepted(&self) {
        self.messages_accepted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn message_empty(&self) {
        self.messages_empty.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn message_oversized(&self) {
        self.messages_oversized.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn message_rejected(&self) {
        self.messages_rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn document_malformed(&self) {
        self.documents_malformed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn batch_flushed(&self) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn documents_indexed(&self, n: usize) {
        self.documents_indexed.fetch_add(n as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn documents_failed(&self, n: usize) {
        self.documents_failed.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Батч (или его остаток) брошен: `n` документов потеряно.
    #[inline]
    pub fn batch_abandoned(&self, n: usize) {
        self.batches_abandoned.fetch_add(1, Ordering::Relaxed);
        self.documents_failed(n);
    }

    #[inline]
    pub fn bulk_retry(&self) {
        self.bulk_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            messages_accepted: self.messages_accepted.load(Ordering::Relaxed),
            messages_empty: self.messages_empty.load(Ordering::Relaxed),
            messages_oversized: self.messages_oversized.load(Ordering::Relaxed),
            messages_rejected: self.messages_rejected.load(Ordering::Relaxed),
            documents_malformed: self.documents_malformed.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            documents_indexed: self.documents_indexed.load(Ordering::Relaxed),
            documents_failed: self.documents_failed.load(Ordering::Relaxed),
            batches_abandoned: self.batches_abandoned.load(Ordering::Relaxed),
            bulk_retries: self.bulk_retries.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub connections_total: u64,
    pub messages_accepted: u64,
    pub messages_empty: u64,
    pub messages_oversized: u64,
    pub messages_rejected: u64,
    pub documents_malformed: u64,
    pub batches_flushed: u64,
    pub documents_indexed: u64,
    pub documents_failed: u64,
    pub batches_abandoned: u64,
    pub bulk_retries: u64,
}
