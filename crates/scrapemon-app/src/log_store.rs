//! Bounded log store: classified records, the failure side-list and the
//! live filter.

use std::collections::VecDeque;

use scrapemon_core::{
    classify, ChannelFilter, ClassifiedRecord, Envelope, FailureItem, FilterUpdate, LogChannel,
    LogFilter,
};

/// Default cap on retained records
pub const MAX_LOGS: usize = 1000;

/// Default cap on retained failure items
pub const MAX_FAILURES: usize = 100;

// ─────────────────────────────────────────────────────────────────────────────
// LogStore
// ─────────────────────────────────────────────────────────────────────────────

/// Ring buffer of classified records plus an independently capped failure list
///
/// Both sequences evict from the front when their cap is exceeded. Reads are
/// projections; nothing here ever rewrites a stored record.
#[derive(Debug)]
pub struct LogStore {
    records: VecDeque<ClassifiedRecord>,
    failures: VecDeque<FailureItem>,
    max_logs: usize,
    max_failures: usize,
    filter: LogFilter,
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LogStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_LOGS, MAX_FAILURES)
    }

    /// Store with custom caps (a cap of 0 is treated as 1)
    pub fn with_capacity(max_logs: usize, max_failures: usize) -> Self {
        let max_logs = max_logs.max(1);
        let max_failures = max_failures.max(1);
        Self {
            records: VecDeque::with_capacity(max_logs),
            failures: VecDeque::with_capacity(max_failures),
            max_logs,
            max_failures,
            filter: LogFilter::default(),
        }
    }

    /// Classify and store an envelope; never fails
    pub fn append(&mut self, envelope: &Envelope) {
        let record = classify(envelope);

        if record.signal.is_failure_signal() {
            self.failures.push_back(FailureItem::from(&record));
            while self.failures.len() > self.max_failures {
                self.failures.pop_front();
            }
        }

        self.records.push_back(record);
        while self.records.len() > self.max_logs {
            self.records.pop_front();
        }
    }

    /// Empty the record buffer; failures are kept
    pub fn clear_logs(&mut self) {
        self.records.clear();
    }

    pub fn clear_failures(&mut self) {
        self.failures.clear();
    }

    /// Drop every record and failure and open the filter back up
    pub fn reset(&mut self) {
        self.records.clear();
        self.failures.clear();
        self.filter = LogFilter::default();
    }

    pub fn set_filter(&mut self, update: FilterUpdate) {
        self.filter.apply(update);
    }

    pub fn filter(&self) -> &LogFilter {
        &self.filter
    }

    /// Records on `channel` passing the level and search filters, oldest first
    pub fn query(&self, channel: LogChannel) -> Vec<ClassifiedRecord> {
        let filter = LogFilter {
            channel: ChannelFilter::Only(channel),
            ..self.filter.clone()
        };
        self.collect(&filter)
    }

    pub fn main_logs(&self) -> Vec<ClassifiedRecord> {
        self.query(LogChannel::Main)
    }

    pub fn request_logs(&self) -> Vec<ClassifiedRecord> {
        self.query(LogChannel::Request)
    }

    /// Records passing the full filter, channel axis included
    pub fn filtered_logs(&self) -> Vec<ClassifiedRecord> {
        self.collect(&self.filter)
    }

    pub fn failures(&self) -> Vec<FailureItem> {
        self.failures.iter().cloned().collect()
    }

    /// Unfiltered record count
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    fn collect(&self, filter: &LogFilter) -> Vec<ClassifiedRecord> {
        self.records
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect()
    }
}
