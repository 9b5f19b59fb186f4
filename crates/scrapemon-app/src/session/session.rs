//! ScrapeSession - the run lifecycle plus everything the stream says about it

use chrono::Local;
use serde_json::Value;

use scrapemon_core::prelude::*;
use scrapemon_core::{payload_text, Envelope, SignalName};

use super::events::{self, Outcome};
use super::state::{
    Counters, MediaSnapshot, RemoteScrapeStatus, RemoteStatus, ResultId, ResultItem,
    ScrapeStatus, SessionSnapshot,
};

/// Everything a new run or `clear()` wipes
#[derive(Debug, Clone, Default)]
struct RunState {
    processed: u64,
    total: u64,
    percent: u32,
    success_results: Vec<ResultItem>,
    failure_results: Vec<ResultItem>,
    selected_result: Option<ResultItem>,
    current_media: Option<MediaSnapshot>,
    /// A report with `processed < total` arrived during this run
    saw_partial_progress: bool,
}

/// State saved by [`ScrapeSession::begin_start`] so a failed start can be
/// undone exactly
#[derive(Debug, Clone)]
pub struct Checkpoint {
    generation: u64,
    status: ScrapeStatus,
    run: RunState,
    status_text: String,
}

/// State machine for one scrape worker
///
/// Explicit transitions are split into a `begin_*` step that commits the
/// local change optimistically and a rollback step the caller uses when the
/// worker rejects the request. Stream events mutate the counters and lists
/// regardless of status.
#[derive(Debug, Default)]
pub struct ScrapeSession {
    status: ScrapeStatus,
    run: RunState,
    status_text: String,
    /// Never reset, so ids stay unique for the lifetime of this instance
    next_result_id: ResultId,
    /// Bumped by every start
    generation: u64,
}

impl ScrapeSession {
    /// Signals whose envelopes mutate the session
    pub const SIGNALS: [SignalName; 4] = [
        SignalName::Progress,
        SignalName::ShowListName,
        SignalName::SetMainInfo,
        SignalName::ScrapeInfo,
    ];

    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────

    pub fn status(&self) -> ScrapeStatus {
        self.status
    }

    pub fn counters(&self) -> Counters {
        Counters {
            processed: self.run.processed,
            total: self.run.total,
            succeeded: self.run.success_results.len() as u64,
            failed: self.run.failure_results.len() as u64,
            percent: self.run.percent,
        }
    }

    pub fn success_results(&self) -> &[ResultItem] {
        &self.run.success_results
    }

    pub fn failure_results(&self) -> &[ResultItem] {
        &self.run.failure_results
    }

    pub fn selected_result(&self) -> Option<&ResultItem> {
        self.run.selected_result.as_ref()
    }

    pub fn current_media(&self) -> Option<&MediaSnapshot> {
        self.run.current_media.as_ref()
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            counters: self.counters(),
            success_results: self.run.success_results.clone(),
            failure_results: self.run.failure_results.clone(),
            selected_result: self.run.selected_result.clone(),
            current_media: self.run.current_media.clone(),
            status_text: self.status_text.clone(),
        }
    }

    // ─────────────────────────────────────────────────────────
    // Explicit transitions
    // ─────────────────────────────────────────────────────────

    /// `idle -> running`, wiping the previous run
    pub fn begin_start(&mut self) -> Result<Checkpoint> {
        self.require("start", &[ScrapeStatus::Idle])?;
        self.generation += 1;
        let checkpoint = Checkpoint {
            generation: self.generation,
            status: self.status,
            run: std::mem::take(&mut self.run),
            status_text: std::mem::take(&mut self.status_text),
        };
        self.status = ScrapeStatus::Running;
        Ok(checkpoint)
    }

    /// Undo a start the worker rejected
    ///
    /// Restores the pre-start state wholesale, including anything the stream
    /// delivered while the request was in flight. A checkpoint from an older
    /// start is ignored once another start has begun. Returns whether the
    /// state was restored.
    pub fn rollback_start(&mut self, checkpoint: Checkpoint) -> bool {
        if checkpoint.generation != self.generation {
            return false;
        }
        self.status = checkpoint.status;
        self.run = checkpoint.run;
        self.status_text = checkpoint.status_text;
        true
    }

    /// `running -> paused`; returns the status to roll back to
    pub fn begin_pause(&mut self) -> Result<ScrapeStatus> {
        self.transition("pause", &[ScrapeStatus::Running], ScrapeStatus::Paused)
    }

    /// `paused -> running`
    pub fn begin_resume(&mut self) -> Result<ScrapeStatus> {
        self.transition("resume", &[ScrapeStatus::Paused], ScrapeStatus::Running)
    }

    /// `running | paused -> stopping`
    pub fn begin_stop(&mut self) -> Result<ScrapeStatus> {
        self.transition(
            "stop",
            &[ScrapeStatus::Running, ScrapeStatus::Paused],
            ScrapeStatus::Stopping,
        )
    }

    /// Revert a pause/resume/stop the worker rejected
    ///
    /// Only applies while the status is still the one the `begin_*` call set;
    /// if the stream moved it on in the meantime the stream wins. Returns
    /// whether the status was reverted.
    pub fn rollback_status(&mut self, expected: ScrapeStatus, previous: ScrapeStatus) -> bool {
        if self.status != expected {
            return false;
        }
        self.status = previous;
        true
    }

    /// Terminal `-> idle`
    pub fn finish(&mut self) {
        if self.status != ScrapeStatus::Idle {
            info!("Scrape session finished ({} -> idle)", self.status);
            self.status = ScrapeStatus::Idle;
        }
    }

    /// Empty counters, result lists, selection and current media
    ///
    /// No-op unless idle. Returns whether anything was cleared.
    pub fn clear(&mut self) -> bool {
        if self.status != ScrapeStatus::Idle {
            debug!("Ignoring clear while session is {}", self.status);
            return false;
        }
        self.run = RunState::default();
        true
    }

    /// Restore the fully initial state; no-op unless idle
    pub fn reset(&mut self) -> bool {
        if !self.clear() {
            return false;
        }
        self.status_text.clear();
        true
    }

    /// Select a result from either list; unknown ids clear the selection
    pub fn select_result(&mut self, id: ResultId) -> Option<&ResultItem> {
        self.run.selected_result = self
            .run
            .success_results
            .iter()
            .chain(self.run.failure_results.iter())
            .find(|item| item.id == id)
            .cloned();
        self.run.selected_result.as_ref()
    }

    // ─────────────────────────────────────────────────────────
    // Stream-driven mutation
    // ─────────────────────────────────────────────────────────

    /// Route an envelope to the matching handler
    ///
    /// Returns whether the session changed. Envelopes for other signals are
    /// ignored.
    pub fn apply(&mut self, envelope: &Envelope) -> bool {
        match envelope.signal {
            SignalName::Progress => self.apply_progress(&envelope.payload),
            SignalName::ShowListName => self.record_result(&envelope.payload).is_some(),
            SignalName::SetMainInfo => self.set_current_media(&envelope.payload),
            SignalName::ScrapeInfo => {
                self.set_status_text(&envelope.payload);
                true
            }
            _ => false,
        }
    }

    /// Overwrite processed/total/percent from an absolute progress report
    ///
    /// A report that covers the whole total ends the run, once this run has
    /// reported partial progress or is stopping. A terminal report re-delivered
    /// from the previous run therefore does not end a fresh one.
    pub fn apply_progress(&mut self, payload: &Value) -> bool {
        let Some(update) = events::parse_progress(payload) else {
            debug!("Ignoring unrecognized progress payload: {}", payload);
            return false;
        };

        if let Some(processed) = update.processed {
            self.run.processed = processed;
        }
        if let Some(total) = update.total {
            self.run.total = total;
        }
        if let Some(percent) = update.percent {
            self.run.percent = percent;
        }

        if self.run.total > 0 && self.run.processed < self.run.total {
            self.run.saw_partial_progress = true;
        }
        if self.covers_total() {
            self.finish();
        }
        true
    }

    /// Append a success or failure item; no dedup
    pub fn record_result(&mut self, payload: &Value) -> Option<ResultId> {
        let Some(event) = events::parse_result(payload) else {
            debug!("Ignoring unrecognized result payload: {}", payload);
            return None;
        };

        let id = self.next_result_id;
        self.next_result_id += 1;

        let item = ResultItem {
            id,
            source_path: event.source_path,
            label: event.label,
            error_text: event.error_text,
            received_at: Local::now(),
        };
        match event.outcome {
            Outcome::Success => self.run.success_results.push(item),
            Outcome::Failure => self.run.failure_results.push(item),
        }
        Some(id)
    }

    /// Replace the current media wholesale
    pub fn set_current_media(&mut self, payload: &Value) -> bool {
        match events::parse_media(payload) {
            Some(media) => {
                self.run.current_media = Some(media);
                true
            }
            None => {
                debug!("set_main_info payload without show_data object, ignoring");
                false
            }
        }
    }

    pub fn set_status_text(&mut self, payload: &Value) {
        self.status_text = payload_text(payload);
    }

    /// Fold in the worker's own view of the run
    ///
    /// Only `stopping` follows a remote `idle`; a freshly started run is
    /// reported idle until the worker has counted its files. Succeeded and
    /// failed always follow the local lists.
    pub fn reconcile(&mut self, remote: &RemoteStatus) {
        self.run.processed = remote.current;
        self.run.total = remote.total;
        self.run.percent = remote.progress.min(100);
        if remote.total > 0 && remote.current < remote.total {
            self.run.saw_partial_progress = true;
        }

        if remote.status == RemoteScrapeStatus::Idle && self.status == ScrapeStatus::Stopping {
            self.finish();
        }
    }

    // ─────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────

    fn covers_total(&self) -> bool {
        let belongs_to_run =
            self.run.saw_partial_progress || self.status == ScrapeStatus::Stopping;
        self.status.is_active()
            && belongs_to_run
            && self.run.total > 0
            && self.run.processed >= self.run.total
    }

    fn require(&self, action: &'static str, allowed: &[ScrapeStatus]) -> Result<()> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(Error::invalid_transition(action, self.status.as_str()))
        }
    }

    fn transition(
        &mut self,
        action: &'static str,
        allowed: &[ScrapeStatus],
        next: ScrapeStatus,
    ) -> Result<ScrapeStatus> {
        self.require(action, allowed)?;
        let previous = self.status;
        self.status = next;
        Ok(previous)
    }
}
