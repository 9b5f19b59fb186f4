//! Dashboard - the service object views share
//!
//! Owns one log store, one scrape session, the dispatcher in front of them
//! and the worker controller. Views hold a reference to the dashboard and
//! read snapshots; only envelopes and the explicit actions below mutate.
//!
//! Lock guards are never held across an `.await`: every explicit action
//! commits locally, releases the lock, calls the worker, then re-locks to
//! confirm or roll back.

use std::io::Write;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures_util::{pin_mut, Stream, StreamExt};
use tokio::sync::mpsc;

use scrapemon_core::prelude::*;
use scrapemon_core::{
    ClassifiedRecord, Envelope, FailureItem, FilterUpdate, LogChannel, LogFilter, SignalName,
};

use crate::config::Settings;
use crate::control::ScrapeController;
use crate::export;
use crate::fanout::{Dispatcher, Subscription, Topic};
use crate::log_store::LogStore;
use crate::session::{
    RemoteStatus, ResultId, ResultItem, ScrapeSession, ScrapeStatus, SessionSnapshot,
};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

pub struct Dashboard<C> {
    settings: Settings,
    store: Arc<RwLock<LogStore>>,
    session: Arc<RwLock<ScrapeSession>>,
    dispatcher: Dispatcher,
    controller: C,
    /// Store and session handlers, registered ahead of any view
    _core: Vec<Subscription>,
}

impl<C: ScrapeController> Dashboard<C> {
    pub fn new(controller: C) -> Self {
        Self::with_settings(controller, Settings::default())
    }

    pub fn with_settings(controller: C, settings: Settings) -> Self {
        let store = Arc::new(RwLock::new(LogStore::with_capacity(
            settings.logs.max_logs,
            settings.logs.max_failures,
        )));
        let session = Arc::new(RwLock::new(ScrapeSession::new()));
        let dispatcher = Dispatcher::new();

        // Core handlers go first so every view sees post-mutation state
        let mut core = Vec::with_capacity(1 + ScrapeSession::SIGNALS.len());

        let record_progress = settings.logs.record_progress;
        let log_store = Arc::clone(&store);
        core.push(dispatcher.add_handler(Topic::All, move |envelope: &Envelope| {
            if envelope.signal == SignalName::Progress && !record_progress {
                return Ok(());
            }
            write(&log_store).append(envelope);
            Ok(())
        }));

        for signal in ScrapeSession::SIGNALS {
            let session = Arc::clone(&session);
            core.push(dispatcher.add_handler(signal, move |envelope: &Envelope| {
                write(&session).apply(envelope);
                Ok(())
            }));
        }

        Self {
            settings,
            store,
            session,
            dispatcher,
            controller,
            _core: core,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    // ─────────────────────────────────────────────────────────
    // Ingestion
    // ─────────────────────────────────────────────────────────

    /// Deliver one envelope to the store, the session and every view
    ///
    /// Returns the number of handlers invoked.
    pub fn on_message(&self, envelope: Envelope) -> usize {
        self.dispatcher.dispatch(&envelope)
    }

    /// Decode a wire frame and deliver it; undecodable frames still arrive
    pub fn on_frame(&self, frame: &str) -> usize {
        self.on_message(Envelope::decode(frame))
    }

    /// Pump envelopes until the stream ends; returns how many were delivered
    pub async fn run<S>(&self, stream: S) -> usize
    where
        S: Stream<Item = Envelope>,
    {
        pin_mut!(stream);
        let mut delivered = 0;
        while let Some(envelope) = stream.next().await {
            self.on_message(envelope);
            delivered += 1;
        }
        debug!("Envelope stream ended after {} message(s)", delivered);
        delivered
    }

    /// Pump a channel until every sender is gone
    pub async fn run_channel(&self, mut rx: mpsc::Receiver<Envelope>) -> usize {
        let mut delivered = 0;
        while let Some(envelope) = rx.recv().await {
            self.on_message(envelope);
            delivered += 1;
        }
        debug!("Envelope channel closed after {} message(s)", delivered);
        delivered
    }

    /// Attach a view handler; drop or unsubscribe the handle on teardown
    #[must_use = "dropping the Subscription unregisters the handler"]
    pub fn subscribe<F>(&self, topic: impl Into<Topic>, handler: F) -> Subscription
    where
        F: FnMut(&Envelope) -> Result<()> + Send + 'static,
    {
        self.dispatcher.add_handler(topic, handler)
    }

    // ─────────────────────────────────────────────────────────
    // Worker control
    // ─────────────────────────────────────────────────────────

    /// Start a new run, wiping the previous one
    ///
    /// If the worker rejects the request the session is restored to exactly
    /// what it was before the call.
    pub async fn start(&self) -> Result<()> {
        let checkpoint = write(&self.session)
            .begin_start()
            .inspect_err(|e| warn!("{}", e))?;

        match self.controller.start().await {
            Ok(()) => {
                info!("Scrape started");
                Ok(())
            }
            Err(e) => {
                if write(&self.session).rollback_start(checkpoint) {
                    warn!("Start failed, session rolled back to idle: {}", e);
                } else {
                    warn!("Start failed after a newer start began, keeping its run: {}", e);
                }
                Err(e)
            }
        }
    }

    pub async fn pause(&self) -> Result<()> {
        let previous = self.begin(ScrapeSession::begin_pause)?;
        let result = self.controller.pause().await;
        self.settle("pause", ScrapeStatus::Paused, previous, result)
    }

    pub async fn resume(&self) -> Result<()> {
        let previous = self.begin(ScrapeSession::begin_resume)?;
        let result = self.controller.resume().await;
        self.settle("resume", ScrapeStatus::Running, previous, result)
    }

    /// Ask the worker to wind down; the session stays `stopping` until the
    /// stream or [`Dashboard::refresh_status`] reports the run is over
    pub async fn stop(&self) -> Result<()> {
        let previous = self.begin(ScrapeSession::begin_stop)?;
        let result = self.controller.stop().await;
        self.settle("stop", ScrapeStatus::Stopping, previous, result)
    }

    /// Query the worker and fold its status into the session
    pub async fn refresh_status(&self) -> Result<RemoteStatus> {
        let remote = self
            .controller
            .status()
            .await
            .inspect_err(|e| warn!("Status query failed: {}", e))?;
        write(&self.session).reconcile(&remote);
        Ok(remote)
    }

    fn begin(
        &self,
        transition: fn(&mut ScrapeSession) -> Result<ScrapeStatus>,
    ) -> Result<ScrapeStatus> {
        transition(&mut *write(&self.session)).inspect_err(|e| warn!("{}", e))
    }

    fn settle(
        &self,
        action: &'static str,
        applied: ScrapeStatus,
        previous: ScrapeStatus,
        result: Result<()>,
    ) -> Result<()> {
        match result {
            Ok(()) => {
                info!("Scrape {} ({} -> {})", action, previous, applied);
                Ok(())
            }
            Err(e) => {
                if write(&self.session).rollback_status(applied, previous) {
                    warn!("Failed to {}, status rolled back to {}: {}", action, previous, e);
                } else {
                    warn!("Failed to {} after the stream moved the session on: {}", action, e);
                }
                Err(e)
            }
        }
    }

    // ─────────────────────────────────────────────────────────
    // Session
    // ─────────────────────────────────────────────────────────

    pub fn session(&self) -> SessionSnapshot {
        read(&self.session).snapshot()
    }

    pub fn status(&self) -> ScrapeStatus {
        read(&self.session).status()
    }

    /// Empty counters and result lists; no-op unless idle
    pub fn clear(&self) -> bool {
        write(&self.session).clear()
    }

    /// Back to a freshly constructed dashboard, keeping handlers attached
    ///
    /// No-op unless idle.
    pub fn reset(&self) -> bool {
        if !write(&self.session).reset() {
            return false;
        }
        write(&self.store).reset();
        info!("Dashboard reset");
        true
    }

    pub fn select_result(&self, id: ResultId) -> Option<ResultItem> {
        write(&self.session).select_result(id).cloned()
    }

    // ─────────────────────────────────────────────────────────
    // Logs
    // ─────────────────────────────────────────────────────────

    pub fn set_filter(&self, update: FilterUpdate) {
        write(&self.store).set_filter(update);
    }

    pub fn filter(&self) -> LogFilter {
        read(&self.store).filter().clone()
    }

    pub fn query(&self, channel: LogChannel) -> Vec<ClassifiedRecord> {
        read(&self.store).query(channel)
    }

    pub fn main_logs(&self) -> Vec<ClassifiedRecord> {
        read(&self.store).main_logs()
    }

    pub fn request_logs(&self) -> Vec<ClassifiedRecord> {
        read(&self.store).request_logs()
    }

    pub fn filtered_logs(&self) -> Vec<ClassifiedRecord> {
        read(&self.store).filtered_logs()
    }

    pub fn failures(&self) -> Vec<FailureItem> {
        read(&self.store).failures()
    }

    pub fn clear_logs(&self) {
        write(&self.store).clear_logs();
    }

    pub fn clear_failures(&self) {
        write(&self.store).clear_failures();
    }

    /// Write the filtered log view; returns the number of lines
    pub fn export_logs<W: Write>(&self, writer: W) -> Result<usize> {
        export::write_logs(&self.filtered_logs(), writer)
    }

    pub fn export_failures<W: Write>(&self, writer: W) -> Result<usize> {
        export::write_failures(&self.failures(), writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogSettings;
    use crate::control::OfflineController;
    use serde_json::json;
    use std::sync::Mutex;

    fn dashboard() -> Dashboard<OfflineController> {
        Dashboard::new(OfflineController)
    }

    #[test]
    fn test_views_see_post_mutation_state() {
        let dashboard = Arc::new(dashboard());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let view_dashboard = Arc::downgrade(&dashboard);
        let view_seen = Arc::clone(&seen);
        let _view = dashboard.subscribe(SignalName::ShowListName, move |_: &Envelope| {
            if let Some(dashboard) = view_dashboard.upgrade() {
                let snapshot = dashboard.session();
                view_seen
                    .lock()
                    .unwrap()
                    .push((snapshot.counters.succeeded, dashboard.main_logs().len()));
            }
            Ok(())
        });

        dashboard.on_message(Envelope::new(
            "show_list_name",
            json!({"status": "succ", "show_data": {"file_path": "/a", "number": "A"}}),
        ));

        assert_eq!(*seen.lock().unwrap(), vec![(1, 1)]);
    }

    #[test]
    fn test_progress_not_logged_by_default() {
        let dashboard = dashboard();
        dashboard.on_message(Envelope::new("progress", json!({"progress": 1, "total": 2})));

        assert!(dashboard.main_logs().is_empty());
        assert_eq!(dashboard.session().counters.processed, 1);
    }

    #[test]
    fn test_progress_logged_when_enabled() {
        let settings = Settings {
            logs: LogSettings {
                record_progress: true,
                ..Default::default()
            },
        };
        let dashboard = Dashboard::with_settings(OfflineController, settings);
        dashboard.on_message(Envelope::new("progress", json!({"progress": 1, "total": 2})));

        assert_eq!(dashboard.main_logs().len(), 1);
    }

    #[test]
    fn test_caps_come_from_settings() {
        let settings = Settings {
            logs: LogSettings {
                max_logs: 3,
                max_failures: 1,
                record_progress: false,
            },
        };
        let dashboard = Dashboard::with_settings(OfflineController, settings);
        for i in 0..5 {
            dashboard.on_message(Envelope::new("logs_failed_settext", format!("failed {i}")));
        }

        assert_eq!(dashboard.main_logs().len(), 3);
        assert_eq!(dashboard.failures().len(), 1);
        assert_eq!(dashboard.failures()[0].text, "failed 4");
    }

    #[test]
    fn test_on_frame_decodes_wire_format() {
        let dashboard = dashboard();
        let invoked = dashboard.on_frame(
            r#"{"type":"qt_signal","message_id":"m1","data":{"name":"scrape_info","data":"scanning"}}"#,
        );

        // Log store catch-all plus the session's scrape_info handler
        assert_eq!(invoked, 2);
        assert_eq!(dashboard.session().status_text, "scanning");
        assert_eq!(dashboard.main_logs()[0].id, "m1");
    }

    #[test]
    fn test_reset_clears_store_and_session() {
        let dashboard = dashboard();
        dashboard.on_message(Envelope::new("logs_failed_show", "bad"));
        dashboard.on_message(Envelope::new("scrape_info", "busy"));
        dashboard.set_filter(FilterUpdate::new().search("bad"));

        assert!(dashboard.reset());

        assert!(dashboard.main_logs().is_empty());
        assert!(dashboard.failures().is_empty());
        assert!(!dashboard.filter().is_active());
        assert_eq!(dashboard.session(), SessionSnapshot::default());
    }

    #[tokio::test]
    async fn test_reset_rejected_while_running() {
        let dashboard = dashboard();
        dashboard.start().await.unwrap();
        dashboard.on_message(Envelope::new("show_log_text", "working"));

        assert!(!dashboard.reset());
        assert_eq!(dashboard.main_logs().len(), 1);
        assert_eq!(dashboard.status(), ScrapeStatus::Running);
    }

    #[tokio::test]
    async fn test_run_pumps_stream() {
        let dashboard = dashboard();
        let envelopes = vec![
            Envelope::new("show_log_text", "one"),
            Envelope::new("detail_log", "two"),
            Envelope::new("scrape_info", "three"),
        ];

        let delivered = dashboard.run(futures_util::stream::iter(envelopes)).await;

        assert_eq!(delivered, 3);
        assert_eq!(dashboard.main_logs().len(), 2);
        assert_eq!(dashboard.request_logs().len(), 1);
    }

    #[tokio::test]
    async fn test_run_channel_until_closed() {
        let dashboard = dashboard();
        let (tx, rx) = mpsc::channel(8);
        tx.send(Envelope::new("show_log_text", "a")).await.unwrap();
        tx.send(Envelope::new("show_log_text", "b")).await.unwrap();
        drop(tx);

        assert_eq!(dashboard.run_channel(rx).await, 2);
        assert_eq!(dashboard.main_logs().len(), 2);
    }

    #[test]
    fn test_export_uses_filtered_view() {
        let dashboard = dashboard();
        dashboard.on_message(Envelope::new("show_log_text", "keep this"));
        dashboard.on_message(Envelope::new("show_log_text", "drop that"));
        dashboard.set_filter(FilterUpdate::new().search("keep"));

        let mut buf = Vec::new();
        assert_eq!(dashboard.export_logs(&mut buf).unwrap(), 1);
        assert!(String::from_utf8(buf).unwrap().ends_with("[INFO] [show_log_text] keep this"));
    }
}
