//! Headless mode runner - stdin frames in, NDJSON events out

use std::collections::HashSet;
use std::path::Path;

use tokio::sync::mpsc;

use scrapemon_app::{
    load_settings, Dashboard, OfflineController, ResultId, ScrapeController, SessionSnapshot,
    Topic,
};
use scrapemon_core::prelude::*;
use scrapemon_core::{classify, Envelope, SignalName};

use super::HeadlessEvent;

/// Frames buffered between the stdin thread and the event loop
const FRAME_BUFFER: usize = 256;

/// Run in headless mode until stdin closes
pub async fn run_watch(project_path: &Path) -> Result<()> {
    info!("═══════════════════════════════════════════════════════");
    info!("scrapemon starting in HEADLESS mode");
    info!("Project: {}", project_path.display());
    info!("═══════════════════════════════════════════════════════");

    let settings = load_settings(project_path);
    let record_progress = settings.logs.record_progress;
    let dashboard = Dashboard::with_settings(OfflineController, settings);

    // Log lines are a plain view over the stream
    let _log_view = dashboard.subscribe(Topic::All, move |envelope: &Envelope| {
        if envelope.signal != SignalName::Progress || record_progress {
            HeadlessEvent::log(&classify(envelope)).emit();
        }
        Ok(())
    });

    let (frame_tx, frame_rx) = mpsc::channel(FRAME_BUFFER);
    std::thread::spawn(move || {
        spawn_stdin_reader_blocking(frame_tx);
    });

    let delivered = headless_event_loop(&dashboard, frame_rx).await;

    info!("scrapemon headless mode exiting after {} frame(s)", delivered);
    Ok(())
}

/// Deliver each envelope and emit whatever it changed in the session
async fn headless_event_loop<C: ScrapeController>(
    dashboard: &Dashboard<C>,
    mut frame_rx: mpsc::Receiver<Envelope>,
) -> usize {
    let mut delivered = 0;
    let mut before = dashboard.session();

    while let Some(envelope) = frame_rx.recv().await {
        dashboard.on_message(envelope);
        delivered += 1;

        let after = dashboard.session();
        for event in session_events(&before, &after) {
            event.emit();
        }
        before = after;
    }

    info!("Frame channel closed");
    delivered
}

/// Events describing the change from `before` to `after`
pub fn session_events(
    before: &SessionSnapshot,
    after: &SessionSnapshot,
) -> Vec<HeadlessEvent> {
    let mut events = Vec::new();

    let progress_changed = before.counters.processed != after.counters.processed
        || before.counters.total != after.counters.total
        || before.counters.percent != after.counters.percent;
    if progress_changed {
        events.push(HeadlessEvent::progress(&after.counters));
    }

    let known: HashSet<ResultId> = before
        .success_results
        .iter()
        .chain(&before.failure_results)
        .map(|item| item.id)
        .collect();
    for item in after.success_results.iter().filter(|i| !known.contains(&i.id)) {
        events.push(HeadlessEvent::result(item, true));
    }
    for item in after.failure_results.iter().filter(|i| !known.contains(&i.id)) {
        events.push(HeadlessEvent::result(item, false));
    }

    if before.status != after.status || before.status_text != after.status_text {
        events.push(HeadlessEvent::status(after.status, &after.status_text));
    }

    events
}

/// Read wire frames from stdin until EOF (blocking, run on its own thread)
fn spawn_stdin_reader_blocking(frame_tx: mpsc::Sender<Envelope>) {
    use std::io::BufRead;

    let stdin = std::io::stdin();
    let reader = stdin.lock();

    for line in reader.lines() {
        match line {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if frame_tx.blocking_send(Envelope::decode(trimmed)).is_err() {
                    break;
                }
            }
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                HeadlessEvent::error(format!("Failed to read stdin: {}", e), true).emit();
                break;
            }
        }
    }

    info!("Stdin reader exiting");
}
