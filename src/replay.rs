//! Replay mode - feed a captured frame log through a dashboard and print views

use std::io::{self, Write};
use std::path::Path;

use futures_util::stream;

use scrapemon_app::{
    load_settings, Dashboard, OfflineController, ScrapeController, SessionSnapshot,
};
use scrapemon_core::prelude::*;
use scrapemon_core::{ChannelFilter, Envelope, FilterUpdate, LevelFilter};

/// What `scrapemon replay` prints
#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    pub channel: ChannelFilter,
    pub level: LevelFilter,
    pub search: Option<String>,
    /// Print the failure list instead of the log
    pub failures: bool,
    /// Append a one-line session summary
    pub summary: bool,
}

impl ReplayOptions {
    pub fn filter_update(&self) -> FilterUpdate {
        let update = FilterUpdate::new().channel(self.channel).level(self.level);
        match &self.search {
            Some(search) => update.search(search.clone()),
            None => update,
        }
    }
}

/// Deliver every non-blank line of a capture; returns the number delivered
pub async fn replay<C: ScrapeController>(dashboard: &Dashboard<C>, capture: &str) -> usize {
    let envelopes = capture
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(Envelope::decode);
    dashboard.run(stream::iter(envelopes)).await
}

/// `processed/total (percent%) | succeeded N | failed N | status`
pub fn summary_line(snapshot: &SessionSnapshot) -> String {
    let counters = &snapshot.counters;
    let mut line = format!(
        "{}/{} ({}%) | succeeded {} | failed {} | {}",
        counters.processed,
        counters.total,
        counters.percent,
        counters.succeeded,
        counters.failed,
        snapshot.status
    );
    if !snapshot.status_text.is_empty() {
        line.push_str(" | ");
        line.push_str(&snapshot.status_text);
    }
    line
}

/// Replay a capture file and print the selected view to stdout
pub async fn run_replay(
    project_path: &Path,
    capture_path: &Path,
    options: &ReplayOptions,
) -> Result<()> {
    let settings = load_settings(project_path);
    let dashboard = Dashboard::with_settings(OfflineController, settings);

    let capture = tokio::fs::read_to_string(capture_path)
        .await
        .with_context(|| format!("Failed to read capture {}", capture_path.display()))?;
    let delivered = replay(&dashboard, &capture).await;
    info!("Replayed {} frame(s) from {}", delivered, capture_path.display());

    dashboard.set_filter(options.filter_update());

    let mut out = io::stdout().lock();
    let lines = if options.failures {
        dashboard.export_failures(&mut out)?
    } else {
        dashboard.export_logs(&mut out)?
    };
    if lines > 0 {
        writeln!(out)?;
    }
    if options.summary {
        writeln!(out, "{}", summary_line(&dashboard.session()))?;
    }
    out.flush()?;
    Ok(())
}
