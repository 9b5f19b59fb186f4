//! scrapemon-app - Log store, scrape session and fan-out for scrapemon
//!
//! This crate holds the stateful core: the bounded log store, the scrape
//! session state machine, the subscription dispatcher that feeds both, the
//! worker-control trait, and the [`Dashboard`] service object that wires them
//! together. Configuration loading and text export live here too.

pub mod config;
pub mod control;
pub mod dashboard;
pub mod export;
pub mod fanout;
pub mod log_store;
pub mod session;

// Re-export primary types
pub use config::{load_settings, Settings};
pub use control::{
    ChannelScrapeController, ControlCommand, ControlReply, ControlRequest, LocalScrapeController,
    OfflineController, ScrapeController,
};
pub use dashboard::Dashboard;
pub use fanout::{Dispatcher, Handler, Subscription, SubscriptionId, Topic};
pub use log_store::{LogStore, MAX_FAILURES, MAX_LOGS};
pub use session::{
    Checkpoint, Counters, MediaSnapshot, RemoteScrapeStatus, RemoteStatus, ResultId, ResultItem,
    ScrapeSession, ScrapeStatus, SessionSnapshot,
};
