//! Scrape session state: lifecycle, counters, result lists, current media

mod events;
#[allow(clippy::module_inception)]
mod session;
mod state;


// Re-export all public types at the session:: level
pub use session::{Checkpoint, ScrapeSession};
pub use state::{
    Counters, MediaSnapshot, RemoteScrapeStatus, RemoteStatus, ResultId, ResultItem,
    ScrapeStatus, SessionSnapshot,
};
