//! # scrapemon-core - Core Domain Types
//!
//! Foundation crate for scrapemon. Provides the push-message envelope, the
//! closed set of known worker signals, classified log records, the event
//! classifier, error handling and logging setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, chrono, thiserror, regex, tracing).
//!
//! ## Public API
//!
//! ### Envelopes (`envelope`)
//! - [`Envelope`] - One inbound push message with delivery metadata
//! - [`SignalName`] - Known logical names, with `Unknown` for forward compatibility
//!
//! ### Domain Types (`types`)
//! - [`ClassifiedRecord`] - An envelope normalized into level/channel/text
//! - [`FailureItem`] - Reduced projection of a failure-signal record
//! - [`LogLevel`], [`LogChannel`] - Classification axes
//! - [`LogFilter`], [`FilterUpdate`] - Log view filtering
//!
//! ### Classification (`classify`)
//! - [`classify()`] - Pure, total envelope → record mapping
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with recoverable classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use scrapemon_core::prelude::*;
//! ```

pub mod classify;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod types;

// Re-export commonly used types at crate root for convenience
pub use classify::{channel_for, classify, level_for, payload_text};
pub use envelope::{Envelope, SignalName, QT_SIGNAL_TYPE, UNKNOWN_SIGNAL};
pub use error::{Error, Result, ResultExt};
pub use types::{
    ChannelFilter, ClassifiedRecord, FailureItem, FilterUpdate, LevelFilter, LogChannel,
    LogFilter, LogLevel, EXPORT_TIME_FORMAT,
};
