//! Envelope classification: level, channel and renderable text
//!
//! The push transport carries no structured severity, so every record is
//! classified heuristically from its logical name and text. All of the policy
//! lives in the ordered rule table below; the function is pure, so the same
//! envelope always classifies to the same record.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde_json::Value;

use crate::envelope::{Envelope, SignalName};
use crate::types::{ClassifiedRecord, LogChannel, LogLevel};

const SUCCESS_KEYWORDS: &[&str] = &["成功", "success", "✓", "✅"];
const ERROR_KEYWORDS: &[&str] = &["失败", "error", "错误", "❌", "异常"];
const WARNING_KEYWORDS: &[&str] = &["warning", "警告", "⚠"];
const DEBUG_KEYWORDS: &[&str] = &["debug"];

/// Build a case-insensitive alternation of literal keywords
fn keyword_pattern(keywords: &[&str]) -> Regex {
    let alternation = keywords
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    RegexBuilder::new(&alternation)
        .case_insensitive(true)
        .build()
        .expect("Invalid keyword regex")
}

static SUCCESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| keyword_pattern(SUCCESS_KEYWORDS));
static ERROR_PATTERN: LazyLock<Regex> = LazyLock::new(|| keyword_pattern(ERROR_KEYWORDS));
static WARNING_PATTERN: LazyLock<Regex> = LazyLock::new(|| keyword_pattern(WARNING_KEYWORDS));
static DEBUG_PATTERN: LazyLock<Regex> = LazyLock::new(|| keyword_pattern(DEBUG_KEYWORDS));

/// One row of the level table: first matching rule wins
struct LevelRule {
    level: LogLevel,
    by_signal: fn(&SignalName) -> bool,
    by_text: &'static LazyLock<Regex>,
}

/// Evaluated top to bottom. Error precedes the request-channel debug
/// fallback, so a `detail_log` line mentioning an error is an error.
static LEVEL_RULES: [LevelRule; 4] = [
    LevelRule {
        level: LogLevel::Success,
        by_signal: SignalName::is_success_signal,
        by_text: &SUCCESS_PATTERN,
    },
    LevelRule {
        level: LogLevel::Error,
        by_signal: SignalName::is_failure_signal,
        by_text: &ERROR_PATTERN,
    },
    LevelRule {
        level: LogLevel::Warning,
        by_signal: |_| false,
        by_text: &WARNING_PATTERN,
    },
    LevelRule {
        level: LogLevel::Debug,
        by_signal: SignalName::is_request_channel,
        by_text: &DEBUG_PATTERN,
    },
];

/// Classify an envelope into a record
///
/// Total: any payload shape produces a record, unknown shapes fall back to
/// `info` on the `main` channel.
pub fn classify(envelope: &Envelope) -> ClassifiedRecord {
    let text = payload_text(&envelope.payload);
    ClassifiedRecord {
        id: envelope.message_id.clone(),
        timestamp: envelope.timestamp,
        channel: channel_for(&envelope.signal),
        level: level_for(&envelope.signal, &text),
        signal: envelope.signal.clone(),
        text,
        envelope: envelope.clone(),
    }
}

/// Channel partition from the logical name alone
pub fn channel_for(signal: &SignalName) -> LogChannel {
    if signal.is_request_channel() {
        LogChannel::Request
    } else {
        LogChannel::Main
    }
}

/// Level from the ordered rule table
pub fn level_for(signal: &SignalName, text: &str) -> LogLevel {
    LEVEL_RULES
        .iter()
        .find(|rule| (rule.by_signal)(signal) || rule.by_text.is_match(text))
        .map(|rule| rule.level)
        .unwrap_or(LogLevel::Info)
}

/// Renderable text for any payload
///
/// Strings are used as-is; everything else is compact JSON, so `null`
/// renders as `"null"` and objects keep a stable key order.
pub fn payload_text(payload: &Value) -> String {
    match payload {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
