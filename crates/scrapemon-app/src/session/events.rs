//! Payload parsing for the signals that drive the session.
//!
//! The worker's payloads have no schema contract, so every accessor here is
//! lenient: numbers may arrive as strings or floats, text fields may be
//! missing or non-string. A payload that is not even the right shape yields
//! `None` and the caller leaves the session untouched.

use serde_json::{Map, Value};

use super::state::MediaSnapshot;

/// Default error text for failed items that carry no outline
pub(crate) const DEFAULT_FAILURE_TEXT: &str = "scrape failed";

/// Absolute progress reported by the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct ProgressUpdate {
    pub processed: Option<u64>,
    pub total: Option<u64>,
    pub percent: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Success,
    Failure,
}

/// One finished work item as reported by `show_list_name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResultEvent {
    pub outcome: Outcome,
    pub source_path: String,
    pub label: String,
    pub error_text: Option<String>,
}

/// `{progress, total, percentage}`
pub(crate) fn parse_progress(payload: &Value) -> Option<ProgressUpdate> {
    let obj = payload.as_object()?;
    let update = ProgressUpdate {
        processed: obj.get("progress").and_then(as_count),
        total: obj.get("total").and_then(as_count),
        percent: obj
            .get("percentage")
            .and_then(as_count)
            .map(|p| p.min(100) as u32),
    };
    if update == ProgressUpdate::default() {
        return None;
    }
    Some(update)
}

/// `{status, real_number?, show_data: {file_path, number, title, outline}}`
pub(crate) fn parse_result(payload: &Value) -> Option<ResultEvent> {
    let obj = payload.as_object()?;
    let empty = Map::new();
    let show_data = obj
        .get("show_data")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let outcome = match obj.get("status").and_then(Value::as_str) {
        Some("succ") => Outcome::Success,
        _ => Outcome::Failure,
    };

    let real_number = text_field(obj, "real_number");
    let label = first_non_empty([
        real_number,
        text_field(show_data, "number"),
        match outcome {
            Outcome::Success => text_field(show_data, "title"),
            Outcome::Failure => None,
        },
    ]);

    let error_text = match outcome {
        Outcome::Success => None,
        Outcome::Failure => Some(
            text_field(show_data, "outline")
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_FAILURE_TEXT.to_string()),
        ),
    };

    Some(ResultEvent {
        outcome,
        source_path: text_field(show_data, "file_path").unwrap_or_default(),
        label,
        error_text,
    })
}

/// `{show_data: {...}}`; requires `show_data` to be an object
pub(crate) fn parse_media(payload: &Value) -> Option<MediaSnapshot> {
    let data = payload.get("show_data")?.as_object()?;
    let text = |key: &str| text_field(data, key).unwrap_or_default();

    Some(MediaSnapshot {
        number: text("number"),
        title: text("title"),
        actors: split_list(&text("actor")),
        release: text("release"),
        runtime: text("runtime"),
        outline: text("outline"),
        tags: split_list(&text("tag")),
        director: text("director"),
        studio: text("studio"),
        series: text("series"),
        publisher: text("publisher"),
        source: text("website"),
        poster_url: text_field(data, "poster").filter(|s| !s.is_empty()),
        thumb_url: text_field(data, "thumb").filter(|s| !s.is_empty()),
        file_path: text_field(data, "file_path").filter(|s| !s.is_empty()),
        nfo_path: text_field(data, "nfo_path").filter(|s| !s.is_empty()),
    })
}

/// Non-negative integer from a number or numeric string
fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| *f >= 0.0)
            .map(|f| f.round() as u64),
        _ => None,
    }
}

/// String form of a scalar field; null and missing are `None`
fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn first_non_empty<const N: usize>(candidates: [Option<String>; N]) -> String {
    candidates
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

/// Comma-separated list, empty entries dropped
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_progress() {
        let payload = json!({"progress": 3, "total": 10, "percentage": 30});
        let update = parse_progress(&payload).unwrap();
        assert_eq!(update.processed, Some(3));
        assert_eq!(update.total, Some(10));
        assert_eq!(update.percent, Some(30));
    }

    #[test]
    fn test_parse_progress_lenient_numbers() {
        let update =
            parse_progress(&json!({"progress": "7", "total": 9.0, "percentage": 77.7})).unwrap();
        assert_eq!(update.processed, Some(7));
        assert_eq!(update.total, Some(9));
        assert_eq!(update.percent, Some(78));
    }

    #[test]
    fn test_parse_progress_clamps_percent() {
        let update = parse_progress(&json!({"percentage": 250})).unwrap();
        assert_eq!(update.percent, Some(100));
        assert_eq!(update.processed, None);
    }

    #[test]
    fn test_parse_progress_rejects_garbage() {
        assert!(parse_progress(&json!("50%")).is_none());
        assert!(parse_progress(&json!({"foo": 1})).is_none());
        assert!(parse_progress(&json!({"progress": -1})).is_none());
    }

    #[test]
    fn test_parse_success_result() {
        let event = parse_result(&json!({
            "status": "succ",
            "real_number": "ABC-123",
            "show_data": {"file_path": "/a/b.mp4", "number": "abc123", "title": "T"}
        }))
        .unwrap();
        assert_eq!(event.outcome, Outcome::Success);
        assert_eq!(event.source_path, "/a/b.mp4");
        assert_eq!(event.label, "ABC-123");
        assert!(event.error_text.is_none());
    }

    #[test]
    fn test_success_label_falls_back_to_title() {
        let event = parse_result(&json!({
            "status": "succ",
            "show_data": {"file_path": "/x.mkv", "title": "Some Title"}
        }))
        .unwrap();
        assert_eq!(event.label, "Some Title");
    }

    #[test]
    fn test_parse_failure_result() {
        let event = parse_result(&json!({
            "status": "fail",
            "show_data": {"file_path": "/a/b.mp4", "number": "XYZ-9", "outline": "no match"}
        }))
        .unwrap();
        assert_eq!(event.outcome, Outcome::Failure);
        assert_eq!(event.label, "XYZ-9");
        assert_eq!(event.error_text.as_deref(), Some("no match"));
    }

    #[test]
    fn test_failure_without_outline_gets_default_text() {
        let payload = json!({"status": "fail", "show_data": {"file_path": "/a"}});
        let event = parse_result(&payload).unwrap();
        assert_eq!(event.error_text.as_deref(), Some(DEFAULT_FAILURE_TEXT));
        assert_eq!(event.label, "");
    }

    #[test]
    fn test_missing_status_is_failure() {
        let event = parse_result(&json!({"show_data": {"file_path": "/a"}})).unwrap();
        assert_eq!(event.outcome, Outcome::Failure);
    }

    #[test]
    fn test_result_requires_object() {
        assert!(parse_result(&json!("succ")).is_none());
        assert!(parse_result(&Value::Null).is_none());
    }

    #[test]
    fn test_parse_media() {
        let media = parse_media(&json!({"show_data": {
            "number": "ABC-123",
            "title": "Title",
            "actor": "Alice, Bob,,",
            "tag": "drama,",
            "runtime": 120,
            "website": "site-a",
            "poster": "/img/poster.jpg",
            "thumb": ""
        }}))
        .unwrap();
        assert_eq!(media.number, "ABC-123");
        assert_eq!(media.actors, vec!["Alice", "Bob"]);
        assert_eq!(media.tags, vec!["drama"]);
        assert_eq!(media.runtime, "120");
        assert_eq!(media.source, "site-a");
        assert_eq!(media.poster_url.as_deref(), Some("/img/poster.jpg"));
        assert!(media.thumb_url.is_none());
        assert!(media.director.is_empty());
    }

    #[test]
    fn test_media_requires_show_data_object() {
        assert!(parse_media(&json!({"show_data": null})).is_none());
        assert!(parse_media(&json!({"other": {}})).is_none());
        assert!(parse_media(&json!("text")).is_none());
    }
}
