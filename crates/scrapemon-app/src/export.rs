//! Flat text export of log records and the failure list

use std::io::Write;

use chrono::{DateTime, Local};

use scrapemon_core::prelude::*;
use scrapemon_core::{ChannelFilter, ClassifiedRecord, FailureItem, LogChannel};

const FILE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Write one line per record; returns the number of lines written
pub fn write_logs<W: Write>(records: &[ClassifiedRecord], writer: W) -> Result<usize> {
    write_lines(records.iter().map(ClassifiedRecord::export_line), writer)
}

/// Write one line per failure item; returns the number of lines written
pub fn write_failures<W: Write>(failures: &[FailureItem], writer: W) -> Result<usize> {
    write_lines(failures.iter().map(FailureItem::export_line), writer)
}

pub fn logs_to_text(records: &[ClassifiedRecord]) -> String {
    records
        .iter()
        .map(ClassifiedRecord::export_line)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn failures_to_text(failures: &[FailureItem]) -> String {
    failures
        .iter()
        .map(FailureItem::export_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// `scrapemon-logs-<main|request|all>-<date>.txt`
pub fn log_file_name(channel: ChannelFilter, date: DateTime<Local>) -> String {
    let scope = match channel {
        ChannelFilter::All => "all",
        ChannelFilter::Only(LogChannel::Main) => "main",
        ChannelFilter::Only(LogChannel::Request) => "request",
    };
    format!("scrapemon-logs-{}-{}.txt", scope, date.format(FILE_DATE_FORMAT))
}

/// `scrapemon-failed-list-<date>.txt`
pub fn failure_file_name(date: DateTime<Local>) -> String {
    format!("scrapemon-failed-list-{}.txt", date.format(FILE_DATE_FORMAT))
}

/// Lines separated by `\n`, no trailing newline
fn write_lines<W, I>(lines: I, mut writer: W) -> Result<usize>
where
    W: Write,
    I: Iterator<Item = String>,
{
    let mut count = 0;
    for line in lines {
        if count > 0 {
            writer.write_all(b"\n")?;
        }
        writer.write_all(line.as_bytes())?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use scrapemon_core::{classify, Envelope};

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, h, m, s).unwrap()
    }

    fn records() -> Vec<ClassifiedRecord> {
        vec![
            classify(&Envelope::new("show_log_text", "scanning").with_timestamp(at(8, 0, 1))),
            classify(&Envelope::new("detail_log", "GET /x").with_timestamp(at(8, 0, 2))),
        ]
    }

    #[test]
    fn test_logs_to_text() {
        assert_eq!(
            logs_to_text(&records()),
            "[2024/03/09 08:00:01] [INFO] [show_log_text] scanning\n\
             [2024/03/09 08:00:02] [DEBUG] [detail_log] GET /x"
        );
    }

    #[test]
    fn test_write_logs_matches_text() {
        let mut buf = Vec::new();
        let count = write_logs(&records(), &mut buf).unwrap();
        assert_eq!(count, 2);
        assert_eq!(String::from_utf8(buf).unwrap(), logs_to_text(&records()));
    }

    #[test]
    fn test_write_failures() {
        let record =
            classify(&Envelope::new("logs_failed_show", "no match").with_timestamp(at(9, 30, 0)));
        let failures = vec![FailureItem::from(&record)];

        let mut buf = Vec::new();
        assert_eq!(write_failures(&failures, &mut buf).unwrap(), 1);
        assert_eq!(String::from_utf8(buf).unwrap(), "[2024/03/09 09:30:00] no match");
        assert_eq!(failures_to_text(&failures), "[2024/03/09 09:30:00] no match");
    }

    #[test]
    fn test_empty_export() {
        let mut buf = Vec::new();
        assert_eq!(write_logs(&[], &mut buf).unwrap(), 0);
        assert!(buf.is_empty());
        assert_eq!(failures_to_text(&[]), "");
    }

    #[test]
    fn test_file_names() {
        let date = at(12, 0, 0);
        assert_eq!(
            log_file_name(ChannelFilter::Only(LogChannel::Request), date),
            "scrapemon-logs-request-2024-03-09.txt"
        );
        assert_eq!(
            log_file_name(ChannelFilter::All, date),
            "scrapemon-logs-all-2024-03-09.txt"
        );
        assert_eq!(failure_file_name(date), "scrapemon-failed-list-2024-03-09.txt");
    }
}
