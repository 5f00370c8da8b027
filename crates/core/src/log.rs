// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run log entries and the server log-line parser.

use serde::{Deserialize, Serialize};

/// Severity of one log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Map a server log level name onto our levels. Chatter levels collapse
    /// into debug; unrecognised names are kept visible as info.
    pub fn from_server_level(name: &str) -> LogLevel {
        match name {
            "debug" | "spam" | "config" | "event" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warning" => LogLevel::Warning,
            "error" | "fatal" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

crate::simple_display! {
    LogLevel {
        Debug => "debug",
        Info => "info",
        Warning => "warning",
        Error => "error",
    }
}

/// One appended log entry. Ids are assigned by the log store, monotonically
/// per run; entries parsed from external sources carry id 0 until appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub at_ms: u64,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(id: u64, at_ms: u64, level: LogLevel, message: impl Into<String>) -> Self {
        Self { id, at_ms, level, message: message.into() }
    }

    /// Parse one line of the server's tab-separated log format:
    ///
    /// `epochSeconds.micros \t host \t pid \t service \t component \t level \t message`
    ///
    /// where the message has `\n` and `\t` escaped. Lines without exactly
    /// seven fields are skipped.
    pub fn parse_server_line(line: &str) -> Option<LogEntry> {
        let fields: Vec<&str> = line.split('\t').collect();
        let [time, host, _pid, service, component, level, message] = fields[..] else {
            return None;
        };
        Some(LogEntry {
            id: 0,
            at_ms: parse_epoch_ms(time)?,
            level: LogLevel::from_server_level(level),
            message: format!("{host}\t{service}\t{component}\n{}", unescape(message)),
        })
    }
}

/// Parse a whole server log dump, skipping malformed lines.
pub fn parse_server_logs(raw: &[u8]) -> Vec<LogEntry> {
    String::from_utf8_lossy(raw)
        .lines()
        .filter_map(LogEntry::parse_server_line)
        .collect()
}

fn parse_epoch_ms(field: &str) -> Option<u64> {
    let (seconds, fraction) = match field.split_once('.') {
        Some((s, f)) => (s, f),
        None => (field, ""),
    };
    let seconds: u64 = seconds.parse().ok()?;
    let mut millis = 0u64;
    for (i, c) in fraction.chars().take(3).enumerate() {
        millis += c.to_digit(10)? as u64 * 10u64.pow(2 - i as u32);
    }
    Some(seconds * 1000 + millis)
}

fn unescape(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut chars = message.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
