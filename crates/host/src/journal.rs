//! systemd journal via `journalctl --output=json`

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use warden_core::Result;

use crate::command;

const JOURNALCTL: &str = "journalctl";
pub const DEFAULT_LINES: usize = 100;
const FOLLOW_BUFFER: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JournalEntry {
    pub timestamp: Option<DateTime<Utc>>,
    pub unit: String,
    pub message: String,
    pub priority: Option<u8>,
    pub pid: String,
    pub hostname: String,
}

#[derive(Debug, Clone, Default)]
pub struct JournalQuery {
    pub unit: Option<String>,
    /// 0 (emerg) through 7 (debug); `None` for all
    pub priority: Option<u8>,
    pub lines: Option<usize>,
    pub since: Option<String>,
    pub until: Option<String>,
}

impl JournalQuery {
    fn args(&self) -> Vec<String> {
        let mut args = vec!["--output=json".to_string(), "--no-pager".to_string()];
        if let Some(unit) = &self.unit {
            args.extend(["-u".to_string(), unit.clone()]);
        }
        if let Some(priority) = self.priority.filter(|p| *p <= 7) {
            args.extend(["-p".to_string(), priority.to_string()]);
        }
        let lines = self.lines.filter(|n| *n > 0).unwrap_or(DEFAULT_LINES);
        args.extend(["-n".to_string(), lines.to_string()]);
        if let Some(since) = &self.since {
            args.extend(["--since".to_string(), since.clone()]);
        }
        if let Some(until) = &self.until {
            args.extend(["--until".to_string(), until.clone()]);
        }
        args
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogStream {
    pub entries: Vec<JournalEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct JournalReader;

impl JournalReader {
    pub fn new() -> Self {
        Self
    }

    pub async fn query(&self, query: &JournalQuery) -> Result<LogStream> {
        let args = query.args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = command::run_checked(JOURNALCTL, &args, command::DEFAULT_TIMEOUT).await?;

        Ok(LogStream {
            entries: command::stdout_text(&output)
                .lines()
                .filter_map(parse_line)
                .collect(),
            unit: query.unit.clone(),
        })
    }

    pub async fn recent(&self, unit: &str, lines: usize) -> Result<Vec<JournalEntry>> {
        let query = JournalQuery {
            unit: Some(unit.to_string()),
            lines: Some(lines),
            ..JournalQuery::default()
        };
        Ok(self.query(&query).await?.entries)
    }

    /// Follow the journal until the returned stream is dropped.
    ///
    /// The `journalctl -f` child is owned by a reader task and killed when
    /// the task ends, which happens as soon as the receiver goes away.
    pub fn follow(&self, unit: Option<&str>) -> Result<ReceiverStream<JournalEntry>> {
        let mut cmd = Command::new(JOURNALCTL);
        cmd.args(["--output=json", "--no-pager", "-f"]);
        if let Some(unit) = unit {
            cmd.args(["-u", unit]);
        }

        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| command::spawn_error(JOURNALCTL, e))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            warden_core::Error::internal("journalctl stdout was not captured")
        })?;

        let (tx, rx) = mpsc::channel(FOLLOW_BUFFER);
        let unit = unit.map(str::to_string);

        tokio::spawn(async move {
            let _child = child;
            let mut lines = BufReader::new(stdout).lines();
            loop {
                tokio::select! {
                    () = tx.closed() => break,
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            if let Some(entry) = parse_line(&line) {
                                if tx.send(entry).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            tracing::warn!(error = %e, "journal follow read failed");
                            break;
                        }
                    },
                }
            }
            tracing::debug!(unit = ?unit, "journal follower stopped");
        });

        Ok(ReceiverStream::new(rx))
    }
}

/// One JSON object per line; unparsable lines are skipped
fn parse_line(line: &str) -> Option<JournalEntry> {
    let raw: Value = serde_json::from_str(line).ok()?;
    let field = |key: &str| raw.get(key).map(field_text).unwrap_or_default();

    let timestamp = raw
        .get("__REALTIME_TIMESTAMP")
        .and_then(Value::as_str)
        .and_then(|ts| ts.parse::<i64>().ok())
        .and_then(from_micros);

    Some(JournalEntry {
        timestamp,
        unit: field("_SYSTEMD_UNIT"),
        message: field("MESSAGE"),
        priority: raw
            .get("PRIORITY")
            .and_then(Value::as_str)
            .and_then(|p| p.parse().ok()),
        pid: field("_PID"),
        hostname: field("_HOSTNAME"),
    })
}

fn from_micros(micros: i64) -> Option<DateTime<Utc>> {
    let nanos = u32::try_from(micros.rem_euclid(1_000_000) * 1_000).ok()?;
    Utc.timestamp_opt(micros.div_euclid(1_000_000), nanos).single()
}

/// journald emits non-UTF-8 fields as arrays of byte values
fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let bytes: Vec<u8> = items
                .iter()
                .filter_map(Value::as_u64)
                .filter_map(|b| u8::try_from(b).ok())
                .collect();
            String::from_utf8_lossy(&bytes).into_owned()
        }
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
