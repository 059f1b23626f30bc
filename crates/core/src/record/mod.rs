use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{controller::Stage, PilotError, Result};

/// One logged trainer frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Seconds since session start.
    pub timestamp: f64,
    /// Degrees.
    pub joint_angle: f32,
    pub rep_count: u32,
    pub stage: Stage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Csv,
    JsonLines,
}

/// Where and how the trainer log is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    pub output_path: PathBuf,
    pub format: LogFormat,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("workout_data.csv"),
            format: LogFormat::Csv,
        }
    }
}

impl RecordingSettings {
    /// Opens the configured file in append mode. Timestamps are written as
    /// seconds since the Unix epoch, counted from the moment the sink opens,
    /// so a file shared by several sessions stays in time order.
    pub fn open_sink(&self) -> Result<Box<dyn RecordSink>> {
        let origin = unix_now();
        Ok(match self.format {
            LogFormat::Csv => {
                Box::new(CsvSink::append(&self.output_path)?.with_time_origin(origin))
            }
            LogFormat::JsonLines => {
                Box::new(JsonLinesSink::append(&self.output_path)?.with_time_origin(origin))
            }
        })
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0)
}

/// Destination for flushed records.
///
/// Delivery is at-least-once: each call renders the whole batch before writing
/// it, but an IO error part way through the write can leave some of it on
/// disk, and the retry writes the batch again.
pub trait RecordSink {
    /// Writes `records` in order. On error none of them count as written.
    fn write_records(&mut self, records: &[LogRecord]) -> Result<()>;
}

impl<S: RecordSink + ?Sized> RecordSink for Box<S> {
    fn write_records(&mut self, records: &[LogRecord]) -> Result<()> {
        (**self).write_records(records)
    }
}

/// Comma-separated log with a `timestamp,joint_angle,rep_count,stage` header.
#[derive(Debug)]
pub struct CsvSink<W: Write> {
    writer: W,
    header_pending: bool,
    origin: f64,
}

pub const CSV_HEADER: &str = "timestamp,joint_angle,rep_count,stage";

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W, write_header: bool) -> Self {
        Self {
            writer,
            header_pending: write_header,
            origin: 0.0,
        }
    }

    /// Offset added to every session-relative timestamp on output.
    pub fn with_time_origin(mut self, origin: f64) -> Self {
        self.origin = origin;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn render(&self, records: &[LogRecord]) -> String {
        let mut chunk = String::new();
        if self.header_pending {
            chunk.push_str(CSV_HEADER);
            chunk.push('\n');
        }
        for record in records {
            chunk.push_str(&format!(
                "{:.3},{:.2},{},{}\n",
                record.timestamp + self.origin,
                record.joint_angle,
                record.rep_count,
                record.stage
            ));
        }
        chunk
    }
}

impl CsvSink<BufWriter<File>> {
    /// Appends to `path`, writing the header only when the file is new or empty.
    pub fn append(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let empty = file.metadata()?.len() == 0;
        Ok(Self::new(BufWriter::new(file), empty))
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn write_records(&mut self, records: &[LogRecord]) -> Result<()> {
        let chunk = self.render(records);
        self.writer
            .write_all(chunk.as_bytes())
            .and_then(|()| self.writer.flush())
            .map_err(|err| PilotError::Sink(format!("csv write failed: {err}")))?;
        self.header_pending = false;
        Ok(())
    }
}

/// One JSON object per line.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
    origin: f64,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, origin: 0.0 }
    }

    /// Offset added to every session-relative timestamp on output.
    pub fn with_time_origin(mut self, origin: f64) -> Self {
        self.origin = origin;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<BufWriter<File>> {
    pub fn append(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn write_records(&mut self, records: &[LogRecord]) -> Result<()> {
        let mut chunk = Vec::new();
        for record in records {
            let shifted = LogRecord {
                timestamp: record.timestamp + self.origin,
                ..*record
            };
            serde_json::to_writer(&mut chunk, &shifted)?;
            chunk.push(b'\n');
        }
        self.writer
            .write_all(&chunk)
            .and_then(|()| self.writer.flush())
            .map_err(|err| PilotError::Sink(format!("json lines write failed: {err}")))
    }
}

/// Keeps written records in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub records: Vec<LogRecord>,
    pub writes: usize,
}

impl RecordSink for MemorySink {
    fn write_records(&mut self, records: &[LogRecord]) -> Result<()> {
        self.records.extend_from_slice(records);
        self.writes += 1;
        Ok(())
    }
}

/// Accumulates trainer records until the host flushes them.
///
/// Records stay in memory after a flush; only the unflushed tail is written on
/// the next flush, so repeated flushes never duplicate output.
#[derive(Debug, Default)]
pub struct SessionRecorder {
    records: Vec<LogRecord>,
    flushed: usize,
}

impl SessionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record. Timestamps must strictly increase.
    pub fn record(&mut self, entry: LogRecord) -> Result<()> {
        if let Some(last) = self.records.last() {
            if entry.timestamp <= last.timestamp {
                warn!(previous = last.timestamp, current = entry.timestamp, "record out of order");
                return Err(PilotError::OutOfOrder {
                    previous: last.timestamp,
                    current: entry.timestamp,
                });
            }
        }
        self.records.push(entry);
        Ok(())
    }

    /// Writes every record not yet flushed and returns how many were written.
    /// On sink failure the pending records are kept for the next attempt.
    pub fn flush(&mut self, sink: &mut dyn RecordSink) -> Result<usize> {
        let pending = &self.records[self.flushed..];
        if pending.is_empty() {
            return Ok(0);
        }

        sink.write_records(pending)?;
        let written = pending.len();
        self.flushed = self.records.len();
        debug!(written, total = self.records.len(), "records flushed");
        Ok(written)
    }

    /// Alias for [`SessionRecorder::flush`] used for mid-session checkpoints.
    pub fn checkpoint(&mut self, sink: &mut dyn RecordSink) -> Result<usize> {
        self.flush(sink)
    }

    /// Timestamp of the newest record; the next one must be later.
    pub fn last_timestamp(&self) -> Option<f64> {
        self.records.last().map(|record| record.timestamp)
    }

    /// Empties the recorder, returning the records no sink has received yet.
    pub fn take_pending(&mut self) -> Vec<LogRecord> {
        let pending = self.records.split_off(self.flushed);
        self.records.clear();
        self.flushed = 0;
        pending
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn pending(&self) -> &[LogRecord] {
        &self.records[self.flushed..]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
