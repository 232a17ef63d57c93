//! Session logger and gaze sample intake.
//!
//! A [`LogSink`] owns file naming and buffering; producers only format rows,
//! and always ask the sink for its separators first. Gaze samples arrive
//! from the tracker side through a bounded channel and are written by a
//! [`GazeRecorder`] on the consumer side, so no state is shared between the
//! two ends.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, Timelike, Utc};
use crossbeam::channel::{bounded, Receiver, Sender};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::data::model::{LogFormat, Point3, Value};
use crate::error::{AnalysisError, Result};

/// Columns every channel starts with, before its own columns.
pub const PREAMBLE_COLUMNS: [&str; 8] = [
    "userId", "logId", "timestamp", "hour", "min", "sec", "ms", "origin",
];

/// Columns written by [`GazeRecorder`].
pub const GAZE_COLUMNS: [&str; 4] = [
    "EtPositionX",
    "EtPositionY",
    "EtPositionZ",
    "FixatedObjectName",
];

/// Object name logged for a sample without a hit.
pub const NO_HIT: &str = "no data";

// ---------------------------------------------------------------------------
// Sink contract
// ---------------------------------------------------------------------------

/// Destination for formatted log rows.
pub trait LogSink {
    /// Separators rows must be formatted with.
    fn format(&self) -> LogFormat;

    /// Append one formatted row to the channel `name`.
    ///
    /// Returns `Ok(false)` when the channel does not exist; the row is
    /// dropped.
    fn log(&mut self, name: &str, row: &str, origin: Option<&str>) -> Result<bool>;
}

/// Formats row fields with a sink's separators.
#[derive(Debug, Clone, Copy)]
pub struct RowFormatter {
    format: LogFormat,
}

impl RowFormatter {
    /// Query the sink's format; call this before building any row.
    pub fn from_sink<S: LogSink + ?Sized>(sink: &S) -> Self {
        RowFormatter {
            format: sink.format(),
        }
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }

    /// One row of values: floats use the decimal separator, fields holding
    /// the field separator or a quote are quoted.
    pub fn row(&self, values: &[Value]) -> Result<String> {
        encode_fields(
            &self.format,
            values.iter().map(|v| self.format.format_value(v)),
        )
    }

    /// `x;y;z`.
    pub fn point(&self, p: &Point3) -> Result<String> {
        self.row(&[Value::Float(p.x), Value::Float(p.y), Value::Float(p.z)])
    }

    /// Column names, quoted like any other field.
    pub fn header(&self, columns: &[&str]) -> Result<String> {
        encode_fields(&self.format, columns)
    }
}

/// Render one delimited record without its line terminator.
fn encode_fields<I, T>(format: &LogFormat, fields: I) -> Result<String>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut out = csv::WriterBuilder::new()
        .delimiter(format.delimiter_byte()?)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    out.write_record(fields)?;
    let mut bytes = out
        .into_inner()
        .map_err(|e| AnalysisError::Logger(format!("cannot render row: {}", e.error())))?;
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
    }
    String::from_utf8(bytes).map_err(|e| AnalysisError::Logger(format!("row is not UTF-8: {e}")))
}

// ---------------------------------------------------------------------------
// File-backed session logger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub format: LogFormat,
    /// Rows collected before the buffer is written out (1..=1000).
    pub buffer_size: usize,
    /// File name prefix, typically the study or participant group.
    pub prefix: String,
    pub save_location: PathBuf,
    pub allow_custom_logs: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            format: LogFormat::semicolon(),
            buffer_size: 1,
            prefix: String::new(),
            save_location: PathBuf::from("logs"),
            allow_custom_logs: true,
        }
    }
}

impl LoggerConfig {
    pub fn validate(&self) -> Result<()> {
        self.format.validate()?;
        if !(1..=1000).contains(&self.buffer_size) {
            return Err(AnalysisError::Config(format!(
                "buffer_size must be in [1, 1000], got {}",
                self.buffer_size
            )));
        }
        Ok(())
    }
}

/// One named log file with its pending rows.
struct LogChannel {
    name: String,
    path: PathBuf,
    writer: BufWriter<File>,
    buffer: String,
    counter: u64,
}

impl LogChannel {
    fn write_out(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            self.writer.write_all(self.buffer.as_bytes())?;
            self.buffer.clear();
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes each channel to `{save_location}/{prefix}_{name}_{session}.txt`.
pub struct SessionLogger {
    config: LoggerConfig,
    session_id: String,
    channels: Vec<LogChannel>,
}

impl SessionLogger {
    /// Validate the configuration and make sure the save location exists.
    pub fn new(config: LoggerConfig) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.save_location).map_err(|e| {
            AnalysisError::Logger(format!(
                "cannot create {}: {e}",
                config.save_location.display()
            ))
        })?;
        let session_id = Local::now().format("%Y%m%d_%H%M%S").to_string();
        info!(
            "session {session_id}: logging to {}",
            config.save_location.display()
        );
        Ok(SessionLogger {
            config,
            session_id,
            channels: Vec::new(),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Open a new channel file and write its header.
    ///
    /// `caller` only names the requester in log messages.
    pub fn create_channel(&mut self, name: &str, columns: &[&str], caller: &str) -> Result<()> {
        if !self.config.allow_custom_logs {
            return Err(AnalysisError::Logger(format!(
                "{caller} tried to create log '{name}' but custom logs are disabled"
            )));
        }
        if name.trim().is_empty() {
            return Err(AnalysisError::Logger(format!(
                "{caller} tried to create a log with no name"
            )));
        }
        if self.channel_index(name).is_some() {
            return Err(AnalysisError::Logger(format!("log '{name}' already exists")));
        }

        let file_name = if self.config.prefix.is_empty() {
            format!("{name}_{}.txt", self.session_id)
        } else {
            format!("{}_{name}_{}.txt", self.config.prefix, self.session_id)
        };
        let path = self.config.save_location.join(file_name);
        let mut writer = BufWriter::new(File::create(&path)?);

        let formatter = RowFormatter {
            format: self.config.format,
        };
        let header: Vec<&str> = PREAMBLE_COLUMNS.iter().chain(columns).copied().collect();
        write!(writer, "{}\r\n", formatter.header(&header)?)?;
        writer.flush()?;
        debug!("{caller} opened log '{name}' at {}", path.display());

        self.channels.push(LogChannel {
            name: name.to_string(),
            path,
            writer,
            buffer: String::new(),
            counter: 1,
        });
        Ok(())
    }

    /// File backing a channel.
    pub fn channel_path(&self, name: &str) -> Option<&Path> {
        self.channel_index(name)
            .map(|i| self.channels[i].path.as_path())
    }

    /// Write every pending buffer to disk.
    pub fn flush(&mut self) -> Result<()> {
        for channel in &mut self.channels {
            channel.write_out()?;
        }
        Ok(())
    }

    fn channel_index(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.name == name)
    }

    fn preamble(&self, counter: u64, origin: Option<&str>) -> Result<String> {
        let now = Local::now();
        encode_fields(
            &self.config.format,
            [
                self.session_id.clone(),
                counter.to_string(),
                Utc::now().timestamp().to_string(),
                format!("{:02}", now.hour()),
                format!("{:02}", now.minute()),
                format!("{:02}", now.second()),
                now.timestamp_subsec_millis().min(999).to_string(),
                origin.unwrap_or("").to_string(),
            ],
        )
    }
}

impl LogSink for SessionLogger {
    fn format(&self) -> LogFormat {
        self.config.format
    }

    fn log(&mut self, name: &str, row: &str, origin: Option<&str>) -> Result<bool> {
        let Some(idx) = self.channel_index(name) else {
            warn!("logging into non-existent log '{name}', row dropped");
            return Ok(false);
        };
        let preamble = self.preamble(self.channels[idx].counter, origin)?;
        let sep = self.config.format.field_separator;
        let buffer_size = self.config.buffer_size as u64;

        let channel = &mut self.channels[idx];
        channel.buffer.push_str(&preamble);
        channel.buffer.push(sep);
        channel.buffer.push_str(row);
        channel.buffer.push_str("\r\n");
        if channel.counter % buffer_size == 0 {
            channel.write_out()?;
        }
        channel.counter += 1;
        Ok(true)
    }
}

impl Drop for SessionLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("session {}: final flush failed: {e}", self.session_id);
        }
    }
}

// ---------------------------------------------------------------------------
// Gaze samples
// ---------------------------------------------------------------------------

/// One eye-tracker reading as delivered by the hardware side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GazeSample {
    /// Whether the gaze ray hit a collider.
    pub hit: bool,
    /// Hit position (meaningless when `hit` is false).
    pub point: Point3,
    /// Name of the object that was hit.
    pub object_name: Option<String>,
}

/// Bounded queue between the tracker callback and the recorder.
pub fn gaze_channel(capacity: usize) -> (Sender<GazeSample>, Receiver<GazeSample>) {
    bounded(capacity)
}

/// Drains gaze samples into a sink channel.
pub struct GazeRecorder {
    receiver: Receiver<GazeSample>,
    log_name: String,
    origin: String,
}

impl GazeRecorder {
    pub fn new(receiver: Receiver<GazeSample>, log_name: &str, origin: &str) -> Self {
        GazeRecorder {
            receiver,
            log_name: log_name.to_string(),
            origin: origin.to_string(),
        }
    }

    /// Create the gaze channel on a session logger.
    pub fn attach(&self, logger: &mut SessionLogger) -> Result<()> {
        logger.create_channel(&self.log_name, &GAZE_COLUMNS, &self.origin)
    }

    /// Log every queued sample without blocking. Returns the rows written.
    pub fn drain<S: LogSink + ?Sized>(&self, sink: &mut S) -> Result<usize> {
        let formatter = RowFormatter::from_sink(sink);
        let mut written = 0;
        while let Ok(sample) = self.receiver.try_recv() {
            let name = match (&sample.object_name, sample.hit) {
                (Some(name), true) => name.as_str(),
                _ => NO_HIT,
            };
            let p = sample.point;
            let row = formatter.row(&[
                Value::Float(p.x),
                Value::Float(p.y),
                Value::Float(p.z),
                Value::Text(name.to_string()),
            ])?;
            if sink.log(&self.log_name, &row, Some(&self.origin))? {
                written += 1;
            }
        }
        Ok(written)
    }
}
