//! Result sinks.
//!
//! - CSV: `frequency;amplitude[;phase]`, one header line, one row per point
//! - JSON: the point list as serialized by serde
//!
//! The amplitude column carries the normalized ratio when present. An
//! absent phase is an empty field, never zero.

use bode_common::sweep::FrequencyPointResult;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Error type for result export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Output file could not be written.
    #[error("Failed to write results: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding failed.
    #[error("Failed to encode results: {0}")]
    Json(#[from] serde_json::Error),
}

/// Consumer of a finished (or truncated) sweep.
pub trait ResultSink {
    /// Write every point, in order.
    fn write_points(&mut self, points: &[FrequencyPointResult]) -> Result<(), ExportError>;
}

/// Semicolon-separated text output.
pub struct CsvSink<W: Write> {
    writer: W,
    with_phase: bool,
}

impl<W: Write> CsvSink<W> {
    /// Create a sink; `with_phase` adds the phase column.
    pub fn new(writer: W, with_phase: bool) -> Self {
        Self { writer, with_phase }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ResultSink for CsvSink<W> {
    fn write_points(&mut self, points: &[FrequencyPointResult]) -> Result<(), ExportError> {
        if self.with_phase {
            writeln!(self.writer, "frequency;amplitude;phase")?;
        } else {
            writeln!(self.writer, "frequency;amplitude")?;
        }

        for point in points {
            write!(self.writer, "{};{}", point.frequency_hz, point.amplitude())?;
            if self.with_phase {
                match point.phase_deg {
                    Some(phase) => write!(self.writer, ";{phase}")?,
                    None => write!(self.writer, ";")?,
                }
            }
            writeln!(self.writer)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Pretty-printed JSON array output.
pub struct JsonSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonSink<W> {
    /// Create a sink.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ResultSink for JsonSink<W> {
    fn write_points(&mut self, points: &[FrequencyPointResult]) -> Result<(), ExportError> {
        serde_json::to_writer_pretty(&mut self.writer, points)?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Output format, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultFormat {
    /// Semicolon-separated text
    Csv,
    /// JSON array
    Json,
}

impl ResultFormat {
    /// `.json` selects JSON; anything else is CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ResultFormat::Json,
            _ => ResultFormat::Csv,
        }
    }
}

/// Write `points` to `path` in the format its extension selects.
pub fn export_to_path(
    path: &Path,
    points: &[FrequencyPointResult],
    with_phase: bool,
) -> Result<ResultFormat, ExportError> {
    let format = ResultFormat::from_path(path);
    let writer = BufWriter::new(File::create(path)?);
    match format {
        ResultFormat::Csv => CsvSink::new(writer, with_phase).write_points(points)?,
        ResultFormat::Json => JsonSink::new(writer).write_points(points)?,
    }
    info!("Wrote {} points to {} ({:?})", points.len(), path.display(), format);
    Ok(format)
}
