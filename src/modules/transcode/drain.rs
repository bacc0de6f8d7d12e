//! Draining the transcoder's stdout and stderr.
//!
//! Each stream gets its own task. Reads are bounded so that a slow upload
//! sink slows down how fast ffmpeg's stdout pipe empties, which in turn
//! paces the encoder.

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::progress::{ProgressState, extract_progress};
use crate::infrastructure::storage::OutputSink;

pub const PRIMARY_CHUNK_SIZE: usize = 16 * 1024;
pub const DIAGNOSTIC_CHUNK_SIZE: usize = 4 * 1024;

// A diagnostic "line" longer than this is flushed without a terminator.
const MAX_LINE_LEN: usize = 64 * 1024;

/// Receives every diagnostic line the transcoder prints.
pub trait DiagnosticSink: Send + Sync {
    fn line(&self, line: &str);
}

/// Logs diagnostic lines at debug level under the `transcoder` target.
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn line(&self, line: &str) {
        debug!(target: "transcoder", "{}", line);
    }
}

/// Splits a byte stream into text lines on `\r` or `\n`.
///
/// ffmpeg rewrites its status line in place with `\r`, so both count as
/// terminators. Partial lines are carried over to the next chunk.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                self.take_line(&mut lines);
            } else {
                self.pending.push(byte);
                if self.pending.len() >= MAX_LINE_LEN {
                    self.take_line(&mut lines);
                }
            }
        }
        lines
    }

    /// Returns whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        let mut lines = Vec::new();
        self.take_line(&mut lines);
        lines.pop()
    }

    fn take_line(&mut self, lines: &mut Vec<String>) {
        if self.pending.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimaryReport {
    /// Bytes read from the stream.
    pub bytes_read: u64,
    /// Bytes the sink reported as published on close.
    pub bytes_published: u64,
    pub read_error: Option<String>,
    pub sink_error: Option<String>,
}

impl PrimaryReport {
    pub fn is_clean(&self) -> bool {
        self.read_error.is_none() && self.sink_error.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticReport {
    pub lines: u64,
    pub progress_updates: u64,
    pub read_error: Option<String>,
}

/// Copies `reader` into `sink` chunk by chunk, in order, then closes the
/// sink exactly once.
///
/// If the sink rejects a chunk the reader is still drained to the end so
/// the producing process never stalls on a full pipe.
pub async fn drain_primary<R>(mut reader: R, mut sink: Box<dyn OutputSink>) -> PrimaryReport
where
    R: AsyncRead + Unpin,
{
    let mut report = PrimaryReport::default();
    let mut buf = vec![0u8; PRIMARY_CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                error!("Failed to read transcoder output: {}", e);
                report.read_error = Some(e.to_string());
                break;
            }
        };
        report.bytes_read += n as u64;

        if report.sink_error.is_some() {
            continue;
        }
        if let Err(e) = sink.append(Bytes::copy_from_slice(&buf[..n])).await {
            error!("Output sink rejected data, discarding the rest: {}", e);
            report.sink_error = Some(e.to_string());
        }
    }

    match sink.close().await {
        Ok(published) => report.bytes_published = published,
        Err(e) => {
            if report.sink_error.is_none() {
                error!("Failed to close output sink: {}", e);
                report.sink_error = Some(e.to_string());
            } else {
                warn!("Output sink closed after earlier failure: {}", e);
            }
        }
    }

    report
}

/// Reads diagnostic text, feeding each line to the progress extractor and
/// the optional diagnostic sink.
pub async fn drain_diagnostics<R>(
    mut reader: R,
    progress: ProgressState,
    diagnostics: Option<Arc<dyn DiagnosticSink>>,
) -> DiagnosticReport
where
    R: AsyncRead + Unpin,
{
    let mut report = DiagnosticReport::default();
    let mut splitter = LineSplitter::new();
    let mut buf = vec![0u8; DIAGNOSTIC_CHUNK_SIZE];

    let handle_line = |line: &str, report: &mut DiagnosticReport| {
        report.lines += 1;
        let (frame, fps) = extract_progress(line);
        if progress.write(frame, fps) {
            report.progress_updates += 1;
        }
        if let Some(sink) = &diagnostics {
            sink.line(line);
        }
    };

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!("Failed to read transcoder diagnostics: {}", e);
                report.read_error = Some(e.to_string());
                break;
            }
        };
        for line in splitter.push(&buf[..n]) {
            handle_line(&line, &mut report);
        }
    }

    if let Some(line) = splitter.finish() {
        handle_line(&line, &mut report);
    }

    report
}

#[derive(Debug, Clone, Default)]
pub struct DrainReport {
    pub primary: PrimaryReport,
    pub diagnostic: DiagnosticReport,
}

/// The two drain tasks of one transcoder run.
pub struct StreamDrainer {
    primary: JoinHandle<PrimaryReport>,
    diagnostic: JoinHandle<DiagnosticReport>,
}

impl StreamDrainer {
    pub fn spawn<P, D>(
        primary: P,
        diagnostic: D,
        sink: Box<dyn OutputSink>,
        progress: ProgressState,
        diagnostics: Option<Arc<dyn DiagnosticSink>>,
    ) -> Self
    where
        P: AsyncRead + Unpin + Send + 'static,
        D: AsyncRead + Unpin + Send + 'static,
    {
        Self {
            primary: tokio::spawn(drain_primary(primary, sink)),
            diagnostic: tokio::spawn(drain_diagnostics(diagnostic, progress, diagnostics)),
        }
    }

    /// Waits for both tasks. A task that died is reported as an error on
    /// its stream rather than propagated.
    pub async fn join(self) -> DrainReport {
        let (primary, diagnostic) = tokio::join!(self.primary, self.diagnostic);

        let primary = primary.unwrap_or_else(|e| {
            error!("Output drain task failed: {}", e);
            PrimaryReport {
                read_error: Some(format!("drain task failed: {}", e)),
                ..PrimaryReport::default()
            }
        });
        let diagnostic = diagnostic.unwrap_or_else(|e| {
            warn!("Diagnostic drain task failed: {}", e);
            DiagnosticReport {
                read_error: Some(format!("drain task failed: {}", e)),
                ..DiagnosticReport::default()
            }
        });

        DrainReport {
            primary,
            diagnostic,
        }
    }
}
