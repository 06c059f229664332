//! Line-oriented output sinks.
//!
//! Every solver writes its transcript (tableaus, pivot announcements, branch
//! labels) into an [`OutputSink`] handed to it by the caller. The engine never
//! opens files or console handles itself.

use std::io;

/// A line-oriented writer capability.
pub trait OutputSink {
    /// Writes text without a trailing newline.
    fn write(&mut self, text: &str);

    /// Writes a full line.
    fn write_line(&mut self, line: &str);

    /// Starts a new titled section of output.
    fn start_section(&mut self, header: &str) {
        self.write_line("");
        self.write_line(header);
        self.write_line(&"-".repeat(header.chars().count().max(3)));
    }
}

impl<S: OutputSink + ?Sized> OutputSink for &mut S {
    fn write(&mut self, text: &str) {
        (**self).write(text);
    }

    fn write_line(&mut self, line: &str) {
        (**self).write_line(line);
    }

    fn start_section(&mut self, header: &str) {
        (**self).start_section(header);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn write(&mut self, _text: &str) {}

    fn write_line(&mut self, _line: &str) {}

    fn start_section(&mut self, _header: &str) {}
}

/// Collects output in memory.
#[derive(Debug, Default, Clone)]
pub struct BufferSink {
    buffer: String,
    sections: Vec<String>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> &str {
        &self.buffer
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.buffer.lines()
    }

    /// Section headers in the order they were started.
    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    pub fn into_string(self) -> String {
        self.buffer
    }
}

impl OutputSink for BufferSink {
    fn write(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    fn write_line(&mut self, line: &str) {
        self.buffer.push_str(line);
        self.buffer.push('\n');
    }

    fn start_section(&mut self, header: &str) {
        self.sections.push(header.to_string());
        self.write_line("");
        self.write_line(header);
        self.write_line(&"-".repeat(header.chars().count().max(3)));
    }
}

/// Forwards output to any [`io::Write`].
///
/// Sink methods cannot fail, so the first I/O error is kept and later writes
/// are dropped. [`WriterSink::finish`] reports it.
#[derive(Debug)]
pub struct WriterSink<W: io::Write> {
    writer: W,
    error: Option<io::Error>,
}

impl<W: io::Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            error: None,
        }
    }

    fn emit(&mut self, text: &str, newline: bool) {
        if self.error.is_some() {
            return;
        }
        let outcome = if newline {
            writeln!(self.writer, "{text}")
        } else {
            write!(self.writer, "{text}")
        };
        if let Err(err) = outcome {
            self.error = Some(err);
        }
    }

    /// Flushes the writer and returns it, or the first error seen.
    pub fn finish(mut self) -> io::Result<W> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: io::Write> OutputSink for WriterSink<W> {
    fn write(&mut self, text: &str) {
        self.emit(text, false);
    }

    fn write_line(&mut self, line: &str) {
        self.emit(line, true);
    }
}

/// Sends output lines to the `log` facade at `info` level.
///
/// Partial writes are buffered until the next full line.
#[derive(Debug, Default)]
pub struct LogSink {
    pending: String,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputSink for LogSink {
    fn write(&mut self, text: &str) {
        self.pending.push_str(text);
    }

    fn write_line(&mut self, line: &str) {
        if self.pending.is_empty() {
            log::info!("{line}");
        } else {
            log::info!("{}{line}", self.pending);
            self.pending.clear();
        }
    }

    fn start_section(&mut self, header: &str) {
        log::info!("== {header} ==");
    }
}

impl Drop for LogSink {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            log::info!("{}", self.pending);
        }
    }
}
