//! Console sink implementation

use crate::core::{
    LogLevel, LogRecord, OutputFormat, RecordFormatter, Result, Sink, TimestampFormat,
    WriteOutcome,
};
use colored::Colorize;
use std::io::Write;

/// Writes one line per record; error and fatal go to stderr, everything
/// else to stdout
pub struct ConsoleSink {
    use_colors: bool,
    formatter: RecordFormatter,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            use_colors: true,
            formatter: RecordFormatter::new(OutputFormat::Text).with_thread(true),
        }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self {
            use_colors,
            ..Self::new()
        }
    }

    /// Set the output format for this sink
    ///
    /// # Example
    ///
    /// ```
    /// use rust_log_dispatch::sinks::ConsoleSink;
    /// use rust_log_dispatch::OutputFormat;
    ///
    /// let sink = ConsoleSink::new().with_output_format(OutputFormat::Json);
    /// ```
    #[must_use]
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.formatter.format = format;
        self
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.formatter.timestamp = format;
        self
    }

    fn render(&self, record: &LogRecord) -> String {
        let line = self.formatter.format(record);
        if !self.use_colors || self.formatter.format != OutputFormat::Text {
            return line;
        }

        let level = format!("{:5}", record.level().to_str());
        let colored_level = level.color(record.level().color_code()).to_string();
        line.replacen(&format!("[{}]", level), &format!("[{}]", colored_level), 1)
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn write(&mut self, record: &LogRecord) -> Result<WriteOutcome> {
        let output = self.render(record);
        match record.level() {
            LogLevel::Error | LogLevel::Fatal => writeln!(std::io::stderr().lock(), "{}", output)?,
            _ => writeln!(std::io::stdout().lock(), "{}", output)?,
        }
        Ok(WriteOutcome::Immediate)
    }

    fn write_sync(&mut self, record: &LogRecord) -> Option<Result<()>> {
        Some(self.write(record).and_then(|_| self.flush()))
    }

    fn flush(&mut self) -> Result<()> {
        std::io::stdout().flush()?;
        std::io::stderr().flush()?;
        Ok(())
    }
}
