//! Reporting interface
//!
//! The migration never prints. It hands notices to a [`Reporter`], and long
//! itemised lists go to diagnostic log files on disk instead of inline.

use chrono::Utc;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Sink for user-facing notices.
pub trait Reporter {
    /// Informational notice, e.g. nothing to migrate.
    fn info(&mut self, message: &str);

    /// Something was skipped or needs attention.
    fn warn(&mut self, message: &str);
}

/// Routes notices into `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn info(&mut self, message: &str) {
        tracing::info!(target: "reposhift::report", "{}", message);
    }

    fn warn(&mut self, message: &str) {
        tracing::warn!(target: "reposhift::report", "{}", message);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
}

/// Keeps every notice in memory, in order.
#[derive(Debug, Default, Clone)]
pub struct CollectingReporter {
    pub messages: Vec<(Severity, String)>,
}

impl CollectingReporter {
    pub fn infos(&self) -> Vec<&str> {
        self.with_severity(Severity::Info)
    }

    pub fn warnings(&self) -> Vec<&str> {
        self.with_severity(Severity::Warning)
    }

    fn with_severity(&self, severity: Severity) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, m)| m.as_str())
            .collect()
    }
}

impl Reporter for CollectingReporter {
    fn info(&mut self, message: &str) {
        self.messages.push((Severity::Info, message.to_string()));
    }

    fn warn(&mut self, message: &str) {
        self.messages.push((Severity::Warning, message.to_string()));
    }
}

/// Write an itemised diagnostic log and return its path.
///
/// The file is named `<stem>-<UTC timestamp>.log` and created under `dir`,
/// which is created if needed. Each item goes on its own line below `header`.
pub fn write_diagnostic_log<I, S>(
    dir: &Path,
    stem: &str,
    header: &str,
    items: I,
) -> std::io::Result<PathBuf>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    std::fs::create_dir_all(dir)?;
    let timestamp = Utc::now().format("%Y%m%d-%H%M%S%.6f");
    let path = dir.join(format!("{}-{}.log", stem, timestamp));

    let mut file = std::io::BufWriter::new(std::fs::File::create(&path)?);
    writeln!(file, "{}", header)?;
    for item in items {
        writeln!(file, "{}", item.as_ref())?;
    }
    file.flush()?;
    Ok(path)
}
