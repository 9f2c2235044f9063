//! Notifier collaborators.
//!
//! A notifier receives the finalized `SessionSummary` exactly once. Delivery
//! failures are logged by the pipeline and never undo the session.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;

use crate::session::SessionSummary;

pub trait Notifier {
    fn notify(&mut self, summary: &SessionSummary) -> Result<()>;
}

/// Writes the report to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, summary: &SessionSummary) -> Result<()> {
        for line in summary.report_text().lines() {
            log::info!("{}", line);
        }
        for artifact in &summary.artifacts {
            log::debug!("artifact {:?} -> {}", artifact.kind, artifact.location);
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ReportFile<'a> {
    digest: String,
    report: String,
    summary: &'a SessionSummary,
}

/// Writes the summary, its digest and the text report as pretty JSON.
#[derive(Debug)]
pub struct JsonReportNotifier {
    path: PathBuf,
}

impl JsonReportNotifier {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Notifier for JsonReportNotifier {
    fn notify(&mut self, summary: &SessionSummary) -> Result<()> {
        let report = ReportFile {
            digest: summary.digest()?,
            report: summary.report_text(),
            summary,
        };
        let json = serde_json::to_string_pretty(&report)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)
            .with_context(|| format!("failed to write report {}", self.path.display()))?;
        log::info!("session report written to {}", self.path.display());
        Ok(())
    }
}

/// Fans a summary out to several notifiers. Every notifier is attempted;
/// the first error is returned after all have run.
#[derive(Default)]
pub struct NotifierChain {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<N: Notifier + 'static>(mut self, notifier: N) -> Self {
        self.notifiers.push(Box::new(notifier));
        self
    }
}

impl Notifier for NotifierChain {
    fn notify(&mut self, summary: &SessionSummary) -> Result<()> {
        let mut first_error = None;
        for notifier in &mut self.notifiers {
            if let Err(e) = notifier.notify(summary) {
                log::error!("notifier failed: {:#}", e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Keeps delivered summaries in memory.
#[derive(Debug, Default)]
pub struct InMemoryNotifier {
    delivered: Vec<SessionSummary>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> &[SessionSummary] {
        &self.delivered
    }
}

impl Notifier for InMemoryNotifier {
    fn notify(&mut self, summary: &SessionSummary) -> Result<()> {
        self.delivered.push(summary.clone());
        Ok(())
    }
}
