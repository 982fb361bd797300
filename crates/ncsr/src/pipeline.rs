//! End-to-end run: reference table, search, extraction, report.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use ncsr_core::{FilingRecord, FilingSearch, FormType, NcsrError, Result, XbrlConverter};
use tracing::info;

use crate::config::PipelineConfig;
use crate::extract::DisclosureExtractor;
use crate::locator::FilingLocator;
use crate::mapping::ClassMapping;
use crate::orchestrator::{BatchOrchestrator, BatchOutcome};
use crate::report::{Report, ReportKind};

/// Parameters of one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunRequest {
    /// Form types to search for.
    pub form_types: Vec<FormType>,
    /// First filing date, inclusive.
    pub from: NaiveDate,
    /// Last filing date, inclusive.
    pub to: NaiveDate,
    /// Maximum number of filings.
    pub limit: usize,
    /// Path of the class/series reference table.
    pub mapping_path: PathBuf,
    /// Report to build.
    pub kind: ReportKind,
}

impl RunRequest {
    /// Create a run request.
    #[must_use]
    pub fn new(
        form_types: Vec<FormType>,
        from: NaiveDate,
        to: NaiveDate,
        limit: usize,
        mapping_path: impl Into<PathBuf>,
        kind: ReportKind,
    ) -> Self {
        Self {
            form_types,
            from,
            to,
            limit,
            mapping_path: mapping_path.into(),
            kind,
        }
    }

    /// Check the search inputs.
    pub fn validate(&self) -> Result<()> {
        if self.form_types.is_empty() {
            return Err(NcsrError::InvalidParameter(
                "Select at least one form type".to_string(),
            ));
        }
        if self.from > self.to {
            return Err(NcsrError::InvalidParameter(format!(
                "From date {} is after to date {}",
                self.from, self.to
            )));
        }
        if self.limit == 0 {
            return Err(NcsrError::InvalidParameter(
                "Limit must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The search matched no filings.
    NoFilings,
    /// Filings were found but none produced a row.
    NoRows {
        /// Located filings.
        filings: Vec<FilingRecord>,
        /// Extraction tallies.
        batch: BatchOutcome,
    },
    /// A report was assembled.
    Report {
        /// The joined report.
        report: Report,
        /// Located filings.
        filings: Vec<FilingRecord>,
        /// Extraction tallies; its rows have moved into the report.
        batch: BatchOutcome,
    },
}

/// Locator, orchestrator and assembler wired over one pair of endpoints.
#[derive(Debug, Clone)]
pub struct Pipeline {
    locator: FilingLocator,
    orchestrator: BatchOrchestrator,
}

impl Pipeline {
    /// Create a pipeline.
    #[must_use]
    pub fn new(
        search: Arc<dyn FilingSearch>,
        converter: Arc<dyn XbrlConverter>,
        config: PipelineConfig,
    ) -> Self {
        let extractor = DisclosureExtractor::new(converter, config.class_id_policy);
        Self {
            locator: FilingLocator::new(search).with_page_size(config.page_size),
            orchestrator: BatchOrchestrator::new(Arc::new(extractor), config.concurrency),
        }
    }

    /// Run once.
    ///
    /// The request and the reference table are checked before any request
    /// is sent; a search failure is returned as an error.
    /// `on_progress(processed, total)` is called after each filing.
    pub async fn run<F>(&self, request: &RunRequest, on_progress: F) -> Result<RunOutcome>
    where
        F: FnMut(usize, usize),
    {
        request.validate()?;
        let mapping = ClassMapping::load(&request.mapping_path)?;

        let filings = self
            .locator
            .try_locate(&request.form_types, request.from, request.to, request.limit)
            .await?;
        if filings.is_empty() {
            info!("Search matched no filings");
            return Ok(RunOutcome::NoFilings);
        }
        info!(filings = filings.len(), "Located filings");

        let mut batch = self.orchestrator.process_filings(&filings, on_progress).await;
        info!(
            rows = batch.rows.len(),
            extracted = batch.extracted,
            no_disclosure = batch.no_disclosure,
            failed = batch.failures.len(),
            "Extraction finished"
        );
        if batch.rows.is_empty() {
            return Ok(RunOutcome::NoRows { filings, batch });
        }

        let rows = std::mem::take(&mut batch.rows);
        let report = Report::assemble(rows, &mapping, &filings, request.kind);
        Ok(RunOutcome::Report {
            report,
            filings,
            batch,
        })
    }
}
