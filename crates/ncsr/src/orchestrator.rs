//! Batch Orchestrator: bounded concurrent extraction over many filings.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use ncsr_core::{DisclosureRow, FilingRecord, NcsrError};
use tracing::{debug, warn};

use crate::extract::{DisclosureExtractor, ExtractOutcome};

/// A filing whose extraction failed.
#[derive(Debug)]
pub struct FilingFailure {
    /// URL of the filing.
    pub filing_url: String,
    /// Why it failed.
    pub error: NcsrError,
}

/// Aggregate result of a batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Rows of every successful filing, in submission order.
    pub rows: Vec<DisclosureRow>,
    /// Filings that produced at least one row.
    pub extracted: usize,
    /// Filings without an expense disclosure.
    pub no_disclosure: usize,
    /// Filings whose extraction failed.
    pub failures: Vec<FilingFailure>,
}

impl BatchOutcome {
    /// Number of filings processed.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.extracted + self.no_disclosure + self.failures.len()
    }
}

/// Runs a [`DisclosureExtractor`] over many filings with bounded concurrency.
#[derive(Debug, Clone)]
pub struct BatchOrchestrator {
    extractor: Arc<DisclosureExtractor>,
    concurrency: usize,
}

impl BatchOrchestrator {
    /// Create an orchestrator running at most `concurrency` extractions at once.
    #[must_use]
    pub fn new(extractor: Arc<DisclosureExtractor>, concurrency: usize) -> Self {
        Self {
            extractor,
            concurrency: concurrency.max(1),
        }
    }

    /// Maximum extractions in flight.
    #[must_use]
    pub const fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Extract every URL. Output order follows input order; failures are
    /// logged and recorded, never aborting the batch.
    ///
    /// `on_progress(processed, total)` is called after each filing.
    pub async fn process_all<F>(&self, urls: &[String], on_progress: F) -> BatchOutcome
    where
        F: FnMut(usize, usize),
    {
        self.process(urls.iter().map(|url| (url.as_str(), None)), urls.len(), on_progress)
            .await
    }

    /// Extract every filing, stamping each row with the filing's date and ticker.
    pub async fn process_filings<F>(&self, filings: &[FilingRecord], on_progress: F) -> BatchOutcome
    where
        F: FnMut(usize, usize),
    {
        self.process(
            filings.iter().map(|f| (f.filing_url.as_str(), Some(f))),
            filings.len(),
            on_progress,
        )
        .await
    }

    async fn process<'a, I, F>(&self, jobs: I, total: usize, mut on_progress: F) -> BatchOutcome
    where
        I: Iterator<Item = (&'a str, Option<&'a FilingRecord>)>,
        F: FnMut(usize, usize),
    {
        let mut results = stream::iter(jobs)
            .map(|(url, filing)| {
                let extractor = Arc::clone(&self.extractor);
                async move { (url, filing, extractor.extract(url).await) }
            })
            .buffered(self.concurrency);

        let mut outcome = BatchOutcome::default();
        let mut processed = 0;

        while let Some((url, filing, result)) = results.next().await {
            match result {
                Ok(ExtractOutcome::Rows(mut rows)) => {
                    if let Some(filing) = filing {
                        rows.iter_mut().for_each(|row| row.annotate(filing));
                    }
                    debug!(filing_url = url, rows = rows.len(), "Filing extracted");
                    outcome.extracted += 1;
                    outcome.rows.extend(rows);
                }
                Ok(ExtractOutcome::NoDisclosure) => {
                    warn!(filing_url = url, "No expense disclosure in filing, skipping");
                    outcome.no_disclosure += 1;
                }
                Err(e) => {
                    warn!(filing_url = url, error = %e, "Failed to extract filing");
                    outcome.failures.push(FilingFailure {
                        filing_url: url.to_string(),
                        error: e,
                    });
                }
            }
            processed += 1;
            on_progress(processed, total);
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassIdPolicy;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use ncsr_core::{Result, XbrlConverter, XbrlJson};
    use serde_json::json;
    use std::time::Duration;

    /// Filings named `rows-N` yield N classes, `none` has no disclosure,
    /// `fail` errors. Earlier filings answer more slowly.
    #[derive(Debug)]
    struct ScriptedConverter;

    #[async_trait]
    impl XbrlConverter for ScriptedConverter {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn xbrl_to_json(&self, filing_url: &str) -> Result<XbrlJson> {
            let (name, delay) = filing_url.split_once('#').unwrap_or((filing_url, "0"));
            tokio::time::sleep(Duration::from_millis(delay.parse().unwrap())).await;

            let body = match name {
                "fail" => return Err(NcsrError::Http { status: 500, url: filing_url.to_string() }),
                "none" => json!({"AvgAnnlRtrPct": []}),
                _ => {
                    let n: usize = name.trim_start_matches("rows-").parse().unwrap();
                    let facts: Vec<_> = (0..n)
                        .map(|i| {
                            json!({
                                "value": "10",
                                "segment": {"value": format!("ck:C{:09}Member", i + 1)}
                            })
                        })
                        .collect();
                    json!({ "ExpensesPaidAmt": facts })
                }
            };
            match body {
                serde_json::Value::Object(map) => Ok(XbrlJson::from(map)),
                _ => unreachable!(),
            }
        }
    }

    fn orchestrator(concurrency: usize) -> BatchOrchestrator {
        let extractor = DisclosureExtractor::new(Arc::new(ScriptedConverter), ClassIdPolicy::Strict);
        BatchOrchestrator::new(Arc::new(extractor), concurrency)
    }

    #[tokio::test]
    async fn test_output_follows_input_order() {
        let urls: Vec<String> = ["rows-2#40", "rows-1#20", "rows-3#0"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let outcome = orchestrator(3).process_all(&urls, |_, _| {}).await;

        let order: Vec<&str> = outcome.rows.iter().map(|r| r.filing_url.as_str()).collect();
        assert_eq!(
            order,
            vec!["rows-2#40", "rows-2#40", "rows-1#20", "rows-3#0", "rows-3#0", "rows-3#0"]
        );
        assert_eq!(outcome.extracted, 3);
    }

    #[tokio::test]
    async fn test_skips_and_failures_do_not_abort() {
        let urls: Vec<String> = ["rows-2", "none", "fail", "rows-1"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut progress = Vec::new();

        let outcome = orchestrator(2)
            .process_all(&urls, |done, total| progress.push((done, total)))
            .await;

        assert_eq!(outcome.rows.len(), 3);
        assert_eq!(outcome.extracted, 2);
        assert_eq!(outcome.no_disclosure, 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].filing_url, "fail");
        assert_eq!(outcome.processed(), 4);
        assert!(outcome.rows.iter().all(|r| r.filing_url != "none"));
        assert_eq!(progress, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    }

    #[tokio::test]
    async fn test_process_filings_stamps_rows() {
        let filed_at = NaiveDate::from_ymd_opt(2024, 2, 28).unwrap();
        let filings = vec![
            FilingRecord::new("819118", filed_at, "0000819118-24-000001", "rows-2")
                .with_ticker("ABCX"),
        ];

        let outcome = orchestrator(1).process_filings(&filings, |_, _| {}).await;

        assert_eq!(outcome.rows.len(), 2);
        for row in &outcome.rows {
            assert_eq!(row.filed_at, Some(filed_at));
            assert_eq!(row.ticker.as_deref(), Some("ABCX"));
        }
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let outcome = orchestrator(8).process_all(&[], |_, _| {}).await;
        assert!(outcome.rows.is_empty());
        assert_eq!(outcome.processed(), 0);
    }
}
