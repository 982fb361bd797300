//! Filing Locator: paginated search for filings by form type and date range.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate};
use ncsr_core::{
    FilingHit, FilingRecord, FilingSearch, FormType, NcsrError, Result, SearchRequest,
};
use tracing::{debug, error, warn};

/// Results requested per search call.
pub const PAGE_SIZE: usize = 50;

/// Build the search query for a set of form types and a filing-date range.
///
/// ```
/// use chrono::NaiveDate;
/// use ncsr::{FormType, build_query};
///
/// let query = build_query(
///     &FormType::shareholder_reports(),
///     NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
///     NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
/// );
/// assert_eq!(
///     query,
///     r#"(formType:"N-CSR" OR formType:"N-CSRS") AND filedAt:[2024-01-01 TO 2024-06-30]"#
/// );
/// ```
#[must_use]
pub fn build_query(form_types: &[FormType], from: NaiveDate, to: NaiveDate) -> String {
    let forms = form_types
        .iter()
        .map(|form| format!("formType:\"{}\"", form))
        .collect::<Vec<_>>()
        .join(" OR ");

    format!(
        "({}) AND filedAt:[{} TO {}]",
        forms,
        from.format("%Y-%m-%d"),
        to.format("%Y-%m-%d")
    )
}

/// Pages through a [`FilingSearch`] endpoint collecting [`FilingRecord`]s.
#[derive(Debug, Clone)]
pub struct FilingLocator {
    search: Arc<dyn FilingSearch>,
    page_size: usize,
}

impl FilingLocator {
    /// Create a locator over a search endpoint with the default page size.
    #[must_use]
    pub fn new(search: Arc<dyn FilingSearch>) -> Self {
        Self {
            search,
            page_size: PAGE_SIZE,
        }
    }

    /// Set the page size (at least one).
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Locate at most `limit` filings, most recently filed first.
    ///
    /// Any search failure is logged and yields an empty sequence.
    pub async fn locate(
        &self,
        form_types: &[FormType],
        from: NaiveDate,
        to: NaiveDate,
        limit: usize,
    ) -> Vec<FilingRecord> {
        match self.try_locate(form_types, from, to, limit).await {
            Ok(records) => records,
            Err(e) => {
                error!(
                    provider = self.search.name(),
                    error = %e,
                    "Filing search failed"
                );
                Vec::new()
            }
        }
    }

    /// Locate at most `limit` filings, propagating search failures.
    ///
    /// Stops paging once `limit` records are collected, a page comes back
    /// empty, or the endpoint reports no further results. The endpoint's
    /// ordering is kept as is.
    pub async fn try_locate(
        &self,
        form_types: &[FormType],
        from: NaiveDate,
        to: NaiveDate,
        limit: usize,
    ) -> Result<Vec<FilingRecord>> {
        validate(form_types, from, to, limit)?;

        let mut request = SearchRequest::new(build_query(form_types, from, to), self.page_size);
        let mut records = Vec::new();

        loop {
            let page = self.search.search(&request).await?;

            let Some(hits) = page.filings.as_ref() else {
                debug!(from = request.from, "Search endpoint reported no more data");
                break;
            };
            if hits.is_empty() {
                debug!(from = request.from, "Search returned an empty page");
                break;
            }

            let consumed = request.from + hits.len();
            records.extend(hits.iter().filter_map(filing_record));
            debug!(
                from = request.from,
                hits = hits.len(),
                collected = records.len(),
                "Fetched search page"
            );

            if records.len() >= limit || !page.has_more_after(consumed) {
                break;
            }
            request = request.next_page();
        }

        records.truncate(limit);
        Ok(records)
    }
}

fn validate(form_types: &[FormType], from: NaiveDate, to: NaiveDate, limit: usize) -> Result<()> {
    if limit == 0 {
        return Err(NcsrError::InvalidParameter(
            "Limit must be a positive integer".to_string(),
        ));
    }
    if form_types.is_empty() {
        return Err(NcsrError::InvalidParameter(
            "Select at least one form type".to_string(),
        ));
    }
    if from > to {
        return Err(NcsrError::InvalidParameter(format!(
            "From date {} is after to date {}",
            from, to
        )));
    }
    Ok(())
}

/// Normalize a search hit, skipping hits that cannot identify a filing.
fn filing_record(hit: &FilingHit) -> Option<FilingRecord> {
    let Some(url) = hit.link_to_filing_details.as_deref().filter(|u| !u.is_empty()) else {
        warn!(accession = ?hit.accession_no, "Skipping search hit without a filing URL");
        return None;
    };

    let Some(filed_at) = hit.filed_at.as_deref().and_then(parse_filed_at) else {
        warn!(filing_url = url, filed_at = ?hit.filed_at, "Skipping search hit without a filing date");
        return None;
    };

    let mut record = FilingRecord::new(
        hit.cik.clone().unwrap_or_default(),
        filed_at,
        hit.accession_no.clone().unwrap_or_default(),
        url,
    );
    record.ticker.clone_from(&hit.ticker);
    record.form_type.clone_from(&hit.form_type);
    record.company_name.clone_from(&hit.company_name);
    Some(record)
}

/// Parse an RFC 3339 timestamp or a plain `YYYY-MM-DD` date.
fn parse_filed_at(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok())
}
